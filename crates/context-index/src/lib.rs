//! Tier-3/4 machinery: boilerplate trimming, sentence-aware chunking, BM25
//! lexical ranking, and the flat cosine-similarity vector index.

pub mod bm25;
pub mod chunker;
pub mod sentence;
pub mod trimmer;
pub mod vector;

pub use bm25::Bm25Index;
pub use chunker::{chunk, ChunkerConfig};
pub use trimmer::trim;
pub use vector::VectorIndex;
