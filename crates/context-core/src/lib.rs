//! Shared types and error definitions for the document context engine.
//!
//! This crate has no I/O of its own; it exists so that `context-loader`,
//! `context-index`, `context-embed`, `context-store` and `context-rag` can
//! agree on a single `Document`/`Chunk`/`Budget`/`Error` vocabulary without
//! depending on one another.

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result, Severity};
pub use ids::DocumentId;
pub use types::*;
