//! `MetadataStore` and `IndexCache` traits plus in-memory reference
//! implementations. Both are explicitly external collaborators per spec
//! §1; these impls make the engine runnable end to end without a real
//! database or cache deployed.

mod memory;

use async_trait::async_trait;
use context_core::{Chunk, Document, DocumentId, DocumentStatus, IndexArtifact, Result};

pub use memory::{InMemoryCache, InMemoryStore};

/// The persistent, strongly-consistent store of documents and chunks
/// (spec §6: `documents` / `chunks` tables). Documents and their chunks
/// are written in a single transaction per upload.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_document(&self, doc: Document, text: String, chunks: Vec<Chunk>) -> Result<()>;
    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>>;
    async fn list_documents(&self, limit: usize) -> Result<Vec<Document>>;
    async fn get_text(&self, id: DocumentId) -> Result<Option<String>>;
    async fn get_chunks(&self, id: DocumentId) -> Result<Vec<Chunk>>;
    async fn update_status(&self, id: DocumentId, status: DocumentStatus) -> Result<()>;
    async fn delete_document(&self, id: DocumentId) -> Result<()>;
}

/// The eventually-consistent, authoritative-nowhere cache of index
/// artifacts (spec §4.11). `put` is best-effort: failures are logged and
/// swallowed, never surfaced, since the artifact is always rebuildable
/// from durable chunks.
#[async_trait]
pub trait IndexCache: Send + Sync {
    async fn get(&self, id: DocumentId) -> Option<IndexArtifact>;
    async fn put(&self, id: DocumentId, artifact: IndexArtifact);
    async fn invalidate(&self, id: DocumentId);
}
