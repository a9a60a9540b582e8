use std::time::{Duration, Instant};

use async_trait::async_trait;
use context_core::{Chunk, Document, DocumentId, DocumentStatus, Error, IndexArtifact, Result};
use dashmap::DashMap;

struct DocumentRecord {
    document: Document,
    text: String,
    chunks: Vec<Chunk>,
}

/// In-memory `MetadataStore`. Not durable across process restarts; stands
/// in for the relational store the spec places out of scope.
#[derive(Default)]
pub struct InMemoryStore {
    documents: DashMap<DocumentId, DocumentRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }
}

#[async_trait]
impl crate::MetadataStore for InMemoryStore {
    async fn put_document(&self, doc: Document, text: String, chunks: Vec<Chunk>) -> Result<()> {
        self.documents.insert(
            doc.id,
            DocumentRecord {
                document: doc,
                text,
                chunks,
            },
        );
        Ok(())
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        Ok(self.documents.get(&id).map(|r| r.document.clone()))
    }

    async fn list_documents(&self, limit: usize) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self.documents.iter().map(|r| r.document.clone()).collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        docs.truncate(limit);
        Ok(docs)
    }

    async fn get_text(&self, id: DocumentId) -> Result<Option<String>> {
        Ok(self.documents.get(&id).map(|r| r.text.clone()))
    }

    async fn get_chunks(&self, id: DocumentId) -> Result<Vec<Chunk>> {
        Ok(self
            .documents
            .get(&id)
            .map(|r| r.chunks.clone())
            .unwrap_or_default())
    }

    async fn update_status(&self, id: DocumentId, status: DocumentStatus) -> Result<()> {
        let mut entry = self
            .documents
            .get_mut(&id)
            .ok_or(Error::DocumentNotFound(id))?;
        entry.document.status = status;
        Ok(())
    }

    async fn delete_document(&self, id: DocumentId) -> Result<()> {
        self.documents.remove(&id);
        Ok(())
    }
}

struct CacheEntry {
    artifact: IndexArtifact,
    inserted_at: Instant,
}

/// In-memory `IndexCache` with an optional TTL, checked lazily on `get`
/// (spec §4.11: "default is unbounded").
pub struct InMemoryCache {
    entries: DashMap<DocumentId, CacheEntry>,
    ttl: Option<Duration>,
}

impl InMemoryCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        InMemoryCache {
            entries: DashMap::new(),
            ttl,
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        InMemoryCache::new(None)
    }
}

#[async_trait]
impl crate::IndexCache for InMemoryCache {
    async fn get(&self, id: DocumentId) -> Option<IndexArtifact> {
        let expired = self.entries.get(&id).is_some_and(|entry| {
            self.ttl
                .is_some_and(|ttl| entry.inserted_at.elapsed() > ttl)
        });
        if expired {
            self.entries.remove(&id);
            return None;
        }
        self.entries.get(&id).map(|e| e.artifact.clone())
    }

    async fn put(&self, id: DocumentId, artifact: IndexArtifact) {
        // Best-effort: an in-memory map cannot fail, but a real cache
        // backend would log-and-swallow here rather than propagate.
        self.entries.insert(
            id,
            CacheEntry {
                artifact,
                inserted_at: Instant::now(),
            },
        );
    }

    async fn invalidate(&self, id: DocumentId) {
        self.entries.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexCache, MetadataStore};
    use context_core::{Bm25Stats, FormatAttributes, Tier};
    use std::collections::HashMap;

    fn sample_document() -> Document {
        Document {
            id: DocumentId::new(),
            filename: "a.txt".to_string(),
            byte_size: 10,
            mime_type: Some("text/plain".to_string()),
            token_count: 5,
            tier: Tier::One,
            attributes: FormatAttributes::default(),
            status: DocumentStatus::Ready,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryStore::new();
        let doc = sample_document();
        let id = doc.id;
        store
            .put_document(doc, "hello".to_string(), vec![])
            .await
            .unwrap();
        let fetched = store.get_document(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(store.get_text(id).await.unwrap().unwrap(), "hello");
    }

    #[tokio::test]
    async fn unknown_document_update_status_errors() {
        let store = InMemoryStore::new();
        let err = store
            .update_status(DocumentId::new(), DocumentStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn cache_put_then_get_round_trips() {
        let cache = InMemoryCache::default();
        let id = DocumentId::new();
        let artifact = IndexArtifact {
            doc_id: id,
            chunk_texts: vec!["a".to_string()],
            bm25: Bm25Stats {
                chunk_count: 1,
                avg_chunk_len: 1.0,
                chunk_lengths: vec![1],
                doc_freq: HashMap::new(),
                term_freqs: vec![HashMap::new()],
            },
            embeddings: None,
        };
        cache.put(id, artifact).await;
        assert!(cache.get(id).await.is_some());
        cache.invalidate(id).await;
        assert!(cache.get(id).await.is_none());
    }

    #[tokio::test]
    async fn cache_ttl_expires_entries() {
        let cache = InMemoryCache::new(Some(Duration::from_millis(10)));
        let id = DocumentId::new();
        let artifact = IndexArtifact {
            doc_id: id,
            chunk_texts: vec![],
            bm25: Bm25Stats {
                chunk_count: 0,
                avg_chunk_len: 0.0,
                chunk_lengths: vec![],
                doc_freq: HashMap::new(),
                term_freqs: vec![],
            },
            embeddings: None,
        };
        cache.put(id, artifact).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get(id).await.is_none());
    }
}
