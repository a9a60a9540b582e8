use std::future::Future;
use std::sync::Arc;

use context_core::{DocumentId, Result};
use dashmap::DashMap;
use tokio::sync::OnceCell;

/// Per-document-id rendezvous for index builds (spec §4.10, §9): a map
/// from document id to a shared, lazily-initialized cell. The map itself
/// is only touched for the instant it takes to clone or insert an `Arc`;
/// the actual build work runs outside that critical section, and
/// concurrent callers for the same id all await the same `OnceCell`.
#[derive(Default)]
pub struct SingleFlight {
    inflight: DashMap<DocumentId, Arc<OnceCell<Arc<context_core::IndexArtifact>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        SingleFlight::default()
    }

    /// Runs `build` at most once per `id` among all concurrently-waiting
    /// callers (property 9). If `build` fails — including on cancellation
    /// — the cell is left uninitialized so a later caller may retry.
    pub async fn get_or_build<F, Fut>(&self, id: DocumentId, build: F) -> Result<Arc<context_core::IndexArtifact>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<context_core::IndexArtifact>>,
    {
        let cell = self
            .inflight
            .entry(id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell.get_or_try_init(|| async { build().await.map(Arc::new) }).await;

        // The cell is single-use from this map's point of view: once it
        // resolves (success or failure) we drop our bookkeeping entry so a
        // future invalidate-and-rebuild starts clean.
        self.inflight.remove(&id);

        result.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_core::Bm25Stats;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn artifact(id: DocumentId) -> context_core::IndexArtifact {
        context_core::IndexArtifact {
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
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_build() {
        let flight = Arc::new(SingleFlight::new());
        let id = DocumentId::new();
        let build_count = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let build_count = build_count.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .get_or_build(id, || async {
                        build_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Ok(artifact(id))
                    })
                    .await
            }));
        }

        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(build_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_build_allows_retry() {
        let flight = SingleFlight::new();
        let id = DocumentId::new();

        let first = flight
            .get_or_build(id, || async { Err(context_core::Error::Cancelled) })
            .await;
        assert!(first.is_err());

        let second = flight.get_or_build(id, || async { Ok(artifact(id)) }).await;
        assert!(second.is_ok());
    }
}
