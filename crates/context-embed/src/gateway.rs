use std::sync::Arc;
use std::time::Duration;

use context_core::{l2_normalize, EmbedderId, Error, Result};
use rand::Rng;

use crate::cancel::CancellationListener;
use crate::providers::{openai::OpenAiEmbedder, EmbedProvider, FailureKind};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(200);

/// Calls the primary embedder with bounded, jittered exponential backoff;
/// falls back to the local embedder on exhaustion, a fatal error, or a
/// missing credential (spec §4.9).
pub struct EmbeddingGateway {
    primary: OpenAiEmbedder,
    fallback: Arc<dyn EmbedProvider>,
}

impl EmbeddingGateway {
    pub fn new(primary: OpenAiEmbedder, fallback: Arc<dyn EmbedProvider>) -> Self {
        EmbeddingGateway { primary, fallback }
    }

    pub async fn embed(
        &self,
        texts: &[String],
        cancel: &mut CancellationListener,
    ) -> Result<(Vec<Vec<f32>>, EmbedderId)> {
        if texts.is_empty() {
            return Ok((Vec::new(), EmbedderId::Primary));
        }

        if self.primary.is_configured() {
            if let Some(vectors) = self.try_primary(texts, cancel).await? {
                return Ok((normalized(vectors), EmbedderId::Primary));
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let vectors = self
            .fallback
            .embed(texts.to_vec())
            .await
            .map_err(|e| Error::EmbedderUnavailable(e.to_string()))?;
        Ok((normalized(vectors), EmbedderId::Fallback))
    }

    /// Embeds using specifically `embedder`, never the other source. Used
    /// at query time so a tier-4 query never mixes dimensions with the
    /// embedder recorded in the document's artifact (spec §9).
    pub async fn embed_with(
        &self,
        embedder: EmbedderId,
        texts: &[String],
        cancel: &mut CancellationListener,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match embedder {
            EmbedderId::Primary => {
                if !self.primary.is_configured() {
                    return Err(Error::EmbedderUnavailable(
                        "primary not configured".to_string(),
                    ));
                }
                match self.try_primary(texts, cancel).await? {
                    Some(vectors) => Ok(normalized(vectors)),
                    None => Err(Error::EmbedderUnavailable(
                        "primary exhausted retries".to_string(),
                    )),
                }
            }
            EmbedderId::Fallback => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let vectors = self
                    .fallback
                    .embed(texts.to_vec())
                    .await
                    .map_err(|e| Error::EmbedderUnavailable(e.to_string()))?;
                Ok(normalized(vectors))
            }
        }
    }

    /// Returns `Ok(Some(vectors))` on success, `Ok(None)` when the caller
    /// should fall back, and `Err` only for cancellation.
    async fn try_primary(
        &self,
        texts: &[String],
        cancel: &mut CancellationListener,
    ) -> Result<Option<Vec<Vec<f32>>>> {
        for attempt in 0..MAX_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.primary.embed_once(texts).await {
                Ok(vectors) => return Ok(Some(vectors)),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "primary embedder attempt failed");
                    if e.failure_kind() == FailureKind::Fatal {
                        return Ok(None);
                    }
                    if attempt + 1 == MAX_ATTEMPTS {
                        return Ok(None);
                    }
                    let backoff = BASE_BACKOFF * 2u32.pow(attempt);
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..50));
                    tokio::select! {
                        _ = tokio::time::sleep(backoff + jitter) => {}
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                    }
                }
            }
        }
        Ok(None)
    }
}

fn normalized(mut vectors: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
    for v in vectors.iter_mut() {
        l2_normalize(v);
    }
    vectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::providers::ProviderError;

    struct StubFallback {
        dimension: usize,
    }

    #[async_trait::async_trait]
    impl EmbedProvider for StubFallback {
        async fn embed(&self, texts: Vec<String>) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts.iter().map(|_| vec![1.0; self.dimension]).collect())
        }
    }

    fn gateway() -> EmbeddingGateway {
        EmbeddingGateway::new(
            OpenAiEmbedder::new(None),
            Arc::new(StubFallback { dimension: 4 }),
        )
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let (_token, mut listener) = CancellationToken::new();
        let (vectors, embedder) = gateway().embed(&[], &mut listener).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(embedder, EmbedderId::Primary);
    }

    #[tokio::test]
    async fn unconfigured_primary_falls_back_immediately() {
        let (_token, mut listener) = CancellationToken::new();
        let (vectors, embedder) = gateway()
            .embed(&["hello".to_string()], &mut listener)
            .await
            .unwrap();
        assert_eq!(embedder, EmbedderId::Fallback);
        assert_eq!(vectors.len(), 1);
        // normalized: a vector of all-1.0 in 4 dims has norm 2, so each
        // component becomes 0.5.
        assert!((vectors[0][0] - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn cancelled_before_dispatch_short_circuits_to_fallback_check() {
        let (token, mut listener) = CancellationToken::new();
        token.cancel();
        let err = gateway()
            .embed(&["hello".to_string()], &mut listener)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
