use std::sync::Arc;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use super::ProviderError;

pub const DIMENSION: usize = context_core::types::defaults::EMBED_DIM_FALLBACK;

/// Fallback embedding provider: a local ONNX model run through `fastembed`,
/// used when the primary provider is unconfigured or exhausts its retries
/// (spec §4.9). Loaded once and shared; `embed` is synchronous CPU work and
/// is always invoked via `spawn_blocking` by the gateway.
#[derive(Clone)]
pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl LocalEmbedder {
    pub fn try_new() -> Result<Self, ProviderError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(false),
        )
        .map_err(|e| ProviderError::Transport(format!("local embedder init: {e}")))?;
        Ok(LocalEmbedder {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait::async_trait]
impl super::EmbedProvider for LocalEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ProviderError> {
        let model = self.model.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = model.blocking_lock();
            guard
                .embed(texts, None)
                .map_err(|e| ProviderError::Transport(format!("local embed: {e}")))
        })
        .await
        .map_err(|e| ProviderError::Transport(format!("embedder task panicked: {e}")))?
    }
}
