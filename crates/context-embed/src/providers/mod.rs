pub mod local;
pub mod openai;

/// A source of embedding vectors for a batch of texts. `LocalEmbedder`
/// implements this for production use; tests substitute a stub.
#[async_trait::async_trait]
pub trait EmbedProvider: Send + Sync {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Whether a provider failure is worth retrying (spec §4.9: "transient
/// network errors, HTTP 429, HTTP 5xx").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Retryable,
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("missing credential")]
    MissingCredential,
}

impl ProviderError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ProviderError::Transport(_) => FailureKind::Retryable,
            ProviderError::Http { status, .. } => {
                if *status == 429 || (500..600).contains(status) {
                    FailureKind::Retryable
                } else {
                    FailureKind::Fatal
                }
            }
            ProviderError::MissingCredential => FailureKind::Fatal,
        }
    }
}
