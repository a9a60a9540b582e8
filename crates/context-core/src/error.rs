use thiserror::Error;

use crate::DocumentId;

pub type Result<T> = std::result::Result<T, Error>;

/// Workspace-wide error enum. One variant per error kind named by the
/// engine's contract; callers at the HTTP boundary map `severity()` onto
/// status codes rather than matching on variants directly.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("document exceeds the size ceiling ({size_bytes} bytes > {limit_bytes} bytes)")]
    Oversize { size_bytes: u64, limit_bytes: u64 },

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("embedder unavailable: both primary and fallback failed ({0})")]
    EmbedderUnavailable(String),

    #[error("index dimension mismatch: expected {expected}, found {found}")]
    IndexDimensionMismatch { expected: usize, found: usize },

    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("document not ready: {0} (status: {status})")]
    DocumentNotReady { id: DocumentId, status: String },

    #[error("query must not be empty")]
    EmptyQuery,

    #[error("store error: {0}")]
    StoreError(String),

    #[error("worker task panicked: {0}")]
    WorkerPanicked(String),

    #[error("cancelled")]
    Cancelled,
}

/// Coarse classification used to map errors onto transport status codes
/// without leaking internals (see spec §7: "generic 500 without leaking
/// internals").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller's fault: malformed input, empty query, unknown id. Maps to 4xx.
    Client,
    /// Engine/dependency fault. Maps to 5xx.
    Server,
    /// Request was withdrawn; no error surface is owed to the caller.
    Cancelled,
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::UnsupportedFormat(_)
            | Error::DecodeError(_)
            | Error::Oversize { .. }
            | Error::DocumentNotFound(_)
            | Error::DocumentNotReady { .. }
            | Error::EmptyQuery => Severity::Client,
            Error::TokenizerError(_)
            | Error::EmbedderUnavailable(_)
            | Error::IndexDimensionMismatch { .. }
            | Error::StoreError(_)
            | Error::WorkerPanicked(_) => Severity::Server,
            Error::Cancelled => Severity::Cancelled,
        }
    }
}
