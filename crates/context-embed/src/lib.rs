//! Embedding Gateway: calls the primary remote embedder with bounded
//! retries, falling back to a local model on exhaustion or missing
//! credentials (spec §4.9).

pub mod cancel;
pub mod gateway;
pub mod providers;

pub use cancel::{CancellationListener, CancellationToken};
pub use gateway::EmbeddingGateway;
pub use providers::{local::LocalEmbedder, openai::OpenAiEmbedder, EmbedProvider, ProviderError};
