use serde::Deserialize;

use context_core::types::defaults;

/// Engine-wide configuration, sourced from environment variables with the
/// defaults listed in spec §6. Loaded once at startup by the binary that
/// embeds this crate; the engine itself never re-reads it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub openai_api_key: Option<String>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub upload_dir: Option<String>,

    pub max_file_size_mb: u64,

    pub tier1_max_tokens: u32,
    pub tier2_max_tokens: u32,
    pub tier3_max_tokens: u32,

    pub chunk_target_tokens: u32,
    pub chunk_overlap_tokens: u32,
    pub chunk_max_tokens: u32,

    pub rag_top_k: usize,

    pub total_context_window: u32,
    pub reserved_system_tokens: u32,
    pub reserved_history_tokens: u32,
    pub reserved_response_tokens: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            openai_api_key: None,
            database_url: None,
            redis_url: None,
            upload_dir: None,
            max_file_size_mb: defaults::MAX_FILE_SIZE_MB,
            tier1_max_tokens: defaults::TIER1_MAX_TOKENS,
            tier2_max_tokens: defaults::TIER2_MAX_TOKENS,
            tier3_max_tokens: defaults::TIER3_MAX_TOKENS,
            chunk_target_tokens: defaults::CHUNK_TARGET_TOKENS,
            chunk_overlap_tokens: defaults::CHUNK_OVERLAP_TOKENS,
            chunk_max_tokens: defaults::CHUNK_MAX_TOKENS,
            rag_top_k: defaults::RAG_TOP_K,
            total_context_window: defaults::TOTAL_CONTEXT_WINDOW,
            reserved_system_tokens: defaults::RESERVED_SYSTEM_TOKENS,
            reserved_history_tokens: defaults::RESERVED_HISTORY_TOKENS,
            reserved_response_tokens: defaults::RESERVED_RESPONSE_TOKENS,
        }
    }
}

impl EngineConfig {
    /// Loads a local `.env` if present, then overlays environment
    /// variables on top of the defaults above (`OPENAI_API_KEY`,
    /// `TIER1_MAX_TOKENS`, etc., per spec §6).
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = EngineConfig::default();
        let builder = config::Config::builder()
            .set_default("max_file_size_mb", defaults.max_file_size_mb)?
            .set_default("tier1_max_tokens", defaults.tier1_max_tokens)?
            .set_default("tier2_max_tokens", defaults.tier2_max_tokens)?
            .set_default("tier3_max_tokens", defaults.tier3_max_tokens)?
            .set_default("chunk_target_tokens", defaults.chunk_target_tokens)?
            .set_default("chunk_overlap_tokens", defaults.chunk_overlap_tokens)?
            .set_default("chunk_max_tokens", defaults.chunk_max_tokens)?
            .set_default("rag_top_k", defaults.rag_top_k as i64)?
            .set_default("total_context_window", defaults.total_context_window)?
            .set_default("reserved_system_tokens", defaults.reserved_system_tokens)?
            .set_default("reserved_history_tokens", defaults.reserved_history_tokens)?
            .set_default("reserved_response_tokens", defaults.reserved_response_tokens)?
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .prefix_separator("__"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn budget(&self) -> context_core::Budget {
        context_core::Budget::new(
            self.total_context_window,
            self.reserved_system_tokens,
            self.reserved_history_tokens,
            self.reserved_response_tokens,
        )
    }

    pub fn tier_thresholds(&self) -> (u32, u32, u32) {
        (self.tier1_max_tokens, self.tier2_max_tokens, self.tier3_max_tokens)
    }

    pub fn chunker_config(&self) -> context_index::ChunkerConfig {
        context_index::ChunkerConfig {
            target_tokens: self.chunk_target_tokens,
            overlap_tokens: self.chunk_overlap_tokens,
            max_tokens: self.chunk_max_tokens,
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}
