//! Deterministic, thread-safe token counting and token-bounded slicing
//! against the `cl100k_base` BPE vocabulary.
//!
//! The `CoreBPE` table is loaded once into a process-wide [`OnceLock`] and
//! never mutated afterward, matching the "process-wide, read-only after
//! initialization" rule for shared resources.

use std::sync::OnceLock;

use context_core::{Error, Result};
use tiktoken_rs::CoreBPE;

static BPE: OnceLock<CoreBPE> = OnceLock::new();

fn bpe() -> &'static CoreBPE {
    BPE.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k_base vocabulary must load"))
}

/// Exact token count for `text` under the fixed vocabulary.
pub fn count(text: &str) -> u32 {
    bpe().encode_with_special_tokens(text).len() as u32
}

/// The longest prefix of `text` whose token count is `<= max_tokens`,
/// without ever splitting a multi-byte token (spec §4.2, §9).
pub fn slice(text: &str, max_tokens: u32) -> String {
    let tokens = bpe().encode_with_special_tokens(text);
    if tokens.len() as u32 <= max_tokens {
        return text.to_string();
    }
    let prefix = &tokens[..max_tokens as usize];
    bpe()
        .decode(prefix.to_vec())
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "token slice failed to decode cleanly, returning empty prefix");
            String::new()
        })
}

/// Same as [`slice`] but reports whether truncation actually occurred.
pub fn try_slice(text: &str, max_tokens: u32) -> Result<(String, bool)> {
    let tokens = bpe().encode_with_special_tokens(text);
    if tokens.len() as u32 <= max_tokens {
        return Ok((text.to_string(), false));
    }
    let prefix = &tokens[..max_tokens as usize];
    let decoded = bpe()
        .decode(prefix.to_vec())
        .map_err(|e| Error::TokenizerError(e.to_string()))?;
    Ok((decoded, true))
}
