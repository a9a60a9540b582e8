use context_core::types::defaults;

use crate::sentence;

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub target_tokens: u32,
    pub overlap_tokens: u32,
    pub max_tokens: u32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        ChunkerConfig {
            target_tokens: defaults::CHUNK_TARGET_TOKENS,
            overlap_tokens: defaults::CHUNK_OVERLAP_TOKENS,
            max_tokens: defaults::CHUNK_MAX_TOKENS,
        }
    }
}

/// A chunk before it is attached to a document id; `index` is assigned by
/// position in the returned vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub text: String,
    pub token_count: u32,
}

/// Sentence-aware greedy chunking with sentence-aligned overlap (spec
/// §4.6). Every sentence in `text` appears in at least one returned chunk;
/// overlap regions appear in exactly two.
pub fn chunk(text: &str, config: &ChunkerConfig) -> Vec<ChunkSpan> {
    let sentences = expand_oversized(sentence::segment(text), config.max_tokens);
    if sentences.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<Sentence> = Vec::new();
    let mut current_tokens: u32 = 0;

    for s in sentences {
        let would_overflow = current_tokens.saturating_add(s.tokens) > config.max_tokens;
        let reached_target = current_tokens >= config.target_tokens;
        if !current.is_empty() && (would_overflow || reached_target) {
            chunks.push(emit(&current));
            current = overlap_suffix(&current, config.overlap_tokens);
            current_tokens = current.iter().map(|s| s.tokens).sum();
        }
        current_tokens += s.tokens;
        current.push(s);
    }

    if !current.is_empty() {
        chunks.push(emit(&current));
    }

    chunks
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Sentence {
    text: String,
    tokens: u32,
}

fn expand_oversized(raw: Vec<String>, max_tokens: u32) -> Vec<Sentence> {
    let mut out = Vec::with_capacity(raw.len());
    for s in raw {
        let tokens = context_tokenize::count(&s);
        if tokens <= max_tokens {
            out.push(Sentence { text: s, tokens });
            continue;
        }
        // Oversize sentence: split on token boundaries, accepting the
        // oversize is not possible here since we must stay <= max_tokens
        // per chunk (property 5), so we slice repeatedly instead.
        let mut remaining = s.as_str();
        while !remaining.is_empty() {
            let piece = context_tokenize::slice(remaining, max_tokens);
            if piece.is_empty() {
                break;
            }
            let piece_tokens = context_tokenize::count(&piece);
            out.push(Sentence {
                text: piece.clone(),
                tokens: piece_tokens,
            });
            remaining = &remaining[piece.len()..];
        }
    }
    out
}

fn emit(sentences: &[Sentence]) -> ChunkSpan {
    let text = sentences
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let token_count = context_tokenize::count(&text);
    ChunkSpan { text, token_count }
}

fn overlap_suffix(sentences: &[Sentence], overlap_tokens: u32) -> Vec<Sentence> {
    if overlap_tokens == 0 {
        return Vec::new();
    }
    let mut acc = 0u32;
    let mut suffix = Vec::new();
    for s in sentences.iter().rev() {
        if acc >= overlap_tokens {
            break;
        }
        acc += s.tokens;
        suffix.push(s.clone());
    }
    suffix.reverse();
    suffix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_chunk_respects_max_tokens() {
        let body = "This is sentence number filler text to pad things out nicely. ".repeat(200);
        let config = ChunkerConfig::default();
        let chunks = chunk(&body, &config);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.token_count <= config.max_tokens);
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let body = "Sentence one is here. Sentence two follows along. Sentence three continues. Sentence four wraps up. Sentence five adds more. Sentence six keeps going. Sentence seven arrives now. Sentence eight is nearly done. Sentence nine almost there. Sentence ten finishes the set.".repeat(30);
        let config = ChunkerConfig {
            target_tokens: 40,
            overlap_tokens: 10,
            max_tokens: 60,
        };
        let chunks = chunk(&body, &config);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk("", &ChunkerConfig::default()).is_empty());
    }
}
