use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DocumentId;

/// Default thresholds and sizes, used when no configuration overrides them.
pub mod defaults {
    pub const TIER1_MAX_TOKENS: u32 = 12_000;
    pub const TIER2_MAX_TOKENS: u32 = 25_000;
    pub const TIER3_MAX_TOKENS: u32 = 50_000;

    pub const CHUNK_TARGET_TOKENS: u32 = 512;
    pub const CHUNK_OVERLAP_TOKENS: u32 = 64;
    pub const CHUNK_MAX_TOKENS: u32 = 768;

    pub const RAG_TOP_K: usize = 10;

    pub const TOTAL_CONTEXT_WINDOW: u32 = 200_000;
    pub const RESERVED_SYSTEM_TOKENS: u32 = 2_000;
    pub const RESERVED_HISTORY_TOKENS: u32 = 10_000;
    pub const RESERVED_RESPONSE_TOKENS: u32 = 4_000;

    pub const MAX_FILE_SIZE_MB: u64 = 50;

    pub const BM25_K1: f64 = 1.5;
    pub const BM25_B: f64 = 0.75;

    pub const EMBED_DIM_PRIMARY: usize = 1536;
    pub const EMBED_DIM_FALLBACK: usize = 384;
}

/// Context-construction strategy, derived once from a document's token
/// count and never revisited (spec §3 invariant: "a document's tier never
/// changes").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tier {
    /// Direct injection of the full canonical text.
    One = 1,
    /// Boilerplate trimming, then direct injection of the trimmed text.
    Two = 2,
    /// Sentence-chunking with BM25 lexical ranking.
    Three = 3,
    /// Embedding-based retrieval with BM25 fallback.
    Four = 4,
}

impl Tier {
    /// Classifies a token count against the three configured thresholds.
    /// Monotone: `t1 <= t2 => classify(t1) <= classify(t2)` (property 3).
    pub fn classify(tokens: u32, tau1: u32, tau2: u32, tau3: u32) -> Tier {
        if tokens <= tau1 {
            Tier::One
        } else if tokens <= tau2 {
            Tier::Two
        } else if tokens <= tau3 {
            Tier::Three
        } else {
            Tier::Four
        }
    }

    pub fn info(&self) -> TierInfo {
        TIER_TABLE[(*self as u8 - 1) as usize]
    }
}

/// Fixed, human-facing metadata returned alongside every tier (spec §4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierInfo {
    pub tier: u8,
    pub label: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

const TIER_TABLE: [TierInfo; 4] = [
    TierInfo {
        tier: 1,
        label: "direct",
        color: "green",
        description: "Small document injected verbatim.",
    },
    TierInfo {
        tier: 2,
        label: "trimmed",
        color: "yellow",
        description: "Boilerplate removed, then injected directly.",
    },
    TierInfo {
        tier: 3,
        label: "chunked",
        color: "orange",
        description: "Sentence-chunked and ranked by lexical relevance.",
    },
    TierInfo {
        tier: 4,
        label: "retrieved",
        color: "red",
        description: "Embedding-based retrieval over chunk vectors.",
    },
];

/// A document's progress through ingestion. Failure at any pre-`Ready`
/// state moves to `Failed` with a reason; there is no transition out of
/// `Ready` besides deletion (handled at the store layer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Uploading,
    Loaded,
    Tokenized,
    Classified,
    Indexed,
    Ready,
    Failed(String),
}

impl DocumentStatus {
    pub fn is_queryable(&self) -> bool {
        matches!(self, DocumentStatus::Ready)
    }
}

/// Format-specific attributes recorded at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatAttributes {
    pub page_count: Option<u32>,
    pub row_count: Option<u32>,
}

/// Identity and metadata for one uploaded document. Immutable once created
/// (spec §3: "Created once at upload; immutable thereafter").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub byte_size: u64,
    pub mime_type: Option<String>,
    pub token_count: u32,
    pub tier: Tier,
    pub attributes: FormatAttributes,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

/// A contiguous, token-bounded, sentence-aligned fragment of canonical
/// text. Exists only for documents with `tier >= Tier::Three`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: DocumentId,
    pub index: u32,
    pub token_count: u32,
    pub text: String,
    pub section: Option<String>,
}

/// Which embedder produced a set of vectors. Recorded with the artifact so
/// a later query can validate dimension before reuse (spec §4.9, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedderId {
    Primary,
    Fallback,
}

impl EmbedderId {
    pub fn dimension(&self) -> usize {
        match self {
            EmbedderId::Primary => defaults::EMBED_DIM_PRIMARY,
            EmbedderId::Fallback => defaults::EMBED_DIM_FALLBACK,
        }
    }
}

/// BM25 sufficient statistics for a document's chunk set, persisted as
/// part of the index artifact so lexical ranking never needs to re-tokenize
/// chunk text on every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Stats {
    pub chunk_count: u32,
    pub avg_chunk_len: f64,
    pub chunk_lengths: Vec<u32>,
    pub doc_freq: HashMap<String, u32>,
    pub term_freqs: Vec<HashMap<String, u32>>,
}

/// The per-document bundle cached between queries: chunk texts, BM25
/// statistics, and (if embedding succeeded) the flat embedding matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexArtifact {
    pub doc_id: DocumentId,
    pub chunk_texts: Vec<String>,
    pub bm25: Bm25Stats,
    pub embeddings: Option<EmbeddingMatrix>,
}

/// Row-major N×d matrix of L2-normalized embedding vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    pub embedder: EmbedderId,
    pub dimension: usize,
    pub chunk_count: usize,
    pub data: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn row(&self, i: usize) -> &[f32] {
        let start = i * self.dimension;
        &self.data[start..start + self.dimension]
    }
}

/// L2-normalizes a vector in place so that dot product equals cosine
/// similarity (spec §4.8).
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

/// Fixed-role partition of the context window (spec §3). `document` is the
/// only role computed dynamically; the others are configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Budget {
    pub total_window: u32,
    pub system: u32,
    pub history: u32,
    pub buffer: u32,
    pub document: u32,
}

impl Budget {
    /// `document = total_window - system - history - buffer`, clamped to
    /// `>= 0`. Invariant `system + history + buffer + document ==
    /// total_window` holds whenever the reserved roles do not exceed the
    /// window (otherwise `document` absorbs the clamp and the invariant is
    /// intentionally broken in the caller's favor of a non-negative role).
    pub fn new(total_window: u32, system: u32, history: u32, buffer: u32) -> Self {
        let reserved = system.saturating_add(history).saturating_add(buffer);
        let document = total_window.saturating_sub(reserved);
        Budget {
            total_window,
            system,
            history,
            buffer,
            document,
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Budget::new(
            defaults::TOTAL_CONTEXT_WINDOW,
            defaults::RESERVED_SYSTEM_TOKENS,
            defaults::RESERVED_HISTORY_TOKENS,
            defaults::RESERVED_RESPONSE_TOKENS,
        )
    }
}

/// Result of allocating the dynamic document role against a requested
/// length (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Allocation {
    pub granted: u32,
    pub truncated: bool,
    pub utilization_pct: u32,
}

pub fn allocate(budget: &Budget, d_req: u32) -> Allocation {
    let granted = d_req.min(budget.document);
    let truncated = granted < d_req;
    let utilization_pct = ((100u64 * granted as u64) / (d_req.max(1) as u64)) as u32;
    Allocation {
        granted,
        truncated,
        utilization_pct,
    }
}

/// One accepted chunk in an assembled context, reported back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkUse {
    pub index: u32,
    pub tokens: u32,
    pub score: f64,
}

/// The final product of a query: assembled text plus enough bookkeeping
/// for the caller to understand how it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    pub token_count: u32,
    pub chunks_used: Vec<ChunkUse>,
    pub strategy_notes: String,
    pub budget: Budget,
    pub tier: Tier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_classification_is_monotone() {
        let (t1, t2, t3) = (12_000, 25_000, 50_000);
        let samples = [0, 1, 11_999, 12_000, 12_001, 24_999, 25_000, 25_001, 49_999, 50_000, 50_001, 1_000_000];
        for w in samples.windows(2) {
            let (a, b) = (w[0], w[1]);
            assert!(a <= b);
            assert!(Tier::classify(a, t1, t2, t3) <= Tier::classify(b, t1, t2, t3));
        }
    }

    #[test]
    fn budget_invariant_holds_when_reserved_fits() {
        let b = Budget::new(200_000, 2_000, 10_000, 4_000);
        assert_eq!(b.system + b.history + b.buffer + b.document, b.total_window);
        assert!(b.document > 0);
    }

    #[test]
    fn budget_clamps_when_reserved_exceeds_window() {
        let b = Budget::new(1_000, 2_000, 10_000, 4_000);
        assert_eq!(b.document, 0);
    }

    #[test]
    fn allocation_reports_truncation() {
        let b = Budget::new(10_000, 0, 0, 0);
        let a = allocate(&b, 20_000);
        assert_eq!(a.granted, 10_000);
        assert!(a.truncated);
        assert_eq!(a.utilization_pct, 50);
    }
}
