use std::collections::HashMap;

use context_core::types::defaults;
use context_core::Bm25Stats;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "that", "the", "to", "was", "were", "will", "with",
];

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").unwrap());

/// Lowercases, Unicode-normalizes (NFKC) and splits on non-word characters,
/// dropping a small stopword list (spec §4.7).
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text.nfkc().collect();
    WORD.split(&normalized.to_lowercase())
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params {
            k1: defaults::BM25_K1,
            b: defaults::BM25_B,
        }
    }
}

/// An in-memory BM25 index over one document's chunks. Deterministic for a
/// fixed (chunks, params) pair (property 8).
#[derive(Debug, Clone)]
pub struct Bm25Index {
    stats: Bm25Stats,
    params: Bm25Params,
}

impl Bm25Index {
    /// Builds sufficient statistics over `chunk_texts`.
    pub fn build(chunk_texts: &[String], params: Bm25Params) -> Bm25Index {
        let term_freqs: Vec<HashMap<String, u32>> = chunk_texts
            .iter()
            .map(|text| {
                let mut tf = HashMap::new();
                for term in tokenize(text) {
                    *tf.entry(term).or_insert(0u32) += 1;
                }
                tf
            })
            .collect();

        let chunk_lengths: Vec<u32> = term_freqs.iter().map(|tf| tf.values().sum()).collect();
        let avg_chunk_len = if chunk_lengths.is_empty() {
            0.0
        } else {
            chunk_lengths.iter().map(|&l| l as f64).sum::<f64>() / chunk_lengths.len() as f64
        };

        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        for tf in &term_freqs {
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }

        Bm25Index {
            stats: Bm25Stats {
                chunk_count: chunk_texts.len() as u32,
                avg_chunk_len,
                chunk_lengths,
                doc_freq,
                term_freqs,
            },
            params,
        }
    }

    pub fn from_stats(stats: Bm25Stats, params: Bm25Params) -> Bm25Index {
        Bm25Index { stats, params }
    }

    pub fn stats(&self) -> &Bm25Stats {
        &self.stats
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.stats.chunk_count as f64;
        let df = *self.stats.doc_freq.get(term).unwrap_or(&0) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score_chunk(&self, chunk_index: usize, query_terms: &[String]) -> f64 {
        let tf_map = &self.stats.term_freqs[chunk_index];
        let len = self.stats.chunk_lengths[chunk_index] as f64;
        let avg_len = self.stats.avg_chunk_len.max(1e-9);
        let (k1, b) = (self.params.k1, self.params.b);

        query_terms
            .iter()
            .map(|t| {
                let tf = *tf_map.get(t).unwrap_or(&0) as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                let idf = self.idf(t);
                idf * tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * len / avg_len))
            })
            .sum()
    }

    /// Ranks every chunk against `query`, descending score, ties broken by
    /// ascending chunk index (property 8).
    pub fn rank(&self, query: &str) -> Vec<(u32, f64)> {
        let query_terms = tokenize(query);
        let mut scored: Vec<(u32, f64)> = (0..self.stats.chunk_count)
            .map(|i| (i, self.score_chunk(i as usize, &query_terms)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored
    }
}
