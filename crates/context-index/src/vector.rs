use context_core::{EmbeddingMatrix, Error, Result};

/// A flat, exact cosine-similarity index. Similarity is plain dot product
/// since embeddings are L2-normalized at build time (spec §4.8).
#[derive(Debug, Clone)]
pub struct VectorIndex {
    matrix: EmbeddingMatrix,
}

impl VectorIndex {
    pub fn new(matrix: EmbeddingMatrix) -> VectorIndex {
        VectorIndex { matrix }
    }

    pub fn dimension(&self) -> usize {
        self.matrix.dimension
    }

    pub fn chunk_count(&self) -> usize {
        self.matrix.chunk_count
    }

    /// Exact top-`k` search by cosine similarity. Returns `(chunk_index,
    /// score)` pairs sorted descending by score, ties broken by ascending
    /// index for determinism.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f64)>> {
        if query.len() != self.matrix.dimension {
            return Err(Error::IndexDimensionMismatch {
                expected: self.matrix.dimension,
                found: query.len(),
            });
        }

        let mut scored: Vec<(u32, f64)> = (0..self.matrix.chunk_count)
            .map(|i| (i as u32, dot(self.matrix.row(i), query)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum()
}

pub use context_core::l2_normalize as normalize;

#[cfg(test)]
mod tests {
    use super::*;
    use context_core::EmbedderId;

    fn matrix() -> EmbeddingMatrix {
        let mut rows = vec![vec![1.0f32, 0.0], vec![0.0f32, 1.0], vec![0.7071f32, 0.7071]];
        for r in rows.iter_mut() {
            normalize(r);
        }
        EmbeddingMatrix {
            embedder: EmbedderId::Fallback,
            dimension: 2,
            chunk_count: rows.len(),
            data: rows.into_iter().flatten().collect(),
        }
    }

    #[test]
    fn finds_closest_vector() {
        let idx = VectorIndex::new(matrix());
        let results = idx.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].0, 0);
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn scores_are_bounded() {
        let idx = VectorIndex::new(matrix());
        for (_, score) in idx.search(&[0.0, 1.0], 3).unwrap() {
            assert!((-1.0..=1.0001).contains(&score));
        }
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let idx = VectorIndex::new(matrix());
        let err = idx.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, Error::IndexDimensionMismatch { .. }));
    }
}
