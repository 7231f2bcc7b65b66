use std::collections::HashMap;

use crate::error::VecError;
use crate::index::{Match, VecIndex};
use crate::similarity::dot;

/// FlatIndex is a brute-force [VecIndex] scoring every stored vector.
/// Exact (no recall loss), O(N) per query. Intended for tests and
/// small-scale deployments (< 1000 subjects).
pub struct FlatIndex {
    dim: usize,
    vectors: HashMap<i64, Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "vecstore: FlatIndex dim must be positive");
        Self {
            dim,
            vectors: HashMap::new(),
        }
    }
}

impl VecIndex for FlatIndex {
    fn insert(&mut self, id: i64, vector: &[f32]) -> Result<(), VecError> {
        if vector.len() != self.dim {
            return Err(VecError::DimensionMismatch {
                got: vector.len(),
                want: self.dim,
            });
        }
        self.vectors.insert(id, vector.to_vec());
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        if query.len() != self.dim {
            return Err(VecError::DimensionMismatch {
                got: query.len(),
                want: self.dim,
            });
        }
        if self.vectors.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let mut results: Vec<Match> = self
            .vectors
            .iter()
            .map(|(&id, vec)| Match {
                id,
                score: dot(query, vec),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        if results.len() > top_k {
            results.truncate(top_k);
        }
        Ok(results)
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn reset(&mut self) {
        self.vectors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_search() {
        let mut idx = FlatIndex::new(4);
        idx.insert(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        idx.insert(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        idx.insert(3, &[0.9, 0.1, 0.0, 0.0]).unwrap();

        let matches = idx.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, 1);
        assert_eq!(matches[1].id, 3);
    }

    #[test]
    fn test_upsert() {
        let mut idx = FlatIndex::new(2);
        idx.insert(1, &[1.0, 0.0]).unwrap();
        idx.insert(1, &[0.0, 1.0]).unwrap();
        assert_eq!(idx.len(), 1);

        let matches = idx.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(matches[0].id, 1);
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_deterministic_tie_break() {
        let mut idx = FlatIndex::new(2);
        idx.insert(9, &[1.0, 0.0]).unwrap();
        idx.insert(3, &[1.0, 0.0]).unwrap();

        let matches = idx.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(matches[0].id, 3);
        assert_eq!(matches[1].id, 9);
    }

    #[test]
    fn test_search_empty() {
        let idx = FlatIndex::new(3);
        assert!(idx.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_reset() {
        let mut idx = FlatIndex::new(2);
        idx.insert(1, &[1.0, 0.0]).unwrap();
        idx.reset();
        assert!(idx.is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut idx = FlatIndex::new(3);
        assert!(idx.insert(1, &[1.0, 0.0]).is_err());
        assert!(idx.search(&[1.0, 0.0], 1).is_err());
    }
}
