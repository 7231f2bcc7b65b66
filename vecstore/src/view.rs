use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::VecError;
use crate::hnsw::{Hnsw, HnswConfig};
use crate::hnsw_io;
use crate::index::{Match, VecIndex};
use crate::similarity::dot;

/// ViewIndex is one searchable embedding space: an HNSW candidate
/// generator plus the raw-vector store that is the single source of truth
/// for scoring.
///
/// The approximate structure is only trusted for list membership; any
/// score delivered to a caller is recomputed from the raw store. `add`
/// updates both sides or neither (the only failure mode, a dimension
/// mismatch, is checked before any mutation).
///
/// No internal locking: writes take `&mut self` so the owner can hold the
/// ANN structure and the raw store under one critical section.
pub struct ViewIndex {
    ann: Hnsw,
    raw: HashMap<i64, Vec<f32>>,
}

impl ViewIndex {
    pub fn new(cfg: HnswConfig) -> Self {
        Self {
            ann: Hnsw::new(cfg),
            raw: HashMap::new(),
        }
    }

    /// Vector dimension this index was built for.
    pub fn dim(&self) -> usize {
        self.ann.dim()
    }

    /// Number of stored subjects.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Insert or overwrite the vector for a subject id.
    ///
    /// Vectors must be unit-norm (the embedding provider's contract);
    /// debug builds assert it, release builds trust it.
    pub fn add(&mut self, id: i64, vector: &[f32]) -> Result<(), VecError> {
        if vector.len() != self.ann.dim() {
            return Err(VecError::DimensionMismatch {
                got: vector.len(),
                want: self.ann.dim(),
            });
        }
        debug_assert!(
            (vector.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt() - 1.0).abs() < 1e-3,
            "vecstore: vector for id {id} is not unit-norm"
        );

        self.ann.insert(id, vector)?;
        self.raw.insert(id, vector.to_vec());
        Ok(())
    }

    /// Approximate search: up to `top_k` candidates by descending
    /// inner-product similarity. Empty on an empty index.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        self.ann.search(query, top_k)
    }

    /// Exact inner-product score of the query against the stored raw
    /// vector, or None if the id is not in the raw store.
    pub fn exact_score(&self, id: i64, query: &[f32]) -> Option<f32> {
        self.raw.get(&id).map(|v| dot(query, v))
    }

    /// True if a raw vector is stored for this id.
    pub fn contains(&self, id: i64) -> bool {
        self.raw.contains_key(&id)
    }

    /// Discard all entries, keeping the configuration.
    pub fn reset(&mut self) {
        self.ann.reset();
        self.raw.clear();
    }

    /// Serialize to a writer. Only the graph is written; the raw store is
    /// rebuilt from the graph's nodes on load.
    pub fn save(&self, w: &mut dyn Write) -> Result<(), VecError> {
        hnsw_io::save(&self.ann, w)
    }

    /// Deserialize from a reader produced by [ViewIndex::save].
    pub fn load(r: &mut dyn Read) -> Result<Self, VecError> {
        let ann = hnsw_io::load(r)?;
        let raw = ann
            .entries()
            .map(|(id, v)| (id, v.to_vec()))
            .collect::<HashMap<_, _>>();
        Ok(Self { ann, raw })
    }
}
