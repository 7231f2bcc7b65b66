use crate::error::VecError;

/// Match is a single result from a vector similarity search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Subject id of the matched vector.
    pub id: i64,

    /// Inner-product similarity between query and matched vector.
    /// Higher values indicate higher similarity. For matches coming out
    /// of an approximate index this is the approximate score; exact
    /// re-scoring happens against the raw vector store.
    pub score: f32,
}

/// VecIndex is the interface for nearest-neighbor search over dense
/// unit-norm float32 vectors keyed by a 64-bit subject id.
///
/// Implementations do no internal locking; callers own the concurrency
/// discipline and hold writes exclusive with reads.
pub trait VecIndex: Send + Sync {
    /// Add a vector under the given id, replacing any previous vector
    /// stored for that id (upsert).
    fn insert(&mut self, id: i64, vector: &[f32]) -> Result<(), VecError>;

    /// Return up to `top_k` nearest vectors to the query, ordered by
    /// descending similarity. Returns fewer than `top_k` if the index
    /// holds fewer entries, and an empty list on an empty index.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError>;

    /// Return the number of vectors in the index.
    fn len(&self) -> usize;

    /// Return true if the index contains no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard all entries, yielding a structurally valid empty index
    /// with the same configuration.
    fn reset(&mut self);
}
