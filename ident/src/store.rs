use std::sync::RwLock;

use petmatch_vecstore::{HnswConfig, ViewIndex};

use crate::error::IdentError;
use crate::types::{Species, View};

/// IdentStore owns the four view indexes: (dog, cat) x (body, face).
///
/// The slots are a fixed 2x2 array indexed by enum, so there is no
/// stringly-typed lookup and no "unknown key" failure mode. Each slot is
/// an independently locked [ViewIndex]; the ANN structure and the raw
/// vector store of a slot always mutate inside the same critical section.
///
/// Lock order is body before face wherever both views of a species are
/// taken together.
pub struct IdentStore {
    dim: usize,
    slots: [[RwLock<ViewIndex>; 2]; 2],
}

impl IdentStore {
    /// Store with default HNSW parameters for the given dimension.
    pub fn new(dim: usize) -> Self {
        Self::with_config(HnswConfig::new(dim))
    }

    /// Store with explicit HNSW parameters (all four slots share them).
    pub fn with_config(cfg: HnswConfig) -> Self {
        let mk = || RwLock::new(ViewIndex::new(cfg.clone()));
        Self {
            dim: cfg.dim,
            slots: [[mk(), mk()], [mk(), mk()]],
        }
    }

    /// Embedding dimension all four indexes expect.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub(crate) fn slot(&self, species: Species, view: View) -> &RwLock<ViewIndex> {
        &self.slots[species.index()][view.index()]
    }

    /// Number of subjects registered for one (species, view) index.
    pub fn len(&self, species: Species, view: View) -> usize {
        self.slot(species, view).read().unwrap().len()
    }

    /// Register or overwrite a subject's body and face embeddings.
    ///
    /// Both dimensions are validated before any mutation, so a failed add
    /// leaves prior state for that id unchanged in both views.
    pub fn add_subject(
        &self,
        species: Species,
        id: i64,
        body: &[f32],
        face: &[f32],
    ) -> Result<(), IdentError> {
        for v in [body, face] {
            if v.len() != self.dim {
                return Err(IdentError::DimensionMismatch {
                    got: v.len(),
                    want: self.dim,
                });
            }
        }

        let mut body_idx = self.slot(species, View::Body).write().unwrap();
        let mut face_idx = self.slot(species, View::Face).write().unwrap();
        body_idx.add(id, body)?;
        face_idx.add(id, face)?;
        Ok(())
    }

    /// Discard every entry in all four indexes; snapshots on disk are not
    /// touched.
    ///
    /// Both view locks of a species are held while its pair is cleared,
    /// so a concurrent search of that species sees the pair either fully
    /// populated or fully empty, never one view of each.
    pub fn reset(&self) {
        for species in Species::ALL {
            let mut body = self.slot(species, View::Body).write().unwrap();
            let mut face = self.slot(species, View::Face).write().unwrap();
            body.reset();
            face.reset();
        }
    }
}
