use std::collections::BTreeSet;

use crate::error::IdentError;
use crate::store::IdentStore;
use crate::types::{RankedMatch, Species, View};

/// Default blend weight for the face score. Faces are more discriminative
/// than whole bodies but less reliably visible, hence the tilt above 0.5.
pub const DEFAULT_FACE_WEIGHT: f32 = 0.6;

impl IdentStore {
    /// Search one species with a body query and a face query, fusing the
    /// two similarity signals into one ranked list.
    ///
    /// 1. Both view indexes are ANN-searched for `top_k` candidates each.
    /// 2. The candidate sets are unioned: a subject strongly matched on
    ///    only one view must still surface.
    /// 3. Every candidate is re-scored exactly against the raw vectors:
    ///    `face_weight * face + (1 - face_weight) * body`. Approximate
    ///    scores never reach the caller.
    /// 4. Candidates missing from either raw store are dropped: the ANN
    ///    structures are candidate generators, not sources of truth.
    /// 5. Descending fused score, ties broken by ascending id.
    ///
    /// `face_weight` is clamped to `[0, 1]`.
    pub fn search_subject(
        &self,
        species: Species,
        query_body: &[f32],
        query_face: &[f32],
        top_k: usize,
        face_weight: f32,
    ) -> Result<Vec<RankedMatch>, IdentError> {
        if top_k == 0 {
            return Err(IdentError::InvalidTopK(0));
        }
        for q in [query_body, query_face] {
            if q.len() != self.dim() {
                return Err(IdentError::DimensionMismatch {
                    got: q.len(),
                    want: self.dim(),
                });
            }
        }
        let w = face_weight.clamp(0.0, 1.0);

        // Hold both read locks for the whole search so the result is a
        // consistent cut: either fully pre-reset or fully post-reset.
        // Lock order matches writers: body before face.
        let body_idx = self.slot(species, View::Body).read().unwrap();
        let face_idx = self.slot(species, View::Face).read().unwrap();

        let body_matches = body_idx.search(query_body, top_k)?;
        let face_matches = face_idx.search(query_face, top_k)?;

        // BTreeSet keeps candidate iteration deterministic.
        let candidates: BTreeSet<i64> = body_matches
            .iter()
            .chain(face_matches.iter())
            .map(|m| m.id)
            .collect();

        let mut fused = Vec::with_capacity(candidates.len());
        for id in candidates {
            let (Some(body_score), Some(face_score)) = (
                body_idx.exact_score(id, query_body),
                face_idx.exact_score(id, query_face),
            ) else {
                // Stale ANN hit with no raw vector backing it.
                continue;
            };
            fused.push(RankedMatch {
                id,
                score: w * face_score + (1.0 - w) * body_score,
            });
        }

        fused.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        fused.truncate(top_k);
        Ok(fused)
    }
}
