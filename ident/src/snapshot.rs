use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use petmatch_vecstore::ViewIndex;

use crate::error::IdentError;
use crate::store::IdentStore;
use crate::types::{Species, View};

/// File name of one (species, view) snapshot inside the snapshot
/// directory, e.g. `dog_body.hnsw`.
pub fn artifact_name(species: Species, view: View) -> String {
    format!("{species}_{view}.hnsw")
}

fn artifact_path(dir: &Path, species: Species, view: View) -> PathBuf {
    dir.join(artifact_name(species, view))
}

/// What happened to one (species, view) pair during a snapshot load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// A snapshot file was read and the in-memory index replaced.
    Loaded,
    /// No snapshot file on disk; the in-memory index was left untouched.
    Missing,
    /// The file exists but could not be restored; the in-memory index was
    /// left untouched.
    Corrupt(String),
}

/// Per-pair result of [IdentStore::load_snapshot].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub species: Species,
    pub view: View,
    pub outcome: SnapshotOutcome,
}

impl SnapshotReport {
    /// The corrupt outcome as an error, for callers that want to fail
    /// instead of continuing with the pairs that did load.
    pub fn error(&self) -> Option<IdentError> {
        match &self.outcome {
            SnapshotOutcome::Corrupt(reason) => Some(IdentError::SnapshotCorrupt {
                species: self.species,
                view: self.view,
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

impl IdentStore {
    /// Write all four indexes to `dir`, one file per (species, view) pair.
    ///
    /// Each file is written under that pair's read lock, so every file is
    /// internally consistent, but the four files are not a single atomic
    /// cut: writes racing with the save may land in some files and not
    /// others. Fails fast on the first I/O error.
    pub fn save_snapshot(&self, dir: &Path) -> Result<(), IdentError> {
        std::fs::create_dir_all(dir).map_err(|e| IdentError::Io(e.to_string()))?;
        for species in Species::ALL {
            for view in View::ALL {
                let path = artifact_path(dir, species, view);
                let file = File::create(&path).map_err(|e| IdentError::Io(e.to_string()))?;
                let mut w = BufWriter::new(file);
                self.slot(species, view).read().unwrap().save(&mut w)?;
            }
        }
        Ok(())
    }

    /// Restore indexes from `dir`, one file per (species, view) pair.
    ///
    /// Pairs restore independently: a missing file leaves that pair's
    /// in-memory index untouched, a corrupt file is reported and skipped,
    /// and the remaining pairs still load. A snapshot whose dimension does
    /// not match the store's counts as corrupt.
    pub fn load_snapshot(&self, dir: &Path) -> Vec<SnapshotReport> {
        let mut reports = Vec::with_capacity(4);
        for species in Species::ALL {
            for view in View::ALL {
                let path = artifact_path(dir, species, view);
                let outcome = self.load_one(&path, species, view);
                reports.push(SnapshotReport {
                    species,
                    view,
                    outcome,
                });
            }
        }
        reports
    }

    fn load_one(&self, path: &Path, species: Species, view: View) -> SnapshotOutcome {
        if !path.exists() {
            return SnapshotOutcome::Missing;
        }
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => return SnapshotOutcome::Corrupt(e.to_string()),
        };
        let mut r = BufReader::new(file);
        let loaded = match ViewIndex::load(&mut r) {
            Ok(v) => v,
            Err(e) => return SnapshotOutcome::Corrupt(e.to_string()),
        };
        if loaded.dim() != self.dim() {
            return SnapshotOutcome::Corrupt(format!(
                "dimension mismatch: snapshot {}, store {}",
                loaded.dim(),
                self.dim()
            ));
        }

        *self.slot(species, view).write().unwrap() = loaded;
        SnapshotOutcome::Loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petmatch_vecstore::HnswConfig;

    fn toy_store() -> IdentStore {
        IdentStore::with_config(HnswConfig {
            dim: 2,
            m: 8,
            ef_construction: 64,
            ef_search: 32,
        })
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!(artifact_name(Species::Dog, View::Body), "dog_body.hnsw");
        assert_eq!(artifact_name(Species::Cat, View::Face), "cat_face.hnsw");
    }

    #[test]
    fn test_save_reset_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = toy_store();
        store
            .add_subject(Species::Dog, 1, &[1.0, 0.0], &[0.0, 1.0])
            .unwrap();
        store
            .add_subject(Species::Cat, 2, &[0.0, 1.0], &[1.0, 0.0])
            .unwrap();

        let q = [1.0f32, 0.0];
        let before = store.search_subject(Species::Dog, &q, &q, 5, 0.6).unwrap();

        store.save_snapshot(dir.path()).unwrap();
        store.reset();
        assert_eq!(store.len(Species::Dog, View::Body), 0);

        let reports = store.load_snapshot(dir.path());
        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| r.outcome == SnapshotOutcome::Loaded));

        assert_eq!(store.len(Species::Dog, View::Body), 1);
        assert_eq!(store.len(Species::Cat, View::Face), 1);

        let after = store.search_subject(Species::Dog, &q, &q, 5, 0.6).unwrap();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.id, b.id);
            assert!((a.score - b.score).abs() < 1e-6);
        }
    }

    #[test]
    fn test_corrupt_file_skipped_others_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = toy_store();
        store
            .add_subject(Species::Dog, 1, &[1.0, 0.0], &[1.0, 0.0])
            .unwrap();
        store.save_snapshot(dir.path()).unwrap();

        // Clobber one file.
        std::fs::write(dir.path().join("dog_body.hnsw"), b"not a snapshot").unwrap();

        store.reset();
        let reports = store.load_snapshot(dir.path());

        for r in &reports {
            if r.species == Species::Dog && r.view == View::Body {
                assert!(matches!(r.outcome, SnapshotOutcome::Corrupt(_)));
                assert!(r.error().is_some());
            } else {
                assert_eq!(r.outcome, SnapshotOutcome::Loaded);
                assert!(r.error().is_none());
            }
        }

        // Corrupt pair stays empty, the rest restored.
        assert_eq!(store.len(Species::Dog, View::Body), 0);
        assert_eq!(store.len(Species::Dog, View::Face), 1);
    }

    #[test]
    fn test_missing_files_leave_index_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = toy_store();
        store
            .add_subject(Species::Dog, 1, &[1.0, 0.0], &[1.0, 0.0])
            .unwrap();

        let reports = store.load_snapshot(dir.path());
        assert!(reports.iter().all(|r| r.outcome == SnapshotOutcome::Missing));
        assert_eq!(store.len(Species::Dog, View::Body), 1);
    }

    #[test]
    fn test_dimension_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();

        let big = IdentStore::with_config(HnswConfig {
            dim: 4,
            m: 8,
            ef_construction: 64,
            ef_search: 32,
        });
        big.add_subject(Species::Dog, 1, &[1.0, 0.0, 0.0, 0.0], &[1.0, 0.0, 0.0, 0.0])
            .unwrap();
        big.save_snapshot(dir.path()).unwrap();

        let small = toy_store();
        let reports = small.load_snapshot(dir.path());
        assert!(
            reports
                .iter()
                .all(|r| matches!(r.outcome, SnapshotOutcome::Corrupt(_)))
        );
        assert_eq!(small.len(Species::Dog, View::Body), 0);
    }
}
