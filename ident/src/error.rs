use thiserror::Error;

use petmatch_vecstore::VecError;
use petmatch_vision::VisionError;

use crate::bbox::BBox;
use crate::types::{Species, View};

/// Failures of subject-box resolution, reported with the stage that
/// failed so the caller can tell "give me a box" from "nothing detected".
#[derive(Error, Debug)]
pub enum BoxError {
    #[error("ident: subject box required but none provided")]
    Required,

    #[error("ident: invalid subject box {0:?}")]
    Invalid(BBox),

    #[error("ident: no {species} detected")]
    NoDetection { species: Species },

    #[error("ident: box resolution disabled: no explicit box, detection off, whole-image fallback off")]
    Disabled,

    #[error("ident: detector: {0}")]
    Detector(String),
}

#[derive(Error, Debug)]
pub enum IdentError {
    #[error("ident: unknown species {0:?} (want \"dog\" or \"cat\")")]
    InvalidSpecies(String),

    #[error("ident: top_k must be positive, got {0}")]
    InvalidTopK(i64),

    #[error("ident: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error(transparent)]
    Box(#[from] BoxError),

    #[error("ident: snapshot {species}/{view}: {reason}")]
    SnapshotCorrupt {
        species: Species,
        view: View,
        reason: String,
    },

    #[error("ident: io: {0}")]
    Io(String),

    #[error("ident: embed: {0}")]
    Embed(String),
}

impl From<VecError> for IdentError {
    fn from(e: VecError) -> Self {
        match e {
            VecError::DimensionMismatch { got, want } => IdentError::DimensionMismatch { got, want },
            VecError::Io(msg) => IdentError::Io(msg),
            VecError::InvalidFormat(msg) => IdentError::Io(msg),
        }
    }
}

impl From<VisionError> for IdentError {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::Dimension { got, want } => IdentError::DimensionMismatch { got, want },
            other => IdentError::Embed(other.to_string()),
        }
    }
}
