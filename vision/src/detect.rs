use serde::{Deserialize, Serialize};

use crate::error::VisionError;

/// Axis-aligned pixel rectangle `(xmin, ymin, xmax, ymax)` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

/// One detected object in an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Class label as reported by the detector (e.g. "dog", "cat").
    pub label: String,

    /// Location of the detected object.
    pub region: Region,

    /// Detector confidence in [0, 1].
    #[serde(default)]
    pub confidence: f32,
}

/// Detector locates subjects in an image.
///
/// The model behind it is opaque; only the label/region association is
/// part of the contract. Detections are expected in descending confidence
/// order; callers take the first region whose label matches the species
/// they are looking for.
///
/// Implementations must be safe for concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait Detector: Send + Sync {
    /// Run detection over raw encoded image bytes.
    async fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, VisionError>;
}
