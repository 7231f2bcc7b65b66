use petmatch_vision::Detector;

use crate::bbox::{BBox, ImageSize, PAD_FRACTION};
use crate::error::BoxError;
use crate::types::Species;

/// BoxPolicy controls how a subject box may be obtained.
///
/// The precedence chain is fixed (explicit input beats inference beats
/// the whole-image fallback) and the flags only decide which stages are
/// allowed and which failures are fatal.
#[derive(Debug, Clone)]
pub struct BoxPolicy {
    /// Fail instead of falling through when the caller's explicit box is
    /// absent or invalid.
    pub require_explicit: bool,

    /// Allow invoking the detector when no usable explicit box exists.
    pub use_detector: bool,

    /// Allow the whole image as a last resort.
    pub allow_full_image: bool,

    /// Outward padding fraction applied to any resolved box.
    pub pad: f32,
}

impl Default for BoxPolicy {
    fn default() -> Self {
        Self {
            require_explicit: false,
            use_detector: true,
            allow_full_image: true,
            pad: PAD_FRACTION,
        }
    }
}

impl BoxPolicy {
    /// Strict mode: the caller must localize the subject itself.
    pub fn explicit_only() -> Self {
        Self {
            require_explicit: true,
            use_detector: false,
            allow_full_image: false,
            pad: PAD_FRACTION,
        }
    }
}

/// Resolve one authoritative subject box for an image.
///
/// Decision order:
/// 1. An explicit box equal to the `(0,0,0,0)` sentinel counts as absent.
/// 2. A valid explicit box wins: it is padded, clamped and returned.
/// 3. An invalid explicit box fails `Invalid` when the policy requires an
///    explicit box, otherwise resolution continues.
/// 4. No usable explicit box with `require_explicit` fails `Required`.
/// 5. If detection is enabled, the detector runs once and the first
///    detection labelled with the requested species is padded and
///    returned. No match falls through to the whole-image fallback, or
///    fails `NoDetection` when that fallback is disabled.
/// 6. The whole image `(0,0,W,H)` when allowed; otherwise `Disabled`.
pub async fn resolve(
    image: &[u8],
    size: ImageSize,
    species: Species,
    explicit: Option<BBox>,
    detector: Option<&dyn Detector>,
    policy: &BoxPolicy,
) -> Result<BBox, BoxError> {
    // Sentinel means "not provided".
    let explicit = explicit.filter(|b| !b.is_sentinel());

    match explicit {
        Some(b) if b.is_valid(size) => {
            return Ok(b.clamp(size).pad(size, policy.pad));
        }
        Some(b) => {
            if policy.require_explicit {
                return Err(BoxError::Invalid(b));
            }
            // Invalid but not required: fall through to detection.
        }
        None => {
            if policy.require_explicit {
                return Err(BoxError::Required);
            }
        }
    }

    if policy.use_detector {
        if let Some(det) = detector {
            let detections = det
                .detect(image)
                .await
                .map_err(|e| BoxError::Detector(e.to_string()))?;

            let found = detections
                .iter()
                .find(|d| d.label.eq_ignore_ascii_case(species.as_str()));

            match found {
                Some(d) => {
                    let b = BBox::from(d.region).clamp(size);
                    return Ok(b.pad(size, policy.pad));
                }
                None => {
                    if !policy.allow_full_image {
                        return Err(BoxError::NoDetection { species });
                    }
                    // Fall through to the whole-image fallback.
                }
            }
        }
    }

    if policy.allow_full_image {
        return Ok(BBox::full(size));
    }

    Err(BoxError::Disabled)
}
