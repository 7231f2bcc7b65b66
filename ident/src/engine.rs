use std::path::Path;
use std::sync::Arc;

use petmatch_vision::{Detector, ImageEmbedder, Region};

use crate::bbox::{BBox, FACE_RATIO, ImageSize, face_box};
use crate::error::IdentError;
use crate::fusion::DEFAULT_FACE_WEIGHT;
use crate::resolve::{BoxPolicy, resolve};
use crate::snapshot::SnapshotReport;
use crate::store::IdentStore;
use crate::types::{RankedMatch, Species};

/// Engine-wide parameters. The defaults match the embedding provider's
/// 512-dimensional output.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Embedding dimension shared by every index.
    pub dim: usize,
    /// Fraction of subject-box height kept as the face region.
    pub face_ratio: f32,
    /// Default blend weight when a request does not set one.
    pub face_weight: f32,
    /// Box policy for registration. Deployments that require curated
    /// reference photos set this to [BoxPolicy::explicit_only].
    pub register_policy: BoxPolicy,
    /// Box policy for identification queries. Query photos are uncurated,
    /// so this stays lenient: detect, then fall back to the whole image.
    pub search_policy: BoxPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dim: 512,
            face_ratio: FACE_RATIO,
            face_weight: DEFAULT_FACE_WEIGHT,
            register_policy: BoxPolicy::default(),
            search_policy: BoxPolicy::default(),
        }
    }
}

/// Register a subject's reference photo under an id.
pub struct RegisterRequest {
    pub species: Species,
    pub id: i64,
    pub image: Vec<u8>,
    pub image_size: ImageSize,
    /// Caller-supplied subject box; `(0,0,0,0)` or `None` means absent.
    pub explicit_box: Option<BBox>,
    /// Blend weight to echo back in the receipt; registration itself does
    /// not use it, but callers commonly record it alongside the subject.
    pub face_weight: Option<f32>,
}

/// Acknowledgement of a completed registration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Receipt {
    pub id: i64,
    pub face_weight: f32,
}

/// Rank registered subjects of one species against a query photo.
pub struct IdentifyRequest {
    pub species: Species,
    pub image: Vec<u8>,
    pub image_size: ImageSize,
    pub explicit_box: Option<BBox>,
    pub top_k: i64,
    /// Per-request override of the engine's default face weight.
    pub face_weight: Option<f32>,
}

/// Engine ties the pieces together: box resolution, the two crops'
/// embeddings, the per-species view indexes and late fusion. It owns the
/// store; the embedder and detector are injected collaborators reached
/// over the network in production and stubbed in tests.
pub struct Engine {
    store: IdentStore,
    embedder: Arc<dyn ImageEmbedder>,
    detector: Option<Arc<dyn Detector>>,
    cfg: EngineConfig,
}

impl Engine {
    /// Fails when the embedder's advertised dimension disagrees with the
    /// engine configuration; vectors of the wrong size must never reach
    /// the indexes.
    pub fn new(
        embedder: Arc<dyn ImageEmbedder>,
        detector: Option<Arc<dyn Detector>>,
        cfg: EngineConfig,
    ) -> Result<Self, IdentError> {
        if embedder.dimension() != cfg.dim {
            return Err(IdentError::DimensionMismatch {
                got: embedder.dimension(),
                want: cfg.dim,
            });
        }
        Ok(Self {
            store: IdentStore::new(cfg.dim),
            embedder,
            detector,
            cfg,
        })
    }

    pub fn store(&self) -> &IdentStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Resolve the subject box, derive the face box and embed both crops.
    async fn subject_vectors(
        &self,
        image: &[u8],
        size: ImageSize,
        species: Species,
        explicit: Option<BBox>,
        policy: &BoxPolicy,
    ) -> Result<(Vec<f32>, Vec<f32>), IdentError> {
        let subject = resolve(
            image,
            size,
            species,
            explicit,
            self.detector.as_deref(),
            policy,
        )
        .await?;
        let face = face_box(subject, self.cfg.face_ratio);

        let body_vec = self
            .embedder
            .embed(image, Region::from(subject))
            .await?;
        let face_vec = self.embedder.embed(image, Region::from(face)).await?;

        for v in [&body_vec, &face_vec] {
            if v.len() != self.cfg.dim {
                return Err(IdentError::DimensionMismatch {
                    got: v.len(),
                    want: self.cfg.dim,
                });
            }
        }
        Ok((body_vec, face_vec))
    }

    /// Register or overwrite one subject from a reference photo.
    pub async fn register(&self, req: RegisterRequest) -> Result<Receipt, IdentError> {
        let (body, face) = self
            .subject_vectors(
                &req.image,
                req.image_size,
                req.species,
                req.explicit_box,
                &self.cfg.register_policy,
            )
            .await?;
        self.store.add_subject(req.species, req.id, &body, &face)?;
        Ok(Receipt {
            id: req.id,
            face_weight: req
                .face_weight
                .unwrap_or(self.cfg.face_weight)
                .clamp(0.0, 1.0),
        })
    }

    /// Rank registered subjects of the requested species against a query
    /// photo. The returned weight is the one actually used after
    /// defaulting and clamping.
    pub async fn identify(
        &self,
        req: IdentifyRequest,
    ) -> Result<(Vec<RankedMatch>, f32), IdentError> {
        if req.top_k <= 0 {
            return Err(IdentError::InvalidTopK(req.top_k));
        }
        let w = req
            .face_weight
            .unwrap_or(self.cfg.face_weight)
            .clamp(0.0, 1.0);

        let (body, face) = self
            .subject_vectors(
                &req.image,
                req.image_size,
                req.species,
                req.explicit_box,
                &self.cfg.search_policy,
            )
            .await?;
        let matches =
            self.store
                .search_subject(req.species, &body, &face, req.top_k as usize, w)?;
        Ok((matches, w))
    }

    pub fn reset(&self) {
        self.store.reset();
    }

    pub fn save_snapshot(&self, dir: &Path) -> Result<(), IdentError> {
        self.store.save_snapshot(dir)
    }

    pub fn load_snapshot(&self, dir: &Path) -> Vec<SnapshotReport> {
        self.store.load_snapshot(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petmatch_vision::{Detection, VisionError};

    /// Deterministic embedder: the vector is a pure function of the image
    /// bytes and the crop region, so the same photo and box always embed
    /// identically while different crops diverge.
    struct StubEmbedder {
        dim: usize,
    }

    impl StubEmbedder {
        fn new(dim: usize) -> Self {
            Self { dim }
        }
    }

    #[async_trait::async_trait]
    impl ImageEmbedder for StubEmbedder {
        async fn embed(&self, image: &[u8], region: Region) -> Result<Vec<f32>, VisionError> {
            let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
            for &b in image {
                seed = seed.wrapping_mul(31).wrapping_add(b as u64);
            }
            for c in [region.xmin, region.ymin, region.xmax, region.ymax] {
                seed = seed.wrapping_mul(31).wrapping_add(c as u64);
            }

            let mut v = Vec::with_capacity(self.dim);
            for _ in 0..self.dim {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                v.push(((seed >> 33) as f32 / (1u64 << 31) as f32) - 0.5);
            }
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            Ok(v.into_iter().map(|x| x / norm).collect())
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }

    struct StubDetector;

    #[async_trait::async_trait]
    impl Detector for StubDetector {
        async fn detect(&self, _image: &[u8]) -> Result<Vec<Detection>, VisionError> {
            Ok(vec![Detection {
                label: "dog".to_string(),
                region: Region {
                    xmin: 10,
                    ymin: 10,
                    xmax: 90,
                    ymax: 90,
                },
                confidence: 0.9,
            }])
        }
    }

    const SIZE: ImageSize = ImageSize {
        width: 100,
        height: 100,
    };

    fn engine(dim: usize) -> Engine {
        Engine::new(
            Arc::new(StubEmbedder::new(dim)),
            Some(Arc::new(StubDetector)),
            EngineConfig {
                dim,
                ..EngineConfig::default()
            },
        )
        .unwrap()
    }

    fn register_req(id: i64, image: &[u8]) -> RegisterRequest {
        RegisterRequest {
            species: Species::Dog,
            id,
            image: image.to_vec(),
            image_size: SIZE,
            explicit_box: None,
            face_weight: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_identify_same_photo_wins() {
        let eng = engine(32);
        for (id, img) in [(1i64, b"photo-a"), (2, b"photo-b"), (3, b"photo-c")] {
            let receipt = eng.register(register_req(id, img)).await.unwrap();
            assert_eq!(receipt.id, id);
            assert_eq!(receipt.face_weight, DEFAULT_FACE_WEIGHT);
        }
        assert_eq!(eng.store().len(Species::Dog, crate::types::View::Body), 3);

        let (matches, w) = eng
            .identify(IdentifyRequest {
                species: Species::Dog,
                image: b"photo-b".to_vec(),
                image_size: SIZE,
                explicit_box: None,
                top_k: 3,
                face_weight: None,
            })
            .await
            .unwrap();

        assert_eq!(w, DEFAULT_FACE_WEIGHT);
        assert_eq!(matches.len(), 3);
        // The exact photo embeds identically in both views: fused score 1.
        assert_eq!(matches[0].id, 2);
        assert!((matches[0].score - 1.0).abs() < 1e-5);
        assert!(matches[1].score < matches[0].score);
    }

    #[tokio::test]
    async fn test_register_is_upsert() {
        let eng = engine(32);
        eng.register(register_req(1, b"old-photo")).await.unwrap();
        eng.register(register_req(1, b"new-photo")).await.unwrap();
        assert_eq!(eng.store().len(Species::Dog, crate::types::View::Body), 1);

        let (matches, _) = eng
            .identify(IdentifyRequest {
                species: Species::Dog,
                image: b"new-photo".to_vec(),
                image_size: SIZE,
                explicit_box: None,
                top_k: 1,
                face_weight: None,
            })
            .await
            .unwrap();
        assert!((matches[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_identify_rejects_nonpositive_top_k() {
        let eng = engine(8);
        for top_k in [0i64, -3] {
            let err = eng
                .identify(IdentifyRequest {
                    species: Species::Dog,
                    image: b"photo".to_vec(),
                    image_size: SIZE,
                    explicit_box: None,
                    top_k,
                    face_weight: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, IdentError::InvalidTopK(k) if k == top_k));
        }
    }

    #[tokio::test]
    async fn test_embedder_dimension_checked_at_construction() {
        let err = Engine::new(
            Arc::new(StubEmbedder::new(64)),
            None,
            EngineConfig {
                dim: 512,
                ..EngineConfig::default()
            },
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            IdentError::DimensionMismatch { got: 64, want: 512 }
        ));
    }

    #[tokio::test]
    async fn test_strict_register_policy_lenient_search() {
        use crate::error::BoxError;

        // Registration demands curated boxes; queries still resolve via
        // the detector.
        let eng = Engine::new(
            Arc::new(StubEmbedder::new(16)),
            Some(Arc::new(StubDetector)),
            EngineConfig {
                dim: 16,
                register_policy: BoxPolicy::explicit_only(),
                ..EngineConfig::default()
            },
        )
        .unwrap();

        let err = eng.register(register_req(1, b"photo")).await.unwrap_err();
        assert!(matches!(err, IdentError::Box(BoxError::Required)));

        let mut req = register_req(1, b"photo");
        req.explicit_box = Some(BBox::new(10, 10, 90, 90));
        eng.register(req).await.unwrap();

        // No explicit box on the query side: detector path still works.
        let (matches, _) = eng
            .identify(IdentifyRequest {
                species: Species::Dog,
                image: b"photo".to_vec(),
                image_size: SIZE,
                explicit_box: None,
                top_k: 1,
                face_weight: None,
            })
            .await
            .unwrap();
        assert_eq!(matches[0].id, 1);
    }

    #[tokio::test]
    async fn test_face_weight_override_clamped() {
        let eng = engine(8);
        eng.register(register_req(1, b"photo")).await.unwrap();
        let (_, w) = eng
            .identify(IdentifyRequest {
                species: Species::Dog,
                image: b"photo".to_vec(),
                image_size: SIZE,
                explicit_box: None,
                top_k: 1,
                face_weight: Some(7.0),
            })
            .await
            .unwrap();
        assert_eq!(w, 1.0);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_through_engine() {
        let dir = tempfile::tempdir().unwrap();
        let eng = engine(16);
        eng.register(register_req(1, b"photo-a")).await.unwrap();
        eng.save_snapshot(dir.path()).unwrap();
        eng.reset();
        assert_eq!(eng.store().len(Species::Dog, crate::types::View::Body), 0);

        let reports = eng.load_snapshot(dir.path());
        assert!(reports.iter().all(|r| r.error().is_none()));
        assert_eq!(eng.store().len(Species::Dog, crate::types::View::Body), 1);
    }
}
