pub mod bbox;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod resolve;
pub mod snapshot;
pub mod store;
pub mod types;

pub use bbox::{BBox, ImageSize, face_box};
pub use engine::{Engine, EngineConfig, IdentifyRequest, Receipt, RegisterRequest};
pub use error::{BoxError, IdentError};
pub use fusion::DEFAULT_FACE_WEIGHT;
pub use resolve::{BoxPolicy, resolve};
pub use snapshot::{SnapshotOutcome, SnapshotReport};
pub use store::IdentStore;
pub use types::{RankedMatch, Species, View};
