pub mod config;
pub mod detect;
pub mod embed;
pub mod error;
pub mod remote;

pub use config::VisionConfig;
pub use detect::{Detection, Detector, Region};
pub use embed::ImageEmbedder;
pub use error::VisionError;
pub use remote::{RemoteDetector, RemoteEmbedder};
