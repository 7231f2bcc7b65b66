use crate::detect::Region;
use crate::error::VisionError;

/// ImageEmbedder converts an image region into a dense float32 vector.
///
/// The contract the identification engine depends on: the returned vector
/// has exactly `dimension()` components and is L2-normalized. The engine
/// never renormalizes; a wrong-sized vector is a fatal dimension error
/// downstream.
///
/// Implementations must be safe for concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait ImageEmbedder: Send + Sync {
    /// Return the embedding for the given region of the image. The image
    /// is passed as raw encoded bytes; cropping happens provider-side.
    async fn embed(&self, image: &[u8], region: Region) -> Result<Vec<f32>, VisionError>;

    /// Return the dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
