use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("vision: empty image")]
    EmptyImage,

    #[error("vision: API error: {0}")]
    Api(String),

    #[error("vision: embedding dimension mismatch: got {got}, want {want}")]
    Dimension { got: usize, want: usize },
}
