pub mod error;
pub mod flat;
pub mod hnsw;
pub mod hnsw_io;
pub mod index;
pub mod similarity;
pub mod view;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::VecError;
pub use flat::FlatIndex;
pub use hnsw::{Hnsw, HnswConfig};
pub use hnsw_io::{load as load_hnsw, save as save_hnsw};
pub use index::{Match, VecIndex};
pub use similarity::dot;
pub use view::ViewIndex;
