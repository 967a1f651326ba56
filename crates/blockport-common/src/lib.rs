pub mod error;
pub mod types;

pub use error::BlockportError;
pub use types::{Bounds, Result, VoxelCoordinate};
