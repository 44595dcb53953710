pub mod error;
pub mod spatial;
pub mod points;
pub mod image;
pub mod interpolation;
pub mod transform;

pub use error::{MappingError, Result};
pub use image::SpaceImage;
pub use points::PointSet;
pub use spatial::Affine4;
