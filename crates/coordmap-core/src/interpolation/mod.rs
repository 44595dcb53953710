//! Interpolation of volumes at continuous coordinates.

pub mod trait_;
pub mod linear;

pub use trait_::Interpolator;
pub use linear::LinearInterpolator;
