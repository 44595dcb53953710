//! Transform kernels.
//!
//! This module provides the affine kernel, coregistration parameter
//! composition, the deformation field sampler and the legacy DCT warp
//! reconstructor.

pub mod trait_;
pub mod affine;
pub mod coreg;
pub mod deformation_field;
pub mod dct;

pub use trait_::Transform;
pub use affine::{apply_affine, solve_affine, AffineTransform};
pub use coreg::CoregParameters;
pub use deformation_field::DeformationField3D;
pub use dct::{dct_basis, DctWarp, LegacyMapped, LegacyNormalization};
