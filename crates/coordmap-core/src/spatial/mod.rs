//! Spatial types for homogeneous coordinate transforms.
//!
//! All types are based on nalgebra for double precision linear algebra.

pub mod affine;

pub use affine::Affine4;
