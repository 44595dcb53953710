//! Space image types.
//!
//! This module provides the `SpaceImage` type describing the voxel grid
//! and voxel-to-world mapping of a volume.

pub mod space;

pub use space::SpaceImage;
