//! File readers for coordmap.
//!
//! NIfTI headers and deformation fields, transform artifacts behind the
//! [`ArtifactReader`] contract, and plain text point lists.

pub mod artifact;
pub mod nifti_io;
pub mod points_io;

pub use artifact::{ArtifactReader, FieldVolume, FsArtifactReader, LegacyWarpRecord};
pub use nifti_io::{read_deformation_field, read_space_image};
pub use points_io::{format_points, read_points, write_points};
