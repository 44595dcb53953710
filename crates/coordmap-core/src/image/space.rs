//! Space images: the voxel grid a point set lives on.
//!
//! A `SpaceImage` carries only what coordinate mapping needs from a volume:
//! its voxel-to-world affine, optionally its spatial dimensions, and the file
//! it came from (external engines operate on image files).
//!
//! Voxel coordinates are one-based, the legacy convention the DCT basis and
//! the deformation field sampler are written against. `coordmap-io` converts
//! zero-based NIfTI header affines when reading.

use std::path::{Path, PathBuf};

use crate::error::{MappingError, Result};
use crate::points::PointSet;
use crate::spatial::Affine4;
use crate::transform::affine::{apply_affine, solve_affine};

/// A reference to a volumetric image, used for its voxel-to-world mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceImage {
    /// Voxel (one-based) to world (mm) affine.
    affine: Affine4,
    /// Spatial dimensions `[nx, ny, nz]`, when known.
    dims: Option<[usize; 3]>,
    /// Backing image file, when the space came from disk.
    path: Option<PathBuf>,
}

impl SpaceImage {
    /// Create a space from its voxel-to-world affine.
    pub fn new(affine: Affine4) -> Self {
        Self {
            affine,
            dims: None,
            path: None,
        }
    }

    /// Set the spatial dimensions.
    pub fn with_dims(mut self, dims: [usize; 3]) -> Self {
        self.dims = Some(dims);
        self
    }

    /// Set the backing image file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Get the voxel-to-world affine.
    pub fn affine(&self) -> &Affine4 {
        &self.affine
    }

    /// Get the spatial dimensions.
    pub fn dims(&self) -> Option<[usize; 3]> {
        self.dims
    }

    /// Get the backing image file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Base name of the backing file without `.nii`/`.nii.gz`/other extension.
    pub fn base_name(&self) -> Option<String> {
        let name = self.path.as_ref()?.file_name()?.to_str()?;
        let stem = name
            .strip_suffix(".gz")
            .unwrap_or(name);
        let stem = match stem.rfind('.') {
            Some(dot) if dot > 0 => &stem[..dot],
            _ => stem,
        };
        Some(stem.to_string())
    }

    /// Backing file, or a missing-space error naming `role`.
    pub fn require_path(&self, role: &str) -> Result<&Path> {
        self.path().ok_or_else(|| {
            MappingError::missing_space(format!("{} space has no backing image file", role))
        })
    }

    /// Map voxel coordinates to world coordinates (4×N).
    pub fn voxel_to_world(&self, voxels: &PointSet) -> Result<PointSet> {
        apply_affine(&self.affine, voxels)
    }

    /// Map world coordinates to voxel coordinates (4×N) with a linear solve.
    pub fn world_to_voxel(&self, world: &PointSet) -> Result<PointSet> {
        solve_affine(&self.affine, world)
    }
}
