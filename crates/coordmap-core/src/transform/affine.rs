//! Affine kernel.
//!
//! Applies homogeneous 4×4 matrices to column-major point sets, and solves
//! affines against world coordinates to recover voxel coordinates.

use nalgebra::DMatrix;

use super::coreg::CoregParameters;
use crate::error::{MappingError, Result};
use crate::points::PointSet;
use crate::spatial::Affine4;

const BOTTOM_ROW_TOLERANCE: f64 = 1e-9;

fn check_bottom_row(matrix: &Affine4) -> Result<()> {
    let expected = [0.0, 0.0, 0.0, 1.0];
    let ok = (0..4).all(|c| (matrix[(3, c)] - expected[c]).abs() <= BOTTOM_ROW_TOLERANCE);
    if ok {
        Ok(())
    } else {
        Err(MappingError::format(format!(
            "affine bottom row must be [0 0 0 1], got {}",
            matrix.inner().row(3)
        )))
    }
}

/// Left-multiply homogenized points by `matrix`, returning 4×N points.
pub fn apply_affine(matrix: &Affine4, points: &PointSet) -> Result<PointSet> {
    check_bottom_row(matrix)?;
    let product: DMatrix<f64> = matrix.to_dmatrix() * points.homogeneous();
    PointSet::new(product)
}

/// Solve `matrix * x = points` for x, returning 4×N points.
///
/// Uses an LU solve rather than an explicit inverse so that near-singular
/// voxel-to-world affines stay well conditioned.
pub fn solve_affine(matrix: &Affine4, points: &PointSet) -> Result<PointSet> {
    check_bottom_row(matrix)?;
    let mut solved = matrix
        .to_dmatrix()
        .lu()
        .solve(&points.homogeneous())
        .ok_or_else(|| MappingError::singular(format!("cannot solve against {}", matrix.inner())))?;
    solved.row_mut(3).fill(1.0);
    PointSet::new(solved)
}

/// Affine transform between two spaces.
///
/// Wraps a single homogeneous matrix. Chains are built with [`compose`],
/// applied right to left like matrix products.
///
/// [`compose`]: AffineTransform::compose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    matrix: Affine4,
}

impl AffineTransform {
    /// Create an affine transform from its matrix.
    pub fn new(matrix: Affine4) -> Self {
        Self { matrix }
    }

    /// Create an identity transform.
    pub fn identity() -> Self {
        Self::new(Affine4::identity())
    }

    /// Transform undoing a coregistration parameter vector.
    ///
    /// Coregistration estimates the rigid motion of the reference onto the
    /// moving image, so moving world coordinates reach the reference through
    /// `inv(rigid(params))`.
    pub fn from_coreg(params: &CoregParameters) -> Result<Self> {
        Ok(Self::new(params.matrix().try_inverse()?))
    }

    /// Get the transform matrix.
    pub fn matrix(&self) -> &Affine4 {
        &self.matrix
    }

    /// `self ∘ first`: apply `first`, then this transform.
    pub fn compose(&self, first: &Affine4) -> Self {
        Self::new(self.matrix * *first)
    }

    /// Apply to a 3×N or 4×N point set.
    pub fn map_points(&self, points: &PointSet) -> Result<PointSet> {
        apply_affine(&self.matrix, points)
    }
}
