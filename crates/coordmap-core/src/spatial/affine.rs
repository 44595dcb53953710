//! Homogeneous 4×4 affine matrix type.
//!
//! Affines map voxel coordinates to world (mm) coordinates, or one world
//! space to another. No shear or orthogonality constraint is assumed.

use nalgebra::{DMatrix, Matrix4};
use serde::{Deserialize, Serialize};

use crate::error::{MappingError, Result};

/// A 4×4 homogeneous affine matrix.
///
/// This is a thin wrapper around nalgebra's `Matrix4<f64>` to provide
/// domain-specific constructors while keeping all nalgebra operations
/// available through the public field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine4(pub Matrix4<f64>);

impl Affine4 {
    /// Create an identity affine.
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Create an affine from row-major rows.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        let mut m = Matrix4::zeros();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                m[(r, c)] = *value;
            }
        }
        Self(m)
    }

    /// Create an affine applying per-axis scaling followed by a translation.
    pub fn from_scale_translation(scale: [f64; 3], translation: [f64; 3]) -> Self {
        let mut m = Matrix4::identity();
        for i in 0..3 {
            m[(i, i)] = scale[i];
            m[(i, 3)] = translation[i];
        }
        Self(m)
    }

    /// Interpret a dynamically sized matrix as an affine.
    ///
    /// Fails with a format error unless the matrix is exactly 4×4.
    pub fn from_dmatrix(matrix: &DMatrix<f64>) -> Result<Self> {
        if matrix.shape() != (4, 4) {
            return Err(MappingError::format(format!(
                "expected a 4x4 affine, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        Ok(Self(Matrix4::from_iterator(matrix.iter().copied())))
    }

    /// Convert into a dynamically sized matrix.
    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_iterator(4, 4, self.0.iter().copied())
    }

    /// Get the underlying matrix.
    pub fn inner(&self) -> &Matrix4<f64> {
        &self.0
    }

    /// Compute the inverse, failing when the matrix is singular.
    pub fn try_inverse(&self) -> Result<Self> {
        self.0
            .try_inverse()
            .map(Self)
            .ok_or_else(|| MappingError::singular(format!("affine is not invertible: {}", self.0)))
    }
}

impl Default for Affine4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Index<(usize, usize)> for Affine4 {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl std::ops::IndexMut<(usize, usize)> for Affine4 {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl std::ops::Mul for Affine4 {
    type Output = Self;

    fn mul(self, other: Self) -> Self::Output {
        Self(self.0 * other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_identity() {
        let a = Affine4::identity();
        assert_eq!(a[(0, 0)], 1.0);
        assert_eq!(a[(3, 3)], 1.0);
        assert_eq!(a[(0, 3)], 0.0);
    }

    #[test]
    fn test_from_rows_is_row_major() {
        let a = Affine4::from_rows([
            [1.0, 2.0, 3.0, 4.0],
            [0.0, 1.0, 0.0, 5.0],
            [0.0, 0.0, 1.0, 6.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(a[(0, 1)], 2.0);
        assert_eq!(a[(1, 3)], 5.0);
    }

    #[test]
    fn test_from_dmatrix_rejects_non_square() {
        let m = DMatrix::<f64>::zeros(3, 4);
        assert!(matches!(
            Affine4::from_dmatrix(&m),
            Err(MappingError::Format(_))
        ));
    }

    #[test]
    fn test_dmatrix_roundtrip_keeps_layout() {
        let a = Affine4::from_scale_translation([2.0, 3.0, 4.0], [5.0, 6.0, 7.0]);
        let back = Affine4::from_dmatrix(&a.to_dmatrix()).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn test_singular_inverse_fails() {
        let mut a = Affine4::identity();
        a[(2, 2)] = 0.0;
        assert!(matches!(a.try_inverse(), Err(MappingError::Singular(_))));
    }
}
