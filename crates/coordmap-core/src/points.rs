//! Column-major point sets.
//!
//! A `PointSet` stores N points as a 3×N or 4×N matrix, one point per
//! column, so the coordinate axis varies fastest in memory. A fourth row,
//! when present, is the homogeneous row and is always 1.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use nalgebra::DMatrix;

use crate::error::{MappingError, Result};

const HOMOGENEOUS_TOLERANCE: f64 = 1e-9;

/// An ordered set of points sharing one coordinate space.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet(DMatrix<f64>);

impl PointSet {
    /// Wrap a 3×N or 4×N matrix.
    ///
    /// Fails with a shape error for any other row count, or when the
    /// homogeneous row of a 4×N matrix is not all ones.
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        match matrix.nrows() {
            3 => Ok(Self(matrix)),
            4 => {
                if let Some(bad) = matrix
                    .row(3)
                    .iter()
                    .position(|w| (w - 1.0).abs() > HOMOGENEOUS_TOLERANCE)
                {
                    return Err(MappingError::shape(format!(
                        "homogeneous row must be 1, point {} has {}",
                        bad,
                        matrix[(3, bad)]
                    )));
                }
                Ok(Self(matrix))
            }
            rows => Err(MappingError::shape(format!(
                "point array must have 3 or 4 rows, got {}x{}",
                rows,
                matrix.ncols()
            ))),
        }
    }

    /// Build a 3×N set from individual points.
    pub fn from_points(points: &[[f64; 3]]) -> Self {
        let mut m = DMatrix::zeros(3, points.len());
        for (j, p) in points.iter().enumerate() {
            for i in 0..3 {
                m[(i, j)] = p[i];
            }
        }
        Self(m)
    }

    /// Build a 4×N set from row-major engine output (one point per row).
    pub fn from_row_major(rows: &[[f64; 3]]) -> Self {
        Self::from_points(rows).into_homogeneous()
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.0.ncols()
    }

    /// Whether the set holds no points.
    pub fn is_empty(&self) -> bool {
        self.0.ncols() == 0
    }

    /// Number of rows (3 or 4).
    pub fn nrows(&self) -> usize {
        self.0.nrows()
    }

    /// Get the underlying matrix.
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.0
    }

    /// Consume into the underlying matrix.
    pub fn into_matrix(self) -> DMatrix<f64> {
        self.0
    }

    /// Spatial coordinates of point `j`.
    pub fn point(&self, j: usize) -> [f64; 3] {
        [self.0[(0, j)], self.0[(1, j)], self.0[(2, j)]]
    }

    /// The 3×N spatial part.
    pub fn xyz(&self) -> DMatrix<f64> {
        self.0.rows(0, 3).into_owned()
    }

    /// The 4×N homogeneous form, appending a row of ones if needed.
    pub fn homogeneous(&self) -> DMatrix<f64> {
        if self.0.nrows() == 4 {
            return self.0.clone();
        }
        let mut m = DMatrix::from_element(4, self.0.ncols(), 1.0);
        m.rows_mut(0, 3).copy_from(&self.0);
        m
    }

    /// Convert into the 4×N homogeneous form.
    pub fn into_homogeneous(self) -> Self {
        if self.0.nrows() == 4 {
            self
        } else {
            Self(self.homogeneous())
        }
    }

    /// Points in row-major layout, one `[x, y, z]` per point.
    pub fn to_row_major(&self) -> Vec<[f64; 3]> {
        (0..self.len()).map(|j| self.point(j)).collect()
    }

    /// Negate the given spatial axes, keeping any homogeneous row.
    pub fn negate_axes(&self, axes: &[usize]) -> Self {
        let mut m = self.0.clone();
        for &axis in axes {
            m.row_mut(axis).neg_mut();
        }
        Self(m)
    }

    /// Add a constant to every spatial coordinate.
    pub fn offset(&self, delta: f64) -> Self {
        let mut m = self.0.clone();
        m.rows_mut(0, 3).add_scalar_mut(delta);
        Self(m)
    }

    /// Convert the spatial part into a `[N, 3]` row tensor.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let n = self.len();
        let mut data = Vec::with_capacity(n * 3);
        for j in 0..n {
            data.extend_from_slice(&self.point(j));
        }
        Tensor::<B, 2>::from_data(TensorData::new(data, Shape::new([n, 3])), device)
    }

    /// Build a 4×N set from a `[N, 3]` row tensor.
    pub fn from_tensor<B: Backend>(tensor: Tensor<B, 2>) -> Result<Self> {
        let [n, cols] = tensor.dims();
        if cols != 3 {
            return Err(MappingError::shape(format!(
                "expected a [N, 3] point tensor, got [{}, {}]",
                n, cols
            )));
        }
        let values = tensor
            .into_data()
            .convert::<f64>()
            .to_vec::<f64>()
            .map_err(|e| MappingError::format(format!("failed to read point tensor: {:?}", e)))?;
        let rows: Vec<[f64; 3]> = values
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Ok(Self::from_row_major(&rows))
    }
}
