//! Deformation field sampler.
//!
//! A deformation field stores, for every voxel of the source grid, the
//! destination world coordinate that voxel maps to. Mapping a point is a
//! trilinear lookup of each channel at the point's fractional voxel index.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use super::trait_::Transform;
use crate::error::{MappingError, Result};
use crate::interpolation::{Interpolator, LinearInterpolator};
use crate::points::PointSet;

/// Dense 3-channel deformation field on a 3D voxel grid.
///
/// The field tensor has shape `[3, Z, Y, X]`; channel c holds the
/// destination world coordinate along axis c.
#[derive(Debug, Clone)]
pub struct DeformationField3D<B: Backend> {
    field: Tensor<B, 4>,
    interpolator: LinearInterpolator,
}

impl<B: Backend> DeformationField3D<B> {
    /// Create a deformation field from a `[3, Z, Y, X]` tensor.
    pub fn new(field: Tensor<B, 4>) -> Result<Self> {
        let dims = field.dims();
        if dims[0] != 3 || dims[1..].iter().any(|&d| d == 0) {
            return Err(MappingError::shape(format!(
                "deformation field must be [3, Z, Y, X] with non-empty grid, got {:?}",
                dims
            )));
        }
        Ok(Self {
            field,
            interpolator: LinearInterpolator::new(),
        })
    }

    /// Create a field from channel-major values laid out `[3, Z, Y, X]`.
    ///
    /// # Arguments
    /// * `values` - `3 * nx * ny * nz` values, x fastest within a channel
    /// * `dims` - Grid size `[nx, ny, nz]`
    pub fn from_values(values: Vec<f64>, dims: [usize; 3], device: &B::Device) -> Result<Self> {
        let [nx, ny, nz] = dims;
        if values.len() != 3 * nx * ny * nz {
            return Err(MappingError::shape(format!(
                "deformation field of grid {:?} needs {} values, got {}",
                dims,
                3 * nx * ny * nz,
                values.len()
            )));
        }
        let data = TensorData::new(values, Shape::new([3, nz, ny, nx]));
        Self::new(Tensor::<B, 4>::from_data(data, device))
    }

    /// Grid size `[nx, ny, nz]`.
    pub fn grid_dims(&self) -> [usize; 3] {
        let [_, z, y, x] = self.field.dims();
        [x, y, z]
    }

    /// Map one-based source voxel coordinates to destination world coordinates.
    ///
    /// Returns 4×N points.
    pub fn map_points(&self, voxels: &PointSet) -> Result<PointSet> {
        if voxels.is_empty() {
            return Ok(voxels.clone().into_homogeneous());
        }
        tracing::debug!(
            "Sampling {} points from a {:?} deformation field",
            voxels.len(),
            self.grid_dims()
        );
        let indices = voxels.offset(-1.0).to_tensor::<B>(&self.field.device());
        PointSet::from_tensor(self.transform_points(indices))
    }
}

impl<B: Backend> Transform<B, 3> for DeformationField3D<B> {
    /// Sample all three channels at zero-based `(x, y, z)` indices.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let [n, _] = points.dims();
        let [_, z, y, x] = self.field.dims();

        let channels: Vec<Tensor<B, 2>> = (0..3)
            .map(|c| {
                let volume = self.field.clone().narrow(0, c, 1).reshape([z, y, x]);
                self.interpolator
                    .interpolate(&volume, points.clone())
                    .reshape([n, 1])
            })
            .collect();

        Tensor::cat(channels, 1)
    }
}
