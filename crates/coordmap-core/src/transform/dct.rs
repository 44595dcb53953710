//! Legacy DCT normalization warps.
//!
//! Legacy spatial normalization stores its non-linear component as a small
//! tensor of discrete cosine coefficients `Tr[bx, by, bz, 3]` defined over
//! the template grid. The displacement at a voxel is the separable
//! expansion
//!
//! ```text
//! d_c(x, y, z) = Σ_i Σ_j Σ_k Bx[x, i] · By[y, j] · Bz[z, k] · Tr[i, j, k, c]
//! ```
//!
//! where each basis is the orthonormal DCT-II over the template dimension.
//! The expansion is evaluated only at the query points, one axis at a time,
//! without materialising the dense field.

use std::f64::consts::PI;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Shape, Tensor, TensorData};

use super::affine::apply_affine;
use super::trait_::Transform;
use crate::error::{MappingError, Result};
use crate::points::PointSet;
use crate::spatial::Affine4;

/// Orthonormal DCT-II basis evaluated at zero-based coordinates.
///
/// # Arguments
/// * `coords` - Zero-based coordinates `[N]` along one axis
/// * `n` - Number of samples along the axis (template dimension)
/// * `k` - Number of basis functions
///
/// # Returns
/// Tensor `[N, k]` with column 0 equal to `1/sqrt(n)` and column j equal
/// to `sqrt(2/n) · cos(π · (2x + 1) · j / (2n))`.
pub fn dct_basis<B: Backend>(coords: Tensor<B, 1>, n: usize, k: usize) -> Tensor<B, 2> {
    let [points] = coords.dims();
    let device = coords.device();
    let nf = n as f64;

    let order = Tensor::<B, 1, Int>::arange(0..k as i64, &device)
        .float()
        .reshape([1, k]);
    let phase = (coords.reshape([points, 1]) * 2.0 + 1.0) * (PI / (2.0 * nf));

    let mut weights = vec![(2.0 / nf).sqrt(); k];
    if let Some(first) = weights.first_mut() {
        *first = 1.0 / nf.sqrt();
    }
    let weights = Tensor::<B, 2>::from_data(TensorData::new(weights, Shape::new([1, k])), &device);

    (phase * order).cos() * weights
}

/// Separable cosine-basis warp over a template grid.
#[derive(Debug, Clone)]
pub struct DctWarp<B: Backend> {
    /// Coefficients `[bx, by, bz, 3]`.
    coefficients: Tensor<B, 4>,
    /// Template grid `[nx, ny, nz]`.
    template_dims: [usize; 3],
}

impl<B: Backend> DctWarp<B> {
    /// Create a warp from a `[bx, by, bz, 3]` coefficient tensor.
    ///
    /// Returns `Ok(None)` when the tensor is empty (pure affine normalization).
    pub fn new(coefficients: Tensor<B, 4>, template_dims: [usize; 3]) -> Result<Option<Self>> {
        let dims = coefficients.dims();
        if dims[..3].iter().any(|&d| d == 0) {
            return Ok(None);
        }
        if dims[3] != 3 {
            return Err(MappingError::shape(format!(
                "DCT coefficients must be [bx, by, bz, 3], got {:?}",
                dims
            )));
        }
        if template_dims.iter().any(|&d| d == 0) {
            return Err(MappingError::format(format!(
                "template dimensions must be positive, got {:?}",
                template_dims
            )));
        }
        Ok(Some(Self {
            coefficients,
            template_dims,
        }))
    }

    /// Create a warp from row-major coefficient values (`c` fastest).
    pub fn from_values(
        values: Vec<f64>,
        shape: [usize; 4],
        template_dims: [usize; 3],
        device: &B::Device,
    ) -> Result<Option<Self>> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(MappingError::shape(format!(
                "DCT coefficients of shape {:?} need {} values, got {}",
                shape,
                expected,
                values.len()
            )));
        }
        if expected == 0 {
            return Ok(None);
        }
        let tensor = Tensor::<B, 4>::from_data(TensorData::new(values, Shape::new(shape)), device);
        Self::new(tensor, template_dims)
    }

    /// Number of basis functions per axis `[bx, by, bz]`.
    pub fn basis_counts(&self) -> [usize; 3] {
        let [bx, by, bz, _] = self.coefficients.dims();
        [bx, by, bz]
    }

    /// Displacement `[N, 3]` at zero-based template coordinates `[N, 3]`.
    pub fn displacement(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let [n, _] = points.dims();
        let [bx, by, bz] = self.basis_counts();
        let [nx, ny, nz] = self.template_dims;

        let axis = |i: usize| points.clone().narrow(1, i, 1).reshape([n]);
        let basis_x = dct_basis(axis(0), nx, bx);
        let basis_y = dct_basis(axis(1), ny, by).reshape([n, 1, by]);
        let basis_z = dct_basis(axis(2), nz, bz);

        let channels: Vec<Tensor<B, 2>> = (0..3)
            .map(|c| {
                let coeffs = self
                    .coefficients
                    .clone()
                    .narrow(3, c, 1)
                    .reshape([bx * by, bz]);
                // z first: [N, bz] x [bz, bx*by]
                let along_z = basis_z.clone().matmul(coeffs.transpose());
                let along_y = (along_z.reshape([n, bx, by]) * basis_y.clone())
                    .sum_dim(2)
                    .reshape([n, bx]);
                (along_y * basis_x.clone()).sum_dim(1)
            })
            .collect();

        Tensor::cat(channels, 1)
    }
}

impl<B: Backend> Transform<B, 3> for DctWarp<B> {
    /// Displace zero-based template coordinates by the cosine expansion.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        points.clone() + self.displacement(points)
    }
}

/// Result of a legacy normalization lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyMapped {
    /// Destination world coordinates, 4×N.
    pub world: PointSet,
    /// Destination voxel coordinates recovered from the artifact, 4×N.
    pub voxel: PointSet,
}

/// Legacy normalization: optional DCT warp followed by two affines.
///
/// `dest_mm = dest_affine · warp_affine · (x + d(x))`
#[derive(Debug, Clone)]
pub struct LegacyNormalization<B: Backend> {
    warp: Option<DctWarp<B>>,
    warp_affine: Affine4,
    dest_affine: Affine4,
}

impl<B: Backend> LegacyNormalization<B> {
    /// Create a legacy normalization.
    pub fn new(warp: Option<DctWarp<B>>, warp_affine: Affine4, dest_affine: Affine4) -> Self {
        Self {
            warp,
            warp_affine,
            dest_affine,
        }
    }

    /// Whether a non-linear component is present.
    pub fn has_warp(&self) -> bool {
        self.warp.is_some()
    }

    /// Map one-based source voxels to destination world and voxel coordinates.
    pub fn map_points(&self, voxels: &PointSet) -> Result<LegacyMapped> {
        if self.has_warp() {
            tracing::debug!("Legacy normalization with DCT warp over {} points", voxels.len());
        } else {
            tracing::debug!("Legacy normalization without DCT coefficients, affine only");
        }
        let displaced = match &self.warp {
            Some(warp) if !voxels.is_empty() => {
                let device = warp.coefficients.device();
                let indices = voxels.offset(-1.0).to_tensor::<B>(&device);
                PointSet::from_tensor(warp.transform_points(indices))?.offset(1.0)
            }
            _ => voxels.clone().into_homogeneous(),
        };

        let voxel = apply_affine(&self.warp_affine, &displaced)?;
        let world = apply_affine(&self.dest_affine, &voxel)?;
        Ok(LegacyMapped { world, voxel })
    }
}
