//! Transform trait for tensor-backed coordinate kernels.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Transform trait for spatial coordinate transformations.
///
/// Maps a batch of points from one space to another. Kernels backed by
/// tensors (deformation fields, DCT warps) implement this; the affine kernel
/// works on nalgebra matrices directly to keep double precision regardless
/// of the backend element type.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality
pub trait Transform<B: Backend, const D: usize> {
    /// Apply transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, D]` containing the input points
    ///
    /// # Returns
    /// Tensor of shape `[Batch, D]` containing the transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}
