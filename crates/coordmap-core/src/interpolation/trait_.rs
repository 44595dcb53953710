//! Interpolator trait for sampling volumes at continuous coordinates.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Interpolator trait for sampling values at continuous voxel indices.
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait Interpolator<B: Backend> {
    /// Interpolate values from a volume at given continuous indices.
    ///
    /// # Arguments
    /// * `data` - Volume laid out as `[Z, Y, X]`
    /// * `indices` - Zero-based indices `[Batch, 3]` ordered `(x, y, z)`
    ///
    /// # Returns
    /// Tensor of sampled values `[Batch]`
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1>;
}
