//! Trilinear interpolation with boundary hold.
//!
//! Samples outside the volume take the value of the nearest valid voxel:
//! both neighbour indices are clamped into range, so the interpolation
//! weights collapse onto the edge voxel instead of reading out of bounds.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::trait_::Interpolator;

/// Trilinear interpolator (degree 1, replicate boundary).
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    /// Create a new linear interpolator.
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn gather<B: Backend>(
        flat_data: &Tensor<B, 1>,
        xi: &Tensor<B, 1, Int>,
        yi: &Tensor<B, 1, Int>,
        zi: &Tensor<B, 1, Int>,
        stride_y: i64,
        stride_z: i64,
    ) -> Tensor<B, 1> {
        let idx = zi.clone() * stride_z + yi.clone() * stride_y + xi.clone();
        flat_data.clone().gather(0, idx)
    }
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let [d0, d1, d2] = data.dims(); // Z, Y, X
        let batch_size = indices.dims()[0];
        let device = indices.device();

        let x = indices.clone().narrow(1, 0, 1).squeeze::<1>(1);
        let y = indices.clone().narrow(1, 1, 1).squeeze::<1>(1);
        let z = indices.narrow(1, 2, 1).squeeze::<1>(1);

        let x0 = x.clone().floor();
        let y0 = y.clone().floor();
        let z0 = z.clone().floor();

        let wx = x - x0.clone();
        let wy = y - y0.clone();
        let wz = z - z0.clone();

        let x1 = x0.clone() + 1.0;
        let y1 = y0.clone() + 1.0;
        let z1 = z0.clone() + 1.0;

        let x0_i = x0.clamp(0.0, (d2 - 1) as f64).int();
        let y0_i = y0.clamp(0.0, (d1 - 1) as f64).int();
        let z0_i = z0.clamp(0.0, (d0 - 1) as f64).int();
        let x1_i = x1.clamp(0.0, (d2 - 1) as f64).int();
        let y1_i = y1.clamp(0.0, (d1 - 1) as f64).int();
        let z1_i = z1.clamp(0.0, (d0 - 1) as f64).int();

        let stride_z = (d1 * d2) as i64;
        let stride_y = d2 as i64;
        let flat_data = data.clone().reshape([d0 * d1 * d2]);

        let v000 = Self::gather(&flat_data, &x0_i, &y0_i, &z0_i, stride_y, stride_z);
        let v001 = Self::gather(&flat_data, &x0_i, &y0_i, &z1_i, stride_y, stride_z);
        let v010 = Self::gather(&flat_data, &x0_i, &y1_i, &z0_i, stride_y, stride_z);
        let v011 = Self::gather(&flat_data, &x0_i, &y1_i, &z1_i, stride_y, stride_z);
        let v100 = Self::gather(&flat_data, &x1_i, &y0_i, &z0_i, stride_y, stride_z);
        let v101 = Self::gather(&flat_data, &x1_i, &y0_i, &z1_i, stride_y, stride_z);
        let v110 = Self::gather(&flat_data, &x1_i, &y1_i, &z0_i, stride_y, stride_z);
        let v111 = Self::gather(&flat_data, &x1_i, &y1_i, &z1_i, stride_y, stride_z);

        let one = Tensor::<B, 1>::ones([batch_size], &device);
        let one_minus_wx = one.clone() - wx.clone();
        let one_minus_wy = one.clone() - wy.clone();
        let one_minus_wz = one - wz.clone();

        // Along X
        let c00 = v000 * one_minus_wx.clone() + v100 * wx.clone();
        let c01 = v001 * one_minus_wx.clone() + v101 * wx.clone();
        let c10 = v010 * one_minus_wx.clone() + v110 * wx.clone();
        let c11 = v011 * one_minus_wx + v111 * wx;

        // Along Y
        let c0 = c00 * one_minus_wy.clone() + c10 * wy.clone();
        let c1 = c01 * one_minus_wy + c11 * wy;

        // Along Z
        c0 * one_minus_wz + c1 * wz
    }
}
