//! Coregistration parameter vectors.
//!
//! A coregistration routine reports its result as up to twelve numbers:
//! translation (x, y, z), rotation (pitch, roll, yaw, radians), zoom
//! (x, y, z) and shear (xy, xz, yz). Missing trailing entries take their
//! identity defaults. The matrix is composed as `T · R · Z · S` with
//! `R = Rx(pitch) · Ry(roll) · Rz(yaw)`.

use nalgebra::{DMatrix, Matrix4};

use crate::error::{MappingError, Result};
use crate::spatial::Affine4;

/// Number of parameters in a full affine parameter vector.
pub const MAX_PARAMS: usize = 12;
/// Minimum number of parameters (rigid body).
pub const MIN_PARAMS: usize = 6;

const DEFAULTS: [f64; MAX_PARAMS] = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];

/// A rigid or affine coregistration parameter vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoregParameters([f64; MAX_PARAMS]);

impl CoregParameters {
    /// Build from 6 to 12 parameters, padding with identity defaults.
    pub fn from_slice(params: &[f64]) -> Result<Self> {
        if params.len() < MIN_PARAMS || params.len() > MAX_PARAMS {
            return Err(MappingError::format(format!(
                "coregistration vector must hold {} to {} parameters, got {}",
                MIN_PARAMS,
                MAX_PARAMS,
                params.len()
            )));
        }
        let mut full = DEFAULTS;
        full[..params.len()].copy_from_slice(params);
        Ok(Self(full))
    }

    /// Build from a row or column vector matrix.
    pub fn from_dmatrix(matrix: &DMatrix<f64>) -> Result<Self> {
        if matrix.nrows() != 1 && matrix.ncols() != 1 {
            return Err(MappingError::format(format!(
                "coregistration parameters must be a vector, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        let values: Vec<f64> = matrix.iter().copied().collect();
        Self::from_slice(&values)
    }

    /// All twelve parameters.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Compose the homogeneous matrix `T · R · Z · S`.
    pub fn matrix(&self) -> Affine4 {
        let p = &self.0;

        #[rustfmt::skip]
        let t = Matrix4::new(
            1.0, 0.0, 0.0, p[0],
            0.0, 1.0, 0.0, p[1],
            0.0, 0.0, 1.0, p[2],
            0.0, 0.0, 0.0, 1.0,
        );

        let (s4, c4) = p[3].sin_cos();
        let (s5, c5) = p[4].sin_cos();
        let (s6, c6) = p[5].sin_cos();

        #[rustfmt::skip]
        let rx = Matrix4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, c4,  s4,  0.0,
            0.0, -s4, c4,  0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        #[rustfmt::skip]
        let ry = Matrix4::new(
            c5,  0.0, s5,  0.0,
            0.0, 1.0, 0.0, 0.0,
            -s5, 0.0, c5,  0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        #[rustfmt::skip]
        let rz = Matrix4::new(
            c6,  s6,  0.0, 0.0,
            -s6, c6,  0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        let z = Matrix4::from_diagonal(&nalgebra::Vector4::new(p[6], p[7], p[8], 1.0));

        #[rustfmt::skip]
        let s = Matrix4::new(
            1.0, p[9], p[10], 0.0,
            0.0, 1.0,  p[11], 0.0,
            0.0, 0.0,  1.0,   0.0,
            0.0, 0.0,  0.0,   1.0,
        );

        Affine4(t * rx * ry * rz * z * s)
    }
}
