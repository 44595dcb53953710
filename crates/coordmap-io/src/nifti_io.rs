use std::path::Path;

use coordmap_core::spatial::Affine4;
use coordmap_core::{MappingError, Result, SpaceImage};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::artifact::FieldVolume;

fn nifti_error(path: &Path, e: impl std::fmt::Display) -> MappingError {
    MappingError::format(format!("failed to read NIfTI file {}: {}", path.display(), e))
}

/// Zero-based voxel-to-world affine from a NIfTI header.
///
/// Prefers the sform, then the qform, then plain pixdim scaling.
pub fn header_affine(header: &NiftiHeader) -> Affine4 {
    if header.sform_code > 0 {
        let r0 = header.srow_x;
        let r1 = header.srow_y;
        let r2 = header.srow_z;
        let mut rows = [[0.0, 0.0, 0.0, 1.0]; 4];
        for (row, src) in rows.iter_mut().zip([r0, r1, r2]) {
            for c in 0..4 {
                row[c] = src[c] as f64;
            }
        }
        return Affine4::from_rows(rows);
    }

    let dx = header.pixdim[1] as f64;
    let dy = header.pixdim[2] as f64;
    let dz = header.pixdim[3] as f64;

    if header.qform_code > 0 {
        // Quaternion form, see the NIfTI-1 standard
        let b = header.quatern_b as f64;
        let c = header.quatern_c as f64;
        let d = header.quatern_d as f64;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

        let qfac = if header.pixdim[0] == 0.0 { 1.0 } else { header.pixdim[0] as f64 };
        let dz = dz * qfac;

        let r11 = a * a + b * b - c * c - d * d;
        let r12 = 2.0 * b * c - 2.0 * a * d;
        let r13 = 2.0 * b * d + 2.0 * a * c;
        let r21 = 2.0 * b * c + 2.0 * a * d;
        let r22 = a * a + c * c - b * b - d * d;
        let r23 = 2.0 * c * d - 2.0 * a * b;
        let r31 = 2.0 * b * d - 2.0 * a * c;
        let r32 = 2.0 * c * d + 2.0 * a * b;
        let r33 = a * a + d * d - c * c - b * b;

        return Affine4::from_rows([
            [r11 * dx, r12 * dy, r13 * dz, header.quatern_x as f64],
            [r21 * dx, r22 * dy, r23 * dz, header.quatern_y as f64],
            [r31 * dx, r32 * dy, r33 * dz, header.quatern_z as f64],
            [0.0, 0.0, 0.0, 1.0],
        ]);
    }

    Affine4::from_scale_translation([dx, dy, dz], [0.0, 0.0, 0.0])
}

/// Shift a zero-based voxel affine to the one-based voxel convention.
pub fn one_based(affine: &Affine4) -> Affine4 {
    *affine * Affine4::from_scale_translation([1.0, 1.0, 1.0], [-1.0, -1.0, -1.0])
}

/// Read the space of a NIfTI image from its header alone.
///
/// The returned affine maps one-based voxel coordinates to world mm.
pub fn read_space_image<P: AsRef<Path>>(path: P) -> Result<SpaceImage> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MappingError::not_found(path));
    }
    let header = NiftiHeader::from_file(path).map_err(|e| nifti_error(path, e))?;
    let dims = [
        header.dim[1] as usize,
        header.dim[2] as usize,
        header.dim[3] as usize,
    ];
    let affine = one_based(&header_affine(&header));
    tracing::debug!("Read space {} with dims {:?}", path.display(), dims);
    Ok(SpaceImage::new(affine).with_dims(dims).with_path(path))
}

/// Read a 3-channel deformation field stored as `[X, Y, Z, 1, 3]` or `[X, Y, Z, 3]`.
pub fn read_deformation_field<P: AsRef<Path>>(path: P) -> Result<FieldVolume> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MappingError::not_found(path));
    }
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| nifti_error(path, e))?;
    let affine = one_based(&header_affine(obj.header()));
    let volume = obj
        .into_volume()
        .into_ndarray::<f64>()
        .map_err(|e| nifti_error(path, e))?;

    let shape = volume.shape().to_vec();
    let five_d = match shape.as_slice() {
        [_, _, _, 1, 3] => true,
        [_, _, _, 3] => false,
        _ => {
            return Err(MappingError::shape(format!(
                "deformation field {} must be [X, Y, Z, 1, 3] or [X, Y, Z, 3], got {:?}",
                path.display(),
                shape
            )))
        }
    };
    let (nx, ny, nz) = (shape[0], shape[1], shape[2]);

    // Channel-major [3, Z, Y, X], x fastest
    let mut values = Vec::with_capacity(3 * nx * ny * nz);
    for c in 0..3 {
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let v = if five_d {
                        volume[&[x, y, z, 0, c][..]]
                    } else {
                        volume[&[x, y, z, c][..]]
                    };
                    values.push(v);
                }
            }
        }
    }

    tracing::debug!(
        "Read deformation field {} on grid {}x{}x{}",
        path.display(),
        nx,
        ny,
        nz
    );
    Ok(FieldVolume {
        dims: [nx, ny, nz],
        values,
        affine,
    })
}
