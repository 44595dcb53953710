//! Transform artifact readers.
//!
//! Registration tools persist their results in several containers. The
//! mapping layer only ever asks for four things: a plain matrix, a named
//! matrix inside a multi-variable container, a legacy normalization record
//! and a dense deformation field. [`ArtifactReader`] is that contract;
//! [`FsArtifactReader`] serves it from text, JSON exports and NIfTI files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use coordmap_core::spatial::Affine4;
use coordmap_core::{MappingError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::nifti_io;

/// Dense 3-channel deformation field as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldVolume {
    /// Grid size `[nx, ny, nz]`.
    pub dims: [usize; 3],
    /// Channel-major values `[3, Z, Y, X]`, x fastest.
    pub values: Vec<f64>,
    /// One-based voxel-to-world affine of the field grid.
    pub affine: Affine4,
}

/// Legacy normalization record (`*_sn.mat` contents).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyWarpRecord {
    /// DCT coefficients, first index fastest.
    #[serde(rename = "Tr", default)]
    pub coefficients: Vec<f64>,
    /// Coefficient tensor shape `[bx, by, bz, 3]`.
    #[serde(rename = "TrShape", default)]
    pub coefficient_shape: [usize; 4],
    /// Template grid `[nx, ny, nz]`.
    #[serde(rename = "TemplateDim")]
    pub template_dims: [usize; 3],
    /// Voxel-to-voxel affine applied after the warp.
    #[serde(rename = "Affine")]
    pub warp_affine: [[f64; 4]; 4],
    /// Template voxel-to-world affine.
    #[serde(rename = "TemplateMat")]
    pub dest_affine: [[f64; 4]; 4],
}

impl LegacyWarpRecord {
    /// Coefficients reordered row-major with the channel fastest.
    pub fn coefficients_row_major(&self) -> Result<(Vec<f64>, [usize; 4])> {
        let shape = self.coefficient_shape;
        let [bx, by, bz, nc] = shape;
        let expected = bx * by * bz * nc;
        if self.coefficients.len() != expected {
            return Err(MappingError::shape(format!(
                "legacy warp coefficients of shape {:?} need {} values, got {}",
                shape,
                expected,
                self.coefficients.len()
            )));
        }
        if expected > 0 && nc != 3 {
            return Err(MappingError::shape(format!(
                "legacy warp coefficients must have 3 channels, got {:?}",
                shape
            )));
        }

        let mut out = vec![0.0; expected];
        for c in 0..nc {
            for k in 0..bz {
                for j in 0..by {
                    for i in 0..bx {
                        let src = i + bx * (j + by * (k + bz * c));
                        let dst = ((i * by + j) * bz + k) * nc + c;
                        out[dst] = self.coefficients[src];
                    }
                }
            }
        }
        Ok((out, shape))
    }

    pub fn warp_affine(&self) -> Affine4 {
        Affine4::from_rows(self.warp_affine)
    }

    pub fn dest_affine(&self) -> Affine4 {
        Affine4::from_rows(self.dest_affine)
    }
}

/// Source of transform artifacts.
pub trait ArtifactReader {
    /// Read the single matrix stored in an artifact.
    fn read_matrix(&self, path: &Path) -> Result<DMatrix<f64>>;

    /// Read a named matrix from a multi-variable artifact.
    fn read_named_matrix(&self, path: &Path, name: &str) -> Result<DMatrix<f64>>;

    /// Read a legacy DCT normalization record.
    fn read_legacy_warp(&self, path: &Path) -> Result<LegacyWarpRecord>;

    /// Read a dense deformation field.
    fn read_deformation_field(&self, path: &Path) -> Result<FieldVolume>;
}

/// Filesystem reader for text, JSON and NIfTI artifacts.
///
/// Matrix artifacts are either whitespace/comma separated text (one row per
/// line, `#` comments) or JSON objects mapping variable names to nested
/// row arrays. Deformation fields are NIfTI volumes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactReader;

impl FsArtifactReader {
    pub fn new() -> Self {
        Self
    }

    fn read_text(path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(MappingError::not_found(path));
        }
        Ok(fs::read_to_string(path)?)
    }

    fn read_variables(path: &Path, text: &str) -> Result<BTreeMap<String, Value>> {
        serde_json::from_str(text).map_err(|e| {
            MappingError::format(format!("invalid JSON artifact {}: {}", path.display(), e))
        })
    }
}

fn is_json(text: &str) -> bool {
    text.trim_start().starts_with('{')
}

/// Parse a JSON number, flat array or array of rows into a matrix.
pub fn json_to_matrix(value: &Value) -> Option<DMatrix<f64>> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| DMatrix::from_element(1, 1, v)),
        Value::Array(items) if items.iter().all(Value::is_array) && !items.is_empty() => {
            let rows: Option<Vec<Vec<f64>>> = items
                .iter()
                .map(|row| row.as_array()?.iter().map(Value::as_f64).collect())
                .collect();
            rows_to_matrix(&rows?)
        }
        Value::Array(items) => {
            let row: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
            let row = row?;
            Some(DMatrix::from_row_slice(1, row.len(), &row))
        }
        _ => None,
    }
}

fn rows_to_matrix(rows: &[Vec<f64>]) -> Option<DMatrix<f64>> {
    let ncols = rows.first()?.len();
    if ncols == 0 || rows.iter().any(|r| r.len() != ncols) {
        return None;
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Some(DMatrix::from_row_slice(rows.len(), ncols, &flat))
}

/// Parse numeric text, one row per line.
pub fn text_to_matrix(text: &str) -> Option<DMatrix<f64>> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let row: std::result::Result<Vec<f64>, _> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::parse::<f64>)
            .collect();
        rows.push(row.ok()?);
    }
    rows_to_matrix(&rows)
}

impl ArtifactReader for FsArtifactReader {
    fn read_matrix(&self, path: &Path) -> Result<DMatrix<f64>> {
        let text = Self::read_text(path)?;
        if !is_json(&text) {
            return text_to_matrix(&text).ok_or_else(|| {
                MappingError::format(format!("no numeric matrix in {}", path.display()))
            });
        }

        let variables = Self::read_variables(path, &text)?;
        let mut values = variables.values();
        match (values.next(), values.next()) {
            (Some(value), None) => json_to_matrix(value).ok_or_else(|| {
                MappingError::format(format!("sole variable in {} is not numeric", path.display()))
            }),
            _ => Err(MappingError::format(format!(
                "expected exactly one variable in {}, found {}",
                path.display(),
                variables.len()
            ))),
        }
    }

    fn read_named_matrix(&self, path: &Path, name: &str) -> Result<DMatrix<f64>> {
        let text = Self::read_text(path)?;
        if !is_json(&text) {
            return Err(MappingError::format(format!(
                "{} holds no named variables, cannot read '{}'",
                path.display(),
                name
            )));
        }
        let variables = Self::read_variables(path, &text)?;
        let value = variables.get(name).ok_or_else(|| {
            MappingError::format(format!("variable '{}' missing from {}", name, path.display()))
        })?;
        json_to_matrix(value).ok_or_else(|| {
            MappingError::format(format!(
                "variable '{}' in {} is not numeric",
                name,
                path.display()
            ))
        })
    }

    fn read_legacy_warp(&self, path: &Path) -> Result<LegacyWarpRecord> {
        let text = Self::read_text(path)?;
        let record: LegacyWarpRecord = serde_json::from_str(&text).map_err(|e| {
            MappingError::format(format!(
                "invalid legacy normalization record {}: {}",
                path.display(),
                e
            ))
        })?;
        tracing::debug!(
            "Read legacy normalization {} with coefficients {:?}",
            path.display(),
            record.coefficient_shape
        );
        Ok(record)
    }

    fn read_deformation_field(&self, path: &Path) -> Result<FieldVolume> {
        nifti_io::read_deformation_field(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const IDENTITY: [[f64; 4]; 4] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    #[test]
    fn test_text_matrix_with_comments() {
        let m = text_to_matrix("# affine\n1 0 0 5\n0, 1, 0, 6\n0 0 1 7\n0 0 0 1\n").unwrap();
        assert_eq!(m.shape(), (4, 4));
        assert_eq!(m[(1, 3)], 6.0);
    }

    #[test]
    fn test_ragged_text_is_rejected() {
        assert!(text_to_matrix("1 2 3\n4 5\n").is_none());
        assert!(text_to_matrix("1 2 x\n").is_none());
    }

    #[test]
    fn test_json_single_variable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.mat");
        fs::write(&path, r#"{"x": [1.0, 2.0, 3.0, 0.0, 0.0, 0.0]}"#).unwrap();

        let m = FsArtifactReader::new().read_matrix(&path).unwrap();
        assert_eq!(m.shape(), (1, 6));
        assert_eq!(m[(0, 2)], 3.0);
    }

    #[test]
    fn test_json_multiple_variables_need_a_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run_spm.mat");
        fs::write(
            &path,
            r#"{"M": [[1,0,0,1],[0,1,0,2],[0,0,1,3],[0,0,0,1]], "x": [0,0,0,0,0,0]}"#,
        )
        .unwrap();

        let reader = FsArtifactReader::new();
        assert!(matches!(reader.read_matrix(&path), Err(MappingError::Format(_))));
        let m = reader.read_named_matrix(&path, "M").unwrap();
        assert_eq!(m[(2, 3)], 3.0);
        let err = reader.read_named_matrix(&path, "Q").unwrap_err();
        assert!(err.to_string().contains("'Q'"));
    }

    #[test]
    fn test_missing_artifact_is_not_found() {
        let dir = tempdir().unwrap();
        let err = FsArtifactReader::new()
            .read_matrix(&dir.path().join("gone.mat"))
            .unwrap_err();
        assert!(matches!(err, MappingError::NotFound { .. }));
    }

    #[test]
    fn test_legacy_coefficients_reorder() {
        // bx=2, by=1, bz=1, 3 channels; column-major value = 10 c + i
        let record = LegacyWarpRecord {
            coefficients: vec![0.0, 1.0, 10.0, 11.0, 20.0, 21.0],
            coefficient_shape: [2, 1, 1, 3],
            template_dims: [4, 4, 4],
            warp_affine: IDENTITY,
            dest_affine: IDENTITY,
        };
        let (values, shape) = record.coefficients_row_major().unwrap();
        assert_eq!(shape, [2, 1, 1, 3]);
        assert_eq!(values, vec![0.0, 10.0, 20.0, 1.0, 11.0, 21.0]);
    }

    #[test]
    fn test_legacy_record_without_warp() {
        let json = r#"{
            "TemplateDim": [91, 109, 91],
            "Affine": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]],
            "TemplateMat": [[2,0,0,-92],[0,2,0,-128],[0,0,2,-74],[0,0,0,1]]
        }"#;
        let record: LegacyWarpRecord = serde_json::from_str(json).unwrap();
        let (values, _) = record.coefficients_row_major().unwrap();
        assert!(values.is_empty());
        assert_eq!(record.dest_affine()[(0, 3)], -92.0);
    }
}
