//! Text point files.
//!
//! One point per line, `x y z` separated by whitespace or commas. Blank
//! lines and `#` comments are skipped.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use coordmap_core::{MappingError, PointSet, Result};

use crate::artifact::text_to_matrix;

/// Parse row-major point text into a 3×N point set.
pub fn parse_points(text: &str) -> Result<PointSet> {
    let has_rows = text
        .lines()
        .any(|l| !l.split('#').next().unwrap_or("").trim().is_empty());
    if !has_rows {
        return Ok(PointSet::from_points(&[]));
    }
    let rows = text_to_matrix(text)
        .ok_or_else(|| MappingError::format("point list must hold numeric rows of equal length"))?;
    if rows.ncols() != 3 {
        return Err(MappingError::shape(format!(
            "points must have 3 coordinates per line, got {}",
            rows.ncols()
        )));
    }
    PointSet::new(rows.transpose())
}

/// Read a point file.
pub fn read_points<P: AsRef<Path>>(path: P) -> Result<PointSet> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MappingError::not_found(path));
    }
    parse_points(&fs::read_to_string(path)?)
}

/// Format points one per line with full precision.
pub fn format_points(points: &PointSet) -> String {
    let mut out = String::new();
    for [x, y, z] in points.to_row_major() {
        let _ = writeln!(out, "{} {} {}", x, y, z);
    }
    out
}

/// Write points to a file, one per line.
pub fn write_points<P: AsRef<Path>>(path: P, points: &PointSet) -> Result<()> {
    fs::write(path, format_points(points))?;
    Ok(())
}
