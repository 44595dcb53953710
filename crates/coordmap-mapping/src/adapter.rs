//! Convention adapters for external engines.
//!
//! Points are held column-major and right-handed; engines take row-major
//! millimetre triples. Engine A is left-handed, so x and y are negated on
//! the way in and again on the way out.

use std::path::Path;

use coordmap_core::{MappingError, PointSet, Result};

use crate::engine::{EngineA, EngineB, LookupMode};

const ENGINE_A_FLIPPED_AXES: [usize; 2] = [0, 1];

fn to_engine_rows(points_mm: &PointSet, flip: bool) -> Vec<[f64; 3]> {
    if flip {
        points_mm.negate_axes(&ENGINE_A_FLIPPED_AXES).to_row_major()
    } else {
        points_mm.to_row_major()
    }
}

fn from_engine_rows(rows: Vec<[f64; 3]>, expected: usize, flip: bool) -> Result<PointSet> {
    if rows.len() != expected {
        return Err(MappingError::engine_call(format!(
            "engine returned {} points for {} inputs",
            rows.len(),
            expected
        )));
    }
    let points = PointSet::from_row_major(&rows);
    Ok(if flip {
        points.negate_axes(&ENGINE_A_FLIPPED_AXES)
    } else {
        points
    })
}

/// Map world points through an engine A linear artifact.
pub fn engine_a_linear(
    engine: &dyn EngineA,
    points_mm: &PointSet,
    artifact: &Path,
    use_inverse: bool,
) -> Result<PointSet> {
    if points_mm.is_empty() {
        return Ok(points_mm.clone().into_homogeneous());
    }
    tracing::debug!(
        "Engine A linear {} (use_inverse = {})",
        artifact.display(),
        use_inverse
    );
    let rows = to_engine_rows(points_mm, true);
    let out = engine.apply_linear(&rows, use_inverse, artifact)?;
    from_engine_rows(out, rows.len(), true)
}

/// Map world points through an engine A non-linear artifact.
pub fn engine_a_nonlinear(
    engine: &dyn EngineA,
    points_mm: &PointSet,
    artifact: Option<&Path>,
    use_inverse: bool,
) -> Result<PointSet> {
    if points_mm.is_empty() {
        return Ok(points_mm.clone().into_homogeneous());
    }
    tracing::debug!(
        "Engine A non-linear {:?} (use_inverse = {})",
        artifact,
        use_inverse
    );
    let rows = to_engine_rows(points_mm, true);
    let out = engine.apply_nonlinear(&rows, use_inverse, artifact)?;
    from_engine_rows(out, rows.len(), true)
}

/// Image pair and artifact of an engine B lookup.
#[derive(Debug, Clone, Copy)]
pub struct LookupTarget<'a> {
    pub source: &'a Path,
    pub dest: &'a Path,
    pub artifact: &'a Path,
    pub mode: LookupMode,
}

/// Map world points through an engine B linear artifact.
pub fn engine_b_linear(
    engine: &dyn EngineB,
    points_mm: &PointSet,
    target: LookupTarget<'_>,
) -> Result<PointSet> {
    if points_mm.is_empty() {
        return Ok(points_mm.clone().into_homogeneous());
    }
    tracing::debug!("Engine B linear {}", target.artifact.display());
    let rows = to_engine_rows(points_mm, false);
    let out = engine.apply_linear_lookup(
        &rows,
        target.source,
        target.dest,
        target.artifact,
        target.mode,
    )?;
    from_engine_rows(out, rows.len(), false)
}

/// Map world points through an engine B warp.
pub fn engine_b_nonlinear(
    engine: &dyn EngineB,
    points_mm: &PointSet,
    target: LookupTarget<'_>,
) -> Result<PointSet> {
    if points_mm.is_empty() {
        return Ok(points_mm.clone().into_homogeneous());
    }
    tracing::debug!("Engine B non-linear {}", target.artifact.display());
    let rows = to_engine_rows(points_mm, false);
    let out = engine.apply_nonlinear_lookup(
        &rows,
        target.source,
        target.dest,
        target.artifact,
        target.mode,
    )?;
    from_engine_rows(out, rows.len(), false)
}
