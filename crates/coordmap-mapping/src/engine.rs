//! External collaborators.
//!
//! Registration engines, engine detection and on-demand rigid registration
//! live outside this crate. Engines exchange points row-major, one `[x, y, z]`
//! millimetre triple per point, in their own handedness; the adapter layer
//! takes care of the conversion.

use std::path::Path;

use coordmap_core::{MappingError, Result, SpaceImage};
use serde::{Deserialize, Serialize};

use crate::config::NormalizationLayout;

/// Engine A: left-handed point transforms with an explicit inverse flag.
pub trait EngineA {
    /// Apply a linear artifact.
    fn apply_linear(
        &self,
        points: &[[f64; 3]],
        use_inverse: bool,
        artifact: &Path,
    ) -> Result<Vec<[f64; 3]>>;

    /// Apply a non-linear (composite or warp) artifact.
    fn apply_nonlinear(
        &self,
        points: &[[f64; 3]],
        use_inverse: bool,
        artifact: Option<&Path>,
    ) -> Result<Vec<[f64; 3]>>;
}

/// Coordinate mode of an engine B lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    #[default]
    Millimetre,
    Voxel,
}

/// Engine B: image-pair lookups through linear or warp artifacts.
pub trait EngineB {
    fn apply_linear_lookup(
        &self,
        points: &[[f64; 3]],
        source: &Path,
        dest: &Path,
        artifact: &Path,
        mode: LookupMode,
    ) -> Result<Vec<[f64; 3]>>;

    fn apply_nonlinear_lookup(
        &self,
        points: &[[f64; 3]],
        source: &Path,
        dest: &Path,
        warp: &Path,
        mode: LookupMode,
    ) -> Result<Vec<[f64; 3]>>;
}

/// Engine that produced a normalization directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineTag {
    EngineA,
    EngineB,
    Deformation,
}

/// Identifies the engine behind a normalization directory.
pub trait EngineDetector {
    fn detect(&self, directory: &Path) -> Result<EngineTag>;
}

/// Computes a rigid registration of `source` onto `dest`.
pub trait RigidRegistrar {
    /// Returns 6 to 12 coregistration parameters.
    fn compute_rigid(&self, dest: &SpaceImage, source: &SpaceImage) -> Result<Vec<f64>>;
}

/// Detects the engine from the files a [`NormalizationLayout`] names.
///
/// Engine A wins over engine B, which wins over deformation fields.
#[derive(Debug, Clone, Default)]
pub struct LayoutEngineDetector {
    layout: NormalizationLayout,
}

impl LayoutEngineDetector {
    pub fn new(layout: NormalizationLayout) -> Self {
        Self { layout }
    }
}

impl EngineDetector for LayoutEngineDetector {
    fn detect(&self, directory: &Path) -> Result<EngineTag> {
        let has = |name: &str| directory.join(name).is_file();
        let layout = &self.layout;

        let tag = if has(&layout.engine_a_composite) {
            EngineTag::EngineA
        } else if has(&layout.engine_b_forward_warp) || has(&layout.engine_b_inverse_warp) {
            EngineTag::EngineB
        } else if has(&layout.deformation_forward) || has(&layout.deformation_inverse) {
            EngineTag::Deformation
        } else {
            return Err(MappingError::not_found(directory.join(&layout.engine_a_composite)));
        };

        tracing::debug!("Detected {:?} normalization in {}", tag, directory.display());
        Ok(tag)
    }
}

/// Stand-in for engines that are not wired into this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableEngine;

impl UnavailableEngine {
    fn unavailable<T>(engine: &str, artifact: Option<&Path>) -> Result<T> {
        let target = artifact
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string());
        Err(MappingError::engine_call(format!(
            "{} is not available (artifact {})",
            engine, target
        )))
    }
}

impl EngineA for UnavailableEngine {
    fn apply_linear(&self, _: &[[f64; 3]], _: bool, artifact: &Path) -> Result<Vec<[f64; 3]>> {
        Self::unavailable("engine A", Some(artifact))
    }

    fn apply_nonlinear(
        &self,
        _: &[[f64; 3]],
        _: bool,
        artifact: Option<&Path>,
    ) -> Result<Vec<[f64; 3]>> {
        Self::unavailable("engine A", artifact)
    }
}

impl EngineB for UnavailableEngine {
    fn apply_linear_lookup(
        &self,
        _: &[[f64; 3]],
        _: &Path,
        _: &Path,
        artifact: &Path,
        _: LookupMode,
    ) -> Result<Vec<[f64; 3]>> {
        Self::unavailable("engine B", Some(artifact))
    }

    fn apply_nonlinear_lookup(
        &self,
        _: &[[f64; 3]],
        _: &Path,
        _: &Path,
        warp: &Path,
        _: LookupMode,
    ) -> Result<Vec<[f64; 3]>> {
        Self::unavailable("engine B", Some(warp))
    }
}

impl RigidRegistrar for UnavailableEngine {
    fn compute_rigid(&self, _: &SpaceImage, source: &SpaceImage) -> Result<Vec<f64>> {
        Self::unavailable("rigid registration", source.path())
    }
}
