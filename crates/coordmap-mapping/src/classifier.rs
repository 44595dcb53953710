//! Transform classification.
//!
//! A transform argument is turned into a [`ResolvedTransform`] exactly once.
//! Rules are tried in order and the first match wins:
//!
//! 1. in-memory matrix: 4×4 affine or 6 to 12 coregistration parameters
//! 2. `*_sn.mat`: legacy DCT normalization
//! 3. `*.mat`: method hint decides, no hint means fallback registration
//! 4. normalization pointer names: engine detected from the directory
//! 5. `*.nii`, `*.nii.gz`, `*.h5`: method hint required
//! 6. anything else is unsupported
//!
//! Sibling artifacts are found by directory scan; when several files match,
//! the lexicographically greatest name is used.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use coordmap_core::spatial::Affine4;
use coordmap_core::transform::coreg::{MAX_PARAMS, MIN_PARAMS};
use coordmap_core::transform::CoregParameters;
use coordmap_core::{MappingError, Result};
use nalgebra::DMatrix;
use regex::Regex;

use crate::config::MapperConfig;
use crate::engine::{EngineDetector, EngineTag};
use crate::method::{MethodHint, TransformMethod};

static ENGINE_A_SUFFIX: OnceLock<Regex> = OnceLock::new();
static ENGINE_B_SUFFIX: OnceLock<Regex> = OnceLock::new();

fn engine_a_suffix() -> &'static Regex {
    ENGINE_A_SUFFIX.get_or_init(|| {
        Regex::new(r"(?:_ants[^/]*)?\.mat$").expect("engine A suffix regex must compile")
    })
}

fn engine_b_suffix() -> &'static Regex {
    ENGINE_B_SUFFIX.get_or_init(|| {
        Regex::new(r"(?:_flirt\d*)?\.mat$").expect("engine B suffix regex must compile")
    })
}

/// A transform argument.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformInput {
    /// In-memory 4×4 matrix or parameter vector.
    Array(DMatrix<f64>),
    /// Artifact on disk.
    Path(PathBuf),
}

impl From<DMatrix<f64>> for TransformInput {
    fn from(matrix: DMatrix<f64>) -> Self {
        TransformInput::Array(matrix)
    }
}

impl From<Affine4> for TransformInput {
    fn from(affine: Affine4) -> Self {
        TransformInput::Array(affine.to_dmatrix())
    }
}

impl From<PathBuf> for TransformInput {
    fn from(path: PathBuf) -> Self {
        TransformInput::Path(path)
    }
}

impl From<&Path> for TransformInput {
    fn from(path: &Path) -> Self {
        TransformInput::Path(path.to_path_buf())
    }
}

impl From<&str> for TransformInput {
    fn from(path: &str) -> Self {
        TransformInput::Path(PathBuf::from(path))
    }
}

/// Classified transform with every sibling artifact resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTransform {
    Affine(Affine4),
    Coreg(CoregParameters),
    AffineFile(PathBuf),
    CoregFile(PathBuf),
    /// Stored `M` maps destination to source mm, so it is applied inverted.
    SpmAffine { path: PathBuf, field: String },
    EngineALinear { artifact: PathBuf, use_inverse: bool },
    EngineBLinear { artifact: PathBuf },
    LegacyDct { artifact: PathBuf },
    ModernDeformation { field: PathBuf },
    EngineANonlinear { artifact: PathBuf, use_inverse: bool },
    EngineBNonlinear { warp: PathBuf },
    FallbackJitCoreg { artifact: PathBuf },
}

impl ResolvedTransform {
    pub fn method(&self) -> TransformMethod {
        match self {
            ResolvedTransform::Affine(_) | ResolvedTransform::AffineFile(_) => {
                TransformMethod::Affine
            }
            ResolvedTransform::Coreg(_) | ResolvedTransform::CoregFile(_) => TransformMethod::Coreg,
            ResolvedTransform::SpmAffine { .. } => TransformMethod::SpmAffine,
            ResolvedTransform::EngineALinear { .. } => TransformMethod::EngineALinear,
            ResolvedTransform::EngineBLinear { .. } => TransformMethod::EngineBLinear,
            ResolvedTransform::LegacyDct { .. } => TransformMethod::LegacyDct,
            ResolvedTransform::ModernDeformation { .. } => TransformMethod::ModernDeformation,
            ResolvedTransform::EngineANonlinear { .. } => TransformMethod::EngineANonlinear,
            ResolvedTransform::EngineBNonlinear { .. } => TransformMethod::EngineBNonlinear,
            ResolvedTransform::FallbackJitCoreg { .. } => TransformMethod::FallbackJitCoreg,
        }
    }
}

/// Turns transform arguments into [`ResolvedTransform`]s.
pub struct TransformClassifier<'a> {
    config: &'a MapperConfig,
    detector: &'a dyn EngineDetector,
}

impl<'a> TransformClassifier<'a> {
    pub fn new(config: &'a MapperConfig, detector: &'a dyn EngineDetector) -> Self {
        Self { config, detector }
    }

    /// Classify a transform argument.
    ///
    /// # Arguments
    /// * `input` - In-memory matrix or artifact path
    /// * `hint` - Optional method hint, see [`MethodHint`]
    /// * `use_inverse` - Engine A inverse flag for hinted non-linear artifacts
    pub fn classify(
        &self,
        input: &TransformInput,
        hint: Option<&str>,
        use_inverse: Option<bool>,
    ) -> Result<ResolvedTransform> {
        let hint = hint.and_then(MethodHint::parse);
        let resolved = match input {
            TransformInput::Array(matrix) => {
                if let Some(hint) = &hint {
                    tracing::warn!("Ignoring method hint '{}' for in-memory transform", hint);
                }
                classify_array(matrix)?
            }
            TransformInput::Path(path) => self.classify_path(path, hint, use_inverse)?,
        };
        tracing::debug!("Classified transform as {}", resolved.method());
        Ok(resolved)
    }

    fn classify_path(
        &self,
        path: &Path,
        hint: Option<MethodHint>,
        use_inverse: Option<bool>,
    ) -> Result<ResolvedTransform> {
        let name = file_name(path);
        let lower = name.to_lowercase();

        if lower.ends_with("_sn.mat") {
            if let Some(hint) = &hint {
                tracing::warn!(
                    "Ignoring method hint '{}' for legacy normalization {}",
                    hint,
                    path.display()
                );
            }
            return Ok(ResolvedTransform::LegacyDct {
                artifact: path.to_path_buf(),
            });
        }

        if lower.ends_with(".mat") {
            return self.classify_mat(path, hint);
        }

        let layout = &self.config.layout;
        let pointer = name.split('.').next().unwrap_or("");
        if pointer == layout.forward_pointer || pointer == layout.inverse_pointer {
            if let Some(hint) = &hint {
                tracing::warn!(
                    "Ignoring method hint '{}' for normalization pointer {}",
                    hint,
                    path.display()
                );
            }
            return self.classify_pointer(path, pointer == layout.forward_pointer);
        }

        if lower.ends_with(".nii") || lower.ends_with(".nii.gz") || lower.ends_with(".h5") {
            return self.classify_field(path, hint, use_inverse);
        }

        Err(MappingError::unsupported_format(path))
    }

    fn classify_mat(&self, path: &Path, hint: Option<MethodHint>) -> Result<ResolvedTransform> {
        let Some(hint) = hint else {
            return Ok(ResolvedTransform::FallbackJitCoreg {
                artifact: path.to_path_buf(),
            });
        };

        let method = hint
            .linear_method()
            .ok_or_else(|| MappingError::unsupported_method(hint.as_str(), path))?;

        Ok(match method {
            TransformMethod::Affine => ResolvedTransform::AffineFile(path.to_path_buf()),
            TransformMethod::Coreg => ResolvedTransform::CoregFile(path.to_path_buf()),
            TransformMethod::SpmAffine => ResolvedTransform::SpmAffine {
                path: spm_container(path),
                field: self.config.spm_affine_field.clone(),
            },
            TransformMethod::EngineALinear => {
                let (artifact, use_inverse) = resolve_engine_a_linear(path)?;
                ResolvedTransform::EngineALinear {
                    artifact,
                    use_inverse,
                }
            }
            TransformMethod::EngineBLinear => ResolvedTransform::EngineBLinear {
                artifact: resolve_engine_b_linear(path)?,
            },
            _ => return Err(MappingError::unsupported_method(hint.as_str(), path)),
        })
    }

    fn classify_pointer(&self, path: &Path, forward: bool) -> Result<ResolvedTransform> {
        let directory = parent_dir(path);
        let layout = &self.config.layout;

        Ok(match self.detector.detect(&directory)? {
            EngineTag::EngineA => ResolvedTransform::EngineANonlinear {
                artifact: directory.join(&layout.engine_a_composite),
                use_inverse: forward,
            },
            EngineTag::EngineB => {
                let warp = if forward {
                    &layout.engine_b_forward_warp
                } else {
                    &layout.engine_b_inverse_warp
                };
                ResolvedTransform::EngineBNonlinear {
                    warp: directory.join(warp),
                }
            }
            // The field sampled at native voxels is the one named inverse.
            EngineTag::Deformation => {
                let field = if forward {
                    &layout.deformation_inverse
                } else {
                    &layout.deformation_forward
                };
                ResolvedTransform::ModernDeformation {
                    field: directory.join(field),
                }
            }
        })
    }

    fn classify_field(
        &self,
        path: &Path,
        hint: Option<MethodHint>,
        use_inverse: Option<bool>,
    ) -> Result<ResolvedTransform> {
        let hint = hint.ok_or_else(|| MappingError::missing_method(path))?;
        let method = hint
            .field_method()
            .ok_or_else(|| MappingError::unsupported_method(hint.as_str(), path))?;

        Ok(match method {
            TransformMethod::EngineANonlinear => ResolvedTransform::EngineANonlinear {
                artifact: path.to_path_buf(),
                use_inverse: use_inverse.unwrap_or(self.config.default_use_inverse),
            },
            TransformMethod::EngineBNonlinear => ResolvedTransform::EngineBNonlinear {
                warp: path.to_path_buf(),
            },
            TransformMethod::ModernDeformation => ResolvedTransform::ModernDeformation {
                field: path.to_path_buf(),
            },
            _ => return Err(MappingError::unsupported_method(hint.as_str(), path)),
        })
    }
}

/// Classify an in-memory transform.
pub fn classify_array(matrix: &DMatrix<f64>) -> Result<ResolvedTransform> {
    if matrix.shape() == (4, 4) {
        return Ok(ResolvedTransform::Affine(Affine4::from_dmatrix(matrix)?));
    }
    let len = matrix.len();
    let is_vector = matrix.nrows() == 1 || matrix.ncols() == 1;
    if is_vector && (MIN_PARAMS..=MAX_PARAMS).contains(&len) {
        return Ok(ResolvedTransform::Coreg(CoregParameters::from_dmatrix(matrix)?));
    }
    Err(MappingError::format(format!(
        "in-memory transform must be 4x4 or a vector of {} to {} parameters, got {}x{}",
        MIN_PARAMS,
        MAX_PARAMS,
        matrix.nrows(),
        matrix.ncols()
    )))
}

/// Resolve an engine A linear artifact next to `path`.
///
/// The base name (any `_ants*` suffix stripped) is read as `moving2fixed`.
/// A direct `moving2fixed_ants*.mat` is applied with `use_inverse = true`;
/// otherwise a reverse `fixed2moving_ants*.mat` is applied with
/// `use_inverse = false`.
pub fn resolve_engine_a_linear(path: &Path) -> Result<(PathBuf, bool)> {
    let name = file_name(path);
    let base = engine_a_suffix().replace(&name, "").into_owned();
    let directory = parent_dir(path);

    let direct = Regex::new(&format!(r"^{}_ants[^/]*\.mat$", regex::escape(&base)))
        .map_err(|e| MappingError::format(format!("bad artifact name {}: {}", name, e)))?;
    if let Some(found) = greatest_match(&directory, &direct)? {
        tracing::debug!("Engine A artifact {} matches {} directly", found.display(), name);
        return Ok((found, true));
    }

    if let Some((moving, fixed)) = base.rsplit_once('2') {
        let reverse = Regex::new(&format!(
            r"^{}2{}_ants[^/]*\.mat$",
            regex::escape(fixed),
            regex::escape(moving)
        ))
        .map_err(|e| MappingError::format(format!("bad artifact name {}: {}", name, e)))?;
        if let Some(found) = greatest_match(&directory, &reverse)? {
            tracing::debug!("Engine A artifact {} matches {} in reverse", found.display(), name);
            return Ok((found, false));
        }
    }

    Err(MappingError::not_found(path))
}

/// Resolve an engine B linear artifact next to `path`.
///
/// Prefers `base_flirt<N>.mat`, then the bare `base.mat`.
pub fn resolve_engine_b_linear(path: &Path) -> Result<PathBuf> {
    let name = file_name(path);
    let base = engine_b_suffix().replace(&name, "").into_owned();
    let directory = parent_dir(path);

    let suffixed = Regex::new(&format!(r"^{}_flirt\d*\.mat$", regex::escape(&base)))
        .map_err(|e| MappingError::format(format!("bad artifact name {}: {}", name, e)))?;
    if let Some(found) = greatest_match(&directory, &suffixed)? {
        tracing::debug!("Engine B artifact {} matches {}", found.display(), name);
        return Ok(found);
    }

    let bare = directory.join(format!("{}.mat", base));
    if bare.is_file() {
        return Ok(bare);
    }
    Err(MappingError::not_found(path))
}

/// Lexicographically greatest file name in `directory` matching `pattern`.
fn greatest_match(directory: &Path, pattern: &Regex) -> Result<Option<PathBuf>> {
    if !directory.is_dir() {
        return Ok(None);
    }
    let mut best: Option<String> = None;
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if pattern.is_match(&name) && best.as_ref().map_or(true, |b| name > *b) {
            best = Some(name);
        }
    }
    Ok(best.map(|name| directory.join(name)))
}

/// `*_spm.mat` container for an SPM affine.
fn spm_container(path: &Path) -> PathBuf {
    let name = file_name(path);
    if name.to_lowercase().ends_with("_spm.mat") {
        return path.to_path_buf();
    }
    let stem = &name[..name.len() - ".mat".len()];
    path.with_file_name(format!("{}_spm.mat", stem))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LayoutEngineDetector;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    fn classify(path: &Path, hint: Option<&str>) -> Result<ResolvedTransform> {
        let config = MapperConfig::default();
        let detector = LayoutEngineDetector::new(config.layout.clone());
        TransformClassifier::new(&config, &detector).classify(&path.into(), hint, None)
    }

    #[test]
    fn test_array_rules() {
        let affine = DMatrix::<f64>::identity(4, 4);
        assert_eq!(
            classify_array(&affine).unwrap(),
            ResolvedTransform::Affine(Affine4::identity())
        );

        let row = DMatrix::from_row_slice(1, 7, &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 2.0]);
        assert_eq!(classify_array(&row).unwrap().method(), TransformMethod::Coreg);

        let col = DMatrix::from_column_slice(12, 1, &[0.0; 12]);
        assert_eq!(classify_array(&col).unwrap().method(), TransformMethod::Coreg);

        for bad in [DMatrix::<f64>::zeros(3, 3), DMatrix::zeros(1, 5), DMatrix::zeros(2, 6)] {
            assert!(matches!(classify_array(&bad), Err(MappingError::Format(_))));
        }
    }

    #[test]
    fn test_legacy_wins_over_hint() {
        let resolved = classify(Path::new("/data/sub01_sn.mat"), Some("affine")).unwrap();
        assert_eq!(resolved.method(), TransformMethod::LegacyDct);
    }

    #[test]
    fn test_mat_without_hint_falls_back() {
        let resolved = classify(Path::new("/data/t1_to_ct.mat"), None).unwrap();
        assert_eq!(
            resolved,
            ResolvedTransform::FallbackJitCoreg {
                artifact: PathBuf::from("/data/t1_to_ct.mat")
            }
        );
        // Blank hints count as absent.
        let resolved = classify(Path::new("/data/t1_to_ct.mat"), Some("  ")).unwrap();
        assert_eq!(resolved.method(), TransformMethod::FallbackJitCoreg);
    }

    #[test]
    fn test_spm_container_name() {
        let resolved = classify(Path::new("/data/run.mat"), Some("SPM")).unwrap();
        assert_eq!(
            resolved,
            ResolvedTransform::SpmAffine {
                path: PathBuf::from("/data/run_spm.mat"),
                field: "M".to_string()
            }
        );
        let resolved = classify(Path::new("/data/run_spm.mat"), Some("spm")).unwrap();
        assert!(matches!(
            &resolved,
            ResolvedTransform::SpmAffine { path, .. } if path.ends_with("run_spm.mat")
        ));
    }

    #[test]
    fn test_unknown_mat_hint() {
        let err = classify(Path::new("/data/a.mat"), Some("fnirt")).unwrap_err();
        match err {
            MappingError::UnsupportedMethod { method, path } => {
                assert_eq!(method, "fnirt");
                assert_eq!(path, PathBuf::from("/data/a.mat"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_engine_a_tie_picks_greatest_name() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "A2B_ants1.mat");
        touch(dir.path(), "A2B_ants2.mat");
        touch(dir.path(), "A2B_ants10.mat");
        touch(dir.path(), "A2BB_ants3.mat");

        let (artifact, use_inverse) =
            resolve_engine_a_linear(&dir.path().join("A2B_ants.mat")).unwrap();
        assert_eq!(artifact, dir.path().join("A2B_ants2.mat"));
        assert!(use_inverse);
    }

    #[test]
    fn test_engine_a_missing_is_not_found() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "C2D_ants1.mat");
        let err = resolve_engine_a_linear(&dir.path().join("A2B.mat")).unwrap_err();
        assert!(matches!(err, MappingError::NotFound { .. }));
    }

    #[test]
    fn test_engine_a_reverse_split_at_last_two() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "ct2sub02t1_ants.mat");
        let (artifact, use_inverse) =
            resolve_engine_a_linear(&dir.path().join("sub02t12ct.mat")).unwrap();
        assert_eq!(artifact, dir.path().join("ct2sub02t1_ants.mat"));
        assert!(!use_inverse);
    }

    #[test]
    fn test_engine_b_prefers_suffixed() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "ct2t1.mat");
        assert_eq!(
            resolve_engine_b_linear(&dir.path().join("ct2t1.mat")).unwrap(),
            dir.path().join("ct2t1.mat")
        );

        touch(dir.path(), "ct2t1_flirt.mat");
        touch(dir.path(), "ct2t1_flirt2.mat");
        assert_eq!(
            resolve_engine_b_linear(&dir.path().join("ct2t1_flirt.mat")).unwrap(),
            dir.path().join("ct2t1_flirt2.mat")
        );

        let err = resolve_engine_b_linear(&dir.path().join("pet2t1.mat")).unwrap_err();
        assert!(matches!(err, MappingError::NotFound { .. }));
    }

    #[test]
    fn test_pointer_dispatch() {
        let config = MapperConfig::default();
        let layout = &config.layout;
        let dir = tempdir().unwrap();
        touch(dir.path(), &layout.deformation_forward);
        touch(dir.path(), &layout.deformation_inverse);

        let forward = classify(&dir.path().join("forwardTransform"), None).unwrap();
        assert_eq!(
            forward,
            ResolvedTransform::ModernDeformation {
                field: dir.path().join(&layout.deformation_inverse)
            }
        );
        let inverse = classify(&dir.path().join("inverseTransform.txt"), None).unwrap();
        assert_eq!(
            inverse,
            ResolvedTransform::ModernDeformation {
                field: dir.path().join(&layout.deformation_forward)
            }
        );

        touch(dir.path(), &layout.engine_a_composite);
        let forward = classify(&dir.path().join("forwardTransform"), None).unwrap();
        assert_eq!(
            forward,
            ResolvedTransform::EngineANonlinear {
                artifact: dir.path().join(&layout.engine_a_composite),
                use_inverse: true
            }
        );
        let inverse = classify(&dir.path().join("inverseTransform"), None).unwrap();
        assert!(matches!(
            inverse,
            ResolvedTransform::EngineANonlinear { use_inverse: false, .. }
        ));
    }

    #[test]
    fn test_engine_b_pointer_dispatch() {
        let config = MapperConfig::default();
        let layout = &config.layout;
        let dir = tempdir().unwrap();
        touch(dir.path(), "fnirt_warpcoef.nii.gz");
        touch(dir.path(), "fnirt_inverse_warpcoef.nii.gz");

        let forward = classify(&dir.path().join("forwardTransform"), None).unwrap();
        assert_eq!(
            forward,
            ResolvedTransform::EngineBNonlinear {
                warp: dir.path().join("fnirt_warpcoef.nii.gz")
            }
        );
        let inverse = classify(&dir.path().join("inverseTransform"), None).unwrap();
        assert_eq!(
            inverse,
            ResolvedTransform::EngineBNonlinear {
                warp: dir.path().join(&layout.engine_b_inverse_warp)
            }
        );
        assert_eq!(layout.engine_b_inverse_warp, "fnirt_inverse_warpcoef.nii.gz");
    }

    #[test]
    fn test_engine_a_glob_suffix() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "A2B_antsA.mat");
        let (artifact, use_inverse) =
            resolve_engine_a_linear(&dir.path().join("A2B.mat")).unwrap();
        assert_eq!(artifact, dir.path().join("A2B_antsA.mat"));
        assert!(use_inverse);
    }

    #[test]
    fn test_field_files_need_hint() {
        for name in ["warp.nii", "warp.nii.gz", "composite.h5"] {
            let err = classify(&Path::new("/data").join(name), None).unwrap_err();
            assert!(matches!(err, MappingError::MissingMethod { .. }), "{}", name);
        }
        let resolved = classify(Path::new("/data/warp.nii.gz"), Some("fnirt")).unwrap();
        assert_eq!(resolved.method(), TransformMethod::EngineBNonlinear);
        let resolved = classify(Path::new("/data/composite.h5"), Some("ANTS")).unwrap();
        assert_eq!(
            resolved,
            ResolvedTransform::EngineANonlinear {
                artifact: PathBuf::from("/data/composite.h5"),
                use_inverse: true
            }
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let err = classify(Path::new("/data/points.txt"), Some("affine")).unwrap_err();
        assert!(matches!(err, MappingError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("points.txt"));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "B2A_ants1.mat");
        touch(dir.path(), "B2A_ants3.mat");
        let path = dir.path().join("A2B.mat");
        let first = classify(&path, Some("ants")).unwrap();
        for _ in 0..20 {
            assert_eq!(classify(&path, Some("ants")).unwrap(), first);
        }
    }
}
