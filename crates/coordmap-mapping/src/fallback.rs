//! On-demand rigid registration with an on-disk cache.
//!
//! A generic `.mat` path given without a method hint is not read at all.
//! Instead a rigid registration of the source onto the destination space is
//! computed once and stored as `{src}2{dest}_coreg.json` next to the path.
//! The cache is written to a temporary file in the same directory and
//! renamed into place, so concurrent writers race harmlessly.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use coordmap_core::transform::CoregParameters;
use coordmap_core::{MappingError, Result, SpaceImage};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::engine::RigidRegistrar;

/// Cached fallback registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCoreg {
    pub source: String,
    pub dest: String,
    pub params: Vec<f64>,
}

fn space_name(space: &SpaceImage, role: &str) -> Result<String> {
    space.base_name().ok_or_else(|| {
        MappingError::missing_space(format!(
            "fallback registration needs a {} image file",
            role
        ))
    })
}

/// Cache file for a fallback registration of `source` onto `dest`.
pub fn cache_path(
    artifact: &Path,
    source: &SpaceImage,
    dest: &SpaceImage,
    suffix: &str,
) -> Result<PathBuf> {
    let name = format!(
        "{}2{}{}",
        space_name(source, "source")?,
        space_name(dest, "destination")?,
        suffix
    );
    Ok(artifact.with_file_name(name))
}

/// Load a cached registration, or compute and cache a fresh one.
pub fn load_or_compute(
    registrar: &dyn RigidRegistrar,
    cache: &Path,
    source: &SpaceImage,
    dest: &SpaceImage,
) -> Result<CoregParameters> {
    if cache.is_file() {
        let cached: CachedCoreg = serde_json::from_str(&fs::read_to_string(cache)?)
            .map_err(|e| {
                MappingError::format(format!(
                    "invalid cached registration {}: {}",
                    cache.display(),
                    e
                ))
            })?;
        tracing::debug!("Reusing fallback registration {}", cache.display());
        return CoregParameters::from_slice(&cached.params);
    }

    tracing::info!(
        "No method given, computing rigid registration of {} onto {}",
        source
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        dest.path()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    );
    let params = registrar.compute_rigid(dest, source)?;
    let coreg = CoregParameters::from_slice(&params)?;

    let cached = CachedCoreg {
        source: space_name(source, "source")?,
        dest: space_name(dest, "destination")?,
        params,
    };
    write_atomic(cache, &cached)?;
    tracing::info!("Cached fallback registration at {}", cache.display());
    Ok(coreg)
}

fn write_atomic(path: &Path, cached: &CachedCoreg) -> Result<()> {
    let directory = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(directory)?;
    let json = serde_json::to_string_pretty(cached)
        .map_err(|e| MappingError::format(format!("failed to encode registration: {}", e)))?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| MappingError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordmap_core::Affine4;
    use std::cell::Cell;
    use tempfile::tempdir;

    struct CountingRegistrar {
        calls: Cell<usize>,
    }

    impl RigidRegistrar for CountingRegistrar {
        fn compute_rigid(&self, _: &SpaceImage, _: &SpaceImage) -> Result<Vec<f64>> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![5.0, 0.0, 0.0, 0.0, 0.0, 0.0])
        }
    }

    fn space(dir: &Path, name: &str) -> SpaceImage {
        SpaceImage::new(Affine4::identity()).with_path(dir.join(name))
    }

    #[test]
    fn test_cache_name() {
        let dir = tempdir().unwrap();
        let path = cache_path(
            &dir.path().join("any.mat"),
            &space(dir.path(), "ct.nii.gz"),
            &space(dir.path(), "t1.nii"),
            "_coreg.json",
        )
        .unwrap();
        assert_eq!(path, dir.path().join("ct2t1_coreg.json"));
    }

    #[test]
    fn test_unnamed_space_is_missing_space() {
        let dir = tempdir().unwrap();
        let err = cache_path(
            &dir.path().join("any.mat"),
            &SpaceImage::new(Affine4::identity()),
            &space(dir.path(), "t1.nii"),
            "_coreg.json",
        )
        .unwrap_err();
        assert!(matches!(err, MappingError::MissingSpace(_)));
    }

    #[test]
    fn test_cache_is_reused() {
        let dir = tempdir().unwrap();
        let registrar = CountingRegistrar { calls: Cell::new(0) };
        let source = space(dir.path(), "ct.nii");
        let dest = space(dir.path(), "t1.nii");
        let cache = dir.path().join("ct2t1_coreg.json");

        let first = load_or_compute(&registrar, &cache, &source, &dest).unwrap();
        assert!(cache.is_file());
        let second = load_or_compute(&registrar, &cache, &source, &dest).unwrap();

        assert_eq!(registrar.calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(first.as_slice()[0], 5.0);
    }

    #[test]
    fn test_corrupt_cache_is_format_error() {
        let dir = tempdir().unwrap();
        let registrar = CountingRegistrar { calls: Cell::new(0) };
        let cache = dir.path().join("ct2t1_coreg.json");
        fs::write(&cache, "not json").unwrap();

        let err = load_or_compute(
            &registrar,
            &cache,
            &space(dir.path(), "ct.nii"),
            &space(dir.path(), "t1.nii"),
        )
        .unwrap_err();
        assert!(matches!(err, MappingError::Format(_)));
        assert_eq!(registrar.calls.get(), 0);
    }
}
