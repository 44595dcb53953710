//! Coordinate mapping entry point.

use std::path::Path;

use burn::tensor::backend::Backend;
use coordmap_core::spatial::Affine4;
use coordmap_core::transform::{
    apply_affine, solve_affine, AffineTransform, CoregParameters, DctWarp, DeformationField3D,
    LegacyNormalization,
};
use coordmap_core::{MappingError, PointSet, Result, SpaceImage};
use coordmap_io::{ArtifactReader, FsArtifactReader};

use crate::adapter::{self, LookupTarget};
use crate::classifier::{ResolvedTransform, TransformClassifier, TransformInput};
use crate::config::MapperConfig;
use crate::engine::{
    EngineA, EngineB, EngineDetector, LayoutEngineDetector, RigidRegistrar, UnavailableEngine,
};
use crate::fallback;

/// Result of a mapping call.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedPoints {
    /// Destination world coordinates, 4×N.
    pub world: PointSet,
    /// Destination voxel coordinates, 4×N, when a destination space was
    /// given or the artifact carries its own voxel grid.
    pub voxel: Option<PointSet>,
}

/// Arguments of one mapping call.
#[derive(Debug, Clone)]
pub struct MapRequest<'a> {
    points: &'a PointSet,
    source: &'a SpaceImage,
    transform: Option<TransformInput>,
    dest: Option<&'a SpaceImage>,
    method: Option<String>,
    use_inverse: Option<bool>,
}

impl<'a> MapRequest<'a> {
    /// Map `points`, given in `source` voxel coordinates.
    pub fn new(points: &'a PointSet, source: &'a SpaceImage) -> Self {
        Self {
            points,
            source,
            transform: None,
            dest: None,
            method: None,
            use_inverse: None,
        }
    }

    pub fn transform(mut self, transform: impl Into<TransformInput>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    pub fn dest(mut self, dest: &'a SpaceImage) -> Self {
        self.dest = Some(dest);
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn use_inverse(mut self, use_inverse: bool) -> Self {
        self.use_inverse = Some(use_inverse);
        self
    }
}

/// Maps voxel coordinates through registration transforms.
///
/// Collaborators default to the filesystem artifact reader, the layout
/// engine detector and [`UnavailableEngine`] for every external engine.
pub struct CoordinateMapper<B: Backend> {
    config: MapperConfig,
    reader: Box<dyn ArtifactReader>,
    detector: Option<Box<dyn EngineDetector>>,
    engine_a: Box<dyn EngineA>,
    engine_b: Box<dyn EngineB>,
    registrar: Box<dyn RigidRegistrar>,
    device: B::Device,
}

impl<B: Backend> CoordinateMapper<B> {
    pub fn new(device: B::Device) -> Self {
        Self {
            config: MapperConfig::default(),
            reader: Box::new(FsArtifactReader::new()),
            detector: None,
            engine_a: Box::new(UnavailableEngine),
            engine_b: Box::new(UnavailableEngine),
            registrar: Box::new(UnavailableEngine),
            device,
        }
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reader(mut self, reader: impl ArtifactReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Replace the layout-based engine detector.
    pub fn with_engine_detector(mut self, detector: impl EngineDetector + 'static) -> Self {
        self.detector = Some(Box::new(detector));
        self
    }

    pub fn with_engine_a(mut self, engine: impl EngineA + 'static) -> Self {
        self.engine_a = Box::new(engine);
        self
    }

    pub fn with_engine_b(mut self, engine: impl EngineB + 'static) -> Self {
        self.engine_b = Box::new(engine);
        self
    }

    pub fn with_registrar(mut self, registrar: impl RigidRegistrar + 'static) -> Self {
        self.registrar = Box::new(registrar);
        self
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Classify a transform without running it.
    pub fn classify(
        &self,
        transform: &TransformInput,
        method: Option<&str>,
        use_inverse: Option<bool>,
    ) -> Result<ResolvedTransform> {
        match &self.detector {
            Some(detector) => TransformClassifier::new(&self.config, detector.as_ref())
                .classify(transform, method, use_inverse),
            None => {
                let detector = LayoutEngineDetector::new(self.config.layout.clone());
                TransformClassifier::new(&self.config, &detector)
                    .classify(transform, method, use_inverse)
            }
        }
    }

    /// Map source voxel coordinates to destination world coordinates.
    ///
    /// # Arguments
    /// * `points` - 3×N or 4×N one-based voxel coordinates in `source`
    /// * `source` - Space the points are given in
    /// * `transform` - Optional transform; without one the source affine is applied
    /// * `dest` - Optional destination space; requests destination voxels
    /// * `method` - Optional method hint
    /// * `use_inverse` - Engine A inverse flag for hinted non-linear artifacts
    pub fn map_coords(
        &self,
        points: &PointSet,
        source: &SpaceImage,
        transform: Option<&TransformInput>,
        dest: Option<&SpaceImage>,
        method: Option<&str>,
        use_inverse: Option<bool>,
    ) -> Result<MappedPoints> {
        let (world, artifact_voxel) = match transform {
            None => (source.voxel_to_world(points)?, None),
            Some(transform) => {
                let resolved = self.classify(transform, method, use_inverse)?;
                self.run(&resolved, points, source, dest)?
            }
        };

        let voxel = match dest {
            Some(dest) => Some(dest.world_to_voxel(&world)?),
            None => artifact_voxel,
        };
        Ok(MappedPoints { world, voxel })
    }

    /// Run a [`MapRequest`].
    pub fn map(&self, request: &MapRequest<'_>) -> Result<MappedPoints> {
        self.map_coords(
            request.points,
            request.source,
            request.transform.as_ref(),
            request.dest,
            request.method.as_deref(),
            request.use_inverse,
        )
    }

    fn run(
        &self,
        resolved: &ResolvedTransform,
        points: &PointSet,
        source: &SpaceImage,
        dest: Option<&SpaceImage>,
    ) -> Result<(PointSet, Option<PointSet>)> {
        tracing::debug!("Mapping {} points with {}", points.len(), resolved.method());

        let points_mm = || source.voxel_to_world(points);
        let world = match resolved {
            ResolvedTransform::LegacyDct { artifact } => {
                let record = self.reader.read_legacy_warp(artifact)?;
                let (values, shape) = record.coefficients_row_major()?;
                let warp =
                    DctWarp::<B>::from_values(values, shape, record.template_dims, &self.device)?;
                let legacy =
                    LegacyNormalization::new(warp, record.warp_affine(), record.dest_affine());
                let mapped = legacy.map_points(points)?;
                return Ok((mapped.world, Some(mapped.voxel)));
            }
            ResolvedTransform::ModernDeformation { field } => {
                let volume = self.reader.read_deformation_field(field)?;
                let sampler =
                    DeformationField3D::<B>::from_values(volume.values, volume.dims, &self.device)?;
                // Field grid voxels of the source points
                let field_vx = solve_affine(&volume.affine, &points_mm()?)?;
                sampler.map_points(&field_vx)?
            }
            ResolvedTransform::Affine(matrix) => apply_affine(matrix, &points_mm()?)?,
            ResolvedTransform::AffineFile(path) => {
                let matrix = Affine4::from_dmatrix(&self.reader.read_matrix(path)?)?;
                apply_affine(&matrix, &points_mm()?)?
            }
            ResolvedTransform::Coreg(params) => {
                AffineTransform::from_coreg(params)?.map_points(&points_mm()?)?
            }
            ResolvedTransform::CoregFile(path) => {
                let params = CoregParameters::from_dmatrix(&self.reader.read_matrix(path)?)?;
                AffineTransform::from_coreg(&params)?.map_points(&points_mm()?)?
            }
            ResolvedTransform::SpmAffine { path, field } => {
                let matrix =
                    Affine4::from_dmatrix(&self.reader.read_named_matrix(path, field)?)?;
                solve_affine(&matrix, &points_mm()?)?
            }
            ResolvedTransform::EngineALinear {
                artifact,
                use_inverse,
            } => adapter::engine_a_linear(
                self.engine_a.as_ref(),
                &points_mm()?,
                artifact,
                *use_inverse,
            )?,
            ResolvedTransform::EngineANonlinear {
                artifact,
                use_inverse,
            } => adapter::engine_a_nonlinear(
                self.engine_a.as_ref(),
                &points_mm()?,
                Some(artifact),
                *use_inverse,
            )?,
            ResolvedTransform::EngineBLinear { artifact } => {
                let target = self.lookup_target(source, dest, artifact)?;
                adapter::engine_b_linear(self.engine_b.as_ref(), &points_mm()?, target)?
            }
            ResolvedTransform::EngineBNonlinear { warp } => {
                let target = self.lookup_target(source, dest, warp)?;
                adapter::engine_b_nonlinear(self.engine_b.as_ref(), &points_mm()?, target)?
            }
            ResolvedTransform::FallbackJitCoreg { artifact } => {
                let dest = dest.ok_or_else(|| {
                    MappingError::missing_space(format!(
                        "fallback registration for {} needs a destination space",
                        artifact.display()
                    ))
                })?;
                let cache = fallback::cache_path(
                    artifact,
                    source,
                    dest,
                    &self.config.fallback_cache_suffix,
                )?;
                let params =
                    fallback::load_or_compute(self.registrar.as_ref(), &cache, source, dest)?;
                AffineTransform::from_coreg(&params)?.map_points(&points_mm()?)?
            }
        };
        Ok((world, None))
    }

    fn lookup_target<'s>(
        &self,
        source: &'s SpaceImage,
        dest: Option<&'s SpaceImage>,
        artifact: &'s Path,
    ) -> Result<LookupTarget<'s>> {
        let dest = dest.ok_or_else(|| {
            MappingError::missing_space(format!(
                "engine B lookup through {} needs a destination space",
                artifact.display()
            ))
        })?;
        Ok(LookupTarget {
            source: source.require_path("source")?,
            dest: dest.require_path("destination")?,
            artifact,
            mode: self.config.lookup_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f64>;

    fn mapper() -> CoordinateMapper<TestBackend> {
        CoordinateMapper::new(Default::default())
    }

    fn scaled_space() -> SpaceImage {
        SpaceImage::new(Affine4::from_scale_translation([2.0, 2.0, 2.0], [5.0, 5.0, 5.0]))
    }

    #[test]
    fn test_no_transform_applies_source_affine() {
        let points = PointSet::from_points(&[[10.0, 20.0, 30.0]]);
        let out = mapper()
            .map_coords(&points, &scaled_space(), None, None, None, None)
            .unwrap();
        assert_eq!(out.world.point(0), [25.0, 45.0, 65.0]);
        assert_eq!(out.world.nrows(), 4);
        assert!(out.voxel.is_none());
    }

    #[test]
    fn test_identity_affine_leaves_world_unchanged() {
        let points = PointSet::from_points(&[[10.0, 20.0, 30.0], [1.0, 1.0, 1.0]]);
        let space = scaled_space();
        let identity = TransformInput::from(Affine4::identity());
        let out = mapper()
            .map_coords(&points, &space, Some(&identity), None, None, None)
            .unwrap();
        assert_eq!(out.world, space.voxel_to_world(&points).unwrap());
    }

    #[test]
    fn test_dest_space_adds_voxels() {
        let points = PointSet::from_points(&[[10.0, 20.0, 30.0]]);
        let space = scaled_space();
        let request = MapRequest::new(&points, &space).dest(&space);
        let out = mapper().map(&request).unwrap();
        let voxel = out.voxel.unwrap();
        for (got, want) in voxel.point(0).iter().zip([10.0, 20.0, 30.0]) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_coreg_vector_is_inverted() {
        let points = PointSet::from_points(&[[10.0, 20.0, 30.0]]);
        let space = SpaceImage::new(Affine4::identity());
        let params = nalgebra::DMatrix::from_row_slice(1, 6, &[5.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let request = MapRequest::new(&points, &space).transform(params);
        let out = mapper().map(&request).unwrap();
        for (got, want) in out.world.point(0).iter().zip([5.0, 20.0, 30.0]) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_fallback_needs_dest() {
        let points = PointSet::from_points(&[[1.0, 1.0, 1.0]]);
        let space = scaled_space();
        let request = MapRequest::new(&points, &space).transform("/data/ct2t1.mat");
        let err = mapper().map(&request).unwrap_err();
        assert!(matches!(err, MappingError::MissingSpace(_)));
    }

    #[test]
    fn test_engine_b_needs_image_files() {
        let points = PointSet::from_points(&[[1.0, 1.0, 1.0]]);
        let space = scaled_space();
        let request = MapRequest::new(&points, &space)
            .transform("/data/warp.nii.gz")
            .method("fnirt")
            .dest(&space);
        let err = mapper().map(&request).unwrap_err();
        assert!(matches!(err, MappingError::MissingSpace(_)));
    }

    #[test]
    fn test_unavailable_engine_propagates() {
        let points = PointSet::from_points(&[[1.0, 1.0, 1.0]]);
        let space = scaled_space();
        let request = MapRequest::new(&points, &space)
            .transform("/data/composite.h5")
            .method("ants");
        let err = mapper().map(&request).unwrap_err();
        assert!(matches!(err, MappingError::EngineCall(_)));
    }
}
