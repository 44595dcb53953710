//! Mapper configuration.

use serde::{Deserialize, Serialize};

use crate::engine::LookupMode;

/// File names of a normalization output directory.
///
/// A normalization run leaves a pair of pointer files next to the engine's
/// own artifacts; the pointer name selects the direction and the directory
/// contents select the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationLayout {
    /// Pointer naming the native-to-template direction.
    pub forward_pointer: String,
    /// Pointer naming the template-to-native direction.
    pub inverse_pointer: String,
    /// Engine A composite transform, used for both directions.
    pub engine_a_composite: String,
    /// Engine B native-to-template warp.
    pub engine_b_forward_warp: String,
    /// Engine B template-to-native warp.
    pub engine_b_inverse_warp: String,
    /// Deformation field defined on the template grid.
    pub deformation_forward: String,
    /// Deformation field defined on the native grid.
    pub deformation_inverse: String,
}

impl Default for NormalizationLayout {
    fn default() -> Self {
        Self {
            forward_pointer: "forwardTransform".to_string(),
            inverse_pointer: "inverseTransform".to_string(),
            engine_a_composite: "ants_Composite.h5".to_string(),
            engine_b_forward_warp: "fnirt_warpcoef.nii.gz".to_string(),
            engine_b_inverse_warp: "fnirt_inverse_warpcoef.nii.gz".to_string(),
            deformation_forward: "y_normalization.nii".to_string(),
            deformation_inverse: "iy_normalization.nii".to_string(),
        }
    }
}

impl NormalizationLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pointer file names.
    pub fn with_pointers(mut self, forward: impl Into<String>, inverse: impl Into<String>) -> Self {
        self.forward_pointer = forward.into();
        self.inverse_pointer = inverse.into();
        self
    }

    /// Set the engine A composite file name.
    pub fn with_engine_a_composite(mut self, name: impl Into<String>) -> Self {
        self.engine_a_composite = name.into();
        self
    }

    /// Set the engine B warp file names.
    pub fn with_engine_b_warps(
        mut self,
        forward: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        self.engine_b_forward_warp = forward.into();
        self.engine_b_inverse_warp = inverse.into();
        self
    }

    /// Set the deformation field file names.
    pub fn with_deformation_fields(
        mut self,
        forward: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        self.deformation_forward = forward.into();
        self.deformation_inverse = inverse.into();
        self
    }
}

/// Mapper configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Normalization directory layout.
    pub layout: NormalizationLayout,
    /// Variable holding the affine in `*_spm.mat` containers.
    pub spm_affine_field: String,
    /// Engine A inverse flag for manually hinted non-linear artifacts.
    pub default_use_inverse: bool,
    /// Suffix of cached fallback registrations, after `{src}2{dest}`.
    pub fallback_cache_suffix: String,
    /// Coordinate mode for engine B lookups.
    pub lookup_mode: LookupMode,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            layout: NormalizationLayout::default(),
            spm_affine_field: "M".to_string(),
            default_use_inverse: true,
            fallback_cache_suffix: "_coreg.json".to_string(),
            lookup_mode: LookupMode::Millimetre,
        }
    }
}

impl MapperConfig {
    /// Create a new mapper config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the normalization layout.
    pub fn with_layout(mut self, layout: NormalizationLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the SPM affine variable name.
    pub fn with_spm_affine_field(mut self, field: impl Into<String>) -> Self {
        self.spm_affine_field = field.into();
        self
    }

    /// Set the default engine A inverse flag.
    pub fn with_default_use_inverse(mut self, use_inverse: bool) -> Self {
        self.default_use_inverse = use_inverse;
        self
    }

    /// Set the fallback cache suffix.
    pub fn with_fallback_cache_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.fallback_cache_suffix = suffix.into();
        self
    }

    /// Set the engine B lookup mode.
    pub fn with_lookup_mode(mut self, mode: LookupMode) -> Self {
        self.lookup_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MapperConfig::new();
        assert_eq!(config.spm_affine_field, "M");
        assert!(config.default_use_inverse);
        assert_eq!(config.layout.forward_pointer, "forwardTransform");
        assert_eq!(config.lookup_mode, LookupMode::Millimetre);
    }

    #[test]
    fn test_builder_overrides() {
        let config = MapperConfig::new()
            .with_layout(NormalizationLayout::new().with_engine_a_composite("warp.h5"))
            .with_default_use_inverse(false)
            .with_fallback_cache_suffix("_rigid.json");
        assert_eq!(config.layout.engine_a_composite, "warp.h5");
        assert!(!config.default_use_inverse);
        assert_eq!(config.fallback_cache_suffix, "_rigid.json");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "layout": {
                "forward_pointer": "fwd",
                "inverse_pointer": "inv",
                "engine_a_composite": "a.h5",
                "engine_b_forward_warp": "b_fwd.nii.gz",
                "engine_b_inverse_warp": "b_inv.nii.gz",
                "deformation_forward": "y.nii",
                "deformation_inverse": "iy.nii"
            },
            "spm_affine_field": "Affine",
            "default_use_inverse": true,
            "fallback_cache_suffix": "_coreg.json",
            "lookup_mode": "voxel"
        }"#;
        let config: MapperConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.layout.inverse_pointer, "inv");
        assert_eq!(config.lookup_mode, LookupMode::Voxel);
    }
}
