//! Transform methods and caller hints.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kernel family selected for a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMethod {
    /// Raw 4×4 world-to-world affine.
    Affine,
    /// Rigid/affine coregistration parameter vector.
    Coreg,
    /// Affine stored as a named field of a `*_spm.mat` container.
    SpmAffine,
    /// Engine A linear artifact.
    EngineALinear,
    /// Engine B linear artifact.
    EngineBLinear,
    /// Legacy DCT normalization (`*_sn.mat`).
    LegacyDct,
    /// Dense deformation field.
    ModernDeformation,
    /// Engine A composite/warp artifact.
    EngineANonlinear,
    /// Engine B warp coefficients.
    EngineBNonlinear,
    /// Rigid registration computed on demand and cached next to the artifact.
    FallbackJitCoreg,
}

impl TransformMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformMethod::Affine => "affine",
            TransformMethod::Coreg => "coreg",
            TransformMethod::SpmAffine => "spm_affine",
            TransformMethod::EngineALinear => "engine_a_linear",
            TransformMethod::EngineBLinear => "engine_b_linear",
            TransformMethod::LegacyDct => "legacy_dct",
            TransformMethod::ModernDeformation => "modern_deformation",
            TransformMethod::EngineANonlinear => "engine_a_nonlinear",
            TransformMethod::EngineBNonlinear => "engine_b_nonlinear",
            TransformMethod::FallbackJitCoreg => "fallback_jit_coreg",
        }
    }

    /// Whether the kernel calls out to an external engine.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            TransformMethod::EngineALinear
                | TransformMethod::EngineBLinear
                | TransformMethod::EngineANonlinear
                | TransformMethod::EngineBNonlinear
        )
    }
}

impl fmt::Display for TransformMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized method hint.
///
/// Hints are case-insensitive and only the last whitespace-separated token
/// is significant, so `"Engine ANTS"` and `"ants"` are the same hint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHint(String);

impl MethodHint {
    /// Normalize a raw hint. Blank hints count as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.split_whitespace()
            .last()
            .map(|token| Self(token.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Method for a generic `.mat` matrix file.
    pub fn linear_method(&self) -> Option<TransformMethod> {
        match self.0.as_str() {
            "affine" => Some(TransformMethod::Affine),
            "coreg" => Some(TransformMethod::Coreg),
            "spm" => Some(TransformMethod::SpmAffine),
            "ants" | "engine-a" => Some(TransformMethod::EngineALinear),
            "fsl" | "flirt" | "engine-b" => Some(TransformMethod::EngineBLinear),
            _ => None,
        }
    }

    /// Method for a generic field file (`.nii`, `.nii.gz`, `.h5`).
    pub fn field_method(&self) -> Option<TransformMethod> {
        match self.0.as_str() {
            "ants" | "engine-a" => Some(TransformMethod::EngineANonlinear),
            "fsl" | "fnirt" | "engine-b" => Some(TransformMethod::EngineBNonlinear),
            "deformation" => Some(TransformMethod::ModernDeformation),
            _ => None,
        }
    }
}

impl fmt::Display for MethodHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
