//! Error types for coordinate mapping.
//!
//! Every variant carries the offending path, method token or shape so that
//! callers can surface the message verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for coordinate mapping operations.
#[derive(Error, Debug)]
pub enum MappingError {
    /// Point array with neither 3 nor 4 rows, or mismatched point counts.
    #[error("Shape error: {0}")]
    Shape(String),

    /// Transform content that cannot be interpreted.
    #[error("Format error: {0}")]
    Format(String),

    /// An expected sibling artifact is missing.
    #[error("Transform artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The transform path matches no known naming convention.
    #[error("Unsupported transform format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// A generic matrix or field file was given without a method hint.
    #[error("Transform method required for {}", path.display())]
    MissingMethod { path: PathBuf },

    /// A method hint that has no meaning for the given artifact.
    #[error("Unsupported transform method '{method}' for {}", path.display())]
    UnsupportedMethod { method: String, path: PathBuf },

    /// Opaque failure reported by an external registration engine.
    #[error("Engine call failed: {0}")]
    EngineCall(String),

    /// Matrix that cannot be inverted or solved against.
    #[error("Singular matrix: {0}")]
    Singular(String),

    /// The selected kernel needs a space image that was not supplied.
    #[error("Missing space image: {0}")]
    MissingSpace(String),

    /// Filesystem failure while probing or reading artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for coordinate mapping operations.
pub type Result<T> = std::result::Result<T, MappingError>;

impl MappingError {
    /// Create a shape error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    /// Create a format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create an engine call error.
    pub fn engine_call(msg: impl Into<String>) -> Self {
        Self::EngineCall(msg.into())
    }

    /// Create a singular matrix error.
    pub fn singular(msg: impl Into<String>) -> Self {
        Self::Singular(msg.into())
    }

    /// Create a missing space error.
    pub fn missing_space(msg: impl Into<String>) -> Self {
        Self::MissingSpace(msg.into())
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn unsupported_format(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedFormat { path: path.into() }
    }

    pub fn missing_method(path: impl Into<PathBuf>) -> Self {
        Self::MissingMethod { path: path.into() }
    }

    pub fn unsupported_method(method: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
            path: path.into(),
        }
    }
}
