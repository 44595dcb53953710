//! Coordinate mapping through registration transforms.
//!
//! [`CoordinateMapper::map_coords`] carries voxel coordinates from a source
//! space into a destination space. The transform argument is classified
//! once into a [`ResolvedTransform`]; native kernels come from
//! `coordmap-core`, external engines are reached through the traits in
//! [`engine`] and the conventions in [`adapter`].

pub mod adapter;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod fallback;
pub mod mapper;
pub mod method;

pub use classifier::{ResolvedTransform, TransformClassifier, TransformInput};
pub use config::{MapperConfig, NormalizationLayout};
pub use engine::{
    EngineA, EngineB, EngineDetector, EngineTag, LayoutEngineDetector, LookupMode,
    RigidRegistrar, UnavailableEngine,
};
pub use mapper::{CoordinateMapper, MapRequest, MappedPoints};
pub use method::{MethodHint, TransformMethod};
