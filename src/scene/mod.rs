//! Scene descriptions: JSON files naming transfer functions and volumes,
//! their parameters and raw voxel sources.

pub mod description;
pub mod loader;

pub use description::{ParamSpec, SceneDescription, TransferFunctionSpec, VolumeSpec};
pub use loader::{build_scene, load_scene, Scene};
