//! Rkvol - parameter-driven volume objects with brick-blocked voxel storage

pub mod core;
pub mod math;
pub mod object;
pub mod transfer;
pub mod volume;
pub mod device;
pub mod scene;

pub use device::{Device, DeviceConfig};
