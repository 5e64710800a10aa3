//! Compiled volume: the query surface handed to traversal and shading.
//!
//! A `CompiledVolume` captures the parameters resolved by one commit and
//! shares the volume's brick store. Positions are in grid coordinates:
//! voxel `(i, j, k)` sits at `(i, j, k)`.

use std::fmt;
use std::sync::Arc;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result, Vec2, Vec3, Vec4};
use crate::math::aabb::Aabb;
use crate::transfer::TransferMap;
use crate::volume::store::BrickStore;
use crate::volume::voxel_type::VoxelType;
use crate::volume::VOLUME_TYPE;

/// Backend state built by a volume commit.
pub struct CompiledVolume {
    pub(crate) voxel_type: VoxelType,
    pub(crate) dimensions: IVec3,
    pub(crate) sampling_rate: f32,
    pub(crate) sampling_step: f32,
    pub(crate) gamma_correction: Vec2,
    pub(crate) transfer: Arc<dyn TransferMap>,
    pub(crate) store: Arc<BrickStore>,
}

impl CompiledVolume {
    pub fn voxel_type(&self) -> VoxelType {
        self.voxel_type
    }

    pub fn dimensions(&self) -> IVec3 {
        self.dimensions
    }

    /// Grid-space bounds of the sample positions.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_dimensions(self.dimensions)
    }

    pub fn sampling_rate(&self) -> f32 {
        self.sampling_rate
    }

    /// Ray-marching increment: `1 / (max(dimensions) * samplingRate)`.
    pub fn sampling_step(&self) -> f32 {
        self.sampling_step
    }

    /// `(coefficient, exponent)` applied to transfer-function colours.
    pub fn gamma_correction(&self) -> Vec2 {
        self.gamma_correction
    }

    pub fn transfer_function(&self) -> &Arc<dyn TransferMap> {
        &self.transfer
    }

    pub fn store(&self) -> &Arc<BrickStore> {
        &self.store
    }

    /// Stored value at a grid coordinate.
    pub fn value(&self, p: IVec3) -> Result<f32> {
        self.store.voxel(p).ok_or(Error::Range {
            object: VOLUME_TYPE,
            origin: p,
            count: IVec3::ONE,
            dimensions: self.dimensions,
        })
    }

    /// Trilinearly interpolated value at a continuous position, clamped to
    /// the grid.
    pub fn sample(&self, position: Vec3) -> f32 {
        let p = self.bounds().clamp(position);
        let base = p.floor().as_ivec3();
        let upper = (base + IVec3::ONE).min(self.dimensions - IVec3::ONE);
        let t = p - base.as_vec3();

        let at = |x: i32, y: i32, z: i32| self.store.voxel(IVec3::new(x, y, z)).unwrap_or(0.0);
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

        let c00 = lerp(at(base.x, base.y, base.z), at(upper.x, base.y, base.z), t.x);
        let c10 = lerp(at(base.x, upper.y, base.z), at(upper.x, upper.y, base.z), t.x);
        let c01 = lerp(at(base.x, base.y, upper.z), at(upper.x, base.y, upper.z), t.x);
        let c11 = lerp(at(base.x, upper.y, upper.z), at(upper.x, upper.y, upper.z), t.x);
        lerp(lerp(c00, c10, t.y), lerp(c01, c11, t.y), t.z)
    }

    /// Colour and opacity for a field value, with gamma correction applied
    /// to the colour: `gamma.x * color ^ gamma.y`.
    pub fn classify(&self, value: f32) -> Vec4 {
        let color = self.transfer.color(value);
        let corrected = self.gamma_correction.x * color.powf(self.gamma_correction.y);
        corrected.extend(self.transfer.opacity(value))
    }

    /// Classified colour of the voxel at a grid coordinate.
    pub fn color_at(&self, p: IVec3) -> Result<Vec4> {
        Ok(self.classify(self.value(p)?))
    }

    /// Classified colour at a continuous position.
    pub fn sample_color(&self, position: Vec3) -> Vec4 {
        self.classify(self.sample(position))
    }
}

impl fmt::Debug for CompiledVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledVolume")
            .field("voxel_type", &self.voxel_type)
            .field("dimensions", &self.dimensions)
            .field("sampling_step", &self.sampling_step)
            .field("gamma_correction", &self.gamma_correction)
            .field("transfer", &self.transfer)
            .finish()
    }
}
