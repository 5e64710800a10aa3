//! Brick-blocked volume, registered as `"block_bricked_volume"`.
//!
//! Parameters:
//! - `voxelType` (string, required): one of the [`VoxelType`] names
//! - `dimensions` (vec3i, required): grid size, strictly positive on every axis
//! - `transferFunction` (object, required): a committed transfer function
//! - `gammaCorrection` (vec2f, default (1, 1)): `(coefficient, exponent)`
//! - `samplingRate` (float, default 1): samples per voxel along a ray
//! - `brickAllocation` (string, default `"eager"`): `"eager"` or `"sparse"`

use std::sync::Arc;

use crate::core::error::{ConfigError, Error};
use crate::core::types::{IVec3, Result, Vec2};
use crate::object::managed::ManagedObject;
use crate::object::param::{ParamKind, ParamStore};
use crate::volume::compiled::CompiledVolume;
use crate::volume::layout::BrickLayout;
use crate::volume::store::{BrickAllocation, BrickStore};
use crate::volume::voxel_type::VoxelType;
use crate::volume::{Volume, VOLUME_TYPE};

/// Registered type name.
pub const TYPE_NAME: &str = "block_bricked_volume";

/// Storage parameters resolved from the parameter store.
#[derive(Clone, Copy, Debug, PartialEq)]
struct StorageParams {
    voxel_type: VoxelType,
    dimensions: IVec3,
    allocation: BrickAllocation,
}

impl StorageParams {
    fn resolve(params: &ParamStore) -> Result<Self> {
        let fail = |kind: ConfigError| Error::config(VOLUME_TYPE, kind);

        for (name, kinds) in [
            ("voxelType", &[ParamKind::String][..]),
            ("dimensions", &[ParamKind::Vec3i][..]),
            ("brickAllocation", &[ParamKind::String][..]),
        ] {
            params.check_kind(name, kinds).map_err(fail)?;
        }

        let voxel_type: VoxelType = params.get_string("voxelType", "unspecified").parse().map_err(fail)?;

        let dimensions = params.get_vec3i("dimensions", IVec3::ZERO);
        let addressable = BrickLayout::try_new(dimensions)
            .and_then(|layout| layout.storage_bytes(voxel_type.size()))
            .is_some();
        if !addressable {
            return Err(fail(ConfigError::InvalidDimensions(dimensions)));
        }

        let allocation: BrickAllocation = params.get_string("brickAllocation", "eager").parse().map_err(fail)?;

        Ok(Self {
            voxel_type,
            dimensions,
            allocation,
        })
    }

    fn allocate(&self) -> Arc<BrickStore> {
        Arc::new(BrickStore::new(self.dimensions, self.voxel_type, self.allocation))
    }
}

/// Volume whose voxels live in an 8x8x8 brick-blocked [`BrickStore`].
pub struct BlockBrickedVolume {
    object: ManagedObject<CompiledVolume>,
    store: Option<Arc<BrickStore>>,
}

impl BlockBrickedVolume {
    pub fn new() -> Self {
        Self {
            object: ManagedObject::new(VOLUME_TYPE),
            store: None,
        }
    }

    /// Reuse the current store when it fits, otherwise allocate a fresh one.
    fn ensure_store(store: &mut Option<Arc<BrickStore>>, storage: &StorageParams) -> Arc<BrickStore> {
        if let Some(existing) = store.as_ref() {
            if existing.matches(storage.dimensions, storage.voxel_type, storage.allocation) {
                return existing.clone();
            }
            log::debug!(
                "Reallocating brick store: {} {} -> {} {}",
                existing.voxel_type(),
                existing.dimensions(),
                storage.voxel_type,
                storage.dimensions
            );
        }
        let fresh = storage.allocate();
        *store = Some(fresh.clone());
        fresh
    }
}

impl Default for BlockBrickedVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl Volume for BlockBrickedVolume {
    fn object(&self) -> &ManagedObject<CompiledVolume> {
        &self.object
    }

    fn object_mut(&mut self) -> &mut ManagedObject<CompiledVolume> {
        &mut self.object
    }

    fn commit(&mut self) -> Result<()> {
        let id = self.object.id();
        let store_slot = &mut self.store;

        self.object.commit_with(|params| {
            let fail = |kind: ConfigError| Error::config(VOLUME_TYPE, kind);

            for (name, kinds) in [
                ("transferFunction", &[ParamKind::Object][..]),
                ("gammaCorrection", &[ParamKind::Vec2f][..]),
                ("samplingRate", &[ParamKind::Float, ParamKind::Int][..]),
            ] {
                params.check_kind(name, kinds).map_err(fail)?;
            }

            let storage = StorageParams::resolve(params)?;

            let tf = params
                .get_object("transferFunction")
                .ok_or(fail(ConfigError::MissingTransferFunction))?;
            let tf = tf.as_transfer_function().ok_or_else(|| {
                fail(ConfigError::InvalidParameter {
                    name: "transferFunction",
                    // The reference may be this volume, which is write-locked by the caller.
                    reason: format!("expected a transfer function, got a {}", tf.kind_name()),
                })
            })?;
            let transfer = tf.read().compiled()?;

            let gamma_correction = params.get_vec2f("gammaCorrection", Vec2::ONE);

            let sampling_rate = params.get_f32("samplingRate", 1.0);
            if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
                return Err(fail(ConfigError::InvalidParameter {
                    name: "samplingRate",
                    reason: format!("expected a positive value, got {}", sampling_rate),
                }));
            }
            let sampling_step = 1.0 / (storage.dimensions.max_element() as f32 * sampling_rate);
            if !sampling_step.is_normal() {
                return Err(fail(ConfigError::InvalidParameter {
                    name: "samplingRate",
                    reason: format!("rate {} gives a degenerate sampling step {}", sampling_rate, sampling_step),
                }));
            }

            // Validation is complete; only now touch backend memory.
            let store = Self::ensure_store(store_slot, &storage);

            log::info!(
                "block_bricked_volume {}: {} {}x{}x{}, step {:.5}, gamma ({}, {}), {} bricks ({})",
                id,
                storage.voxel_type,
                storage.dimensions.x,
                storage.dimensions.y,
                storage.dimensions.z,
                sampling_step,
                gamma_correction.x,
                gamma_correction.y,
                store.brick_count(),
                storage.allocation.name()
            );

            Ok(Arc::new(CompiledVolume {
                voxel_type: storage.voxel_type,
                dimensions: storage.dimensions,
                sampling_rate,
                sampling_step,
                gamma_correction,
                transfer,
                store,
            }))
        })?;
        Ok(())
    }

    fn set_region(&mut self, source: &[u8], origin: IVec3, count: IVec3) -> Result<()> {
        let store = match &self.store {
            Some(store) => store.clone(),
            None => {
                let storage = StorageParams::resolve(self.object.params())?;
                Self::ensure_store(&mut self.store, &storage)
            }
        };
        let result = store.write_region(source, origin, count);
        if let Err(err @ (Error::Range { .. } | Error::SourceSize { .. })) = &result {
            self.object.warn_on_condition(true, &err.to_string());
        }
        result
    }

    fn store(&self) -> Option<Arc<BrickStore>> {
        self.store.clone()
    }
}
