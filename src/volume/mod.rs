//! Volumes: brick-blocked scalar fields mapped through a transfer function.
//!
//! A volume is configured through parameters, receives voxel data through
//! [`Volume::set_region`] (before or after commit), and on commit compiles a
//! [`CompiledVolume`] that traversal code samples.

pub mod block_bricked;
pub mod compiled;
pub mod layout;
pub mod store;
pub mod voxel_type;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::types::{IVec3, Result};
use crate::object::managed::{ManagedObject, ObjectId};
use crate::object::param::ParamValue;
use crate::object::registry::Registry;

pub use block_bricked::BlockBrickedVolume;
pub use compiled::CompiledVolume;
pub use layout::{BrickLayout, BRICK_VOXELS, BRICK_WIDTH};
pub use store::{BrickAllocation, BrickStore};
pub use voxel_type::{voxel_type_size, VoxelType};

/// Entity type string used in volume diagnostics.
pub const VOLUME_TYPE: &str = "rkvol::Volume";

/// Lifecycle state of a volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeState {
    /// Freshly created: no parameters, no data.
    Uninitialized,
    /// Parameters or regions set since creation or since the last commit.
    Configured,
    /// Backend compiled from the current parameters and ready for queries.
    Committed,
}

/// A configurable volume entity.
pub trait Volume: Send + Sync {
    fn object(&self) -> &ManagedObject<CompiledVolume>;

    fn object_mut(&mut self) -> &mut ManagedObject<CompiledVolume>;

    /// Validate parameters, allocate (or reuse) storage and compile the query surface.
    fn commit(&mut self) -> Result<()>;

    /// Copy `count` voxels of raw data (x fastest) into the grid at `origin`.
    fn set_region(&mut self, source: &[u8], origin: IVec3, count: IVec3) -> Result<()>;

    /// The backing store, once allocated.
    fn store(&self) -> Option<Arc<BrickStore>>;

    /// Region upload through a shared reference, used when several threads
    /// stream into one volume. `None` means the volume needs exclusive
    /// access and the caller must use [`Volume::set_region`] instead.
    ///
    /// The default writes straight into the allocated store. Kinds that do
    /// more work per upload than a store write override this.
    fn set_region_shared(&self, source: &[u8], origin: IVec3, count: IVec3) -> Option<Result<()>> {
        let store = self.store()?;
        let result = store.write_region(source, origin, count);
        if let Err(err) = &result {
            self.object().warn_on_condition(true, &err.to_string());
        }
        Some(result)
    }

    fn id(&self) -> ObjectId {
        self.object().id()
    }

    fn set_param(&mut self, name: &str, value: ParamValue) {
        self.object_mut().set_param(name, value);
    }

    /// The query surface built by the most recent successful commit.
    fn compiled(&self) -> Result<Arc<CompiledVolume>> {
        self.object().compiled()
    }

    fn state(&self) -> VolumeState {
        let object = self.object();
        if object.is_committed() {
            VolumeState::Committed
        } else if object.params().is_empty() && object.epoch() == 0 && self.store().is_none() {
            VolumeState::Uninitialized
        } else {
            VolumeState::Configured
        }
    }
}

/// Shared handle to a volume.
pub type VolumeRef = Arc<RwLock<dyn Volume>>;

/// Registry of volume kinds.
pub type VolumeRegistry = Registry<dyn Volume>;

/// Create a volume of the given registered type.
pub fn create_instance(registry: &VolumeRegistry, type_name: &str) -> Result<VolumeRef> {
    registry.create(type_name)
}

/// Register a default-constructible kind under `name`.
pub fn register_type<V>(registry: &mut VolumeRegistry, name: &str) -> bool
where
    V: Volume + Default + 'static,
{
    registry.register(name, || Arc::new(RwLock::new(V::default())) as VolumeRef)
}

/// A registry holding the built-in kinds.
pub fn builtin_registry() -> VolumeRegistry {
    let mut registry = Registry::new(VOLUME_TYPE);
    register_type::<BlockBrickedVolume>(&mut registry, block_bricked::TYPE_NAME);
    registry
}
