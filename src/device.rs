//! Device: the engine context that owns the type registries and the
//! failure policy.
//!
//! All entity creation and commit traffic from applications and the scene
//! loader goes through a `Device`, so the policy decides in one place whether
//! a misconfiguration ends the process.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::policy::FailurePolicy;
use crate::core::types::{IVec3, Result};
use crate::object::managed::ObjectRef;
use crate::transfer::{self, TransferFunction, TransferFunctionRef, TransferFunctionRegistry};
use crate::volume::{self, Volume, VolumeRef, VolumeRegistry};

/// Device configuration, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Terminate the process on configuration errors.
    pub fail_fast: bool,
    /// Size of the global rayon pool; `None` keeps rayon's default.
    pub worker_threads: Option<usize>,
    /// Z-slices per `set_region` call when streaming raw files.
    pub region_slab_depth: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            worker_threads: None,
            region_slab_depth: 16,
        }
    }
}

impl DeviceConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Scene(format!("{}: invalid device config: {}", path.display(), e)))
    }

    /// Write as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Scene(format!("failed to serialize device config: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Engine context.
pub struct Device {
    config: DeviceConfig,
    policy: FailurePolicy,
    volumes: VolumeRegistry,
    transfer_functions: TransferFunctionRegistry,
}

impl Device {
    /// Create a device with the built-in volume and transfer-function types.
    pub fn new(config: DeviceConfig) -> Self {
        if let Some(threads) = config.worker_threads {
            // The global pool can only be built once per process.
            if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
                log::warn!("Could not configure {} worker threads: {}", threads, e);
            }
        }

        let policy = FailurePolicy::from_fail_fast(config.fail_fast);
        let volumes = volume::builtin_registry();
        let transfer_functions = transfer::builtin_registry();

        log::info!(
            "Device created: policy {:?}, {} rayon threads, volume types [{}], transfer function types [{}]",
            policy,
            rayon::current_num_threads(),
            volumes.type_names().join(", "),
            transfer_functions.type_names().join(", ")
        );

        Self {
            config,
            policy,
            volumes,
            transfer_functions,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn volume_registry(&self) -> &VolumeRegistry {
        &self.volumes
    }

    pub fn transfer_function_registry(&self) -> &TransferFunctionRegistry {
        &self.transfer_functions
    }

    /// Create a volume of a registered type.
    pub fn new_volume(&self, type_name: &str) -> Result<VolumeRef> {
        self.policy.apply(volume::create_instance(&self.volumes, type_name))
    }

    /// Create a transfer function of a registered type.
    pub fn new_transfer_function(&self, type_name: &str) -> Result<TransferFunctionRef> {
        self.policy.apply(transfer::create_instance(&self.transfer_functions, type_name))
    }

    /// Register (or override) a volume type. Returns true if one was replaced.
    pub fn register_volume<V>(&mut self, type_name: &str) -> bool
    where
        V: Volume + Default + 'static,
    {
        volume::register_type::<V>(&mut self.volumes, type_name)
    }

    /// Register (or override) a transfer-function type. Returns true if one was replaced.
    pub fn register_transfer_function<C>(&mut self, type_name: &str) -> bool
    where
        C: TransferFunction + Default + 'static,
    {
        transfer::register_type::<C>(&mut self.transfer_functions, type_name)
    }

    /// Commit any managed object.
    pub fn commit(&self, object: &ObjectRef) -> Result<()> {
        self.policy.apply(object.commit())
    }

    /// Upload a region of raw voxel data.
    ///
    /// Tries [`Volume::set_region_shared`] under a shared lock first, so
    /// several threads can stream disjoint regions into one volume at once.
    /// Falls back to [`Volume::set_region`] under the write lock.
    pub fn set_region(&self, volume: &VolumeRef, source: &[u8], origin: IVec3, count: IVec3) -> Result<()> {
        let shared = volume.read().set_region_shared(source, origin, count);
        let result = match shared {
            Some(result) => result,
            None => volume.write().set_region(source, origin, count),
        };
        self.policy.apply(result)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("config", &self.config)
            .field("volumes", &self.volumes)
            .field("transfer_functions", &self.transfer_functions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::error::ConfigError;
    use crate::core::types::{Vec2, Vec3};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::object::managed::ManagedObject;
    use crate::object::param::DataBuffer;
    use crate::transfer::{LinearTransferMap, TransferMap, TRANSFER_FUNCTION_TYPE};
    use crate::volume::{BlockBrickedVolume, BrickStore, CompiledVolume};
    use tempfile::tempdir;

    fn device() -> Device {
        Device::new(DeviceConfig::default())
    }

    fn committed_tf(device: &Device) -> TransferFunctionRef {
        let tf = device.new_transfer_function("piecewise_linear").unwrap();
        {
            let mut guard = tf.write();
            guard.set_param("colors", DataBuffer::from_vec3s(&[Vec3::ZERO, Vec3::ONE]).into());
            guard.set_param("valueRange", Vec2::new(0.0, 255.0).into());
        }
        device.commit(&tf.clone().into()).unwrap();
        tf
    }

    /// Constant-colour transfer function used to check registry overrides.
    struct FlatRed {
        object: ManagedObject<dyn TransferMap>,
    }

    impl Default for FlatRed {
        fn default() -> Self {
            Self {
                object: ManagedObject::new(TRANSFER_FUNCTION_TYPE),
            }
        }
    }

    impl TransferFunction for FlatRed {
        fn object(&self) -> &ManagedObject<dyn TransferMap> {
            &self.object
        }

        fn object_mut(&mut self) -> &mut ManagedObject<dyn TransferMap> {
            &mut self.object
        }

        fn commit(&mut self) -> Result<()> {
            self.object.commit_with(|_| {
                Ok(Arc::new(LinearTransferMap::new(vec![Vec3::X], vec![1.0], Vec2::new(0.0, 1.0)))
                    as Arc<dyn TransferMap>)
            })?;
            Ok(())
        }
    }

    static JOURNALED_UPLOADS: AtomicUsize = AtomicUsize::new(0);

    /// Volume kind that records every upload and so needs exclusive access.
    #[derive(Default)]
    struct JournaledVolume {
        inner: BlockBrickedVolume,
    }

    impl Volume for JournaledVolume {
        fn object(&self) -> &ManagedObject<CompiledVolume> {
            self.inner.object()
        }

        fn object_mut(&mut self) -> &mut ManagedObject<CompiledVolume> {
            self.inner.object_mut()
        }

        fn commit(&mut self) -> Result<()> {
            self.inner.commit()
        }

        fn set_region(&mut self, source: &[u8], origin: IVec3, count: IVec3) -> Result<()> {
            JOURNALED_UPLOADS.fetch_add(1, Ordering::SeqCst);
            self.inner.set_region(source, origin, count)
        }

        fn store(&self) -> Option<Arc<BrickStore>> {
            self.inner.store()
        }

        fn set_region_shared(&self, _: &[u8], _: IVec3, _: IVec3) -> Option<Result<()>> {
            None
        }
    }

    #[test]
    fn test_config_defaults_and_partial_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("device.json");
        std::fs::write(&path, r#"{ "fail_fast": true }"#).unwrap();

        let config = DeviceConfig::load(&path).unwrap();
        assert!(config.fail_fast);
        assert_eq!(config.region_slab_depth, 16);
        assert_eq!(config.worker_threads, None);
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("device.json");
        let config = DeviceConfig {
            fail_fast: false,
            worker_threads: None,
            region_slab_depth: 4,
        };
        config.save(&path).unwrap();
        assert_eq!(DeviceConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_config_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("device.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(DeviceConfig::load(&path), Err(Error::Scene(_))));
        assert!(matches!(DeviceConfig::load(&dir.path().join("missing.json")), Err(Error::Io(_))));
    }

    #[test]
    fn test_unknown_type_propagates() {
        let device = device();
        let err = device.new_volume("amr_volume").err().unwrap();
        assert_eq!(err.config_kind(), Some(&ConfigError::UnknownType("amr_volume".to_string())));
    }

    #[test]
    fn test_volume_lifecycle_through_device() {
        let device = device();
        let tf = committed_tf(&device);
        let volume = device.new_volume("block_bricked_volume").unwrap();
        let handle = ObjectRef::from(volume.clone());
        handle.set_param("voxelType", "uchar");
        handle.set_param("dimensions", IVec3::splat(4));
        handle.set_param("transferFunction", tf);

        // Before commit the store is allocated on demand.
        device.set_region(&volume, &[255; 8], IVec3::ZERO, IVec3::splat(2)).unwrap();
        device.commit(&handle).unwrap();

        // After commit, writes go straight to the shared store.
        device.set_region(&volume, &[51], IVec3::splat(3), IVec3::ONE).unwrap();
        let err = device.set_region(&volume, &[0; 8], IVec3::splat(3), IVec3::splat(2)).unwrap_err();
        assert!(matches!(err, Error::Range { .. }));

        let compiled = volume.read().compiled().unwrap();
        assert_eq!(compiled.value(IVec3::ONE).unwrap(), 255.0);
        assert_eq!(compiled.value(IVec3::splat(3)).unwrap(), 51.0);
        assert!((compiled.color_at(IVec3::splat(3)).unwrap().x - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_concurrent_set_region_through_device() {
        let device = device();
        let tf = committed_tf(&device);
        let volume = device.new_volume("block_bricked_volume").unwrap();
        {
            let mut guard = volume.write();
            guard.set_param("voxelType", "uchar".into());
            guard.set_param("dimensions", IVec3::new(16, 16, 32).into());
            guard.set_param("transferFunction", tf.into());
        }
        device.commit(&volume.clone().into()).unwrap();

        std::thread::scope(|scope| {
            for slab in 0..4 {
                let device = &device;
                let volume = &volume;
                scope.spawn(move || {
                    let data = vec![slab as u8 + 1; 16 * 16 * 8];
                    device
                        .set_region(volume, &data, IVec3::new(0, 0, slab * 8), IVec3::new(16, 16, 8))
                        .unwrap();
                });
            }
        });

        let compiled = volume.read().compiled().unwrap();
        for slab in 0..4 {
            assert_eq!(compiled.value(IVec3::new(7, 9, slab * 8 + 3)).unwrap(), (slab + 1) as f32);
        }
    }

    #[test]
    fn test_registry_override() {
        let mut device = device();
        assert!(!device.register_transfer_function::<FlatRed>("flat_red"));
        // Replacing the built-in name makes create() build the new type.
        assert!(device.register_transfer_function::<FlatRed>("piecewise_linear"));

        let tf = device.new_transfer_function("piecewise_linear").unwrap();
        device.commit(&tf.clone().into()).unwrap();
        assert_eq!(tf.read().compiled().unwrap().color(0.7), Vec3::X);
    }

    #[test]
    fn test_set_region_honours_volume_kind_after_commit() {
        let mut device = device();
        assert!(!device.register_volume::<JournaledVolume>("journaled_volume"));
        let tf = committed_tf(&device);
        let volume = device.new_volume("journaled_volume").unwrap();
        let handle = ObjectRef::from(volume.clone());
        handle.set_param("voxelType", "uchar");
        handle.set_param("dimensions", IVec3::splat(8));
        handle.set_param("transferFunction", tf);
        device.commit(&handle).unwrap();
        assert!(volume.read().store().is_some());

        device.set_region(&volume, &[7], IVec3::splat(2), IVec3::ONE).unwrap();
        device.set_region(&volume, &[9], IVec3::splat(5), IVec3::ONE).unwrap();
        assert_eq!(JOURNALED_UPLOADS.load(Ordering::SeqCst), 2);

        let compiled = volume.read().compiled().unwrap();
        assert_eq!(compiled.value(IVec3::splat(2)).unwrap(), 7.0);
        assert_eq!(compiled.value(IVec3::splat(5)).unwrap(), 9.0);
    }
}
