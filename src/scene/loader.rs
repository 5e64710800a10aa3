//! Scene loading: build, stream and commit every entity of a description.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Instant;

use crate::core::error::Error;
use crate::core::types::{IVec2, IVec3, IVec4, Result, Vec2, Vec3, Vec4};
use crate::device::Device;
use crate::object::managed::ObjectRef;
use crate::object::param::{DataBuffer, ParamValue};
use crate::transfer::TransferFunctionRef;
use crate::volume::{VolumeRef, VoxelType, VOLUME_TYPE};

use super::description::{ParamSpec, SceneDescription};

/// Entities created from a scene description, by name.
#[derive(Default)]
pub struct Scene {
    transfer_functions: BTreeMap<String, TransferFunctionRef>,
    volumes: BTreeMap<String, VolumeRef>,
}

impl Scene {
    pub fn transfer_function(&self, name: &str) -> Option<&TransferFunctionRef> {
        self.transfer_functions.get(name)
    }

    pub fn volume(&self, name: &str) -> Option<&VolumeRef> {
        self.volumes.get(name)
    }

    /// Volumes sorted by name.
    pub fn volumes(&self) -> impl Iterator<Item = (&str, &VolumeRef)> {
        self.volumes.iter().map(|(name, volume)| (name.as_str(), volume))
    }

    /// Transfer functions sorted by name.
    pub fn transfer_functions(&self) -> impl Iterator<Item = (&str, &TransferFunctionRef)> {
        self.transfer_functions.iter().map(|(name, tf)| (name.as_str(), tf))
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("transfer_functions", &self.transfer_functions.keys().collect::<Vec<_>>())
            .field("volumes", &self.volumes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Load a scene file: create every entity through the device registries,
/// commit transfer functions, stream raw voxel files into volumes and commit
/// the volumes.
pub fn load_scene(device: &Device, path: &Path) -> Result<Scene> {
    let start = Instant::now();
    let description = SceneDescription::load(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let scene = build_scene(device, &description, base_dir)?;
    log::info!(
        "Loaded scene {}: {} transfer functions, {} volumes in {:.1}ms",
        path.display(),
        scene.transfer_functions.len(),
        scene.volumes.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(scene)
}

/// Build a scene from an already parsed description. Raw file paths are
/// resolved against `base_dir`.
pub fn build_scene(device: &Device, description: &SceneDescription, base_dir: &Path) -> Result<Scene> {
    let mut scene = Scene::default();
    let mut objects: HashMap<String, ObjectRef> = HashMap::new();

    for spec in &description.transfer_functions {
        claim_name(&objects, &spec.name)?;
        let tf = device.new_transfer_function(&spec.type_name)?;
        let object = ObjectRef::from(tf.clone());
        for (name, value) in &spec.params {
            object.set_param(name.as_str(), resolve_param(value, &objects)?);
        }
        device.commit(&object)?;
        objects.insert(spec.name.clone(), object);
        scene.transfer_functions.insert(spec.name.clone(), tf);
    }

    for spec in &description.volumes {
        claim_name(&objects, &spec.name)?;
        let volume = device.new_volume(&spec.type_name)?;
        let object = ObjectRef::from(volume.clone());
        for (name, value) in &spec.params {
            object.set_param(name.as_str(), resolve_param(value, &objects)?);
        }
        if let Some(raw) = &spec.raw {
            stream_raw(device, &volume, &base_dir.join(raw))?;
        }
        device.commit(&object)?;
        objects.insert(spec.name.clone(), object);
        scene.volumes.insert(spec.name.clone(), volume);
    }

    Ok(scene)
}

fn claim_name(objects: &HashMap<String, ObjectRef>, name: &str) -> Result<()> {
    if objects.contains_key(name) {
        return Err(Error::Scene(format!("duplicate entity name '{}'", name)));
    }
    Ok(())
}

fn resolve_param(spec: &ParamSpec, objects: &HashMap<String, ObjectRef>) -> Result<ParamValue> {
    Ok(match spec {
        ParamSpec::Int(v) => ParamValue::Int(*v),
        ParamSpec::Long(v) => ParamValue::Long(*v),
        ParamSpec::Float(v) => ParamValue::Float(*v),
        ParamSpec::Vec2f(v) => ParamValue::Vec2f(Vec2::from_array(*v)),
        ParamSpec::Vec3f(v) => ParamValue::Vec3f(Vec3::from_array(*v)),
        ParamSpec::Vec4f(v) => ParamValue::Vec4f(Vec4::from_array(*v)),
        ParamSpec::Vec2i(v) => ParamValue::Vec2i(IVec2::from_array(*v)),
        ParamSpec::Vec3i(v) => ParamValue::Vec3i(IVec3::from_array(*v)),
        ParamSpec::Vec4i(v) => ParamValue::Vec4i(IVec4::from_array(*v)),
        ParamSpec::String(v) => ParamValue::String(v.clone()),
        ParamSpec::Object(name) => ParamValue::Object(
            objects
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Scene(format!("reference to undefined entity '{}'", name)))?,
        ),
        ParamSpec::FloatData(values) => ParamValue::Data(DataBuffer::from_f32s(values)),
        ParamSpec::Vec3fData(values) => {
            let values: Vec<Vec3> = values.iter().copied().map(Vec3::from_array).collect();
            ParamValue::Data(DataBuffer::from_vec3s(&values))
        }
    })
}

/// Grid size and voxel format the volume's parameters currently describe.
fn raw_layout(volume: &VolumeRef) -> Result<(IVec3, VoxelType)> {
    let guard = volume.read();
    let params = guard.object().params();
    let voxel_type: VoxelType = params
        .get_string("voxelType", "unspecified")
        .parse()
        .map_err(|kind| Error::config(VOLUME_TYPE, kind))?;
    Ok((params.get_vec3i("dimensions", IVec3::ZERO), voxel_type))
}

/// Stream a raw voxel file into `volume` in z-slabs of `region_slab_depth` slices.
fn stream_raw(device: &Device, volume: &VolumeRef, path: &Path) -> Result<()> {
    let start = Instant::now();
    let (dimensions, voxel_type) = device.policy().apply(raw_layout(volume))?;
    if dimensions.min_element() <= 0 {
        // Let the volume report the invalid dimensions through its own commit.
        return Ok(());
    }

    let slice_bytes = dimensions.x as usize * dimensions.y as usize * voxel_type.size();
    let expected = slice_bytes as u64 * dimensions.z as u64;
    let file = File::open(path)?;
    let actual = file.metadata()?.len();
    if actual != expected {
        return Err(Error::Scene(format!(
            "{}: expected {} bytes for {} {}x{}x{}, found {}",
            path.display(),
            expected,
            voxel_type,
            dimensions.x,
            dimensions.y,
            dimensions.z,
            actual
        )));
    }

    let depth = device.config().region_slab_depth.max(1) as i32;
    let mut reader = BufReader::new(file);
    let mut slab = Vec::new();
    let mut z = 0;
    while z < dimensions.z {
        let count = IVec3::new(dimensions.x, dimensions.y, depth.min(dimensions.z - z));
        slab.resize(slice_bytes * count.z as usize, 0);
        reader.read_exact(&mut slab)?;
        device.set_region(volume, &slab, IVec3::new(0, 0, z), count)?;
        log::trace!("Streamed slices {}..{} of {}", z, z + count.z, path.display());
        z += count.z;
    }

    log::debug!(
        "Streamed {} ({}KB) in {:.1}ms",
        path.display(),
        expected / 1024,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}
