//! Named, typed parameters attached to every managed object.
//!
//! Reads are find-or-default: a missing name, or a value of the wrong kind,
//! yields the caller's default. Kind mismatches are reported once, at commit,
//! through [`ParamStore::check_kind`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::error::ConfigError;
use crate::core::types::{IVec2, IVec3, IVec4, Vec2, Vec3, Vec4};
use crate::object::managed::ObjectRef;

/// Opaque byte buffer with an element stride (`OSP_DATA`-style arrays).
#[derive(Clone, PartialEq)]
pub struct DataBuffer {
    bytes: Arc<[u8]>,
    stride: usize,
}

impl DataBuffer {
    /// Wrap raw bytes. `stride` is the byte distance between elements.
    pub fn new(bytes: impl Into<Arc<[u8]>>, stride: usize) -> Self {
        Self {
            bytes: bytes.into(),
            stride: stride.max(1),
        }
    }

    pub fn from_f32s(values: &[f32]) -> Self {
        Self::new(bytemuck::cast_slice::<f32, u8>(values), 4)
    }

    pub fn from_vec3s(values: &[Vec3]) -> Self {
        let flat: Vec<[f32; 3]> = values.iter().map(|v| v.to_array()).collect();
        Self::new(bytemuck::cast_slice::<[f32; 3], u8>(&flat), 12)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of whole elements in the buffer.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the leading `size_of::<T>()` bytes of every element.
    fn read<T: bytemuck::AnyBitPattern>(&self) -> Vec<T> {
        let size = std::mem::size_of::<T>();
        if size > self.stride {
            return Vec::new();
        }
        self.bytes
            .chunks_exact(self.stride)
            .map(|element| bytemuck::pod_read_unaligned::<T>(&element[..size]))
            .collect()
    }

    /// Interpret elements as `f32`. Empty when the stride is too small.
    pub fn to_f32s(&self) -> Vec<f32> {
        self.read::<f32>()
    }

    /// Interpret elements as three-float vectors. Empty when the stride is too small.
    pub fn to_vec3s(&self) -> Vec<Vec3> {
        self.read::<[f32; 3]>().into_iter().map(Vec3::from_array).collect()
    }
}

impl fmt::Debug for DataBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBuffer")
            .field("bytes", &self.bytes.len())
            .field("stride", &self.stride)
            .finish()
    }
}

/// The kind of a stored parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Int,
    Long,
    Float,
    Vec2f,
    Vec3f,
    Vec4f,
    Vec2i,
    Vec3i,
    Vec4i,
    String,
    Object,
    Data,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Int => "int",
            ParamKind::Long => "long",
            ParamKind::Float => "float",
            ParamKind::Vec2f => "vec2f",
            ParamKind::Vec3f => "vec3f",
            ParamKind::Vec4f => "vec4f",
            ParamKind::Vec2i => "vec2i",
            ParamKind::Vec3i => "vec3i",
            ParamKind::Vec4i => "vec4i",
            ParamKind::String => "string",
            ParamKind::Object => "object",
            ParamKind::Data => "data",
        };
        f.write_str(name)
    }
}

/// A single parameter value
#[derive(Clone, Debug)]
pub enum ParamValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Vec2f(Vec2),
    Vec3f(Vec3),
    Vec4f(Vec4),
    Vec2i(IVec2),
    Vec3i(IVec3),
    Vec4i(IVec4),
    String(String),
    Object(ObjectRef),
    Data(DataBuffer),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Long(_) => ParamKind::Long,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Vec2f(_) => ParamKind::Vec2f,
            ParamValue::Vec3f(_) => ParamKind::Vec3f,
            ParamValue::Vec4f(_) => ParamKind::Vec4f,
            ParamValue::Vec2i(_) => ParamKind::Vec2i,
            ParamValue::Vec3i(_) => ParamKind::Vec3i,
            ParamValue::Vec4i(_) => ParamKind::Vec4i,
            ParamValue::String(_) => ParamKind::String,
            ParamValue::Object(_) => ParamKind::Object,
            ParamValue::Data(_) => ParamKind::Data,
        }
    }
}

macro_rules! impl_from_param {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_param! {
    i32 => Int,
    i64 => Long,
    f32 => Float,
    Vec2 => Vec2f,
    Vec3 => Vec3f,
    Vec4 => Vec4f,
    IVec2 => Vec2i,
    IVec3 => Vec3i,
    IVec4 => Vec4i,
    String => String,
    ObjectRef => Object,
    DataBuffer => Data,
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

/// Mapping from parameter name to value. Last write wins.
#[derive(Clone, Debug, Default)]
pub struct ParamStore {
    values: HashMap<String, ParamValue>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a parameter.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Remove a parameter, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parameter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Commit-time kind validation. Absent parameters pass; present ones must
    /// have one of the `accepted` kinds. An empty `accepted` leaves the
    /// parameter unconstrained.
    pub fn check_kind(&self, name: &str, accepted: &[ParamKind]) -> Result<(), ConfigError> {
        let Some(&expected) = accepted.first() else {
            return Ok(());
        };
        match self.values.get(name) {
            Some(value) if !accepted.contains(&value.kind()) => Err(ConfigError::TypeMismatch {
                name: name.to_string(),
                expected,
                found: value.kind(),
            }),
            _ => Ok(()),
        }
    }

    pub fn get_i32(&self, name: &str, default: i32) -> i32 {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => *v,
            _ => default,
        }
    }

    pub fn get_i64(&self, name: &str, default: i64) -> i64 {
        match self.values.get(name) {
            Some(ParamValue::Long(v)) => *v,
            Some(ParamValue::Int(v)) => *v as i64,
            _ => default,
        }
    }

    pub fn get_f32(&self, name: &str, default: f32) -> f32 {
        match self.values.get(name) {
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(v)) => *v as f32,
            _ => default,
        }
    }

    pub fn get_vec2f(&self, name: &str, default: Vec2) -> Vec2 {
        match self.values.get(name) {
            Some(ParamValue::Vec2f(v)) => *v,
            _ => default,
        }
    }

    pub fn get_vec3f(&self, name: &str, default: Vec3) -> Vec3 {
        match self.values.get(name) {
            Some(ParamValue::Vec3f(v)) => *v,
            _ => default,
        }
    }

    pub fn get_vec4f(&self, name: &str, default: Vec4) -> Vec4 {
        match self.values.get(name) {
            Some(ParamValue::Vec4f(v)) => *v,
            _ => default,
        }
    }

    pub fn get_vec2i(&self, name: &str, default: IVec2) -> IVec2 {
        match self.values.get(name) {
            Some(ParamValue::Vec2i(v)) => *v,
            _ => default,
        }
    }

    pub fn get_vec3i(&self, name: &str, default: IVec3) -> IVec3 {
        match self.values.get(name) {
            Some(ParamValue::Vec3i(v)) => *v,
            _ => default,
        }
    }

    pub fn get_vec4i(&self, name: &str, default: IVec4) -> IVec4 {
        match self.values.get(name) {
            Some(ParamValue::Vec4i(v)) => *v,
            _ => default,
        }
    }

    pub fn get_string(&self, name: &str, default: &str) -> String {
        match self.values.get(name) {
            Some(ParamValue::String(v)) => v.clone(),
            _ => default.to_string(),
        }
    }

    pub fn get_object(&self, name: &str) -> Option<ObjectRef> {
        match self.values.get(name) {
            Some(ParamValue::Object(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn get_data(&self, name: &str) -> Option<DataBuffer> {
        match self.values.get(name) {
            Some(ParamValue::Data(v)) => Some(v.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut params = ParamStore::new();
        params.set("samplingRate", 0.5f32);
        params.set("samplingRate", 2.0f32);
        assert_eq!(params.get_f32("samplingRate", 1.0), 2.0);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_missing_yields_default() {
        let params = ParamStore::new();
        assert_eq!(params.get_vec3i("dimensions", IVec3::ZERO), IVec3::ZERO);
        assert_eq!(params.get_string("voxelType", "unspecified"), "unspecified");
        assert_eq!(params.get_vec2f("gammaCorrection", Vec2::ONE), Vec2::ONE);
        assert!(params.get_object("transferFunction").is_none());
    }

    #[test]
    fn test_mismatch_yields_default_and_is_reported_by_check() {
        let mut params = ParamStore::new();
        params.set("dimensions", 4.0f32);
        assert_eq!(params.get_vec3i("dimensions", IVec3::ZERO), IVec3::ZERO);

        let err = params.check_kind("dimensions", &[ParamKind::Vec3i]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::TypeMismatch {
                name: "dimensions".to_string(),
                expected: ParamKind::Vec3i,
                found: ParamKind::Float,
            }
        );
        assert!(params.check_kind("absent", &[ParamKind::Vec3i]).is_ok());
    }

    #[test]
    fn test_check_kind_with_no_accepted_kinds() {
        let mut params = ParamStore::new();
        params.set("dimensions", 4.0f32);
        assert!(params.check_kind("dimensions", &[]).is_ok());
        assert!(params.check_kind("absent", &[]).is_ok());
    }

    #[test]
    fn test_int_reads_as_float() {
        let mut params = ParamStore::new();
        params.set("samplingRate", 2i32);
        assert_eq!(params.get_f32("samplingRate", 1.0), 2.0);
        assert_eq!(params.get_i64("samplingRate", 0), 2);
    }

    #[test]
    fn test_names_sorted_and_remove() {
        let mut params = ParamStore::new();
        params.set("voxelType", "uchar");
        params.set("dimensions", IVec3::splat(4));
        assert_eq!(params.names(), vec!["dimensions", "voxelType"]);
        assert!(params.remove("voxelType").is_some());
        assert!(!params.contains("voxelType"));
    }

    #[test]
    fn test_data_buffer_views() {
        let floats = DataBuffer::from_f32s(&[0.0, 0.5, 1.0]);
        assert_eq!(floats.len(), 3);
        assert_eq!(floats.stride(), 4);
        assert_eq!(floats.to_f32s(), vec![0.0, 0.5, 1.0]);

        let colors = DataBuffer::from_vec3s(&[Vec3::ZERO, Vec3::new(1.0, 0.5, 0.25)]);
        assert_eq!(colors.len(), 2);
        assert_eq!(colors.to_vec3s()[1], Vec3::new(1.0, 0.5, 0.25));

        // A stride smaller than the element cannot be read as vec3.
        assert!(floats.to_vec3s().is_empty());
    }

    #[test]
    fn test_data_buffer_strided() {
        // Two floats per element; only the first is read.
        let data = DataBuffer::new(
            bytemuck::cast_slice::<f32, u8>(&[1.0, 9.0, 2.0, 9.0]).to_vec(),
            8,
        );
        assert_eq!(data.to_f32s(), vec![1.0, 2.0]);
    }
}
