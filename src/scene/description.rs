//! JSON scene description

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// A typed parameter value, externally tagged by kind:
/// `{"vec3i": [64, 64, 64]}`, `{"object": "tf0"}`, `{"float_data": [0, 1]}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSpec {
    Int(i32),
    Long(i64),
    Float(f32),
    Vec2f([f32; 2]),
    Vec3f([f32; 3]),
    Vec4f([f32; 4]),
    Vec2i([i32; 2]),
    Vec3i([i32; 3]),
    Vec4i([i32; 4]),
    String(String),
    /// Reference to another entity of the scene, by name.
    Object(String),
    FloatData(Vec<f32>),
    Vec3fData(Vec<[f32; 3]>),
}

/// A named transfer function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferFunctionSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
}

/// A named volume, optionally backed by a raw voxel file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
    /// Raw voxels in native byte order, x fastest, relative to the scene file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<PathBuf>,
}

/// Top-level scene file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub transfer_functions: Vec<TransferFunctionSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
}

impl SceneDescription {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Scene(format!("invalid scene description: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| match e {
            Error::Scene(msg) => Error::Scene(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Scene(format!("failed to serialize scene: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }
}
