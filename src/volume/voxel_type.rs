//! Voxel element formats

use std::fmt;
use std::str::FromStr;

use half::f16;
use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;

/// Element format of a volume's field. Values are stored in native byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoxelType {
    /// 8-bit unsigned scalar
    UChar,
    /// 16-bit unsigned scalar
    UShort,
    /// 16-bit signed scalar
    Short,
    /// 16-bit float scalar
    Half,
    /// 32-bit float scalar
    Float,
    /// 64-bit float scalar
    Double,
    /// Three 32-bit floats; sampled by magnitude
    Vec3f,
}

impl VoxelType {
    pub const ALL: [VoxelType; 7] = [
        VoxelType::UChar,
        VoxelType::UShort,
        VoxelType::Short,
        VoxelType::Half,
        VoxelType::Float,
        VoxelType::Double,
        VoxelType::Vec3f,
    ];

    /// Name accepted by the `voxelType` parameter.
    pub fn name(&self) -> &'static str {
        match self {
            VoxelType::UChar => "uchar",
            VoxelType::UShort => "ushort",
            VoxelType::Short => "short",
            VoxelType::Half => "half",
            VoxelType::Float => "float",
            VoxelType::Double => "double",
            VoxelType::Vec3f => "vec3f",
        }
    }

    /// Size of one voxel in bytes.
    pub fn size(&self) -> usize {
        match self {
            VoxelType::UChar => 1,
            VoxelType::UShort | VoxelType::Short | VoxelType::Half => 2,
            VoxelType::Float => 4,
            VoxelType::Double => 8,
            VoxelType::Vec3f => 12,
        }
    }

    /// Number of components per voxel.
    pub fn components(&self) -> usize {
        match self {
            VoxelType::Vec3f => 3,
            _ => 1,
        }
    }

    /// Decode one voxel from the front of `bytes` as the scalar used for
    /// transfer-function lookup. `bytes` must hold at least `size()` bytes.
    pub fn decode(&self, bytes: &[u8]) -> f32 {
        match self {
            VoxelType::UChar => bytes[0] as f32,
            VoxelType::UShort => bytemuck::pod_read_unaligned::<u16>(&bytes[..2]) as f32,
            VoxelType::Short => bytemuck::pod_read_unaligned::<i16>(&bytes[..2]) as f32,
            VoxelType::Half => f16::from_bits(bytemuck::pod_read_unaligned::<u16>(&bytes[..2])).to_f32(),
            VoxelType::Float => bytemuck::pod_read_unaligned::<f32>(&bytes[..4]),
            VoxelType::Double => bytemuck::pod_read_unaligned::<f64>(&bytes[..8]) as f32,
            VoxelType::Vec3f => {
                let v = bytemuck::pod_read_unaligned::<[f32; 3]>(&bytes[..12]);
                glam::Vec3::from_array(v).length()
            }
        }
    }

    /// Encode scalar values into a raw buffer of this type (saturating for
    /// integer types). Vector types store the value in the first component.
    pub fn encode(&self, values: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(values.len() * self.size());
        for &value in values {
            match self {
                VoxelType::UChar => out.push(value as u8),
                VoxelType::UShort => out.extend_from_slice(bytemuck::bytes_of(&(value as u16))),
                VoxelType::Short => out.extend_from_slice(bytemuck::bytes_of(&(value as i16))),
                VoxelType::Half => out.extend_from_slice(bytemuck::bytes_of(&f16::from_f32(value).to_bits())),
                VoxelType::Float => out.extend_from_slice(bytemuck::bytes_of(&value)),
                VoxelType::Double => out.extend_from_slice(bytemuck::bytes_of(&(value as f64))),
                VoxelType::Vec3f => out.extend_from_slice(bytemuck::bytes_of(&[value, 0.0, 0.0])),
            }
        }
        out
    }
}

/// Byte size of a voxel type, for sizing raw buffers before `set_region`.
pub fn voxel_type_size(voxel_type: VoxelType) -> usize {
    voxel_type.size()
}

impl FromStr for VoxelType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoxelType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| ConfigError::InvalidVoxelType(s.to_string()))
    }
}

impl fmt::Display for VoxelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(voxel_type_size(VoxelType::UChar), 1);
        assert_eq!(voxel_type_size(VoxelType::Half), 2);
        assert_eq!(voxel_type_size(VoxelType::Float), 4);
        assert_eq!(voxel_type_size(VoxelType::Double), 8);
        assert_eq!(voxel_type_size(VoxelType::Vec3f), 12);
    }

    #[test]
    fn test_parse() {
        for t in VoxelType::ALL {
            assert_eq!(t.name().parse::<VoxelType>(), Ok(t));
        }
        assert_eq!(
            "unspecified".parse::<VoxelType>(),
            Err(ConfigError::InvalidVoxelType("unspecified".to_string()))
        );
    }

    #[test]
    fn test_decode_encoded_values() {
        let values = [0.0, 1.0, 42.0, 200.0];
        for t in [VoxelType::UChar, VoxelType::UShort, VoxelType::Short, VoxelType::Half, VoxelType::Float, VoxelType::Double] {
            let bytes = t.encode(&values);
            assert_eq!(bytes.len(), values.len() * t.size());
            let decoded: Vec<f32> = bytes.chunks_exact(t.size()).map(|b| t.decode(b)).collect();
            assert_eq!(decoded, values, "voxel type {}", t);
        }
    }

    #[test]
    fn test_integer_encode_saturates() {
        let bytes = VoxelType::UChar.encode(&[-5.0, 300.0]);
        assert_eq!(bytes, vec![0, 255]);
    }

    #[test]
    fn test_vec3f_decodes_magnitude() {
        let bytes = bytemuck::cast_slice::<f32, u8>(&[3.0, 4.0, 0.0]).to_vec();
        assert_eq!(VoxelType::Vec3f.decode(&bytes), 5.0);
        assert_eq!(VoxelType::Vec3f.components(), 3);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&VoxelType::UChar).unwrap();
        assert_eq!(json, "\"uchar\"");
        let parsed: VoxelType = serde_json::from_str("\"vec3f\"").unwrap();
        assert_eq!(parsed, VoxelType::Vec3f);
    }
}
