//! Error types for the rkvol object model

use glam::IVec3;
use thiserror::Error;

use crate::object::param::ParamKind;

/// Reasons a `commit()` (or a registry lookup) rejects an entity's configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("unrecognized voxel type '{0}'")]
    InvalidVoxelType(String),

    #[error("invalid volume dimensions {0}")]
    InvalidDimensions(IVec3),

    #[error("no transfer function specified")]
    MissingTransferFunction,

    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("parameter '{name}' has type {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: ParamKind,
        found: ParamKind,
    },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Misconfiguration detected at commit time or by the type registry.
    #[error("{object}: {kind}")]
    Configuration {
        object: &'static str,
        kind: ConfigError,
    },

    /// A region write or voxel query outside the volume grid.
    #[error("{object}: region origin {origin} count {count} outside dimensions {dimensions}")]
    Range {
        object: &'static str,
        origin: IVec3,
        count: IVec3,
        dimensions: IVec3,
    },

    /// Region source buffer shorter than the region it describes.
    #[error("{object}: region needs {expected} bytes of source data, got {actual}")]
    SourceSize {
        object: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Use of a compiled handle that does not exist or is stale.
    #[error("{object}: {message}")]
    Reference {
        object: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scene error: {0}")]
    Scene(String),
}

impl Error {
    /// Build a configuration error for the given entity type string.
    pub fn config(object: &'static str, kind: ConfigError) -> Self {
        Error::Configuration { object, kind }
    }

    /// Build a reference error for the given entity type string.
    pub fn reference(object: &'static str, message: impl Into<String>) -> Self {
        Error::Reference {
            object,
            message: message.into(),
        }
    }

    /// Configuration errors leave the program in a state it is not expected to
    /// continue from; everything else may be retried or reported.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// The configuration error kind, if this is a configuration error.
    pub fn config_kind(&self) -> Option<&ConfigError> {
        match self {
            Error::Configuration { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
