//! Core types and utilities shared by every module

pub mod types;
pub mod error;
pub mod logging;
pub mod policy;

pub use types::*;
pub use error::{ConfigError, Error};
pub use policy::FailurePolicy;
