//! Transfer functions: map a scalar field value to colour and opacity.
//!
//! The mapping itself is implemented by registered kinds; the core only
//! fixes the contract. A kind is constructible by name through the
//! [`Registry`], committable, and after a successful commit exposes a
//! compiled [`TransferMap`] that volumes sample during traversal.

pub mod piecewise_linear;

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::types::{Result, Vec2, Vec3, Vec4};
use crate::object::managed::{ManagedObject, ObjectId};
use crate::object::param::ParamValue;
use crate::object::registry::Registry;

pub use piecewise_linear::{LinearTransferMap, PiecewiseLinearTransferFunction};

/// Entity type string used in transfer-function diagnostics.
pub const TRANSFER_FUNCTION_TYPE: &str = "rkvol::TransferFunction";

/// Compiled, read-only mapping queried by volumes.
pub trait TransferMap: Send + Sync + fmt::Debug {
    /// Colour for a field value.
    fn color(&self, value: f32) -> Vec3;

    /// Opacity for a field value.
    fn opacity(&self, value: f32) -> f32;

    /// Field value range covered by the mapping.
    fn value_range(&self) -> Vec2;

    /// Colour and opacity packed as `(r, g, b, a)`.
    fn map(&self, value: f32) -> Vec4 {
        self.color(value).extend(self.opacity(value))
    }
}

/// A configurable transfer-function entity.
pub trait TransferFunction: Send + Sync {
    fn object(&self) -> &ManagedObject<dyn TransferMap>;

    fn object_mut(&mut self) -> &mut ManagedObject<dyn TransferMap>;

    /// Validate parameters and build the compiled mapping.
    fn commit(&mut self) -> Result<()>;

    fn id(&self) -> ObjectId {
        self.object().id()
    }

    fn set_param(&mut self, name: &str, value: ParamValue) {
        self.object_mut().set_param(name, value);
    }

    /// The mapping built by the most recent successful commit.
    fn compiled(&self) -> Result<Arc<dyn TransferMap>> {
        self.object().compiled()
    }
}

/// Shared handle to a transfer function.
pub type TransferFunctionRef = Arc<RwLock<dyn TransferFunction>>;

/// Registry of transfer-function kinds.
pub type TransferFunctionRegistry = Registry<dyn TransferFunction>;

/// Create a transfer function of the given registered type.
pub fn create_instance(registry: &TransferFunctionRegistry, type_name: &str) -> Result<TransferFunctionRef> {
    registry.create(type_name)
}

/// Register a default-constructible kind under `name`.
pub fn register_type<C>(registry: &mut TransferFunctionRegistry, name: &str) -> bool
where
    C: TransferFunction + Default + 'static,
{
    registry.register(name, || Arc::new(RwLock::new(C::default())) as TransferFunctionRef)
}

/// A registry holding the built-in kinds.
pub fn builtin_registry() -> TransferFunctionRegistry {
    let mut registry = Registry::new(TRANSFER_FUNCTION_TYPE);
    register_type::<PiecewiseLinearTransferFunction>(&mut registry, piecewise_linear::TYPE_NAME);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ConfigError;

    #[test]
    fn test_builtin_registry() {
        let registry = builtin_registry();
        assert_eq!(registry.type_names(), vec!["piecewise_linear"]);
        let tf = create_instance(&registry, "piecewise_linear").unwrap();
        assert!(tf.read().compiled().is_err());
    }

    #[test]
    fn test_unknown_kind() {
        let registry = builtin_registry();
        let err = create_instance(&registry, "gaussian").err().unwrap();
        assert_eq!(err.config_kind(), Some(&ConfigError::UnknownType("gaussian".to_string())));
    }
}
