//! Type registry: maps a type name to a constructor.
//!
//! New volume and transfer-function kinds register themselves here without
//! the core knowing about them at build time. Registering a name twice
//! replaces the earlier factory, so late-loaded extensions can override
//! built-in kinds.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::error::{ConfigError, Error};
use crate::core::types::Result;

/// Zero-argument constructor producing a shared, lockable instance.
pub type Factory<T> = Arc<dyn Fn() -> Arc<RwLock<T>> + Send + Sync>;

/// Named factories for one entity family (volumes, transfer functions, ...).
pub struct Registry<T: ?Sized> {
    /// Entity family used in diagnostics, e.g. `rkvol::Volume`.
    family: &'static str,
    factories: HashMap<String, Factory<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            factories: HashMap::new(),
        }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Register `factory` under `name`. Returns true if an earlier
    /// registration was replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn() -> Arc<RwLock<T>> + Send + Sync + 'static,
    {
        let name = name.into();
        let replaced = self.factories.insert(name.clone(), Arc::new(factory)).is_some();
        if replaced {
            log::warn!("{}: type '{}' re-registered, replacing previous factory", self.family, name);
        } else {
            log::debug!("{}: registered type '{}'", self.family, name);
        }
        replaced
    }

    /// Remove a registration.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    /// Construct a new instance of the named type.
    pub fn create(&self, name: &str) -> Result<Arc<RwLock<T>>> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => {
                log::error!("{}: unknown type '{}'", self.family, name);
                Err(Error::config(self.family, ConfigError::UnknownType(name.to_string())))
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("family", &self.family)
            .field("types", &self.type_names())
            .finish()
    }
}
