//! Managed objects: identity, parameters and the compiled backend handle.
//!
//! Every configurable entity embeds a [`ManagedObject`] and goes through the
//! same two-phase lifecycle: parameters are set, then [`ManagedObject::commit_with`]
//! validates them and compiles a fresh backend handle. The handle is an
//! `Arc` so traversal threads can keep reading one commit epoch while the
//! application configures the next.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::error::Error;
use crate::core::logging;
use crate::core::types::Result;
use crate::object::param::{ParamStore, ParamValue};
use crate::transfer::TransferFunctionRef;
use crate::volume::VolumeRef;

/// Global counter for unique object ids
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identity of a managed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared state of a configurable object whose compiled form is `H`.
pub struct ManagedObject<H: ?Sized> {
    id: ObjectId,
    /// Human-readable entity type used in diagnostics, e.g. `rkvol::Volume`.
    type_string: &'static str,
    params: ParamStore,
    compiled: Option<Arc<H>>,
    /// Number of successful commits.
    epoch: u64,
    /// Parameters changed since the last successful commit.
    modified: bool,
    last_commit_failed: bool,
}

impl<H: ?Sized> ManagedObject<H> {
    pub fn new(type_string: &'static str) -> Self {
        Self {
            id: ObjectId::next(),
            type_string,
            params: ParamStore::new(),
            compiled: None,
            epoch: 0,
            modified: false,
            last_commit_failed: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_string(&self) -> &'static str {
        self.type_string
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Set a parameter. The compiled handle becomes stale until the next commit.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.set(name, value);
        self.modified = true;
    }

    /// Remove a parameter. The compiled handle becomes stale until the next commit.
    pub fn remove_param(&mut self, name: &str) -> Option<ParamValue> {
        let removed = self.params.remove(name);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// True when a compiled handle exists and reflects the current parameters.
    pub fn is_committed(&self) -> bool {
        self.compiled.is_some() && !self.modified
    }

    pub fn has_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// The compiled handle of the most recent commit.
    ///
    /// Fails when the object was never committed, its last commit failed, or
    /// its parameters have changed since.
    pub fn compiled(&self) -> Result<Arc<H>> {
        match &self.compiled {
            None if self.last_commit_failed => {
                Err(Error::reference(self.type_string, format!("{} last commit failed", self.id)))
            }
            None => Err(Error::reference(self.type_string, format!("{} has not been committed", self.id))),
            Some(_) if self.modified => Err(Error::reference(
                self.type_string,
                format!("{} parameters changed since last commit", self.id),
            )),
            Some(handle) => Ok(handle.clone()),
        }
    }

    /// Run the commit protocol.
    ///
    /// The previous handle is dropped before `compile` runs, so a failed
    /// commit never leaves a handle built from older parameters behind.
    pub fn commit_with<F>(&mut self, compile: F) -> Result<Arc<H>>
    where
        F: FnOnce(&ParamStore) -> Result<Arc<H>>,
    {
        self.compiled = None;
        match compile(&self.params) {
            Ok(handle) => {
                self.compiled = Some(handle.clone());
                self.epoch += 1;
                self.modified = false;
                self.last_commit_failed = false;
                log::debug!("{} {} committed (epoch {})", self.type_string, self.id, self.epoch);
                Ok(handle)
            }
            Err(err) => {
                self.last_commit_failed = true;
                match &err {
                    Error::Configuration { kind, .. } => {
                        logging::emit_error(self.type_string, &kind.to_string())
                    }
                    other => logging::emit_error(self.type_string, &other.to_string()),
                }
                Err(err)
            }
        }
    }

    /// Log a warning for this object when `condition` holds.
    pub fn warn_on_condition(&self, condition: bool, message: &str) -> bool {
        logging::warn_on_condition(self.type_string, condition, message)
    }
}

impl<H: ?Sized> fmt::Debug for ManagedObject<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedObject")
            .field("id", &self.id)
            .field("type", &self.type_string)
            .field("params", &self.params.names())
            .field("committed", &self.is_committed())
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Shared reference to any managed object; the object-reference parameter kind.
///
/// Cloning shares ownership: the object lives as long as its longest holder.
#[derive(Clone)]
pub enum ObjectRef {
    TransferFunction(TransferFunctionRef),
    Volume(VolumeRef),
}

impl ObjectRef {
    pub fn id(&self) -> ObjectId {
        match self {
            ObjectRef::TransferFunction(tf) => tf.read().object().id(),
            ObjectRef::Volume(volume) => volume.read().object().id(),
        }
    }

    pub fn type_string(&self) -> &'static str {
        match self {
            ObjectRef::TransferFunction(tf) => tf.read().object().type_string(),
            ObjectRef::Volume(volume) => volume.read().object().type_string(),
        }
    }

    /// Entity family of the reference. Never locks the referenced object.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ObjectRef::TransferFunction(_) => "transfer function",
            ObjectRef::Volume(_) => "volume",
        }
    }

    /// Number of live holders of the referenced object.
    pub fn ref_count(&self) -> usize {
        match self {
            ObjectRef::TransferFunction(tf) => Arc::strong_count(tf),
            ObjectRef::Volume(volume) => Arc::strong_count(volume),
        }
    }

    pub fn set_param(&self, name: impl Into<String>, value: impl Into<ParamValue>) {
        match self {
            ObjectRef::TransferFunction(tf) => tf.write().object_mut().set_param(name, value),
            ObjectRef::Volume(volume) => volume.write().object_mut().set_param(name, value),
        }
    }

    /// Commit the referenced object.
    pub fn commit(&self) -> Result<()> {
        match self {
            ObjectRef::TransferFunction(tf) => tf.write().commit(),
            ObjectRef::Volume(volume) => volume.write().commit(),
        }
    }

    pub fn as_transfer_function(&self) -> Option<&TransferFunctionRef> {
        match self {
            ObjectRef::TransferFunction(tf) => Some(tf),
            _ => None,
        }
    }

    pub fn as_volume(&self) -> Option<&VolumeRef> {
        match self {
            ObjectRef::Volume(volume) => Some(volume),
            _ => None,
        }
    }

    /// True when both refer to the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        match (self, other) {
            (ObjectRef::TransferFunction(a), ObjectRef::TransferFunction(b)) => Arc::ptr_eq(a, b),
            (ObjectRef::Volume(a), ObjectRef::Volume(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<TransferFunctionRef> for ObjectRef {
    fn from(tf: TransferFunctionRef) -> Self {
        ObjectRef::TransferFunction(tf)
    }
}

impl From<VolumeRef> for ObjectRef {
    fn from(volume: VolumeRef) -> Self {
        ObjectRef::Volume(volume)
    }
}

impl From<TransferFunctionRef> for ParamValue {
    fn from(tf: TransferFunctionRef) -> Self {
        ParamValue::Object(ObjectRef::TransferFunction(tf))
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never block: the referenced object may be locked by the caller.
        let (label, id) = match self {
            ObjectRef::TransferFunction(tf) => ("TransferFunction", tf.try_read().map(|g| g.object().id())),
            ObjectRef::Volume(volume) => ("Volume", volume.try_read().map(|g| g.object().id())),
        };
        match id {
            Some(id) => write!(f, "{}({})", label, id),
            None => write!(f, "{}(<locked>)", label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ConfigError;

    #[test]
    fn test_ids_are_unique() {
        let a: ManagedObject<u32> = ManagedObject::new("test::A");
        let b: ManagedObject<u32> = ManagedObject::new("test::A");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_uncommitted_handle_is_reference_error() {
        let object: ManagedObject<u32> = ManagedObject::new("test::A");
        let err = object.compiled().unwrap_err();
        assert!(matches!(err, Error::Reference { .. }));
        assert!(err.to_string().contains("has not been committed"));
    }

    #[test]
    fn test_commit_sets_handle_and_epoch() {
        let mut object: ManagedObject<u32> = ManagedObject::new("test::A");
        object.set_param("value", 7i32);
        assert!(object.is_modified());

        let handle = object
            .commit_with(|params| Ok(Arc::new(params.get_i32("value", 0) as u32)))
            .unwrap();
        assert_eq!(*handle, 7);
        assert_eq!(object.epoch(), 1);
        assert!(object.is_committed());
        assert_eq!(*object.compiled().unwrap(), 7);
    }

    #[test]
    fn test_param_change_makes_handle_stale() {
        let mut object: ManagedObject<u32> = ManagedObject::new("test::A");
        object.commit_with(|_| Ok(Arc::new(1))).unwrap();
        object.set_param("value", 2i32);
        assert!(!object.is_committed());
        assert!(object.has_compiled());
        let err = object.compiled().unwrap_err();
        assert!(err.to_string().contains("parameters changed"));
    }

    #[test]
    fn test_failed_commit_clears_handle() {
        let mut object: ManagedObject<u32> = ManagedObject::new("test::A");
        object.commit_with(|_| Ok(Arc::new(1))).unwrap();

        let result = object.commit_with(|_| {
            Err(Error::config("test::A", ConfigError::MissingParameter("value")))
        });
        assert!(result.is_err());
        assert!(!object.has_compiled());
        assert_eq!(object.epoch(), 1);
        assert!(object.compiled().unwrap_err().to_string().contains("last commit failed"));
    }

    #[test]
    fn test_remove_param_marks_modified_only_when_present() {
        let mut object: ManagedObject<u32> = ManagedObject::new("test::A");
        object.commit_with(|_| Ok(Arc::new(1))).unwrap();
        assert!(object.remove_param("absent").is_none());
        assert!(object.is_committed());
    }
}
