//! Parameter-driven object model: parameters, managed objects, type registry

pub mod param;
pub mod managed;
pub mod registry;

pub use param::{DataBuffer, ParamKind, ParamStore, ParamValue};
pub use managed::{ManagedObject, ObjectId, ObjectRef};
pub use registry::{Factory, Registry};
