// Core of the Storm object-relational mapper
//
// Lifecycle hook dispatch for mapped instances, the registry that resolves
// dotted property names, class metadata and the unified error taxonomy.

pub mod event;
pub mod exceptions;
pub mod info;
pub mod properties;

// Re-export commonly used types for easier access in tests
pub use event::{EmitReport, EventBus, Flow, HookArg, HookError, HookFn, HookResult};
pub use exceptions::{
    wrap_driver_error, DatabaseErrorKind, DriverError, OrmError, Result, StoreErrorKind,
};
pub use info::{ClassBuilder, MappedClass, ObjectInfo, PropertyPublisher};
pub use properties::{
    Property, PropertyAccess, PropertyKind, PropertyPathError, PropertyRegistry,
};
