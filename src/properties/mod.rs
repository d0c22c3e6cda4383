// Mapped properties and the registry that resolves dotted names to them

pub use property::{Property, PropertyAccess, PropertyKind};
pub use registry::{PropertyPathError, PropertyRegistry};

mod property;
mod registry;
