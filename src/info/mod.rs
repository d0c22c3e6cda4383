// Class metadata and per-instance state
//
// Mapped classes are described explicitly through `ClassBuilder` and made
// resolvable by name through a `PropertyPublisher`. Each instance gets an
// `ObjectInfo` carrying its values and its lifecycle `EventBus`.

pub use class::{ClassBuilder, MappedClass};
pub use object::ObjectInfo;
pub use publisher::PropertyPublisher;

mod class;
mod object;
mod publisher;
