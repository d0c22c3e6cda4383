use std::sync::Arc;

use tracing::info;

use super::class::{ClassBuilder, MappedClass};
use crate::exceptions::Result;
use crate::properties::PropertyRegistry;

/// Root of a mapped class hierarchy
///
/// Every class defined through a publisher has its properties registered in
/// the publisher's registry, so they can later be looked up by name. The
/// registry does not keep classes alive: once the returned class and its
/// properties are dropped, their entries disappear.
#[derive(Debug, Clone, Default)]
pub struct PropertyPublisher {
    registry: PropertyRegistry,
}

impl PropertyPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    /// Builds the class and registers its properties
    pub fn define(&self, builder: ClassBuilder) -> Result<Arc<MappedClass>> {
        let class = Arc::new(builder.build()?);
        self.registry.add_class(&class);

        info!(
            class = %class.qualified_name(),
            table = %class.table(),
            "Mapped class defined"
        );
        Ok(class)
    }
}
