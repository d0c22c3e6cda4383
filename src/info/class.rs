use std::sync::Arc;

use tracing::{debug, warn};

use crate::exceptions::{OrmError, Result};
use crate::properties::Property;

/// Metadata for a mapped class: where it lives, which table it maps to and
/// the properties it declares
#[derive(Debug)]
pub struct MappedClass {
    module: String,
    name: String,
    table: String,
    /// Declaration order is preserved.
    attributes: Vec<(String, Arc<Property>)>,
}

impl MappedClass {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `module.path.ClassName`, or just the class name for an empty module
    pub fn qualified_name(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.module, self.name)
        }
    }

    /// Fully-qualified dotted path of attribute `attr`
    pub fn path_of(&self, attr: &str) -> String {
        format!("{}.{}", self.qualified_name(), attr)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Arc<Property>)> {
        self.attributes
            .iter()
            .map(|(attr, property)| (attr.as_str(), property))
    }

    pub fn property(&self, attr: &str) -> Option<&Arc<Property>> {
        self.attributes
            .iter()
            .find(|(name, _)| name == attr)
            .map(|(_, property)| property)
    }

    /// Attribute name under which `property` is declared on this class
    pub fn attribute_of(&self, property: &Property) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(_, candidate)| std::ptr::eq(Arc::as_ptr(candidate), property))
            .map(|(attr, _)| attr.as_str())
    }

    /// Attributes flagged as primary key, in declaration order
    pub fn primary_key(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(_, property)| property.is_primary())
            .map(|(attr, _)| attr.as_str())
            .collect()
    }
}

/// Builds a [`MappedClass`]
///
/// ```
/// use storm_core::{ClassBuilder, Property, PropertyKind};
///
/// let order = ClassBuilder::new("shop.models", "Order")
///     .table("orders")
///     .property("id", Property::new(PropertyKind::Int).primary())
///     .property("total", Property::new(PropertyKind::Decimal))
///     .build()
///     .unwrap();
///
/// assert_eq!(order.path_of("id"), "shop.models.Order.id");
/// ```
pub struct ClassBuilder {
    module: String,
    name: String,
    table: Option<String>,
    attributes: Vec<(String, Arc<Property>)>,
}

impl ClassBuilder {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            table: None,
            attributes: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declares `attr`; accepts an owned property or an already shared one
    pub fn property(mut self, attr: impl Into<String>, property: impl Into<Arc<Property>>) -> Self {
        self.attributes.push((attr.into(), property.into()));
        self
    }

    pub fn build(self) -> Result<MappedClass> {
        let table = match self.table {
            Some(table) if !table.is_empty() => table,
            _ => {
                warn!(class = %self.name, "Rejected class without a table");
                return Err(OrmError::ClassInfo(format!(
                    "{} has no table defined",
                    self.name
                )));
            }
        };

        for (i, (attr, property)) in self.attributes.iter().enumerate() {
            if self.attributes[..i].iter().any(|(other, _)| other == attr) {
                warn!(class = %self.name, attr = %attr, "Rejected duplicate attribute");
                return Err(OrmError::ClassInfo(format!(
                    "{} declares attribute '{}' twice",
                    self.name, attr
                )));
            }
            property.validate()?;
        }

        if !self.attributes.iter().any(|(_, p)| p.is_primary()) {
            warn!(class = %self.name, "Rejected class without a primary key");
            return Err(OrmError::ClassInfo(format!(
                "{} has no primary key information",
                self.name
            )));
        }

        debug!(
            class = %self.name,
            table = %table,
            attributes = self.attributes.len(),
            "Mapped class built"
        );
        Ok(MappedClass {
            module: self.module,
            name: self.name,
            table,
            attributes: self.attributes,
        })
    }
}
