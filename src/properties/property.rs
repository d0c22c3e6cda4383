use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::registry::Registration;
use crate::event::HookArg;
use crate::exceptions::{OrmError, Result};
use crate::info::ObjectInfo;

/// The column type a property maps to
///
/// Value coercion belongs to the variable layer; the kind is carried as
/// metadata, except for enums, whose value maps are applied on access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    Decimal,
    Bytes,
    Unicode,
    DateTime,
    Date,
    Time,
    TimeDelta,
    Uuid,
    Pickle,
    Json,
    List {
        item: Box<PropertyKind>,
    },
    /// Values seen by the application differ from the stored ones
    Enum {
        /// stored -> application
        get_map: Vec<(Value, Value)>,
        /// application -> stored
        set_map: Vec<(Value, Value)>,
    },
}

/// A mapped attribute backed by a database column
pub struct Property {
    column: Option<String>,
    primary: bool,
    kind: PropertyKind,
    default: Option<Value>,
    allow_none: bool,
    registrations: Mutex<Vec<Registration>>,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("column", &self.column)
            .field("primary", &self.primary)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("allow_none", &self.allow_none)
            .finish()
    }
}

impl Property {
    pub fn new(kind: PropertyKind) -> Self {
        Self {
            column: None,
            primary: false,
            kind,
            default: None,
            allow_none: true,
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// A list column whose elements are of kind `item`
    pub fn list(item: PropertyKind) -> Self {
        Self::new(PropertyKind::List {
            item: Box::new(item),
        })
    }

    /// An enum column; `map` pairs application values with stored values
    pub fn enumeration(map: Vec<(Value, Value)>) -> Self {
        let get_map = map.iter().map(|(k, v)| (v.clone(), k.clone())).collect();
        Self::new(PropertyKind::Enum {
            get_map,
            set_map: map,
        })
    }

    /// Accept a different set of application values when setting
    ///
    /// Reads still go through the map given to [`Property::enumeration`].
    /// Has no effect on non-enum kinds.
    pub fn with_set_map(mut self, map: Vec<(Value, Value)>) -> Self {
        if let PropertyKind::Enum { set_map, .. } = &mut self.kind {
            *set_map = map;
        }
        self
    }

    /// Column name to use instead of the attribute name
    pub fn named(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn allow_none(mut self, allow: bool) -> Self {
        self.allow_none = allow;
        self
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Column name for this property when bound to attribute `attr`
    pub fn column_name<'a>(&'a self, attr: &'a str) -> &'a str {
        self.column.as_deref().unwrap_or(attr)
    }

    /// Checks the property configuration before it is bound to a class
    pub fn validate(&self) -> Result<()> {
        if matches!(self.kind, PropertyKind::List { .. }) && self.default.is_some() {
            warn!(column = ?self.column, "Rejected default on list property");
            return Err(OrmError::Value(
                "'default' not allowed for List. Use a default factory instead.".to_string(),
            ));
        }
        Ok(())
    }

    /// Records `registration`, forgetting records whose registry is gone or
    /// no longer holds this property under that key
    pub(crate) fn record_registration(&self, registration: Registration) {
        let this: *const Property = self;
        let mut registrations = self.registrations.lock();
        registrations.retain(|r| {
            !r.same_as(&registration)
                && r
                    .registry
                    .upgrade()
                    .is_some_and(|registry| registry.contains(&r.key, this))
        });
        registrations.push(registration);
    }

    #[cfg(test)]
    pub(crate) fn registration_count(&self) -> usize {
        self.registrations.lock().len()
    }

    fn attribute_in<'a>(&self, obj: &'a ObjectInfo) -> Result<&'a str> {
        obj.class().attribute_of(self).ok_or_else(|| {
            OrmError::ClassInfo(format!(
                "Property used in an unknown class: {}",
                obj.class().qualified_name()
            ))
        })
    }

    fn to_stored(&self, value: Value) -> Result<Value> {
        match &self.kind {
            PropertyKind::Enum { set_map, .. } if !value.is_null() => lookup(set_map, &value),
            _ => Ok(value),
        }
    }

    fn from_stored(&self, value: Value) -> Result<Value> {
        match &self.kind {
            PropertyKind::Enum { get_map, .. } if !value.is_null() => lookup(get_map, &value),
            _ => Ok(value),
        }
    }
}

fn lookup(map: &[(Value, Value)], value: &Value) -> Result<Value> {
    map.iter()
        .find(|(from, _)| from == value)
        .map(|(_, to)| to.clone())
        .ok_or_else(|| OrmError::Value(format!("Invalid enum value: {value}")))
}

impl Drop for Property {
    fn drop(&mut self) {
        let this: *const Property = self;
        for registration in self.registrations.get_mut().drain(..) {
            if let Some(registry) = registration.registry.upgrade() {
                registry.remove(&registration.key, this);
            }
        }
    }
}

/// Explicit attribute access on a mapped object
///
/// The object-mapping layer calls these instead of intercepting attribute
/// access on the instance.
pub trait PropertyAccess {
    fn get(&self, obj: &ObjectInfo) -> Result<Value>;
    fn set(&self, obj: &ObjectInfo, value: Value) -> Result<()>;
    fn delete(&self, obj: &ObjectInfo) -> Result<()>;
}

impl PropertyAccess for Property {
    /// Stored value, falling back to the default and then to `Null`
    fn get(&self, obj: &ObjectInfo) -> Result<Value> {
        let attr = self.attribute_in(obj)?;
        match obj.variable(attr) {
            Some(value) => self.from_stored(value),
            None => Ok(self.default.clone().unwrap_or(Value::Null)),
        }
    }

    fn set(&self, obj: &ObjectInfo, value: Value) -> Result<()> {
        let attr = self.attribute_in(obj)?;
        if value.is_null() && !self.allow_none {
            return Err(OrmError::NoneValue(format!(
                "None isn't acceptable as a value for {}.{}",
                obj.class().name(),
                attr
            )));
        }
        let stored = self.to_stored(value)?;
        obj.store_variable(attr, stored);
        obj.emit("changed", &[HookArg::from(attr), HookArg::from(false)]);
        Ok(())
    }

    fn delete(&self, obj: &ObjectInfo) -> Result<()> {
        let attr = self.attribute_in(obj)?;
        if obj.remove_variable(attr).is_some() {
            obj.emit("changed", &[HookArg::from(attr), HookArg::from(false)]);
        }
        Ok(())
    }
}
