use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::class::MappedClass;
use crate::event::{EmitReport, EventBus, HookArg};
use crate::exceptions::{OrmError, Result};

/// Per-instance state of a mapped object
///
/// Holds the current column values and the instance's [`EventBus`]. The bus
/// is owned by the object and refers back to it weakly, so hooks receive the
/// object itself as their first argument.
pub struct ObjectInfo {
    class: Arc<MappedClass>,
    variables: RwLock<HashMap<String, Value>>,
    event: EventBus<ObjectInfo>,
}

impl fmt::Debug for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectInfo")
            .field("class", &self.class.qualified_name())
            .field("variables", &*self.variables.read())
            .finish()
    }
}

impl ObjectInfo {
    pub fn new(class: Arc<MappedClass>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            class,
            variables: RwLock::new(HashMap::new()),
            event: EventBus::with_owner(this.clone()),
        })
    }

    pub fn class(&self) -> &Arc<MappedClass> {
        &self.class
    }

    pub fn event(&self) -> &EventBus<ObjectInfo> {
        &self.event
    }

    pub fn emit(&self, name: &str, args: &[HookArg]) -> EmitReport {
        self.event.emit(name, args)
    }

    /// Installs values as read from the database, then emits `"loaded"`
    ///
    /// Values are stored as-is (no enum translation, no change events).
    /// Unknown attributes are rejected before anything is stored.
    pub fn load(&self, values: impl IntoIterator<Item = (String, Value)>) -> Result<()> {
        let values: Vec<(String, Value)> = values.into_iter().collect();
        if let Some((attr, _)) = values
            .iter()
            .find(|(attr, _)| self.class.property(attr).is_none())
        {
            return Err(OrmError::ClassInfo(format!(
                "{} has no attribute '{}'",
                self.class.qualified_name(),
                attr
            )));
        }

        {
            let mut variables = self.variables.write();
            variables.extend(values);
        }

        debug!(class = %self.class.qualified_name(), "Object loaded");
        self.emit("loaded", &[]);
        Ok(())
    }

    /// Whether a value is currently stored for `attr`
    pub fn is_defined(&self, attr: &str) -> bool {
        self.variables.read().contains_key(attr)
    }

    pub(crate) fn variable(&self, attr: &str) -> Option<Value> {
        self.variables.read().get(attr).cloned()
    }

    pub(crate) fn store_variable(&self, attr: &str, value: Value) -> Option<Value> {
        self.variables.write().insert(attr.to_string(), value)
    }

    pub(crate) fn remove_variable(&self, attr: &str) -> Option<Value> {
        self.variables.write().remove(attr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Flow, HookFn};
    use crate::info::ClassBuilder;
    use crate::properties::{Property, PropertyAccess, PropertyKind};
    use serde_json::json;
    use std::sync::Mutex;

    fn order_class() -> Arc<MappedClass> {
        Arc::new(
            ClassBuilder::new("shop", "Order")
                .table("orders")
                .property("id", Property::new(PropertyKind::Int).primary().allow_none(false))
                .property(
                    "status",
                    Property::enumeration(vec![(json!("open"), json!(1)), (json!("paid"), json!(2))]),
                )
                .property(
                    "note",
                    Property::new(PropertyKind::Unicode).default_value(json!("n/a")),
                )
                .build()
                .unwrap(),
        )
    }

    fn recorder(obj: &ObjectInfo, event: &str) -> Arc<Mutex<Vec<Vec<HookArg>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook = HookFn::new("recorder", move |_: &ObjectInfo, args: &[HookArg]| {
            sink.lock().unwrap().push(args.to_vec());
            Ok(Flow::Continue)
        });
        obj.event().hook(event, &hook, vec![]);
        seen
    }

    #[test]
    fn test_hooks_receive_the_object_itself() {
        let obj = ObjectInfo::new(order_class());
        let seen_class = Arc::new(Mutex::new(None));
        let sink = seen_class.clone();
        let hook = HookFn::new("class-probe", move |owner: &ObjectInfo, _: &[HookArg]| {
            *sink.lock().unwrap() = Some(owner.class().qualified_name());
            Ok(Flow::Continue)
        });
        obj.event().hook("flushed", &hook, vec![]);

        obj.emit("flushed", &[]);

        assert_eq!(seen_class.lock().unwrap().as_deref(), Some("shop.Order"));
    }

    #[test]
    fn test_set_get_delete_round_through_accessors() {
        let class = order_class();
        let obj = ObjectInfo::new(class.clone());
        let changes = recorder(&obj, "changed");
        let status = class.property("status").unwrap();
        let note = class.property("note").unwrap();

        status.set(&obj, json!("paid")).unwrap();
        assert_eq!(obj.variable("status"), Some(json!(2)));
        assert_eq!(status.get(&obj).unwrap(), json!("paid"));

        assert_eq!(note.get(&obj).unwrap(), json!("n/a"));
        note.set(&obj, json!("gift")).unwrap();
        note.delete(&obj).unwrap();
        assert_eq!(note.get(&obj).unwrap(), json!("n/a"));
        assert!(!obj.is_defined("note"));

        let changes = changes.lock().unwrap();
        assert_eq!(
            changes.as_slice(),
            &[
                vec![HookArg::from("status"), HookArg::from(false)],
                vec![HookArg::from("note"), HookArg::from(false)],
                vec![HookArg::from("note"), HookArg::from(false)],
            ]
        );
    }

    #[test]
    fn test_set_rejects_none_and_unknown_enum_values() {
        let class = order_class();
        let obj = ObjectInfo::new(class.clone());

        let id = class.property("id").unwrap();
        assert!(matches!(id.set(&obj, Value::Null), Err(OrmError::NoneValue(_))));

        let status = class.property("status").unwrap();
        assert!(matches!(status.set(&obj, json!("void")), Err(OrmError::Value(_))));
        assert!(!obj.is_defined("status"));
    }

    #[test]
    fn test_property_from_another_class_is_rejected() {
        let obj = ObjectInfo::new(order_class());
        let stranger = Property::new(PropertyKind::Int);

        assert!(matches!(stranger.get(&obj), Err(OrmError::ClassInfo(_))));
    }

    #[test]
    fn test_load_stores_raw_values_and_emits_loaded() {
        let class = order_class();
        let obj = ObjectInfo::new(class.clone());
        let loaded = recorder(&obj, "loaded");
        let changed = recorder(&obj, "changed");

        obj.load([("id".to_string(), json!(7)), ("status".to_string(), json!(1))])
            .unwrap();

        assert_eq!(class.property("id").unwrap().get(&obj).unwrap(), json!(7));
        assert_eq!(class.property("status").unwrap().get(&obj).unwrap(), json!("open"));
        assert_eq!(loaded.lock().unwrap().len(), 1);
        assert!(changed.lock().unwrap().is_empty());

        let err = obj.load([("missing".to_string(), json!(1))]);
        assert!(matches!(err, Err(OrmError::ClassInfo(_))));
    }
}
