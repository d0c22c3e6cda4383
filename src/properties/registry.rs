use std::cmp::Reverse;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, instrument};

use super::property::Property;
use crate::info::MappedClass;

/// Errors raised when resolving a property path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyPathError {
    #[error("Path '{0}' matches no known property.")]
    PropertyNotFound(String),

    #[error("Path '{name}' matches multiple properties: {}", .candidates.join(", "))]
    AmbiguousProperty {
        name: String,
        /// Fully-qualified paths of the competing properties, in key order
        candidates: Vec<String>,
    },
}

struct Entry {
    /// Reversed dotted path with a trailing dot, e.g. `id.Order.models.shop.`
    key: String,
    property: Weak<Property>,
}

pub(crate) struct RegistryInner {
    /// Sorted ascending by key.
    entries: RwLock<Vec<Entry>>,
}

impl RegistryInner {
    /// Removes the entry for `key` that points at `property`
    ///
    /// Called from `Drop for Property`, when the property can no longer be
    /// upgraded, so identity is compared by address.
    pub(crate) fn remove(&self, key: &str, property: *const Property) {
        let mut entries = self.entries.write();
        let start = entries.partition_point(|e| e.key.as_str() < key);
        let found = entries[start..]
            .iter()
            .take_while(|e| e.key == key)
            .position(|e| std::ptr::eq(e.property.as_ptr(), property));

        if let Some(offset) = found {
            entries.remove(start + offset);
            debug!(path = %display_path(key), "Property dropped - registry entry removed");
        }
    }

    /// Whether the entry for `key` pointing at `property` is still present
    pub(crate) fn contains(&self, key: &str, property: *const Property) -> bool {
        let entries = self.entries.read();
        let start = entries.partition_point(|e| e.key.as_str() < key);
        entries[start..]
            .iter()
            .take_while(|e| e.key == key)
            .any(|e| std::ptr::eq(e.property.as_ptr(), property))
    }
}

/// Record kept by a property of every registry it was added to, so the
/// property can remove itself when dropped.
pub(crate) struct Registration {
    pub(crate) registry: Weak<RegistryInner>,
    pub(crate) key: String,
}

impl Registration {
    pub(crate) fn same_as(&self, other: &Registration) -> bool {
        self.key == other.key && self.registry.ptr_eq(&other.registry)
    }
}

/// Remembers the properties declared on mapped classes and translates
/// names like `"id"`, `"Order.id"` or `"shop.models.Order.id"` into them
///
/// Paths are stored reversed (`id.Order.models.shop.`) in a sorted vector,
/// so matching on trailing path components becomes a prefix search that
/// starts with a binary search. Properties are held weakly: a dropped
/// property removes its own entries, and lookups skip any entry whose
/// property is already gone.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct PropertyRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

impl PropertyRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Registers `property` under its fully-qualified dotted path
    ///
    /// Adding the same property under the same path again is a no-op.
    pub fn add(&self, property: &Arc<Property>, path: &str) {
        let key = search_key(path);
        let handle = Arc::downgrade(property);

        {
            let mut entries = self.inner.entries.write();
            let start = entries.partition_point(|e| e.key < key);
            let duplicate = entries[start..]
                .iter()
                .take_while(|e| e.key == key)
                .any(|e| e.property.ptr_eq(&handle));
            if duplicate {
                debug!(path = %path, "Property already registered");
                return;
            }
            entries.insert(
                start,
                Entry {
                    key: key.clone(),
                    property: handle,
                },
            );
        }

        property.record_registration(Registration {
            registry: Arc::downgrade(&self.inner),
            key,
        });
        debug!(path = %path, "Property registered");
    }

    /// Registers every property declared on `class`
    #[instrument(skip(self, class), fields(class = %class.qualified_name()))]
    pub fn add_class(&self, class: &MappedClass) {
        for (attr, property) in class.attributes() {
            self.add(property, &class.path_of(attr));
        }
    }

    /// Registers a single property of `class` under `attr_name`
    pub fn add_property(&self, class: &MappedClass, property: &Arc<Property>, attr_name: &str) {
        self.add(property, &class.path_of(attr_name));
    }

    /// Translates a property name path into the property it names
    ///
    /// `name` may be just the attribute (`"id"`), class and attribute
    /// (`"Order.id"`) or the full path. When `namespace` is given, names
    /// are disambiguated by picking the property whose path shares the
    /// most leading segments with it; `get("Order.id", Some("a.b.c"))`
    /// picks `a.Order.id` over `d.Order.id`. Among equally close matches
    /// the shortest path wins. An empty namespace counts as none.
    pub fn get(
        &self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Arc<Property>, PropertyPathError> {
        let key = search_key(name);

        // Strong handles must outlive the read guard: dropping the last one
        // runs Property::drop, which takes the write lock.
        let candidates: Vec<(String, Arc<Property>)> = {
            let entries = self.inner.entries.read();
            let start = entries.partition_point(|e| e.key < key);
            entries[start..]
                .iter()
                .take_while(|e| e.key.starts_with(&key))
                .filter_map(|e| e.property.upgrade().map(|p| (e.key.clone(), p)))
                .collect()
        };

        let mut best = match namespace.filter(|ns| !ns.is_empty()) {
            None => candidates,
            Some(namespace) => closest_to_namespace(candidates, namespace),
        };

        match best.len() {
            0 => {
                debug!(name = %name, "No property matches path");
                Err(PropertyPathError::PropertyNotFound(name.to_string()))
            }
            1 => Ok(best.swap_remove(0).1),
            _ => {
                let candidates: Vec<String> =
                    best.iter().map(|(key, _)| display_path(key)).collect();
                debug!(name = %name, ?candidates, "Ambiguous property path");
                Err(PropertyPathError::AmbiguousProperty {
                    name: name.to_string(),
                    candidates,
                })
            }
        }
    }

    /// Removes every entry
    pub fn clear(&self) {
        let mut entries = self.inner.entries.write();
        let removed = entries.len();
        entries.clear();
        debug!(removed, "Property registry cleared");
    }

    /// Removes entries whose property has already been dropped, returning
    /// how many were removed
    pub fn prune(&self) -> usize {
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|e| e.property.strong_count() > 0);
        before - entries.len()
    }

    /// Number of entries, including any not yet pruned
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fully-qualified paths of the live properties, in key order
    pub fn paths(&self) -> Vec<String> {
        let entries = self.inner.entries.read();
        entries
            .iter()
            .filter(|e| e.property.strong_count() > 0)
            .map(|e| display_path(&e.key))
            .collect()
    }
}

/// Keeps only the candidates whose path is closest to `namespace`
///
/// Closeness is `(most shared leading segments, fewest remaining segments)`.
fn closest_to_namespace(
    candidates: Vec<(String, Arc<Property>)>,
    namespace: &str,
) -> Vec<(String, Arc<Property>)> {
    let namespace_parts: Vec<&str> = namespace.split('.').collect();
    let mut best_score = None;
    let mut best = Vec::new();

    for (key, property) in candidates {
        let path_parts: Vec<&str> = key.trim_end_matches('.').rsplit('.').collect();
        let common = path_parts
            .iter()
            .zip(&namespace_parts)
            .take_while(|(part, ns_part)| part == ns_part)
            .count();
        let score = (Reverse(common), path_parts.len() - common);

        match best_score {
            Some(current) if score > current => {}
            Some(current) if score == current => best.push((key, property)),
            _ => {
                best_score = Some(score);
                best.clear();
                best.push((key, property));
            }
        }
    }

    best
}

/// `shop.models.Order.id` -> `id.Order.models.shop.`
fn search_key(path: &str) -> String {
    let mut key = path.rsplit('.').collect::<Vec<_>>().join(".");
    key.push('.');
    key
}

/// `id.Order.models.shop.` -> `shop.models.Order.id`
fn display_path(key: &str) -> String {
    key.strip_suffix('.')
        .unwrap_or(key)
        .rsplit('.')
        .collect::<Vec<_>>()
        .join(".")
}
