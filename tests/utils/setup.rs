use std::sync::{Arc, Once};

use storm_core::{ClassBuilder, MappedClass, Property, PropertyKind, PropertyPublisher};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

static TRACING: Once = Once::new();

/// Routes crate logs to the test output; honours `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "storm_core=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A publisher together with the classes defined through it
pub struct Catalog {
    pub publisher: PropertyPublisher,
    pub classes: Vec<Arc<MappedClass>>,
}

#[allow(dead_code)]
impl Catalog {
    pub fn class(&self, qualified_name: &str) -> &Arc<MappedClass> {
        self.classes
            .iter()
            .find(|c| c.qualified_name() == qualified_name)
            .unwrap_or_else(|| panic!("class {qualified_name} not defined"))
    }

    pub fn property(&self, path: &str) -> &Arc<Property> {
        let (class, attr) = path.rsplit_once('.').expect("path has a class part");
        self.class(class)
            .property(attr)
            .unwrap_or_else(|| panic!("{path} not declared"))
    }
}

pub struct CatalogBuilder {
    classes: Vec<(String, String, Vec<&'static str>)>,
}

#[allow(dead_code)]
impl CatalogBuilder {
    pub fn new() -> Self {
        Self { classes: vec![] }
    }

    /// Declares `module.Name` with an integer primary key `id` plus the
    /// given unicode attributes
    pub fn with_class(mut self, module: &str, name: &str, attrs: Vec<&'static str>) -> Self {
        self.classes
            .push((module.to_string(), name.to_string(), attrs));
        self
    }

    /// `a.Order` and `b.Order`, both declaring `name`
    pub fn with_competing_orders(self) -> Self {
        self.with_class("a", "Order", vec!["name"])
            .with_class("b", "Order", vec!["name"])
    }

    pub fn build(self) -> Catalog {
        init_tracing();
        let publisher = PropertyPublisher::new();
        let classes = self
            .classes
            .into_iter()
            .map(|(module, name, attrs)| {
                let table = name.to_lowercase();
                let builder = attrs.into_iter().fold(
                    ClassBuilder::new(module, name)
                        .table(table)
                        .property("id", Property::new(PropertyKind::Int).primary()),
                    |builder, attr| builder.property(attr, Property::new(PropertyKind::Unicode)),
                );
                publisher.define(builder).expect("class should build")
            })
            .collect();

        Catalog { publisher, classes }
    }
}
