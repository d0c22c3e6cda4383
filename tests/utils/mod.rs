pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use mocks::{CountingHook, Owner};
#[allow(unused_imports)]
pub use setup::{init_tracing, Catalog, CatalogBuilder};
