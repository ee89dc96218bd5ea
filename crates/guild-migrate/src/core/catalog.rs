//! Adapter catalog for explicit dependency injection.
//!
//! The [`AdapterCatalog`] maps a platform identifier to a factory that builds
//! the adapter from configuration. It is constructed at startup and handed to
//! whoever needs an adapter; there is no global registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapters::{MatrixAdapter, StoatAdapter};
use crate::config::Config;
use crate::error::{MigrateError, Result};

use super::traits::PlatformAdapter;

/// Builds an adapter from the loaded configuration.
pub type AdapterFactory =
    Arc<dyn Fn(&Config) -> Result<Arc<dyn PlatformAdapter>> + Send + Sync>;

/// Registry of destination platforms.
///
/// # Example
///
/// ```rust,ignore
/// let catalog = AdapterCatalog::with_builtins();
/// let adapter = catalog.create("stoat", &config)?;
/// let report = Orchestrator::new(adapter).run(snapshot).await;
/// ```
#[derive(Default)]
pub struct AdapterCatalog {
    factories: BTreeMap<String, AdapterFactory>,
}

impl AdapterCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with the built-in destinations registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register("stoat", |config| {
            let adapter = StoatAdapter::from_config(config.require_stoat()?, &config.migration)?;
            Ok(Arc::new(adapter) as Arc<dyn PlatformAdapter>)
        });
        catalog.register("matrix", |config| {
            let adapter =
                MatrixAdapter::from_config(config.require_matrix()?, &config.migration)?;
            Ok(Arc::new(adapter) as Arc<dyn PlatformAdapter>)
        });
        catalog
    }

    /// Register a factory under a platform identifier, replacing any
    /// previous registration. Identifiers are case-insensitive.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Config) -> Result<Arc<dyn PlatformAdapter>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Arc::new(factory));
    }

    /// Registered identifiers, sorted.
    pub fn platforms(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the adapter for `name`.
    pub fn create(&self, name: &str, config: &Config) -> Result<Arc<dyn PlatformAdapter>> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| MigrateError::UnknownPlatform {
                name: name.to_string(),
                available: self.platforms().join(", "),
            })?;
        factory(config)
    }
}
