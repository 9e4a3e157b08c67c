//! Adapter registry mapping target categories to adapter factories.
//!
//! The registry is populated once at startup (each adapter module
//! self-registers through [`AdapterRegistry::register`]) and is read-mostly
//! afterwards: lookups take a shared lock and may run concurrently from any
//! number of scenario runners.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use betakit_proto::{Adapter, Category, Error, Result};

/// Constructor for a fresh adapter instance of one category.
pub type AdapterFactory = fn() -> Box<dyn Adapter>;

/// Process-wide catalog of adapter factories keyed by category.
pub struct AdapterRegistry {
    factories: RwLock<HashMap<Category, AdapterFactory>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Binds `category` to `factory`.
    ///
    /// Fails with `Error::DuplicateCategory` if the category is already
    /// bound; the first registration is retained. Last-writer-wins is
    /// deliberately not supported, so a second registration can never
    /// silently shadow the first.
    pub fn register(&self, category: Category, factory: AdapterFactory) -> Result<()> {
        let mut factories = self.factories.write().expect("registry lock poisoned");
        if factories.contains_key(&category) {
            return Err(Error::DuplicateCategory(category.as_str().to_string()));
        }
        factories.insert(category, factory);
        Ok(())
    }

    /// Creates a fresh adapter instance for `category`.
    ///
    /// Fails with `Error::UnknownCategory` if nothing is registered for it.
    pub fn resolve(&self, category: Category) -> Result<Box<dyn Adapter>> {
        let factories = self.factories.read().expect("registry lock poisoned");
        match factories.get(&category) {
            Some(factory) => Ok(factory()),
            None => Err(Error::UnknownCategory(category.as_str().to_string())),
        }
    }

    /// Lists the registered categories, in no particular order.
    pub fn categories(&self) -> Vec<Category> {
        let factories = self.factories.read().expect("registry lock poisoned");
        factories.keys().copied().collect()
    }

    /// Returns true if `category` has a registered factory.
    pub fn is_registered(&self, category: Category) -> bool {
        let factories = self.factories.read().expect("registry lock poisoned");
        factories.contains_key(&category)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the process-wide registry handle.
///
/// The handle is created on first access; callers populate it once during
/// startup and only resolve afterwards.
pub fn global_registry() -> &'static AdapterRegistry {
    static REGISTRY: OnceLock<AdapterRegistry> = OnceLock::new();
    REGISTRY.get_or_init(AdapterRegistry::new)
}
