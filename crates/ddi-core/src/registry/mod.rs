//! Plugin-based client registry
//!
//! The registry maps client and record store type names to factories, so the
//! concrete directory client is picked from configuration instead of
//! hardcoded if-else chains. It is an ordinary value: build one, register
//! what you need, pass it by reference.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddi_core::registry::ClientRegistry;
//! use ddi_core::config::ClientConfig;
//!
//! let registry = ClientRegistry::with_builtins();
//! ddi_client_wapi::register(&registry);
//!
//! let client = registry.create_client(&config.client)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::{ClientConfig, RecordStoreConfig};
use crate::directory::MemoryDirectoryFactory;
use crate::error::{Error, Result};
use crate::state::{FileRecordStoreFactory, MemoryRecordStoreFactory};
use crate::traits::{DirectoryClient, DirectoryClientFactory, RecordStore, RecordStoreFactory};

/// Registry of directory client and record store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Arc<dyn DirectoryClientFactory>>>,
    record_stores: RwLock<HashMap<String, Arc<dyn RecordStoreFactory>>>,
}

impl ClientRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the in-memory client and both record stores
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_client("memory", Box::new(MemoryDirectoryFactory));
        registry.register_record_store("memory", Box::new(MemoryRecordStoreFactory));
        registry.register_record_store("file", Box::new(FileRecordStoreFactory));
        registry
    }

    /// Register a directory client factory
    ///
    /// # Parameters
    ///
    /// - `name`: Client type name (e.g., "wapi", "memory")
    /// - `factory`: Factory object for creating client instances
    pub fn register_client(&self, name: impl Into<String>, factory: Box<dyn DirectoryClientFactory>) {
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(name.into(), Arc::from(factory));
        }
    }

    /// Register a record store factory
    pub fn register_record_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RecordStoreFactory>,
    ) {
        if let Ok(mut stores) = self.record_stores.write() {
            stores.insert(name.into(), Arc::from(factory));
        }
    }

    /// Create a directory client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn DirectoryClient>)`: Created client instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_client(&self, config: &ClientConfig) -> Result<Arc<dyn DirectoryClient>> {
        config.validate()?;
        let client_type = config.type_name();

        let factory = self
            .clients
            .read()
            .map_err(|_| Error::Other("client registry lock poisoned".to_string()))?
            .get(client_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown client type: {}", client_type)))?;

        factory.create(config)
    }

    /// Create a record store from configuration
    pub async fn create_record_store(
        &self,
        config: &RecordStoreConfig,
    ) -> Result<Box<dyn RecordStore>> {
        config.validate()?;
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = self
            .record_stores
            .read()
            .map_err(|_| Error::Other("record store registry lock poisoned".to_string()))?
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown record store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// List all registered client types
    pub fn list_clients(&self) -> Vec<String> {
        self.clients
            .read()
            .map(|clients| clients.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if a client type is registered
    pub fn has_client(&self, name: &str) -> bool {
        self.clients
            .read()
            .map(|clients| clients.contains_key(name))
            .unwrap_or(false)
    }

    /// Check if a record store type is registered
    pub fn has_record_store(&self, name: &str) -> bool {
        self.record_stores
            .read()
            .map(|stores| stores.contains_key(name))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockClientFactory;

    impl DirectoryClientFactory for MockClientFactory {
        fn create(&self, _config: &ClientConfig) -> Result<Arc<dyn DirectoryClient>> {
            Err(Error::not_found("Mock client not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ClientRegistry::new();
        assert!(!registry.has_client("mock"));

        registry.register_client("mock", Box::new(MockClientFactory));

        assert!(registry.has_client("mock"));
        assert!(registry.list_clients().contains(&"mock".to_string()));
    }

    #[test]
    fn test_builtins_create_memory_client() {
        let registry = ClientRegistry::with_builtins();
        let client = registry.create_client(&ClientConfig::Memory).unwrap();
        assert_eq!(client.client_name(), "memory");
        assert!(registry.has_record_store("file"));
    }

    #[test]
    fn test_unknown_client_type() {
        let registry = ClientRegistry::new();
        let err = registry.create_client(&ClientConfig::Memory).err().unwrap();
        assert!(err.to_string().contains("Unknown client type"));
    }

    #[tokio::test]
    async fn test_create_record_store() {
        let registry = ClientRegistry::with_builtins();
        let store = registry
            .create_record_store(&RecordStoreConfig::Memory)
            .await
            .unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
