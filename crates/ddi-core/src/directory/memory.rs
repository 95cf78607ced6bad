// # Memory Directory
//
// In-memory implementation of DirectoryClient.
//
// ## Purpose
//
// Stands in for a real directory in tests and demos. Besides the client
// operations it exposes out-of-band helpers that mimic other tools editing
// the directory: renaming objects (reference rotation), adding or removing
// attributes, and inserting raw objects.
//
// ## References
//
// References look like `<type>/<hex sequence>`. Every rename and every
// update that changes the `name` field issues a fresh sequence number, so
// the old reference stops resolving.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::Error;
use crate::attrs::{AttributeMap, Value};
use crate::traits::{
    DirectoryClient, DirectoryClientFactory, ObjectPayload, RemoteObject, SearchFilter,
};

/// In-memory directory
///
/// Cloning shares the underlying objects and counters.
///
/// # Example
///
/// ```rust,no_run
/// use ddi_core::directory::MemoryDirectory;
/// use ddi_core::traits::{DirectoryClient, ObjectPayload};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let dir = MemoryDirectory::new();
///     let object = dir.create("record:host", &ObjectPayload::default()).await?;
///
///     // Another tool renames the object
///     let new_ref = dir.rename(&object.reference).await?;
///     assert_ne!(new_ref, object.reference);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    objects: Arc<RwLock<BTreeMap<String, RemoteObject>>>,
    sequence: Arc<AtomicU64>,
    counters: Arc<CallCounters>,
    failures: Arc<Mutex<HashMap<String, String>>>,
}

#[derive(Debug, Default)]
struct CallCounters {
    fetch: AtomicUsize,
    search: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

impl MemoryDirectory {
    /// Create a new empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects stored
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Check if the directory is empty
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Look at an object without going through the client interface
    pub async fn get(&self, reference: &str) -> Option<RemoteObject> {
        self.objects.read().await.get(reference).cloned()
    }

    /// Out-of-band rename: move an object to a fresh reference
    ///
    /// # Returns
    ///
    /// The new reference.
    pub async fn rename(&self, reference: &str) -> Result<String, Error> {
        let mut objects = self.objects.write().await;
        let mut object = objects
            .remove(reference)
            .ok_or_else(|| Error::not_found(format!("no object at {}", reference)))?;

        object.reference = self.next_reference(&object.type_name);
        let new_ref = object.reference.clone();
        objects.insert(new_ref.clone(), object);

        tracing::debug!(from = reference, to = %new_ref, "renamed object out of band");
        Ok(new_ref)
    }

    /// Out-of-band attribute write, as another tool would do
    pub async fn set_attribute(
        &self,
        reference: &str,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), Error> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(reference)
            .ok_or_else(|| Error::not_found(format!("no object at {}", reference)))?;
        object.attributes.insert(key.into(), value.into());
        Ok(())
    }

    /// Out-of-band attribute removal
    pub async fn remove_attribute(&self, reference: &str, key: &str) -> Result<(), Error> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(reference)
            .ok_or_else(|| Error::not_found(format!("no object at {}", reference)))?;
        object.attributes.remove(key);
        Ok(())
    }

    /// Insert an object without counting it as a client call
    ///
    /// # Returns
    ///
    /// The reference of the inserted object.
    pub async fn insert_raw(&self, type_name: &str, attributes: AttributeMap) -> String {
        let reference = self.next_reference(type_name);
        let object = RemoteObject {
            reference: reference.clone(),
            type_name: type_name.to_string(),
            fields: Default::default(),
            attributes,
        };
        self.objects.write().await.insert(reference.clone(), object);
        reference
    }

    /// Out-of-band delete
    pub async fn remove(&self, reference: &str) -> Option<RemoteObject> {
        self.objects.write().await.remove(reference)
    }

    /// Make the next call of an operation fail with a remote error
    ///
    /// `operation` is one of `fetch_by_ref`, `search`, `create`, `update`,
    /// `delete`.
    pub fn fail_next(&self, operation: &str, message: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(operation.to_string(), message.to_string());
        }
    }

    /// Number of `fetch_by_ref` calls
    pub fn fetch_count(&self) -> usize {
        self.counters.fetch.load(Ordering::SeqCst)
    }

    /// Number of `search` calls
    pub fn search_count(&self) -> usize {
        self.counters.search.load(Ordering::SeqCst)
    }

    /// Number of `create` calls
    pub fn create_count(&self) -> usize {
        self.counters.create.load(Ordering::SeqCst)
    }

    /// Number of `update` calls
    pub fn update_count(&self) -> usize {
        self.counters.update.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls
    pub fn delete_count(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    fn next_reference(&self, type_name: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}/{:x}", type_name, seq)
    }

    fn take_failure(&self, operation: &str) -> Result<(), Error> {
        let injected = self
            .failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.remove(operation));
        match injected {
            Some(message) => Err(Error::remote("memory", message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DirectoryClient for MemoryDirectory {
    async fn fetch_by_ref(&self, type_name: &str, reference: &str) -> Result<RemoteObject, Error> {
        self.counters.fetch.fetch_add(1, Ordering::SeqCst);
        self.take_failure("fetch_by_ref")?;

        self.objects
            .read()
            .await
            .get(reference)
            .filter(|o| o.type_name == type_name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{} {}", type_name, reference)))
    }

    async fn search(
        &self,
        type_name: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<RemoteObject>, Error> {
        self.counters.search.fetch_add(1, Ordering::SeqCst);
        self.take_failure("search")?;

        Ok(self
            .objects
            .read()
            .await
            .values()
            .filter(|o| o.type_name == type_name && filter.matches(&o.attributes))
            .cloned()
            .collect())
    }

    async fn create(&self, type_name: &str, payload: &ObjectPayload) -> Result<RemoteObject, Error> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        self.take_failure("create")?;

        let object = RemoteObject {
            reference: self.next_reference(type_name),
            type_name: type_name.to_string(),
            fields: payload.fields.clone(),
            attributes: payload.attributes.clone(),
        };

        self.objects
            .write()
            .await
            .insert(object.reference.clone(), object.clone());
        Ok(object)
    }

    async fn update(
        &self,
        type_name: &str,
        reference: &str,
        payload: &ObjectPayload,
    ) -> Result<RemoteObject, Error> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        self.take_failure("update")?;

        let mut objects = self.objects.write().await;
        if !objects.get(reference).is_some_and(|o| o.type_name == type_name) {
            return Err(Error::not_found(format!("{} {}", type_name, reference)));
        }
        let mut object = objects
            .remove(reference)
            .ok_or_else(|| Error::not_found(format!("{} {}", type_name, reference)))?;

        // Directories key references on the object name, so a rename rotates it
        let renamed = payload.fields.get("name").is_some_and(|name| {
            object.fields.get("name").is_some_and(|current| current != name)
        });
        if renamed {
            object.reference = self.next_reference(type_name);
        }

        for (key, value) in &payload.fields {
            object.fields.insert(key.clone(), value.clone());
        }
        object.attributes = payload.attributes.clone();
        objects.insert(object.reference.clone(), object.clone());
        Ok(object)
    }

    async fn delete(&self, type_name: &str, reference: &str) -> Result<String, Error> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        self.take_failure("delete")?;

        let mut objects = self.objects.write().await;
        match objects.get(reference) {
            Some(o) if o.type_name == type_name => {
                objects.remove(reference);
                Ok(reference.to_string())
            }
            _ => Err(Error::not_found(format!("{} {}", type_name, reference))),
        }
    }

    fn client_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating in-memory directories
pub struct MemoryDirectoryFactory;

impl DirectoryClientFactory for MemoryDirectoryFactory {
    fn create(
        &self,
        config: &crate::config::ClientConfig,
    ) -> Result<Arc<dyn DirectoryClient>, Error> {
        match config {
            crate::config::ClientConfig::Memory => Ok(Arc::new(MemoryDirectory::new())),
            _ => Err(Error::config("Invalid config for memory directory")),
        }
    }
}
