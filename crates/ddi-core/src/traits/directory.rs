// # Directory Client Trait
//
// Defines the interface to the remote network-services directory.
//
// ## Implementations
//
// - In-memory: `ddi_core::directory::MemoryDirectory` (tests, demos)
// - WAPI-style REST: `ddi-client-wapi` crate
//
// ## Usage
//
// ```rust,ignore
// use ddi_core::DirectoryClient;
//
// let object = client.fetch_by_ref("record:host", "record:host/ZG5z:web.lab").await?;
// println!("{} has {} attributes", object.reference, object.attributes.len());
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::attrs::{AttributeMap, Value};

/// Per-type scalar/list fields of an object (everything but the attribute bag)
pub type ObjectFields = serde_json::Map<String, serde_json::Value>;

/// An object as returned by the remote directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Server-assigned reference (mutable across the object's lifetime)
    pub reference: String,
    /// Object type (e.g., "record:host")
    pub type_name: String,
    /// Per-type fields
    #[serde(default)]
    pub fields: ObjectFields,
    /// Attribute bag, identity entry included
    #[serde(default)]
    pub attributes: AttributeMap,
}

/// Body of a create or update call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectPayload {
    /// Per-type fields to set
    pub fields: ObjectFields,
    /// Complete attribute bag to store
    pub attributes: AttributeMap,
}

/// Attribute equality filter for searches
///
/// Every entry must match (logical AND).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Attribute key → required value
    pub attributes: BTreeMap<String, Value>,
}

impl SearchFilter {
    /// Filter on a single attribute value
    pub fn attribute(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(key.into(), value.into());
        Self { attributes }
    }

    /// Whether an attribute bag satisfies this filter
    pub fn matches(&self, attrs: &AttributeMap) -> bool {
        self.attributes
            .iter()
            .all(|(key, value)| attrs.get(key) == Some(value))
    }
}

/// Trait for directory client implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// Clients own transport, authentication and retries of transient network
/// failures. They don't resolve identities, merge attributes or decide
/// whether an update is needed; that is the reconciler's job.
///
/// # Not Found
///
/// `fetch_by_ref` on a missing object must return `Error::NotFound`. The
/// resolver relies on this to fall back to an identity search. Every other
/// failure should be an `Error::Remote`.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Fetch an object by its reference
    ///
    /// # Returns
    ///
    /// - `Ok(RemoteObject)`: The object
    /// - `Err(Error::NotFound)`: No object with this reference
    /// - `Err(Error)`: Any other failure
    async fn fetch_by_ref(
        &self,
        type_name: &str,
        reference: &str,
    ) -> Result<RemoteObject, crate::Error>;

    /// Search objects of a type by attribute values
    ///
    /// # Returns
    ///
    /// All matching objects; an empty vector when none match.
    async fn search(
        &self,
        type_name: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<RemoteObject>, crate::Error>;

    /// Create an object
    async fn create(
        &self,
        type_name: &str,
        payload: &ObjectPayload,
    ) -> Result<RemoteObject, crate::Error>;

    /// Update an object
    ///
    /// A partial update: only the fields present in the payload change, the
    /// rest keep their current value. The attribute bag is replaced whole.
    ///
    /// The returned object may carry a new reference.
    async fn update(
        &self,
        type_name: &str,
        reference: &str,
        payload: &ObjectPayload,
    ) -> Result<RemoteObject, crate::Error>;

    /// Delete an object
    ///
    /// # Returns
    ///
    /// The reference of the deleted object.
    async fn delete(&self, type_name: &str, reference: &str) -> Result<String, crate::Error>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}

/// Helper trait for constructing directory clients from configuration
pub trait DirectoryClientFactory: Send + Sync {
    /// Create a DirectoryClient instance from configuration
    fn create(
        &self,
        config: &crate::config::ClientConfig,
    ) -> Result<std::sync::Arc<dyn DirectoryClient>, crate::Error>;
}
