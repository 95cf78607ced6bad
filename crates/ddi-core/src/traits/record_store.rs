// # Record Store Trait
//
// Defines the interface for persistent storage of local resource records.
//
// ## Purpose
//
// The record store is the declarative side's memory between reconciliation
// passes. For each managed resource it keeps:
// - The identity token
// - The last known remote reference
// - The last applied fields and desired attributes
//
// Losing a record means losing ownership: the next pass would create a new
// object instead of finding the existing one.
//
// ## Implementations
//
// - Memory: `MemoryRecordStore` (tests, ephemeral runs)
// - File: `FileRecordStore` (JSON with atomic writes and backup recovery)
//
// ## Usage
//
// ```rust,ignore
// use ddi_core::RecordStore;
//
// let record = reconciler.create(request).await?;
// store.put("web-host", &record).await?;
//
// let mut record = store.get("web-host").await?.expect("tracked");
// reconciler.update(&mut record, spec).await?;
// store.put("web-host", &record).await?;
// ```

use async_trait::async_trait;

use crate::record::ResourceRecord;

/// Trait for record store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Implementation Guidelines
///
/// - **Async I/O only**: Use async file/database operations, never blocking I/O
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **No business logic**: Stores never talk to the directory
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a record by its local resource name
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ResourceRecord))`: The stored record
    /// - `Ok(None)`: No record found
    /// - `Err(Error)`: Storage error
    async fn get(&self, name: &str) -> Result<Option<ResourceRecord>, crate::Error>;

    /// Create or replace a record
    async fn put(&self, name: &str, record: &ResourceRecord) -> Result<(), crate::Error>;

    /// Delete a record
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Successfully deleted (or didn't exist)
    /// - `Err(Error)`: Storage error
    async fn delete(&self, name: &str) -> Result<(), crate::Error>;

    /// List all local resource names in the store
    async fn list(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing record stores from configuration
#[async_trait]
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::RecordStoreConfig,
    ) -> Result<Box<dyn RecordStore>, crate::Error>;
}
