//! Core traits for the reconciliation layer
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DirectoryClient`]: CRUD and search against the remote directory
//! - [`RecordStore`]: Persistent storage of local resource records

pub mod directory;
pub mod record_store;

pub use directory::{
    DirectoryClient, DirectoryClientFactory, ObjectFields, ObjectPayload, RemoteObject,
    SearchFilter,
};
pub use record_store::{RecordStore, RecordStoreFactory};
