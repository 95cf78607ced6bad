//! Test doubles and common utilities for contract tests
//!
//! The in-memory directory shipped with the core covers most needs. The
//! wrapper here adds a call journal so tests can assert which remote calls
//! an operation made, and in what order.

#![allow(dead_code)]

use async_trait::async_trait;
use ddi_core::error::Result;
use ddi_core::traits::{DirectoryClient, ObjectPayload, RemoteObject, SearchFilter};
use ddi_core::{AttributeMap, MemoryDirectory, Reconciler, Value};
use std::sync::{Arc, Mutex};

/// A remote call as seen by the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(String),
    Search(String),
    Create(String),
    Update(String),
    Delete(String),
}

/// MemoryDirectory wrapper that journals every call
#[derive(Clone, Default)]
pub struct RecordingDirectory {
    inner: MemoryDirectory,
    calls: Arc<Mutex<Vec<Call>>>,
    sent: Arc<Mutex<Vec<ObjectPayload>>>,
}

impl RecordingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped directory, for out-of-band edits
    pub fn inner(&self) -> &MemoryDirectory {
        &self.inner
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Payloads of every update call, in order
    pub fn update_payloads(&self) -> Vec<ObjectPayload> {
        self.sent.lock().unwrap().clone()
    }

    /// Forget recorded calls
    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
        self.sent.lock().unwrap().clear();
    }

    /// Number of mutating calls (create, update, delete)
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(_) | Call::Update(_) | Call::Delete(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DirectoryClient for RecordingDirectory {
    async fn fetch_by_ref(&self, type_name: &str, reference: &str) -> Result<RemoteObject> {
        self.record(Call::Fetch(reference.to_string()));
        self.inner.fetch_by_ref(type_name, reference).await
    }

    async fn search(&self, type_name: &str, filter: &SearchFilter) -> Result<Vec<RemoteObject>> {
        self.record(Call::Search(type_name.to_string()));
        self.inner.search(type_name, filter).await
    }

    async fn create(&self, type_name: &str, payload: &ObjectPayload) -> Result<RemoteObject> {
        self.record(Call::Create(type_name.to_string()));
        self.inner.create(type_name, payload).await
    }

    async fn update(
        &self,
        type_name: &str,
        reference: &str,
        payload: &ObjectPayload,
    ) -> Result<RemoteObject> {
        self.record(Call::Update(reference.to_string()));
        self.sent.lock().unwrap().push(payload.clone());
        self.inner.update(type_name, reference, payload).await
    }

    async fn delete(&self, type_name: &str, reference: &str) -> Result<String> {
        self.record(Call::Delete(reference.to_string()));
        self.inner.delete(type_name, reference).await
    }

    fn client_name(&self) -> &'static str {
        "recording"
    }
}

/// Reconciler over a fresh recording directory
pub fn recording_reconciler() -> (RecordingDirectory, Reconciler) {
    let dir = RecordingDirectory::new();
    let reconciler = Reconciler::new(Arc::new(dir.clone()));
    (dir, reconciler)
}

/// Reconciler over a fresh in-memory directory
pub fn memory_reconciler() -> (MemoryDirectory, Reconciler) {
    let dir = MemoryDirectory::new();
    let reconciler = Reconciler::new(Arc::new(dir.clone()));
    (dir, reconciler)
}

/// Build a string-valued attribute map
pub fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}
