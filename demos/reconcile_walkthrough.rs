//! Walkthrough of the reconciliation core against an in-memory directory
//!
//! Plays the create → external edit → reconcile → rename → change → delete
//! sequence and prints the remote attribute bag after every step.
//!
//! ```bash
//! DDI_LOG_LEVEL=debug cargo run --bin reconcile_walkthrough
//! ```

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, bail};
use ddi_core::traits::RecordStore;
use ddi_core::{
    AttributeMap, ClientRegistry, CreateRequest, DeleteOutcome, MemoryDirectory,
    MemoryRecordStore, ReadOutcome, Reconciler, ResourceSpec, Value,
};

fn init_logging() {
    let level = std::env::var("DDI_LOG_LEVEL")
        .ok()
        .and_then(|raw| tracing::Level::from_str(&raw).ok())
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt().with_max_level(level).init();
}

fn site(value: &str) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.insert("site".to_string(), Value::from(value));
    attrs
}

async fn show(dir: &MemoryDirectory, reference: &str, step: &str) -> anyhow::Result<()> {
    let object = dir
        .get(reference)
        .await
        .with_context(|| format!("no object at {reference}"))?;
    let bag: serde_json::Map<String, serde_json::Value> = object
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    tracing::info!("{step}: {reference} -> {}", serde_json::Value::Object(bag));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let registry = ClientRegistry::with_builtins();
    ddi_client_wapi::register(&registry);
    tracing::info!("registered clients: {:?}", registry.list_clients());

    let dir = MemoryDirectory::new();
    let reconciler = Reconciler::new(Arc::new(dir.clone()));
    let store = MemoryRecordStore::new();

    // 1. Create with {"site": "hq"}
    let mut record = reconciler
        .create(CreateRequest::new(
            "record:host",
            ResourceSpec::with_attributes(site("hq")),
        ))
        .await?;
    store.put("web", &record).await?;
    show(&dir, &record.reference, "created").await?;

    // 2. Another tool tags the object
    dir.set_attribute(&record.reference, "owner", "netops").await?;
    show(&dir, &record.reference, "external edit").await?;

    // 3. Reconcile with unchanged desired attributes
    let outcome = reconciler
        .update(&mut record, ResourceSpec::with_attributes(site("hq")))
        .await?;
    tracing::info!("reconcile: {:?}", outcome);
    show(&dir, &record.reference, "after reconcile").await?;

    // 4. The object is renamed out of band; read repairs the reference
    let renamed = dir.rename(&record.reference).await?;
    match reconciler.read(&mut record).await? {
        ReadOutcome::Present { external } => {
            tracing::info!("external attributes: {:?}", external.keys().collect::<Vec<_>>());
        }
        ReadOutcome::Gone => bail!("object should survive a rename"),
    }
    if record.reference != renamed {
        bail!("reference was not repaired");
    }
    store.put("web", &record).await?;

    // 5. Change the managed key
    reconciler
        .update(&mut record, ResourceSpec::with_attributes(site("branch")))
        .await?;
    show(&dir, &record.reference, "after change").await?;

    // 6. Delete
    match reconciler.delete(&record).await? {
        DeleteOutcome::Deleted { reference } => tracing::info!("deleted {reference}"),
        DeleteOutcome::AlreadyGone => tracing::info!("already gone"),
    }
    store.delete("web").await?;

    tracing::info!("records left: {}", store.list().await?.len());
    Ok(())
}
