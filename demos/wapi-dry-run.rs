// # WAPI Client Validation Tool
//
// Runs one reconcile pass against a real WAPI grid manager.
//
// ## Usage
//
// ```bash
// # Dry-run mode (default - safe): reads are real, writes are logged
// DDI_WAPI_HOST=gm.lab \
// DDI_WAPI_USERNAME=admin \
// DDI_WAPI_PASSWORD=secret \
// DDI_OBJECT_REF='record:host/ZG5z...:web.lab/default' \
// cargo run --bin wapi_dry_run
//
// # Live mode (makes actual changes!)
// DDI_MODE=live ... cargo run --bin wapi_dry_run
// ```
//
// ## Environment Variables
//
// Required:
// - `DDI_WAPI_HOST`, `DDI_WAPI_USERNAME`, `DDI_WAPI_PASSWORD`
// - `DDI_OBJECT_REF`: Reference of an existing object to import
//
// Optional:
// - `DDI_WAPI_VERSION`: API version (default: 2.12)
// - `DDI_ATTRIBUTES`: Desired attributes as JSON (default: the current ones)
// - `DDI_MODE`: "dry-run" or "live" (default: dry-run)
// - `DDI_LOG_LEVEL`: tracing level (default: info)

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use ddi_client_wapi::{WapiClient, WapiConfig, reference_type};
use ddi_core::attrs::codec::decode_desired;
use ddi_core::{Reconciler, ResourceSpec};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let level = std::env::var("DDI_LOG_LEVEL")
        .ok()
        .and_then(|raw| tracing::Level::from_str(&raw).ok())
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    // Safe by default: only an explicit DDI_MODE=live sends writes
    let live = std::env::var("DDI_MODE").is_ok_and(|m| m.eq_ignore_ascii_case("live"));
    let mut config = WapiConfig::from_env().context("loading WAPI settings")?;
    config.dry_run = !live;

    let reference = std::env::var("DDI_OBJECT_REF").context("DDI_OBJECT_REF is required")?;
    let type_name = reference_type(&reference).to_string();

    tracing::info!(
        "validating against {} [mode: {}]",
        config.base_url(),
        if config.dry_run { "DRY-RUN" } else { "LIVE" }
    );

    let client = WapiClient::new(config)?;
    let reconciler = Reconciler::new(Arc::new(client));

    let mut record = reconciler.import(&type_name, &reference).await?;
    tracing::info!(
        "imported {} with {} attributes, identity: {}",
        record.reference,
        record.attributes.len(),
        record
            .internal_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );

    let desired = match std::env::var("DDI_ATTRIBUTES") {
        Ok(raw) => decode_desired(&raw)?,
        Err(_) => record.attributes.clone(),
    };

    let outcome = reconciler
        .update(&mut record, ResourceSpec::with_attributes(desired))
        .await?;
    tracing::info!("update outcome: {:?}", outcome);

    let record_json = serde_json::to_string_pretty(&record)?;
    println!("{record_json}");
    Ok(())
}
