// # WAPI Directory Client
//
// Directory client for WAPI-style REST directories (Infoblox NIOS grid
// managers and compatible services).
//
// ## Behavior
//
// - One HTTP request per trait call, except `create` against servers that
//   answer POST with a bare reference (one follow-up GET)
// - Every error is propagated to the caller; no retries, no backoff
// - HTTP timeout of 30 seconds
// - Dry-run mode performs reads and logs mutations without sending them
//
// ## Security Requirements
//
// - The password never appears in logs or `Debug` output
// - Credentials come from configuration or environment variables only
// - Construction fails fast on empty credentials
//
// ## API Reference
//
// - Read by reference: `GET /wapi/v{version}/{ref}`
// - Search by attribute: `GET /wapi/v{version}/{type}?*{key}={value}`
// - Create: `POST /wapi/v{version}/{type}`
// - Update: `PUT /wapi/v{version}/{ref}`
// - Delete: `DELETE /wapi/v{version}/{ref}`
//
// Extensible attributes travel as `{"extattrs": {"key": {"value": v}}}` and
// are only returned when `_return_fields+=extattrs` is requested.

use std::time::Duration;

use async_trait::async_trait;
use ddi_core::attrs::codec::{from_wire, to_wire};
use ddi_core::config::ClientConfig;
use ddi_core::traits::{
    DirectoryClient, DirectoryClientFactory, ObjectFields, ObjectPayload, RemoteObject,
    SearchFilter,
};
use ddi_core::{AttributeMap, ClientRegistry, Error, Result, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::sync::Arc;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default WAPI version
const DEFAULT_WAPI_VERSION: &str = "2.12";

/// Query parameter asking the server to include extensible attributes
const RETURN_EXTATTRS: (&str, &str) = ("_return_fields+", "extattrs");

/// Client name used in errors and logs
const CLIENT_NAME: &str = "wapi";

/// Connection settings for a WAPI directory
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WapiConfig {
    /// Grid manager host name or address
    pub host: String,
    /// API version, without the leading `v`
    pub version: String,
    /// Basic auth user
    pub username: String,
    /// Basic auth password
    /// ⚠️ NEVER log this value
    pub password: String,
    /// Verify TLS certificates
    pub tls_verify: bool,
    /// Log mutations instead of sending them
    pub dry_run: bool,
}

impl std::fmt::Debug for WapiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WapiConfig")
            .field("host", &self.host)
            .field("version", &self.version)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("tls_verify", &self.tls_verify)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl WapiConfig {
    /// Load settings from the environment
    ///
    /// | Variable             | Required | Default |
    /// |----------------------|----------|---------|
    /// | `DDI_WAPI_HOST`      | yes      |         |
    /// | `DDI_WAPI_USERNAME`  | yes      |         |
    /// | `DDI_WAPI_PASSWORD`  | yes      |         |
    /// | `DDI_WAPI_VERSION`   | no       | `2.12`  |
    /// | `DDI_WAPI_TLS_VERIFY`| no       | `true`  |
    /// | `DDI_MODE`           | no       | live; `dry-run` enables dry-run |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::config(format!("{} is required", key)))
        };

        let config = Self {
            host: required("DDI_WAPI_HOST")?,
            username: required("DDI_WAPI_USERNAME")?,
            password: required("DDI_WAPI_PASSWORD")?,
            version: lookup("DDI_WAPI_VERSION")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_WAPI_VERSION.to_string()),
            tls_verify: lookup("DDI_WAPI_TLS_VERIFY")
                .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
            dry_run: dry_run_requested(lookup("DDI_MODE").as_deref()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Build settings from a registry client configuration
    pub fn from_client_config(config: &ClientConfig, dry_run: bool) -> Result<Self> {
        match config {
            ClientConfig::Wapi {
                host,
                version,
                username,
                password,
                tls_verify,
            } => {
                let config = Self {
                    host: host.clone(),
                    version: version.clone(),
                    username: username.clone(),
                    password: password.clone(),
                    tls_verify: *tls_verify,
                    dry_run,
                };
                config.validate()?;
                Ok(config)
            }
            _ => Err(Error::config("Invalid config for WAPI client")),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::config("WAPI host cannot be empty"));
        }
        if self.username.is_empty() || self.password.is_empty() {
            return Err(Error::config("WAPI username and password are required"));
        }
        if self.version.trim_start_matches('v').is_empty() {
            return Err(Error::config("WAPI version cannot be empty"));
        }
        Ok(())
    }

    /// Base URL every request is built from, with a trailing slash
    pub fn base_url(&self) -> String {
        format!(
            "https://{}/wapi/v{}/",
            self.host.trim_end_matches('/'),
            self.version.trim_start_matches('v')
        )
    }
}

fn dry_run_requested(mode: Option<&str>) -> bool {
    mode.is_some_and(|m| m.eq_ignore_ascii_case("dry-run"))
}

/// WAPI directory client
///
/// # Dry-Run Mode
///
/// When `dry_run` is set, the client will:
/// - Perform all GET requests (fetch, search)
/// - Log the intended POST / PUT / DELETE payload
/// - Echo the payload back as if the server had applied it
///
/// # Security
///
/// The Debug implementation does NOT expose the password.
pub struct WapiClient {
    config: WapiConfig,
    base_url: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for WapiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WapiClient")
            .field("base_url", &self.base_url)
            .field("username", &self.config.username)
            .field("password", &"<REDACTED>")
            .field("dry_run", &self.config.dry_run)
            .finish()
    }
}

impl WapiClient {
    /// Create a client
    ///
    /// # Returns
    ///
    /// - `Ok(WapiClient)`: Ready client; no request is made yet
    /// - `Err(Error::Config)`: Invalid settings or HTTP client build failure
    pub fn new(config: WapiConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        if !config.tls_verify {
            tracing::warn!(host = %config.host, "TLS certificate verification is disabled");
        }

        Ok(Self {
            base_url: config.base_url(),
            config,
            http,
        })
    }

    /// Whether mutations are only logged
    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Accept", "application/json")
    }

    /// Send a request and return the decoded JSON body
    async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<Json> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| Error::remote(CLIENT_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(map_status(status.as_u16(), &body, context));
        }

        response
            .json()
            .await
            .map_err(|e| Error::remote(CLIENT_NAME, format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl DirectoryClient for WapiClient {
    async fn fetch_by_ref(&self, type_name: &str, reference: &str) -> Result<RemoteObject> {
        if reference_type(reference) != type_name {
            return Err(Error::not_found(format!(
                "{} is not a reference to a {} object",
                reference, type_name
            )));
        }

        tracing::debug!(reference, "fetching object");
        let request = self
            .http
            .get(self.url(reference))
            .query(&[RETURN_EXTATTRS]);
        let json = self.send(request, reference).await?;
        parse_object(type_name, &json)
    }

    async fn search(&self, type_name: &str, filter: &SearchFilter) -> Result<Vec<RemoteObject>> {
        tracing::debug!(type_name, "searching by extensible attribute");
        let request = self
            .http
            .get(self.url(type_name))
            .query(&search_params(filter));
        let json = self.send(request, type_name).await?;

        json.as_array()
            .ok_or_else(|| {
                Error::remote(CLIENT_NAME, "Invalid response format: search result is not an array")
            })?
            .iter()
            .map(|item| parse_object(type_name, item))
            .collect()
    }

    async fn create(&self, type_name: &str, payload: &ObjectPayload) -> Result<RemoteObject> {
        let body = payload_body(payload);

        if self.config.dry_run {
            tracing::info!(
                "[DRY-RUN] Would POST {} with payload: {}",
                self.url(type_name),
                body
            );
            return Ok(RemoteObject {
                reference: format!("{}/dry-run", type_name),
                type_name: type_name.to_string(),
                fields: payload.fields.clone(),
                attributes: payload.attributes.clone(),
            });
        }

        let request = self
            .http
            .post(self.url(type_name))
            .query(&[RETURN_EXTATTRS])
            .json(&body);
        let json = self.send(request, type_name).await?;

        // Older servers ignore _return_fields on POST and answer with the ref
        match json.as_str() {
            Some(reference) => self.fetch_by_ref(type_name, reference).await,
            None => parse_object(type_name, &json),
        }
    }

    async fn update(
        &self,
        type_name: &str,
        reference: &str,
        payload: &ObjectPayload,
    ) -> Result<RemoteObject> {
        let body = payload_body(payload);

        if self.config.dry_run {
            tracing::info!(
                "[DRY-RUN] Would PUT {} with payload: {}",
                self.url(reference),
                body
            );
            return Ok(RemoteObject {
                reference: reference.to_string(),
                type_name: type_name.to_string(),
                fields: payload.fields.clone(),
                attributes: payload.attributes.clone(),
            });
        }

        let request = self
            .http
            .put(self.url(reference))
            .query(&[RETURN_EXTATTRS])
            .json(&body);
        let json = self.send(request, reference).await?;

        match json.as_str() {
            Some(new_ref) => self.fetch_by_ref(type_name, new_ref).await,
            None => parse_object(type_name, &json),
        }
    }

    async fn delete(&self, type_name: &str, reference: &str) -> Result<String> {
        if reference_type(reference) != type_name {
            return Err(Error::not_found(format!(
                "{} is not a reference to a {} object",
                reference, type_name
            )));
        }

        if self.config.dry_run {
            tracing::info!("[DRY-RUN] Would DELETE {}", self.url(reference));
            return Ok(reference.to_string());
        }

        let json = self
            .send(self.http.delete(self.url(reference)), reference)
            .await?;
        Ok(json.as_str().unwrap_or(reference).to_string())
    }

    fn client_name(&self) -> &'static str {
        CLIENT_NAME
    }
}

/// Object type encoded in a reference (`record:host/ZG5z...:web.lab/default`)
pub fn reference_type(reference: &str) -> &str {
    reference.split('/').next().unwrap_or_default()
}

/// Map a failed HTTP status to a core error
///
/// WAPI reports missing objects either as 404 or as 400 with an
/// `AdmConDataNotFoundError` body; both become `NotFound`. Any other
/// failure is a remote error, whatever its message says.
pub fn map_status(status: u16, body: &str, context: &str) -> Error {
    if status == 404 || (status == 400 && body.contains("AdmConDataNotFoundError")) {
        return Error::not_found(format!("{}: {}", context, body.trim()));
    }

    let message = match status {
        401 | 403 => format!(
            "Authentication failed: invalid credentials or insufficient permissions. Status: {}",
            status
        ),
        409 => format!("Conflict on {}: {}", context, body.trim()),
        429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
        500..=599 => format!("Server error (transient): {} - {}", status, body.trim()),
        _ => format!("Request for {} failed: {} - {}", context, status, body.trim()),
    };
    Error::remote(CLIENT_NAME, message)
}

/// Query parameters for an extensible-attribute search
pub fn search_params(filter: &SearchFilter) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = filter
        .attributes
        .iter()
        .map(|(key, value)| (format!("*{}", key), search_value(value)))
        .collect();
    params.push((RETURN_EXTATTRS.0.to_string(), RETURN_EXTATTRS.1.to_string()));
    params
}

fn search_value(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_json().to_string(),
    }
}

/// Request body for POST / PUT
pub fn payload_body(payload: &ObjectPayload) -> Json {
    let mut body = payload.fields.clone();
    body.remove("_ref");
    body.insert("extattrs".to_string(), to_wire(&payload.attributes));
    Json::Object(body)
}

/// Parse a WAPI object into a `RemoteObject`
///
/// `_ref` is required. `extattrs` becomes the attribute bag; every other
/// property is kept as a per-type field.
pub fn parse_object(type_name: &str, json: &Json) -> Result<RemoteObject> {
    let object = json.as_object().ok_or_else(|| {
        Error::remote(CLIENT_NAME, "Invalid response format: object is not a JSON object")
    })?;

    let reference = object
        .get("_ref")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::remote(CLIENT_NAME, "Invalid response format: _ref is missing"))?
        .to_string();

    let attributes = match object.get("extattrs") {
        Some(wire) => from_wire(wire)?,
        None => AttributeMap::new(),
    };

    let fields: ObjectFields = object
        .iter()
        .filter(|(key, _)| key.as_str() != "_ref" && key.as_str() != "extattrs")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(RemoteObject {
        reference,
        type_name: type_name.to_string(),
        fields,
        attributes,
    })
}

/// Factory for creating WAPI clients
pub struct WapiFactory;

impl DirectoryClientFactory for WapiFactory {
    fn create(&self, config: &ClientConfig) -> Result<Arc<dyn DirectoryClient>> {
        let dry_run = dry_run_requested(std::env::var("DDI_MODE").ok().as_deref());
        if dry_run {
            tracing::warn!("WAPI client running in DRY-RUN mode - no changes will be made");
        }

        let config = WapiConfig::from_client_config(config, dry_run)?;
        Ok(Arc::new(WapiClient::new(config)?))
    }
}

/// Register the WAPI client with a registry
///
/// # Example
///
/// ```rust
/// use ddi_core::ClientRegistry;
///
/// let registry = ClientRegistry::with_builtins();
/// ddi_client_wapi::register(&registry);
/// assert!(registry.has_client("wapi"));
/// ```
pub fn register(registry: &ClientRegistry) {
    registry.register_client(CLIENT_NAME, Box::new(WapiFactory));
}
