//! Configuration types for the reconciliation layer
//!
//! This module defines all configuration structures used throughout the crate.
//! Nothing here is global: callers build a `ReconcilerConfig` and pass it in.

use serde::{Deserialize, Serialize};

/// Main reconciler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Directory client configuration
    pub client: ClientConfig,

    /// Record store configuration
    #[serde(default)]
    pub record_store: RecordStoreConfig,

    /// Optional reconciler settings
    #[serde(default)]
    pub settings: ReconcilerSettings,
}

impl ReconcilerConfig {
    /// Create a configuration for a given client with default settings
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            record_store: RecordStoreConfig::default(),
            settings: ReconcilerSettings::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.client.validate()?;
        self.record_store.validate()?;
        Ok(())
    }
}

/// Directory client configuration
///
/// `Debug` output never includes credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientConfig {
    /// WAPI-style REST directory
    Wapi {
        /// Directory host name or address
        host: String,
        /// API version (e.g., "2.12")
        #[serde(default = "default_wapi_version")]
        version: String,
        /// Username for basic auth
        username: String,
        /// Password for basic auth
        password: String,
        /// Verify TLS certificates
        #[serde(default = "default_true")]
        tls_verify: bool,
    },

    /// In-memory directory (tests, demos)
    #[default]
    Memory,

    /// Custom client
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientConfig::Wapi {
                host,
                version,
                username,
                tls_verify,
                ..
            } => f
                .debug_struct("Wapi")
                .field("host", host)
                .field("version", version)
                .field("username", username)
                .field("password", &"<REDACTED>")
                .field("tls_verify", tls_verify)
                .finish(),
            ClientConfig::Memory => f.write_str("Memory"),
            ClientConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<REDACTED>")
                .finish(),
        }
    }
}

impl ClientConfig {
    /// Validate the client configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ClientConfig::Wapi {
                host,
                version,
                username,
                password,
                ..
            } => {
                if host.is_empty() {
                    return Err(crate::Error::config("WAPI host cannot be empty"));
                }
                if version.is_empty() {
                    return Err(crate::Error::config("WAPI version cannot be empty"));
                }
                if username.is_empty() || password.is_empty() {
                    return Err(crate::Error::config(
                        "WAPI username and password are required",
                    ));
                }
                Ok(())
            }
            ClientConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom client factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom client config cannot be null"));
                }
                Ok(())
            }
            ClientConfig::Memory => Ok(()),
        }
    }

    /// Get the client type name
    pub fn type_name(&self) -> &str {
        match self {
            ClientConfig::Wapi { .. } => "wapi",
            ClientConfig::Memory => "memory",
            ClientConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordStoreConfig {
    /// File-based record store
    File {
        /// Path to the record file
        path: String,
    },

    /// In-memory record store (not persistent)
    #[default]
    Memory,

    /// Custom record store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RecordStoreConfig {
    /// Validate the record store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RecordStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Record store path cannot be empty"))
            }
            RecordStoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom record store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the record store type name
    pub fn type_name(&self) -> &str {
        match self {
            RecordStoreConfig::File { .. } => "file",
            RecordStoreConfig::Memory => "memory",
            RecordStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Reconciler behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    /// Skip the remote update call when merged state equals remote state
    #[serde(default = "default_true")]
    pub skip_unchanged: bool,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            skip_unchanged: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_wapi_version() -> String {
    "2.12".to_string()
}
