//! Local resource records
//!
//! A `ResourceRecord` is what the declarative side remembers about one
//! managed object between reconciliation passes.

use serde::{Deserialize, Serialize};

use crate::attrs::AttributeMap;
use crate::identity::InternalId;
use crate::traits::{ObjectFields, RemoteObject};

/// Locally tracked state of a managed remote object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Object type (e.g., "record:host")
    pub type_name: String,

    /// Last known remote reference; a cache, not a key
    pub reference: String,

    /// Identity token, absent for records imported and not yet updated
    #[serde(default)]
    pub internal_id: Option<InternalId>,

    /// Per-type fields as last applied
    #[serde(default)]
    pub fields: ObjectFields,

    /// Desired attributes as last applied (identity entry never included)
    #[serde(default)]
    pub attributes: AttributeMap,

    /// Time of the last successful reconciliation
    pub last_reconciled: chrono::DateTime<chrono::Utc>,
}

impl ResourceRecord {
    /// Build a record from a freshly created or resolved remote object
    ///
    /// `attributes` is the desired (operator-owned) subset, not the full bag.
    pub(crate) fn from_remote(
        object: &RemoteObject,
        internal_id: Option<InternalId>,
        attributes: AttributeMap,
    ) -> Self {
        Self {
            type_name: object.type_name.clone(),
            reference: object.reference.clone(),
            internal_id,
            fields: object.fields.clone(),
            attributes,
            last_reconciled: chrono::Utc::now(),
        }
    }

    /// Check if the record is stale (older than given duration)
    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        let now = chrono::Utc::now();
        now.signed_duration_since(self.last_reconciled) > max_age
    }
}

/// Desired state for an existing record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Per-type fields to apply
    #[serde(default)]
    pub fields: ObjectFields,
    /// Desired attributes
    #[serde(default)]
    pub attributes: AttributeMap,
}

impl ResourceSpec {
    /// Create a spec from fields and attributes
    pub fn new(fields: ObjectFields, attributes: AttributeMap) -> Self {
        Self { fields, attributes }
    }

    /// Attributes only, no per-type fields
    pub fn with_attributes(attributes: AttributeMap) -> Self {
        Self {
            fields: ObjectFields::new(),
            attributes,
        }
    }
}

/// Request to create a new managed object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Object type
    pub type_name: String,
    /// Desired fields and attributes
    #[serde(flatten)]
    pub spec: ResourceSpec,
    /// Identity field as supplied by the caller; must be empty
    #[serde(default)]
    pub internal_id: Option<String>,
}

impl CreateRequest {
    /// Create a request with no caller-supplied identity
    pub fn new(type_name: impl Into<String>, spec: ResourceSpec) -> Self {
        Self {
            type_name: type_name.into(),
            spec,
            internal_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::Value;

    #[test]
    fn record_serde_round_trip() {
        let mut attributes = AttributeMap::new();
        attributes.insert("site".into(), Value::from("hq"));

        let record = ResourceRecord {
            type_name: "record:a".to_string(),
            reference: "record:a/1".to_string(),
            internal_id: Some(InternalId::mint()),
            fields: ObjectFields::new(),
            attributes,
            last_reconciled: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: ResourceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_staleness() {
        let mut record = ResourceRecord {
            type_name: "record:a".to_string(),
            reference: "record:a/1".to_string(),
            internal_id: None,
            fields: ObjectFields::new(),
            attributes: AttributeMap::new(),
            last_reconciled: chrono::Utc::now(),
        };
        assert!(!record.is_stale(chrono::Duration::hours(1)));

        record.last_reconciled = chrono::Utc::now() - chrono::Duration::hours(2);
        assert!(record.is_stale(chrono::Duration::hours(1)));
    }

    #[test]
    fn create_request_flattens_spec() {
        let request: CreateRequest = serde_json::from_value(serde_json::json!({
            "type_name": "record:a",
            "fields": {"name": "web.lab"},
            "attributes": {"site": "hq"}
        }))
        .unwrap();

        assert_eq!(request.type_name, "record:a");
        assert_eq!(request.spec.attributes["site"], Value::from("hq"));
        assert!(request.internal_id.is_none());
    }
}
