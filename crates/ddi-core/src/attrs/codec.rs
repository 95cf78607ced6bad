//! Attribute codec
//!
//! Converts between the operator-facing attribute map and the wire
//! representation used by directory clients, and keeps the identity entry
//! out of anything the operator sees.
//!
//! ## Wire format
//!
//! Each attribute is wrapped in an object with a `value` member:
//!
//! ```json
//! {
//!   "site": { "value": "hq" },
//!   "dns_servers": { "value": ["10.0.0.1", "10.0.0.2"] },
//!   "_internal_id": { "value": "2f1c..." }
//! }
//! ```
//!
//! The operator-facing form is a plain JSON object (`{"site": "hq"}`).

use serde_json::{Map, Value as Json};

use super::value::{AttributeMap, Value};
use crate::error::{Error, Result};
use crate::identity::{IDENTITY_ATTR_KEY, InternalId};

/// Parse the operator-facing JSON text into an attribute map
///
/// An empty string is an empty map. `null` and nested objects are rejected.
pub fn decode_desired(raw: &str) -> Result<AttributeMap> {
    if raw.trim().is_empty() {
        return Ok(AttributeMap::new());
    }

    let json: Json = serde_json::from_str(raw)
        .map_err(|e| Error::config(format!("attributes are not valid JSON: {}", e)))?;

    let object = json
        .as_object()
        .ok_or_else(|| Error::config("attributes must be a JSON object"))?;

    let mut attrs = AttributeMap::new();
    for (key, value) in object {
        let value = Value::from_json(value).ok_or_else(|| {
            Error::config(format!(
                "attribute '{}' must be a string, number, bool or list",
                key
            ))
        })?;
        attrs.insert(key.clone(), value);
    }

    ensure_unreserved(&attrs)?;
    Ok(attrs)
}

/// Render an attribute map as operator-facing JSON text
///
/// The identity entry is never rendered.
pub fn encode_desired(attrs: &AttributeMap) -> Result<String> {
    let visible: Map<String, Json> = attrs
        .iter()
        .filter(|(key, _)| key.as_str() != IDENTITY_ATTR_KEY)
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect();

    Ok(serde_json::to_string(&visible)?)
}

/// Encode an attribute map into the wire representation
pub fn to_wire(attrs: &AttributeMap) -> Json {
    let wire: Map<String, Json> = attrs
        .iter()
        .map(|(key, value)| {
            let mut wrapped = Map::new();
            wrapped.insert("value".to_string(), value.to_json());
            (key.clone(), Json::Object(wrapped))
        })
        .collect();

    Json::Object(wire)
}

/// Decode the wire representation into an attribute map
///
/// A missing or `null` attribute block decodes to an empty map. Entries that
/// are bare values (not wrapped in `{"value": ..}`) are accepted as well.
pub fn from_wire(wire: &Json) -> Result<AttributeMap> {
    let object = match wire {
        Json::Null => return Ok(AttributeMap::new()),
        Json::Object(object) => object,
        other => {
            return Err(Error::remote(
                "codec",
                format!("attribute block is not an object: {}", other),
            ));
        }
    };

    let mut attrs = AttributeMap::new();
    for (key, entry) in object {
        let raw = match entry {
            Json::Object(wrapped) => wrapped.get("value"),
            bare => Some(bare),
        };

        let value = raw.and_then(Value::from_json).ok_or_else(|| {
            Error::remote(
                "codec",
                format!("attribute '{}' has an unsupported value: {}", key, entry),
            )
        })?;
        attrs.insert(key.clone(), value);
    }

    Ok(attrs)
}

/// Split the identity entry off an attribute map
///
/// # Returns
///
/// The remaining attributes and the identity token, if one was present.
/// A malformed identity value is an `InvalidToken` error.
pub fn strip_identity(mut attrs: AttributeMap) -> Result<(AttributeMap, Option<InternalId>)> {
    let id = match attrs.remove(IDENTITY_ATTR_KEY) {
        Some(Value::String(raw)) => Some(InternalId::parse(&raw)?),
        Some(other) => {
            return Err(Error::invalid_token(format!(
                "identity attribute holds a {} instead of a string",
                other.kind()
            )));
        }
        None => None,
    };

    Ok((attrs, id))
}

/// Read the identity token from an attribute map without consuming it
pub fn identity_of(attrs: &AttributeMap) -> Result<Option<InternalId>> {
    match attrs.get(IDENTITY_ATTR_KEY) {
        Some(Value::String(raw)) => Ok(Some(InternalId::parse(raw)?)),
        Some(other) => Err(Error::invalid_token(format!(
            "identity attribute holds a {} instead of a string",
            other.kind()
        ))),
        None => Ok(None),
    }
}

/// Insert the identity entry, replacing any previous value
pub fn inject_identity(attrs: &mut AttributeMap, id: &InternalId) {
    attrs.insert(
        IDENTITY_ATTR_KEY.to_string(),
        Value::String(id.as_str().to_string()),
    );
}

/// Fail if a caller-supplied map tries to manage the reserved identity key
pub fn ensure_unreserved(attrs: &AttributeMap) -> Result<()> {
    if attrs.contains_key(IDENTITY_ATTR_KEY) {
        return Err(Error::config(format!(
            "attribute '{}' is reserved and must not be set manually",
            IDENTITY_ATTR_KEY
        )));
    }
    Ok(())
}
