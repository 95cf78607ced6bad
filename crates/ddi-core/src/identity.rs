// # Identity Token
//
// Every locally-managed resource owns exactly one `InternalId`. It is minted
// once, stored in local state, and written into the remote object's attribute
// bag under `IDENTITY_ATTR_KEY`. Remote references rotate; the token doesn't.
//
// ## Lifecycle
//
// - Create: minted by the reconciler, never by the caller
// - Update: backfilled inside the update guard when an imported record has none
// - Delete: discarded together with the local record

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Reserved attribute key carrying the identity token inside every remote
/// attribute bag. Never shown in operator-facing attribute listings.
pub const IDENTITY_ATTR_KEY: &str = "_internal_id";

/// Opaque identity token for a locally-managed resource
///
/// Serialized as its string form. Values are 128-bit random (UUID v4), so
/// collisions across the lifetime of a directory are negligible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InternalId(String);

impl InternalId {
    /// Mint a new, unique token
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reconstruct a token from its stored string form
    ///
    /// The token must be a UUID, but it is kept exactly as written (minus
    /// surrounding whitespace). Identity searches match the stored text, so
    /// reformatting would lose objects tagged by other writers.
    ///
    /// # Returns
    ///
    /// - `Ok(InternalId)`: The parsed token
    /// - `Err(Error::InvalidToken)`: If the string is empty or malformed
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_token("identity token is empty"));
        }

        Uuid::parse_str(trimmed)
            .map_err(|e| Error::invalid_token(format!("'{}': {}", trimmed, e)))?;

        Ok(Self(trimmed.to_string()))
    }

    /// The stored string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InternalId {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<InternalId> for String {
    fn from(id: InternalId) -> Self {
        id.0
    }
}

/// Reject a caller-supplied identity value on create
///
/// The identity field is owned by the reconciler. A present, non-empty value
/// in a create request is a configuration error.
pub fn reject_manual_identity(raw: Option<&str>) -> Result<()> {
    match raw {
        Some(value) if !value.trim().is_empty() => Err(Error::config(
            "identity field must not be set manually",
        )),
        _ => Ok(()),
    }
}
