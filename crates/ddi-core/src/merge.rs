//! Attribute merge engine
//!
//! Remote attribute bags are shared with other tools. The merge engine decides
//! what to push on update without touching keys this reconciler doesn't own,
//! and what to report back on read.
//!
//! ## Ownership
//!
//! - **Managed keys**: present in the local desired map
//! - **Foreign keys**: everything else on the remote object, including the
//!   reserved identity key
//!
//! ## Write path (three-way merge)
//!
//! | key in `new` | key in `previous` | key in `remote` | result            |
//! |--------------|-------------------|-----------------|-------------------|
//! | yes          | any               | any             | `new` value       |
//! | no           | yes               | any             | removed           |
//! | no           | no                | yes             | `remote` value    |

use tracing::debug;

use crate::attrs::codec::ensure_unreserved;
use crate::attrs::{AttributeMap, Value, attributes_equivalent};
use crate::error::{Error, Result};
use crate::identity::IDENTITY_ATTR_KEY;

/// Compute the attribute bag to push on update
///
/// # Parameters
///
/// - `remote`: Live attributes of the remote object (identity entry included)
/// - `previous`: Desired attributes from the last successful apply
/// - `desired`: Newly desired attributes
///
/// # Returns
///
/// - `Ok(AttributeMap)`: The merged bag. Foreign keys keep their remote value.
/// - `Err(Error::Config)`: A desired map contains the reserved identity key
/// - `Err(Error::Merge)`: The operator starts managing a key whose remote value
///   has a different shape
pub fn merge(
    remote: &AttributeMap,
    previous: &AttributeMap,
    desired: &AttributeMap,
) -> Result<AttributeMap> {
    ensure_unreserved(previous)?;
    ensure_unreserved(desired)?;

    let mut merged = AttributeMap::new();
    let mut removed = 0usize;
    let mut foreign = 0usize;

    for (key, value) in desired {
        if !previous.contains_key(key) {
            if let Some(existing) = remote.get(key) {
                check_takeover(key, existing, value)?;
            }
        }
        merged.insert(key.clone(), value.clone());
    }

    for (key, value) in remote {
        if desired.contains_key(key) {
            continue;
        }
        if previous.contains_key(key) {
            removed += 1;
            continue;
        }
        foreign += 1;
        merged.insert(key.clone(), value.clone());
    }

    debug!(
        managed = desired.len(),
        foreign, removed, "merged attribute bag"
    );

    Ok(merged)
}

/// A key moving from a foreign writer to the operator must keep its shape
fn check_takeover(key: &str, existing: &Value, desired: &Value) -> Result<()> {
    if existing.kind() != desired.kind() {
        return Err(Error::merge(
            key,
            format!(
                "remote holds a {} but the desired value is a {}",
                existing.kind(),
                desired.kind()
            ),
        ));
    }
    Ok(())
}

/// Remote attributes split for read-back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Remote values of the keys the local record manages
    pub visible: AttributeMap,
    /// Foreign keys present remotely, identity entry excluded
    pub external: AttributeMap,
}

impl Projection {
    /// Whether any externally managed attribute was found
    pub fn has_external(&self) -> bool {
        !self.external.is_empty()
    }
}

/// Compute what to surface back to the operator on read
///
/// Managed keys report their live remote value so drift shows up in the next
/// diff. Foreign keys go to `external` and never enter the desired map. A
/// managed key that vanished remotely is absent from `visible`.
pub fn project(remote: &AttributeMap, tracked: &AttributeMap) -> Projection {
    let mut projection = Projection::default();

    for (key, value) in remote {
        if key == IDENTITY_ATTR_KEY {
            continue;
        }
        if tracked.contains_key(key) {
            projection.visible.insert(key.clone(), value.clone());
        } else {
            projection.external.insert(key.clone(), value.clone());
        }
    }

    projection
}

/// Whether pushing `merged` would change the remote bag
pub fn needs_push(remote: &AttributeMap, merged: &AttributeMap) -> bool {
    !attributes_equivalent(remote, merged)
}
