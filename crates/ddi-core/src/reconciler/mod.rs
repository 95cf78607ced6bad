//! Reconciler
//!
//! Per-record-type handlers call the reconciler for create, read, update,
//! delete and import. It strings together the resolver, the attribute codec,
//! the merge engine and the update guard.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!   ResourceSpec ─►│  Reconciler  │◄─ ResourceRecord (previous state)
//!                  └──────────────┘
//!                         │
//!       ┌─────────────────┼──────────────────┬─────────────────┐
//!       ▼                 ▼                  ▼                 ▼
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Resolver  │   │ Merge Engine │   │ UpdateGuard │   │  Directory  │
//! │ (locate)   │   │ (ownership)  │   │ (rollback)  │   │  (mutate)   │
//! └────────────┘   └──────────────┘   └─────────────┘   └─────────────┘
//! ```
//!
//! ## Update Flow
//!
//! 1. Snapshot the record (UpdateGuard)
//! 2. Resolve the live object by reference, then by identity
//! 3. Backfill an identity token if the record has none
//! 4. Merge remote / previous / desired attributes
//! 5. Skip the call if nothing changed, otherwise update remotely
//! 6. Commit, or roll back on any error

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::attrs::codec::{ensure_unreserved, identity_of, inject_identity, strip_identity};
use crate::attrs::AttributeMap;
use crate::config::{ReconcilerConfig, ReconcilerSettings};
use crate::error::{Error, Result};
use crate::guard::{UpdateGuard, UpdatedFields};
use crate::identity::{InternalId, reject_manual_identity};
use crate::merge::{merge, needs_push, project};
use crate::record::{CreateRequest, ResourceRecord, ResourceSpec};
use crate::registry::ClientRegistry;
use crate::resolver::ObjectResolver;
use crate::traits::{DirectoryClient, ObjectFields, ObjectPayload};

/// Result of a read
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The object exists; the record now reflects it
    Present {
        /// Attributes set on the object by other writers
        external: AttributeMap,
    },
    /// The object no longer exists remotely; drop the local record
    Gone,
}

/// Result of an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The remote object was changed
    Updated {
        /// Reference before the update
        previous_ref: String,
        /// Reference after the update
        new_ref: String,
    },
    /// Remote state already matched; no call was made
    Unchanged {
        /// Current reference
        reference: String,
    },
}

/// Result of a delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The object was deleted
    Deleted {
        /// Reference of the deleted object
        reference: String,
    },
    /// The object was already gone
    AlreadyGone,
}

/// Identity and attribute-ownership reconciler
///
/// ## Concurrency
///
/// Operations on distinct records may run concurrently. Two concurrent
/// operations on the same record are not coordinated here; an
/// `IdentityConflict` is the visible symptom if they race on create.
#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn DirectoryClient>,
    settings: ReconcilerSettings,
}

impl Reconciler {
    /// Create a reconciler over a directory client
    pub fn new(client: Arc<dyn DirectoryClient>) -> Self {
        Self {
            client,
            settings: ReconcilerSettings::default(),
        }
    }

    /// Create a reconciler from configuration and a client registry
    pub fn from_config(config: &ReconcilerConfig, registry: &ClientRegistry) -> Result<Self> {
        config.validate()?;
        let client = registry.create_client(&config.client)?;
        Ok(Self {
            client,
            settings: config.settings.clone(),
        })
    }

    /// Override the reconciler settings
    pub fn with_settings(mut self, settings: ReconcilerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The underlying directory client
    pub fn client(&self) -> &dyn DirectoryClient {
        self.client.as_ref()
    }

    fn resolver(&self) -> ObjectResolver<'_> {
        ObjectResolver::new(self.client.as_ref())
    }

    /// Create a new managed object
    ///
    /// # Returns
    ///
    /// - `Ok(ResourceRecord)`: The new record, carrying a freshly minted token
    /// - `Err(Error::Config)`: The request set the identity field or the
    ///   reserved attribute
    /// - `Err(Error)`: The directory rejected the create
    pub async fn create(&self, request: CreateRequest) -> Result<ResourceRecord> {
        reject_manual_identity(request.internal_id.as_deref())?;
        ensure_unreserved(&request.spec.attributes)?;

        let internal_id = InternalId::mint();
        let mut attributes = request.spec.attributes.clone();
        inject_identity(&mut attributes, &internal_id);

        let payload = ObjectPayload {
            fields: request.spec.fields.clone(),
            attributes,
        };

        let object = self.client.create(&request.type_name, &payload).await?;
        info!(
            type_name = %request.type_name,
            reference = %object.reference,
            internal_id = %internal_id,
            "created object"
        );

        Ok(ResourceRecord::from_remote(
            &object,
            Some(internal_id),
            request.spec.attributes,
        ))
    }

    /// Refresh a record from the live object
    ///
    /// The cached reference is repaired, a remote token is adopted if the
    /// record has none, and managed attributes take their live values. The
    /// record is unchanged if an error is returned.
    pub async fn read(&self, record: &mut ResourceRecord) -> Result<ReadOutcome> {
        let resolved = match self
            .resolver()
            .resolve(
                &record.type_name,
                &record.reference,
                record.internal_id.as_ref(),
            )
            .await
        {
            Ok(resolved) => resolved,
            Err(e) if e.is_not_found() => {
                info!(reference = %record.reference, "object is gone remotely");
                return Ok(ReadOutcome::Gone);
            }
            Err(e) => return Err(e),
        };

        let object = resolved.object;
        let remote_id = identity_of(&object.attributes)?;
        let projection = project(&object.attributes, &record.attributes);

        if projection.has_external() {
            debug!(
                reference = %object.reference,
                external = projection.external.len(),
                "object carries externally managed attributes"
            );
        }

        if record.internal_id.is_none() && remote_id.is_some() {
            record.internal_id = remote_id;
        }
        record.reference = object.reference;
        record.fields = object.fields;
        record.attributes = projection.visible;
        record.last_reconciled = chrono::Utc::now();

        Ok(ReadOutcome::Present {
            external: projection.external,
        })
    }

    /// Apply new desired state to an existing object
    ///
    /// Runs under an [`UpdateGuard`]: on any error every field of `record`
    /// is restored before the error is returned.
    pub async fn update(
        &self,
        record: &mut ResourceRecord,
        spec: ResourceSpec,
    ) -> Result<UpdateOutcome> {
        ensure_unreserved(&spec.attributes)?;

        let mut attempt = UpdateGuard::begin(record);
        let previous_ref = attempt.reference.clone();

        let resolved = self
            .resolver()
            .resolve(
                &attempt.type_name,
                &attempt.reference,
                attempt.internal_id.as_ref(),
            )
            .await?;
        let object = resolved.object;

        // Imported records adopt the token already on the object, if any
        let remote_id = identity_of(&object.attributes)?;
        if attempt.internal_id.is_none() && remote_id.is_some() {
            attempt.internal_id = remote_id.clone();
        }
        let internal_id = attempt.backfill_internal_id();

        let mut merged = merge(&object.attributes, &attempt.attributes, &spec.attributes)?;
        inject_identity(&mut merged, &internal_id);

        let fields_changed = object.fields != overlay_fields(&object.fields, &spec.fields);
        let attrs_changed = needs_push(&object.attributes, &merged);
        let identity_missing = remote_id.as_ref() != Some(&internal_id);

        if self.settings.skip_unchanged && !fields_changed && !attrs_changed && !identity_missing {
            debug!(reference = %object.reference, "remote state already matches, skipping update");
            let reference = object.reference.clone();
            attempt.commit(UpdatedFields {
                reference: object.reference,
                fields: object.fields,
                attributes: spec.attributes,
                internal_id: Some(internal_id),
            });
            return Ok(UpdateOutcome::Unchanged { reference });
        }

        // Partial update: server-owned fields are never sent back
        let payload = ObjectPayload {
            fields: spec.fields.clone(),
            attributes: merged,
        };

        let updated = self
            .client
            .update(&attempt.type_name, &object.reference, &payload)
            .await?;

        let (_, echoed_id) = strip_identity(updated.attributes.clone())?;
        if echoed_id.as_ref() != Some(&internal_id) {
            warn!(
                reference = %updated.reference,
                "directory did not echo the identity attribute back"
            );
        }

        info!(
            previous = %previous_ref,
            reference = %updated.reference,
            "updated object"
        );

        // Clients that echo only the sent fields still leave a complete record
        let new_ref = updated.reference.clone();
        attempt.commit(UpdatedFields {
            fields: overlay_fields(&object.fields, &updated.fields),
            reference: updated.reference,
            attributes: spec.attributes,
            internal_id: Some(internal_id),
        });

        Ok(UpdateOutcome::Updated {
            previous_ref,
            new_ref,
        })
    }

    /// Delete the object behind a record
    ///
    /// An object that no longer exists counts as deleted.
    pub async fn delete(&self, record: &ResourceRecord) -> Result<DeleteOutcome> {
        let resolved = match self
            .resolver()
            .resolve(
                &record.type_name,
                &record.reference,
                record.internal_id.as_ref(),
            )
            .await
        {
            Ok(resolved) => resolved,
            Err(e) if e.is_not_found() => {
                info!(reference = %record.reference, "object already gone, nothing to delete");
                return Ok(DeleteOutcome::AlreadyGone);
            }
            Err(e) => return Err(e),
        };

        let reference = self
            .client
            .delete(&record.type_name, &resolved.object.reference)
            .await?;
        info!(reference = %reference, "deleted object");

        Ok(DeleteOutcome::Deleted { reference })
    }

    /// Start managing an existing object
    ///
    /// Every non-identity attribute on the object becomes managed. A token
    /// already on the object is adopted; otherwise none is minted until the
    /// first update.
    pub async fn import(&self, type_name: &str, reference: &str) -> Result<ResourceRecord> {
        if reference.is_empty() {
            return Err(Error::config("import requires a reference"));
        }

        let object = self.client.fetch_by_ref(type_name, reference).await?;
        let (attributes, internal_id) = strip_identity(object.attributes.clone())?;

        info!(
            reference = %object.reference,
            has_identity = internal_id.is_some(),
            "imported object"
        );

        Ok(ResourceRecord::from_remote(&object, internal_id, attributes))
    }
}

/// Live fields with the desired ones laid on top, as the directory would
/// hold them after a partial update
fn overlay_fields(live: &ObjectFields, desired: &ObjectFields) -> ObjectFields {
    let mut merged = live.clone();
    for (key, value) in desired {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
