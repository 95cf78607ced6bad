//! Update guard
//!
//! Wraps a mutating operation so a failure leaves the local record exactly as
//! it was before the attempt. A record is always either "the last successful
//! remote state" or "the state before a failed attempt", never a mix.
//!
//! Two forms are provided:
//!
//! - [`UpdateGuard`]: RAII guard. Mutate the record through it, then
//!   [`commit`](UpdateGuard::commit). Dropping it uncommitted (for example on
//!   an early `?` return) restores the snapshot.
//! - [`guard`]: closure form. The mutation receives a staged copy of the
//!   record and returns the fields to commit.

use std::future::Future;
use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::attrs::AttributeMap;
use crate::error::Result;
use crate::identity::InternalId;
use crate::record::ResourceRecord;
use crate::traits::ObjectFields;

/// Fields produced by a successful mutation
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedFields {
    /// Current remote reference (possibly rotated)
    pub reference: String,
    /// Per-type fields as applied
    pub fields: ObjectFields,
    /// Desired attributes as applied
    pub attributes: AttributeMap,
    /// Identity token, when one was minted or adopted during the attempt
    pub internal_id: Option<InternalId>,
}

/// Snapshot-and-restore guard around a local record
pub struct UpdateGuard<'r> {
    record: &'r mut ResourceRecord,
    snapshot: Option<ResourceRecord>,
}

impl<'r> UpdateGuard<'r> {
    /// Snapshot the record and start an attempt
    pub fn begin(record: &'r mut ResourceRecord) -> Self {
        let snapshot = Some(record.clone());
        Self { record, snapshot }
    }

    /// Return the record's identity token, minting one if it has none
    ///
    /// A minted token is staged on the record and only survives a commit.
    pub fn backfill_internal_id(&mut self) -> InternalId {
        if let Some(id) = &self.record.internal_id {
            return id.clone();
        }
        let id = InternalId::mint();
        debug!(internal_id = %id, reference = %self.record.reference, "minted identity for record without one");
        self.record.internal_id = Some(id.clone());
        id
    }

    /// Keep the current record state, applying the mutation's results
    pub fn commit(mut self, updated: UpdatedFields) {
        self.record.reference = updated.reference;
        self.record.fields = updated.fields;
        self.record.attributes = updated.attributes;
        if updated.internal_id.is_some() {
            self.record.internal_id = updated.internal_id;
        }
        self.record.last_reconciled = chrono::Utc::now();
        self.snapshot = None;
    }

    /// Keep whatever was staged on the record as is
    pub fn commit_staged(mut self) {
        self.record.last_reconciled = chrono::Utc::now();
        self.snapshot = None;
    }

    /// Restore the snapshot now
    pub fn rollback(self) {
        // Drop does the work
    }
}

impl Deref for UpdateGuard<'_> {
    type Target = ResourceRecord;

    fn deref(&self) -> &ResourceRecord {
        self.record
    }
}

impl DerefMut for UpdateGuard<'_> {
    fn deref_mut(&mut self) -> &mut ResourceRecord {
        self.record
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            if *self.record != snapshot {
                warn!(reference = %snapshot.reference, "rolling back record after failed update");
            }
            *self.record = snapshot;
        }
    }
}

/// Run a mutation against a staged copy of the record
///
/// The staged copy has an identity token backfilled if the record had none.
/// On success the returned fields are committed; on failure the record keeps
/// its pre-call value and the error is returned unchanged.
pub async fn guard<F, Fut>(record: &mut ResourceRecord, mutation: F) -> Result<()>
where
    F: FnOnce(ResourceRecord) -> Fut,
    Fut: Future<Output = Result<UpdatedFields>>,
{
    let mut attempt = UpdateGuard::begin(record);
    let minted = attempt.internal_id.is_none();
    let internal_id = attempt.backfill_internal_id();
    let staged = (*attempt).clone();

    let mut updated = mutation(staged).await?;
    if minted && updated.internal_id.is_none() {
        updated.internal_id = Some(internal_id);
    }

    attempt.commit(updated);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::Value;
    use crate::error::Error;

    fn record(with_id: bool) -> ResourceRecord {
        let mut attributes = AttributeMap::new();
        attributes.insert("site".into(), Value::from("hq"));
        ResourceRecord {
            type_name: "record:a".to_string(),
            reference: "record:a/1".to_string(),
            internal_id: with_id.then(InternalId::mint),
            fields: ObjectFields::new(),
            attributes,
            last_reconciled: chrono::Utc::now(),
        }
    }

    fn updated(reference: &str, site: &str) -> UpdatedFields {
        let mut attributes = AttributeMap::new();
        attributes.insert("site".into(), Value::from(site));
        UpdatedFields {
            reference: reference.to_string(),
            fields: ObjectFields::new(),
            attributes,
            internal_id: None,
        }
    }

    #[test]
    fn dropped_guard_restores_every_field() {
        let mut rec = record(false);
        let before = rec.clone();

        {
            let mut attempt = UpdateGuard::begin(&mut rec);
            attempt.backfill_internal_id();
            attempt.reference = "record:a/2".to_string();
            attempt.attributes.clear();
            attempt.fields.insert("name".into(), "changed".into());
        }

        assert_eq!(rec, before);
        assert!(rec.internal_id.is_none());
    }

    #[test]
    fn committed_guard_applies_updates() {
        let mut rec = record(true);
        let id = rec.internal_id.clone();

        let attempt = UpdateGuard::begin(&mut rec);
        attempt.commit(updated("record:a/9", "branch"));

        assert_eq!(rec.reference, "record:a/9");
        assert_eq!(rec.attributes["site"], Value::from("branch"));
        assert_eq!(rec.internal_id, id);
    }

    #[test]
    fn explicit_rollback_and_staged_commit() {
        let mut rec = record(false);
        let before = rec.clone();

        let mut attempt = UpdateGuard::begin(&mut rec);
        attempt.reference = "record:a/5".to_string();
        attempt.rollback();
        assert_eq!(rec, before);

        let mut attempt = UpdateGuard::begin(&mut rec);
        let id = attempt.backfill_internal_id();
        attempt.commit_staged();
        assert_eq!(rec.internal_id, Some(id));
    }

    #[test]
    fn backfill_keeps_existing_token() {
        let mut rec = record(true);
        let id = rec.internal_id.clone().unwrap();
        let mut attempt = UpdateGuard::begin(&mut rec);
        assert_eq!(attempt.backfill_internal_id(), id);
    }

    #[tokio::test]
    async fn failed_mutation_restores_snapshot() {
        let mut rec = record(false);
        let before = rec.clone();

        let result = guard(&mut rec, |staged| async move {
            assert!(staged.internal_id.is_some());
            Err::<UpdatedFields, _>(Error::remote("memory", "validation failed"))
        })
        .await;

        assert!(matches!(result, Err(Error::Remote { .. })));
        assert_eq!(rec, before);
    }

    #[tokio::test]
    async fn successful_mutation_commits_minted_token() {
        let mut rec = record(false);
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let seen_in = seen.clone();

        guard(&mut rec, |staged| async move {
            *seen_in.lock().unwrap() = staged.internal_id.clone();
            Ok(updated("record:a/2", "branch"))
        })
        .await
        .unwrap();

        assert_eq!(rec.reference, "record:a/2");
        assert!(rec.internal_id.is_some());
        assert_eq!(rec.internal_id, *seen.lock().unwrap());
    }

    #[test]
    fn guard_works_from_sync_code() {
        let mut rec = record(true);
        let result = tokio_test::block_on(guard(&mut rec, |_| async {
            Ok(updated("record:a/3", "dc"))
        }));
        assert!(result.is_ok());
        assert_eq!(rec.reference, "record:a/3");
    }
}
