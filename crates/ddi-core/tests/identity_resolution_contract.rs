//! Contract Test: Identity Resolution
//!
//! A managed resource must keep finding its remote object when the remote
//! reference changes, and must never silently adopt somebody else's object.
//!
//! Constraints verified:
//! - A rotated reference is repaired through the identity search
//! - A valid reference is used directly, with no search
//! - Two objects claiming one token surface as `IdentityConflict`
//! - Minted tokens are never shared between resources
//! - Tokens written by other tools are matched and carried as written
//!
//! If this test fails, managed resources can lose or swap their objects.

mod common;

use common::*;
use ddi_core::attrs::codec::inject_identity;
use ddi_core::{
    CreateRequest, Error, IDENTITY_ATTR_KEY, ReadOutcome, ResourceSpec, UpdateOutcome, Value,
};
use std::collections::HashSet;

#[tokio::test]
async fn rotated_reference_is_repaired_on_read() {
    let (dir, reconciler) = recording_reconciler();
    let mut record = reconciler
        .create(CreateRequest::new(
            "record:host",
            ResourceSpec::with_attributes(attrs(&[("site", "hq")])),
        ))
        .await
        .expect("create succeeds");

    let old_ref = record.reference.clone();
    let new_ref = dir.inner().rename(&old_ref).await.unwrap();
    dir.reset();

    let outcome = reconciler.read(&mut record).await.expect("read succeeds");

    assert!(matches!(outcome, ReadOutcome::Present { .. }));
    assert_eq!(record.reference, new_ref);
    assert_eq!(
        dir.calls(),
        vec![Call::Fetch(old_ref), Call::Search("record:host".to_string())]
    );
}

#[tokio::test]
async fn valid_reference_skips_search() {
    let (dir, reconciler) = recording_reconciler();
    let mut record = reconciler
        .create(CreateRequest::new("record:host", ResourceSpec::default()))
        .await
        .unwrap();
    dir.reset();

    reconciler.read(&mut record).await.unwrap();

    assert_eq!(dir.calls(), vec![Call::Fetch(record.reference.clone())]);
}

#[tokio::test]
async fn update_targets_the_renamed_object() {
    let (dir, reconciler) = recording_reconciler();
    let mut record = reconciler
        .create(CreateRequest::new(
            "record:host",
            ResourceSpec::with_attributes(attrs(&[("site", "hq")])),
        ))
        .await
        .unwrap();

    let new_ref = dir.inner().rename(&record.reference).await.unwrap();

    let outcome = reconciler
        .update(
            &mut record,
            ResourceSpec::with_attributes(attrs(&[("site", "branch")])),
        )
        .await
        .expect("update succeeds");

    match outcome {
        UpdateOutcome::Updated {
            previous_ref,
            new_ref: updated_ref,
        } => {
            assert_ne!(previous_ref, new_ref);
            assert_eq!(updated_ref, new_ref);
        }
        other => panic!("expected an update, got {other:?}"),
    }
    assert_eq!(record.reference, new_ref);
    assert!(dir.calls().contains(&Call::Update(new_ref.clone())));

    let object = dir.inner().get(&new_ref).await.unwrap();
    assert_eq!(object.attributes["site"], Value::from("branch"));
}

#[tokio::test]
async fn reference_reused_by_another_object_is_not_adopted() {
    let (dir, reconciler) = memory_reconciler();
    let mut mine = reconciler
        .create(CreateRequest::new("record:host", ResourceSpec::default()))
        .await
        .unwrap();
    let theirs = reconciler
        .create(CreateRequest::new("record:host", ResourceSpec::default()))
        .await
        .unwrap();

    // Point the local record at the other object's reference
    let my_ref = mine.reference.clone();
    mine.reference = theirs.reference.clone();

    reconciler.read(&mut mine).await.unwrap();

    assert_eq!(mine.reference, my_ref);
    assert_eq!(dir.len().await, 2);
}

#[tokio::test]
async fn duplicate_token_is_identity_conflict() {
    let (dir, reconciler) = memory_reconciler();
    let mut record = reconciler
        .create(CreateRequest::new("record:host", ResourceSpec::default()))
        .await
        .unwrap();
    let id = record.internal_id.clone().unwrap();

    // A second object claims the same token, and the cached ref goes stale
    let mut forged = attrs(&[]);
    inject_identity(&mut forged, &id);
    dir.insert_raw("record:host", forged).await;
    dir.rename(&record.reference).await.unwrap();

    let before = record.clone();
    let err = reconciler.read(&mut record).await.unwrap_err();

    match err {
        Error::IdentityConflict { references, .. } => assert_eq!(references.len(), 2),
        other => panic!("expected IdentityConflict, got {other:?}"),
    }
    assert_eq!(record, before);
}

#[tokio::test]
async fn identity_conflict_is_not_swallowed_by_delete() {
    let (dir, reconciler) = memory_reconciler();
    let record = reconciler
        .create(CreateRequest::new("record:host", ResourceSpec::default()))
        .await
        .unwrap();

    let mut forged = attrs(&[]);
    inject_identity(&mut forged, record.internal_id.as_ref().unwrap());
    dir.insert_raw("record:host", forged).await;
    dir.remove(&record.reference).await;

    // One survivor plus a missing original still means one match: deleted
    let outcome = reconciler.delete(&record).await.unwrap();
    assert!(matches!(outcome, ddi_core::DeleteOutcome::Deleted { .. }));

    // Two claimants is a conflict, never AlreadyGone
    let mut first = attrs(&[]);
    inject_identity(&mut first, record.internal_id.as_ref().unwrap());
    dir.insert_raw("record:host", first.clone()).await;
    dir.insert_raw("record:host", first).await;

    let err = reconciler.delete(&record).await.unwrap_err();
    assert!(matches!(err, Error::IdentityConflict { .. }));
    assert_eq!(dir.len().await, 2);
}

#[tokio::test]
async fn object_without_token_is_gone_once_reference_fails() {
    let (dir, reconciler) = memory_reconciler();
    let reference = dir.insert_raw("record:host", attrs(&[("site", "hq")])).await;
    let mut record = reconciler.import("record:host", &reference).await.unwrap();
    assert!(record.internal_id.is_none());

    dir.rename(&reference).await.unwrap();

    assert_eq!(reconciler.read(&mut record).await.unwrap(), ReadOutcome::Gone);
    assert_eq!(dir.search_count(), 0);
}

#[tokio::test]
async fn token_written_by_another_tool_keeps_its_spelling() {
    const TOKEN: &str = "6F9619FF-8B86-D011-B42D-00C04FC964FF";
    let (dir, reconciler) = memory_reconciler();
    let reference = dir
        .insert_raw(
            "record:host",
            attrs(&[("site", "hq"), (IDENTITY_ATTR_KEY, TOKEN)]),
        )
        .await;
    let mut record = reconciler.import("record:host", &reference).await.unwrap();
    assert_eq!(record.internal_id.as_ref().unwrap().as_str(), TOKEN);

    let new_ref = dir.rename(&reference).await.unwrap();
    let outcome = reconciler.read(&mut record).await.unwrap();

    assert!(matches!(outcome, ReadOutcome::Present { .. }));
    assert_eq!(record.reference, new_ref);

    let outcome = reconciler
        .update(
            &mut record,
            ResourceSpec::with_attributes(attrs(&[("site", "hq")])),
        )
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Unchanged { reference: new_ref.clone() });
    assert_eq!(dir.update_count(), 0);
    let object = dir.get(&new_ref).await.unwrap();
    assert_eq!(object.attributes[IDENTITY_ATTR_KEY], Value::from(TOKEN));
}

#[tokio::test]
async fn minted_tokens_are_exclusive() {
    let (dir, reconciler) = memory_reconciler();
    let mut seen = HashSet::new();

    for _ in 0..50 {
        let record = reconciler
            .create(CreateRequest::new("record:host", ResourceSpec::default()))
            .await
            .unwrap();
        let id = record.internal_id.clone().unwrap();
        assert!(seen.insert(id.clone()), "token {id} minted twice");

        let resolved = ddi_core::ObjectResolver::new(&dir)
            .search_by_identity("record:host", &id)
            .await
            .unwrap();
        assert_eq!(resolved.reference, record.reference);
        assert_eq!(
            resolved.attributes[IDENTITY_ATTR_KEY],
            Value::from(id.as_str())
        );
    }
}
