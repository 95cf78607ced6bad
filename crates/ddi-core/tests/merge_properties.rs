//! Property-based tests for the attribute merge engine.
//!
//! Generates random remote / previous / desired bags and checks the
//! ownership rules hold for all of them.
//!
//! Run with: `cargo test --test merge_properties`

use proptest::prelude::*;

use ddi_core::attrs::attributes_equivalent;
use ddi_core::attrs::codec::decode_desired;
use ddi_core::{AttributeMap, IDENTITY_ATTR_KEY, InternalId, Value, merge, project};

// =============================================================================
// Strategies
// =============================================================================

/// Attribute values, lists one level deep
fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[a-z0-9 .-]{0,12}".prop_map(Value::String),
    ];

    leaf.prop_recursive(1, 8, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Value::List)
    })
}

/// Attribute bags over a small key space so keys collide between bags
fn bag_strategy() -> impl Strategy<Value = AttributeMap> {
    prop::collection::btree_map("[a-f]", value_strategy(), 0..6)
}

/// Remote bag: arbitrary keys plus a valid identity entry
fn remote_strategy() -> impl Strategy<Value = AttributeMap> {
    bag_strategy().prop_map(|mut bag| {
        bag.insert(
            IDENTITY_ATTR_KEY.to_string(),
            Value::from(InternalId::mint().as_str()),
        );
        bag
    })
}

/// Previous and desired bags whose shared keys keep their remote shape
fn merge_input_strategy() -> impl Strategy<Value = (AttributeMap, AttributeMap, AttributeMap)> {
    (remote_strategy(), bag_strategy(), bag_strategy()).prop_map(
        |(remote, previous, mut desired)| {
            // Newly managed keys must match the remote kind, or merge refuses
            for (key, value) in desired.iter_mut() {
                if previous.contains_key(key) {
                    continue;
                }
                if let Some(existing) = remote.get(key) {
                    *value = existing.clone();
                }
            }
            (remote, previous, desired)
        },
    )
}

proptest! {
    /// Foreign keys (not in previous or desired) keep their exact remote value
    #[test]
    fn foreign_keys_preserved((remote, previous, desired) in merge_input_strategy()) {
        let merged = merge(&remote, &previous, &desired).unwrap();

        for (key, value) in &remote {
            if !previous.contains_key(key) && !desired.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
        prop_assert_eq!(merged.get(IDENTITY_ATTR_KEY), remote.get(IDENTITY_ATTR_KEY));
    }

    /// Desired keys carry the desired value, in the caller's order
    #[test]
    fn desired_values_win((remote, previous, desired) in merge_input_strategy()) {
        let merged = merge(&remote, &previous, &desired).unwrap();

        for (key, value) in &desired {
            prop_assert_eq!(merged.get(key), Some(value));
        }
    }

    /// Keys dropped from desired are removed
    #[test]
    fn dropped_keys_removed((remote, previous, desired) in merge_input_strategy()) {
        let merged = merge(&remote, &previous, &desired).unwrap();

        for key in previous.keys() {
            if !desired.contains_key(key) {
                prop_assert!(!merged.contains_key(key));
            }
        }
    }

    /// Merging against the result of a previous merge changes nothing
    #[test]
    fn merge_is_idempotent((remote, previous, desired) in merge_input_strategy()) {
        let once = merge(&remote, &previous, &desired).unwrap();
        let twice = merge(&once, &desired, &desired).unwrap();
        prop_assert!(attributes_equivalent(&once, &twice));
    }

    /// Read projection never exposes the identity entry
    #[test]
    fn projection_hides_identity(remote in remote_strategy(), tracked in bag_strategy()) {
        let projection = project(&remote, &tracked);
        prop_assert!(!projection.visible.contains_key(IDENTITY_ATTR_KEY));
        prop_assert!(!projection.external.contains_key(IDENTITY_ATTR_KEY));
        prop_assert_eq!(projection.visible.len() + projection.external.len(), remote.len() - 1);
    }

    /// Decoding arbitrary text never panics
    #[test]
    fn decode_never_panics(raw in ".{0,64}") {
        let _ = decode_desired(&raw);
    }
}
