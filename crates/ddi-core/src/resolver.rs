//! Object resolver
//!
//! Finds the live remote object for a local record. The cached reference is
//! tried first; the identity token is the fallback and the authority.
//!
//! ## Algorithm
//!
//! ```text
//! last_known_ref ──► fetch_by_ref ──► ok, token matches ──► Resolved (Reference)
//!        │                 │
//!        │ empty           ├── NotFound ───────┐
//!        │                 └── token mismatch ─┤
//!        ▼                                     ▼
//!   search(type, {IDENTITY_ATTR_KEY: token}) ──► 0 ─► NotFound
//!                                            ├─► 1 ─► Resolved (IdentitySearch)
//!                                            └─► n ─► IdentityConflict
//! ```
//!
//! The resolver is read-only. Callers update their cached reference from
//! [`Resolved::reference_changed`].

use tracing::{debug, info, warn};

use crate::attrs::codec::identity_of;
use crate::error::{Error, Result};
use crate::identity::{IDENTITY_ATTR_KEY, InternalId};
use crate::traits::{DirectoryClient, RemoteObject, SearchFilter};

/// How the live object was located
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedVia {
    /// The cached reference was still valid
    Reference,
    /// The identity search found it
    IdentitySearch,
}

/// Result of a successful resolve
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The live object
    pub object: RemoteObject,
    /// How it was found
    pub via: ResolvedVia,
    /// Whether the caller's cached reference differs from the live one
    pub reference_changed: bool,
}

/// Locates remote objects by reference and identity token
pub struct ObjectResolver<'c> {
    client: &'c dyn DirectoryClient,
}

impl<'c> ObjectResolver<'c> {
    /// Create a resolver over a directory client
    pub fn new(client: &'c dyn DirectoryClient) -> Self {
        Self { client }
    }

    /// Resolve the current remote object
    ///
    /// # Parameters
    ///
    /// - `type_name`: Object type to search
    /// - `last_known_ref`: Cached reference; may be empty or stale
    /// - `internal_id`: Identity token, if the record has one
    ///
    /// # Returns
    ///
    /// - `Ok(Resolved)`: The live object
    /// - `Err(Error::NotFound)`: The object no longer exists remotely
    /// - `Err(Error::IdentityConflict)`: Several objects claim the token
    /// - `Err(Error)`: Client failure (no fallback search is attempted)
    pub async fn resolve(
        &self,
        type_name: &str,
        last_known_ref: &str,
        internal_id: Option<&InternalId>,
    ) -> Result<Resolved> {
        if !last_known_ref.is_empty() {
            match self.client.fetch_by_ref(type_name, last_known_ref).await {
                Ok(object) => {
                    if Self::claims_other_identity(&object, internal_id)? {
                        warn!(
                            reference = last_known_ref,
                            "reference now points at an object with another identity, searching"
                        );
                    } else {
                        debug!(reference = last_known_ref, "resolved by reference");
                        let reference_changed = object.reference != last_known_ref;
                        return Ok(Resolved {
                            object,
                            via: ResolvedVia::Reference,
                            reference_changed,
                        });
                    }
                }
                Err(e) if e.is_not_found() => {
                    debug!(reference = last_known_ref, "cached reference is gone");
                }
                Err(e) => return Err(e),
            }
        }

        let Some(id) = internal_id else {
            return Err(Error::not_found(format!(
                "{} '{}' has no identity token to search by",
                type_name, last_known_ref
            )));
        };

        let object = self.search_by_identity(type_name, id).await?;
        let reference_changed = object.reference != last_known_ref;
        if reference_changed {
            info!(
                previous = last_known_ref,
                current = %object.reference,
                "repaired stale reference via identity search"
            );
        }

        Ok(Resolved {
            object,
            via: ResolvedVia::IdentitySearch,
            reference_changed,
        })
    }

    /// Search for the single object carrying an identity token
    pub async fn search_by_identity(
        &self,
        type_name: &str,
        internal_id: &InternalId,
    ) -> Result<RemoteObject> {
        let filter = SearchFilter::attribute(IDENTITY_ATTR_KEY, internal_id.as_str());
        let mut matches = self.client.search(type_name, &filter).await?;

        match matches.len() {
            0 => Err(Error::not_found(format!(
                "no {} carries identity {}",
                type_name, internal_id
            ))),
            1 => Ok(matches.remove(0)),
            _ => Err(Error::IdentityConflict {
                type_name: type_name.to_string(),
                internal_id: internal_id.to_string(),
                references: matches.into_iter().map(|o| o.reference).collect(),
            }),
        }
    }

    /// True when the object carries a token different from the expected one
    fn claims_other_identity(
        object: &RemoteObject,
        expected: Option<&InternalId>,
    ) -> Result<bool> {
        let Some(expected) = expected else {
            return Ok(false);
        };
        match identity_of(&object.attributes) {
            Ok(Some(found)) => Ok(&found != expected),
            Ok(None) => Ok(false),
            // Unparseable token can't be ours
            Err(Error::InvalidToken(_)) => Ok(true),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::{AttributeMap, Value};
    use crate::attrs::codec::inject_identity;
    use crate::directory::MemoryDirectory;
    use crate::traits::ObjectPayload;

    fn payload_with(id: Option<&InternalId>) -> ObjectPayload {
        let mut attributes = AttributeMap::new();
        attributes.insert("site".into(), Value::from("hq"));
        if let Some(id) = id {
            inject_identity(&mut attributes, id);
        }
        ObjectPayload {
            fields: Default::default(),
            attributes,
        }
    }

    #[tokio::test]
    async fn resolves_by_reference_first() {
        let dir = MemoryDirectory::new();
        let id = InternalId::mint();
        let created = dir.create("record:a", &payload_with(Some(&id))).await.unwrap();

        let resolved = ObjectResolver::new(&dir)
            .resolve("record:a", &created.reference, Some(&id))
            .await
            .unwrap();

        assert_eq!(resolved.via, ResolvedVia::Reference);
        assert!(!resolved.reference_changed);
        assert_eq!(dir.search_count(), 0);
    }

    #[tokio::test]
    async fn falls_back_to_identity_after_rename() {
        let dir = MemoryDirectory::new();
        let id = InternalId::mint();
        let created = dir.create("record:a", &payload_with(Some(&id))).await.unwrap();
        let renamed = dir.rename(&created.reference).await.unwrap();

        let resolved = ObjectResolver::new(&dir)
            .resolve("record:a", &created.reference, Some(&id))
            .await
            .unwrap();

        assert_eq!(resolved.via, ResolvedVia::IdentitySearch);
        assert!(resolved.reference_changed);
        assert_eq!(resolved.object.reference, renamed);
    }

    #[tokio::test]
    async fn empty_reference_searches_directly() {
        let dir = MemoryDirectory::new();
        let id = InternalId::mint();
        dir.create("record:a", &payload_with(Some(&id))).await.unwrap();

        let resolved = ObjectResolver::new(&dir)
            .resolve("record:a", "", Some(&id))
            .await
            .unwrap();
        assert_eq!(resolved.via, ResolvedVia::IdentitySearch);
        assert_eq!(dir.fetch_count(), 0);
    }

    #[tokio::test]
    async fn missing_everywhere_is_not_found() {
        let dir = MemoryDirectory::new();
        let err = ObjectResolver::new(&dir)
            .resolve("record:a", "record:a/404", Some(&InternalId::mint()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn no_reference_and_no_token_is_not_found() {
        let dir = MemoryDirectory::new();
        let err = ObjectResolver::new(&dir)
            .resolve("record:a", "", None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn duplicate_identity_is_a_conflict() {
        let dir = MemoryDirectory::new();
        let id = InternalId::mint();
        dir.create("record:a", &payload_with(Some(&id))).await.unwrap();
        dir.create("record:a", &payload_with(Some(&id))).await.unwrap();

        let err = ObjectResolver::new(&dir)
            .resolve("record:a", "", Some(&id))
            .await
            .unwrap_err();

        match err {
            Error::IdentityConflict { references, .. } => assert_eq!(references.len(), 2),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reused_reference_with_foreign_identity_is_skipped() {
        let dir = MemoryDirectory::new();
        let mine = InternalId::mint();
        let theirs = InternalId::mint();
        let my_obj = dir.create("record:a", &payload_with(Some(&mine))).await.unwrap();
        let their_obj = dir.create("record:a", &payload_with(Some(&theirs))).await.unwrap();

        // Cached reference points at someone else's object
        let resolved = ObjectResolver::new(&dir)
            .resolve("record:a", &their_obj.reference, Some(&mine))
            .await
            .unwrap();

        assert_eq!(resolved.object.reference, my_obj.reference);
        assert_eq!(resolved.via, ResolvedVia::IdentitySearch);
    }

    #[tokio::test]
    async fn record_without_token_accepts_reference_hit() {
        let dir = MemoryDirectory::new();
        let created = dir.create("record:a", &payload_with(None)).await.unwrap();

        let resolved = ObjectResolver::new(&dir)
            .resolve("record:a", &created.reference, None)
            .await
            .unwrap();
        assert_eq!(resolved.via, ResolvedVia::Reference);
    }

    #[tokio::test]
    async fn client_failure_is_not_masked_by_search() {
        let dir = MemoryDirectory::new();
        dir.fail_next("fetch_by_ref", "connection reset");

        let err = ObjectResolver::new(&dir)
            .resolve("record:a", "record:a/1", Some(&InternalId::mint()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Remote { .. }));
        assert_eq!(dir.search_count(), 0);
    }
}
