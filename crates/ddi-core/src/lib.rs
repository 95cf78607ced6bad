// # ddi-core
//
// Core library for reconciling declared resources against a shared DDI
// directory (DNS, DHCP and IPAM objects behind a WAPI-style REST API).
//
// ## Architecture Overview
//
// - **DirectoryClient**: Trait for CRUD and search against the remote directory
// - **RecordStore**: Trait for persisting local resource records
// - **ObjectResolver**: Locates the live object by reference, then by identity
// - **Merge engine**: Three-way attribute merge that leaves foreign keys alone
// - **UpdateGuard**: Snapshot-and-restore around every mutating operation
// - **Reconciler**: Create / read / update / delete / import orchestration
// - **ClientRegistry**: Plugin-based registry for directory clients
//
// ## Design Principles
//
// 1. **Stable identity**: Every managed object carries a minted token in its
//    attribute bag; references are a cache, the token is the truth
// 2. **Shared ownership**: Only keys the operator declares are managed
// 3. **Atomic local state**: A failed operation leaves the record untouched
// 4. **Plugin-Based**: Clients are registered by name, no hard-coded if-else
// 5. **Library-First**: All core functionality can be used as a library

pub mod attrs;
pub mod config;
pub mod directory;
pub mod error;
pub mod guard;
pub mod identity;
pub mod merge;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use attrs::{AttributeMap, Value, ValueKind};
pub use config::{ClientConfig, ReconcilerConfig, ReconcilerSettings, RecordStoreConfig};
pub use directory::MemoryDirectory;
pub use error::{Error, Result};
pub use guard::{UpdateGuard, UpdatedFields, guard};
pub use identity::{IDENTITY_ATTR_KEY, InternalId};
pub use merge::{Projection, merge, project};
pub use reconciler::{DeleteOutcome, ReadOutcome, Reconciler, UpdateOutcome};
pub use record::{CreateRequest, ResourceRecord, ResourceSpec};
pub use registry::ClientRegistry;
pub use resolver::{ObjectResolver, Resolved, ResolvedVia};
pub use state::{FileRecordStore, MemoryRecordStore};
pub use traits::{DirectoryClient, RecordStore};
