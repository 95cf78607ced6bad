// # Directory Client Implementations
//
// Directory clients shipped with the core. Network-backed clients live in
// their own crates (see `ddi-client-wapi`).

pub mod memory;

pub use memory::{MemoryDirectory, MemoryDirectoryFactory};
