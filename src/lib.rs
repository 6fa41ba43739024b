//! Workspace umbrella crate.
//!
//! Re-exports the service façade and the crates hosts usually need next to it,
//! so an application can depend on `vault-sync-workspace` alone.

pub use bridge_traits;
pub use core_runtime;
pub use core_service::{CoreError, Result, VaultSyncService};
pub use core_sync;
pub use core_transfer;

#[cfg(feature = "memory-store")]
pub use bridge_memory::InMemorySecretStore;
