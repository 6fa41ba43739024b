//! # In-Memory Bridge Implementation
//!
//! A [`SecretStoreClient`] backed by process memory. Every update appends a
//! new version, mirroring how remote secret stores keep history.
//!
//! ## Overview
//!
//! Besides the store operations, [`InMemorySecretStore`] offers hooks that make
//! it useful for exercising the sync core:
//! - seeding entries without touching call counters
//! - failure injection per `(store, name)` for reads and writes
//! - listing failures per store
//! - call counters per operation
//! - optional artificial latency on every call
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_memory::InMemorySecretStore;
//! use bridge_traits::{SecretStoreClient, StoreRef};
//!
//! let store = InMemorySecretStore::new();
//! let kv = StoreRef::new("memory://staging");
//! store.seed(&kv, "db-password", "hunter2").await;
//! let entries = store.list_entries(&kv).await?;
//! ```

mod store;

pub use store::{CallCounts, InMemorySecretStore};
