//! # Host Bridge Traits
//!
//! Collaborator traits the sync core depends on but does not implement.
//!
//! ## Traits
//!
//! - [`SecretStoreClient`](secret_store::SecretStoreClient) - List, read, create and
//!   update entries in a remote secret store
//! - [`Clock`](time::Clock) - Time source for deterministic cache expiry
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Implementations
//!
//! | Backend   | Implementation Crate | Notes |
//! |-----------|---------------------|-------|
//! | In-memory | `bridge-memory`     | Versioned values, failure injection |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast when a required capability is missing:
//!
//! ```ignore
//! let client = config.secret_store.ok_or_else(|| Error::CapabilityMissing {
//!     capability: "SecretStoreClient".to_string(),
//!     message: "Inject a SecretStoreClient implementation.".to_string(),
//! })?;
//! ```
//!
//! ## Error Handling
//!
//! Every trait reports failures with [`BridgeError`](error::BridgeError).
//! Implementations should map backend errors onto `NotFound` / `Conflict`
//! where they apply so the core can distinguish them from transport failures.

pub mod error;
pub mod secret_store;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use secret_store::{Entry, EntryAttributes, SecretBundle, SecretStoreClient, StoreRef};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
