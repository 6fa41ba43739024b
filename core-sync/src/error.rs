use bridge_traits::error::BridgeError;
use core_transfer::TransferError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] BridgeError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Failed to load value: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unknown entry: {0}")]
    UnknownEntry(String),

    #[error("Entry {name} does not exist in {store}")]
    NotApplicable { store: String, name: String },

    #[error("Cannot {action} {name}: entry is {status}")]
    InvalidAction {
        name: String,
        action: String,
        status: String,
    },

    #[error("Import has {unresolved} unresolved conflict(s)")]
    Validation { unresolved: usize },

    #[error("Conflict index {index} out of range ({len} conflicts)")]
    ConflictIndexOutOfRange { index: usize, len: usize },

    #[error("No conflict for entry {0}")]
    UnknownConflict(String),

    #[error("Invalid conflict policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Sync cancelled")]
    Cancelled,
}

/// Why a single value could not be loaded.
///
/// `Clone` so one in-flight result can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{name} not found in {store}")]
    NotFound { store: String, name: String },

    #[error("{name} in {store}: {message}")]
    Store {
        store: String,
        name: String,
        message: String,
    },

    #[error("fetch of {name} cancelled before it started")]
    Cancelled { name: String },
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
