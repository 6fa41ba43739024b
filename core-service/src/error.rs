use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Store error: {0}")]
    Store(#[from] bridge_traits::BridgeError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] core_transfer::TransferError),
}

impl CoreError {
    /// Number of unresolved conflicts when a commit was rejected for them.
    pub fn unresolved_conflicts(&self) -> Option<usize> {
        match self {
            CoreError::Sync(core_sync::SyncError::Validation { unresolved }) => Some(*unresolved),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
