use crate::format::TransferFormat;
use thiserror::Error;

/// Import/export failures. Every variant is terminal for the operation that
/// raised it: nothing has been written when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Import content is empty")]
    EmptyContent,

    #[error(
        "Could not detect import format. Supported formats: full JSON export, \
         simple JSON array, key-value JSON object, or .env"
    )]
    UnrecognizedFormat,

    #[error("Unknown transfer format: {0}")]
    UnknownFormat(String),

    #[error("Invalid {format} content: {message}")]
    Malformed {
        format: TransferFormat,
        message: String,
    },

    #[error("Failed to serialize {format} export: {message}")]
    Serialization {
        format: TransferFormat,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, TransferError>;
