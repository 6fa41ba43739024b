use crate::error::TransferError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported import/export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferFormat {
    /// JSON object with store metadata and `{name, value, attributes}` items
    Full,
    /// JSON array of `{name, value}`
    Simple,
    /// Flat JSON object mapping name to value
    KeyValue,
    /// `NAME="value"` lines
    Dotenv,
}

impl TransferFormat {
    pub const ALL: [TransferFormat; 4] = [
        TransferFormat::Full,
        TransferFormat::Simple,
        TransferFormat::KeyValue,
        TransferFormat::Dotenv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferFormat::Full => "full",
            TransferFormat::Simple => "simple",
            TransferFormat::KeyValue => "keyValue",
            TransferFormat::Dotenv => "dotenv",
        }
    }

    /// Conventional file extension for exported content.
    pub fn file_extension(&self) -> &'static str {
        match self {
            TransferFormat::Dotenv => "env",
            _ => "json",
        }
    }
}

impl fmt::Display for TransferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferFormat {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "full" => Ok(TransferFormat::Full),
            "simple" => Ok(TransferFormat::Simple),
            "keyValue" | "key-value" | "keyvalue" => Ok(TransferFormat::KeyValue),
            "dotenv" | "env" | ".env" => Ok(TransferFormat::Dotenv),
            other => Err(TransferError::UnknownFormat(other.to_string())),
        }
    }
}
