//! Secret Store Abstractions
//!
//! Defines the contract for the remote store that holds named secret entries,
//! along with the snapshot types the store hands back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Opaque reference to a secret store (usually the store's base URI).
///
/// Trailing slashes are trimmed so that `https://kv.example/` and
/// `https://kv.example` address the same store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreRef(String);

impl StoreRef {
    pub fn new(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let trimmed = reference.trim().trim_end_matches('/');
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short human-readable name: the first host label of a URI, or the
    /// whole reference when it has no scheme.
    ///
    /// `https://kv-prod.vault.azure.net` → `kv-prod`
    pub fn display_name(&self) -> &str {
        let Some((_, rest)) = self.0.split_once("://") else {
            return &self.0;
        };
        let host = rest.split('/').next().unwrap_or(rest);
        match host.split('.').next() {
            Some(label) if !label.is_empty() => label,
            _ => &self.0,
        }
    }
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreRef {
    fn from(value: &str) -> Self {
        StoreRef::new(value)
    }
}

impl From<String> for StoreRef {
    fn from(value: String) -> Self {
        StoreRef::new(value)
    }
}

/// Metadata attached to an entry. Timestamps are Unix seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverable_days: Option<u32>,
}

/// Immutable snapshot of an entry as listed by the store (no value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub identifier: String,
    #[serde(default)]
    pub attributes: EntryAttributes,
}

impl Entry {
    pub fn new(identifier: impl Into<String>, attributes: EntryAttributes) -> Self {
        Self {
            identifier: identifier.into(),
            attributes,
        }
    }

    /// Entry name: the last `/`-delimited segment of the identifier.
    pub fn name(&self) -> &str {
        self.identifier
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.identifier)
    }
}

/// A fetched entry value together with its identifier and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBundle {
    pub identifier: String,
    pub value: Option<String>,
    #[serde(default)]
    pub attributes: EntryAttributes,
}

/// Remote secret store trait
///
/// The reconciliation core only needs four operations from a store. Timeouts,
/// retries and authentication are the implementation's concern.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::secret_store::{SecretStoreClient, StoreRef};
///
/// async fn count(client: &dyn SecretStoreClient, store: &StoreRef) -> usize {
///     client.list_entries(store).await.map(|e| e.len()).unwrap_or(0)
/// }
/// ```
#[async_trait]
pub trait SecretStoreClient: Send + Sync {
    /// List all live entries with metadata, without values
    async fn list_entries(&self, store: &StoreRef) -> Result<Vec<Entry>>;

    /// Fetch the current value
    ///
    /// Returns `BridgeError::NotFound` when the entry is absent.
    async fn get_value(&self, store: &StoreRef, name: &str) -> Result<SecretBundle>;

    /// Fetch one historical version of an entry
    async fn get_version(&self, store: &StoreRef, name: &str, version: &str)
        -> Result<SecretBundle>;

    /// Create a new entry
    async fn create_entry(&self, store: &StoreRef, name: &str, value: &str) -> Result<Entry>;

    /// Write a new version of an existing entry
    ///
    /// The store keeps prior versions; nothing is overwritten in place.
    async fn update_entry(&self, store: &StoreRef, name: &str, value: &str) -> Result<Entry>;
}
