//! Versioned in-memory secret store

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    Clock, Entry, EntryAttributes, SecretBundle, SecretStoreClient, StoreRef, SystemClock,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

const RECOVERY_LEVEL: &str = "Recoverable+Purgeable";
const RECOVERABLE_DAYS: u32 = 90;

#[derive(Debug, Clone)]
struct StoredVersion {
    version: String,
    value: String,
    updated: u64,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    created: u64,
    enabled: bool,
    versions: Vec<StoredVersion>,
}

impl StoredEntry {
    fn current(&self) -> Option<&StoredVersion> {
        self.versions.last()
    }

    fn attributes(&self) -> EntryAttributes {
        EntryAttributes {
            enabled: Some(self.enabled),
            created: Some(self.created),
            updated: self.current().map(|v| v.updated),
            recovery_level: Some(RECOVERY_LEVEL.to_string()),
            recoverable_days: Some(RECOVERABLE_DAYS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FailOn {
    Read,
    Write,
}

/// Snapshot of how many times each store operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub create: usize,
    pub update: usize,
}

#[derive(Debug, Default)]
struct Counters {
    list: AtomicUsize,
    get: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
}

/// In-memory [`SecretStoreClient`] with versioned values and failure injection.
pub struct InMemorySecretStore {
    stores: RwLock<HashMap<StoreRef, BTreeMap<String, StoredEntry>>>,
    failures: RwLock<HashSet<(FailOn, StoreRef, String)>>,
    unavailable: RwLock<HashSet<StoreRef>>,
    counters: Counters,
    latency: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashSet::new()),
            unavailable: RwLock::new(HashSet::new()),
            counters: Counters::default(),
            latency: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Delay every store call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Use `clock` for created/updated timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Insert or append a value without counting it as a client call.
    pub async fn seed(&self, store: &StoreRef, name: &str, value: &str) {
        let now = self.now_secs();
        let mut stores = self.stores.write().await;
        let entries = stores.entry(store.clone()).or_default();
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| StoredEntry {
                created: now,
                enabled: true,
                versions: Vec::new(),
            });
        entry.versions.push(StoredVersion {
            version: new_version_id(),
            value: value.to_string(),
            updated: now,
        });
    }

    /// Current value of `name`, bypassing counters and failure injection.
    pub async fn value_of(&self, store: &StoreRef, name: &str) -> Option<String> {
        let stores = self.stores.read().await;
        stores
            .get(store)
            .and_then(|entries| entries.get(name))
            .and_then(|entry| entry.current())
            .map(|v| v.value.clone())
    }

    /// Number of versions recorded for `name` (0 when absent).
    pub async fn version_count(&self, store: &StoreRef, name: &str) -> usize {
        let stores = self.stores.read().await;
        stores
            .get(store)
            .and_then(|entries| entries.get(name))
            .map(|entry| entry.versions.len())
            .unwrap_or(0)
    }

    /// Version identifiers of `name`, oldest first.
    pub async fn versions(&self, store: &StoreRef, name: &str) -> Vec<String> {
        let stores = self.stores.read().await;
        stores
            .get(store)
            .and_then(|entries| entries.get(name))
            .map(|entry| entry.versions.iter().map(|v| v.version.clone()).collect())
            .unwrap_or_default()
    }

    /// Make every `get_value` for `name` fail.
    pub async fn fail_reads(&self, store: &StoreRef, name: &str) {
        self.failures
            .write()
            .await
            .insert((FailOn::Read, store.clone(), name.to_string()));
    }

    /// Make every create/update for `name` fail.
    pub async fn fail_writes(&self, store: &StoreRef, name: &str) {
        self.failures
            .write()
            .await
            .insert((FailOn::Write, store.clone(), name.to_string()));
    }

    /// Make `list_entries` fail for `store`.
    pub async fn fail_listing(&self, store: &StoreRef) {
        self.unavailable.write().await.insert(store.clone());
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
        self.unavailable.write().await.clear();
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list: self.counters.list.load(Ordering::SeqCst),
            get: self.counters.get.load(Ordering::SeqCst),
            create: self.counters.create.load(Ordering::SeqCst),
            update: self.counters.update.load(Ordering::SeqCst),
        }
    }

    async fn read_version(
        &self,
        store: &StoreRef,
        name: &str,
        version: Option<&str>,
    ) -> Result<SecretBundle> {
        self.counters.get.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_failure(FailOn::Read, store, name).await?;

        let stores = self.stores.read().await;
        let entry = stores
            .get(store)
            .and_then(|entries| entries.get(name))
            .ok_or_else(|| BridgeError::NotFound(name.to_string()))?;

        let selected = match version {
            Some(version) => entry.versions.iter().find(|v| v.version == version),
            None => entry.current(),
        }
        .ok_or_else(|| {
            BridgeError::NotFound(format!("{}/{}", name, version.unwrap_or("current")))
        })?;

        Ok(SecretBundle {
            identifier: format!("{}/{}", identifier(store, name), selected.version),
            value: Some(selected.value.clone()),
            attributes: entry.attributes(),
        })
    }

    fn now_secs(&self) -> u64 {
        u64::try_from(self.clock.unix_timestamp()).unwrap_or(0)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn check_failure(&self, kind: FailOn, store: &StoreRef, name: &str) -> Result<()> {
        let failures = self.failures.read().await;
        if failures.contains(&(kind, store.clone(), name.to_string())) {
            return Err(BridgeError::OperationFailed(format!(
                "Injected {:?} failure for {} in {}",
                kind,
                name,
                store.display_name()
            )));
        }
        Ok(())
    }
}

impl Default for InMemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

fn new_version_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn identifier(store: &StoreRef, name: &str) -> String {
    format!("{}/secrets/{}", store, name)
}

#[async_trait]
impl SecretStoreClient for InMemorySecretStore {
    async fn list_entries(&self, store: &StoreRef) -> Result<Vec<Entry>> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.unavailable.read().await.contains(store) {
            return Err(BridgeError::NotAvailable(format!(
                "Store {} is unavailable",
                store.display_name()
            )));
        }

        let stores = self.stores.read().await;
        let entries: Vec<Entry> = stores
            .get(store)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(name, entry)| Entry::new(identifier(store, name), entry.attributes()))
                    .collect()
            })
            .unwrap_or_default();

        debug!(store = %store, count = entries.len(), "Listed in-memory entries");
        Ok(entries)
    }

    async fn get_value(&self, store: &StoreRef, name: &str) -> Result<SecretBundle> {
        self.read_version(store, name, None).await
    }

    async fn get_version(
        &self,
        store: &StoreRef,
        name: &str,
        version: &str,
    ) -> Result<SecretBundle> {
        self.read_version(store, name, Some(version)).await
    }

    async fn create_entry(&self, store: &StoreRef, name: &str, value: &str) -> Result<Entry> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_failure(FailOn::Write, store, name).await?;

        let now = self.now_secs();
        let mut stores = self.stores.write().await;
        let entries = stores.entry(store.clone()).or_default();
        if entries.contains_key(name) {
            return Err(BridgeError::Conflict(name.to_string()));
        }

        let entry = StoredEntry {
            created: now,
            enabled: true,
            versions: vec![StoredVersion {
                version: new_version_id(),
                value: value.to_string(),
                updated: now,
            }],
        };
        let attributes = entry.attributes();
        entries.insert(name.to_string(), entry);

        debug!(store = %store, name, "Created in-memory entry");
        Ok(Entry::new(identifier(store, name), attributes))
    }

    async fn update_entry(&self, store: &StoreRef, name: &str, value: &str) -> Result<Entry> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_failure(FailOn::Write, store, name).await?;

        let now = self.now_secs();
        let mut stores = self.stores.write().await;
        let entry = stores
            .get_mut(store)
            .and_then(|entries| entries.get_mut(name))
            .ok_or_else(|| BridgeError::NotFound(name.to_string()))?;

        entry.versions.push(StoredVersion {
            version: new_version_id(),
            value: value.to_string(),
            updated: now,
        });

        debug!(store = %store, name, versions = entry.versions.len(), "Updated in-memory entry");
        Ok(Entry::new(identifier(store, name), entry.attributes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv() -> StoreRef {
        StoreRef::new("memory://kv-a")
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let store = InMemorySecretStore::new();
        store.create_entry(&kv(), "api-key", "abc").await.unwrap();

        let entries = store.list_entries(&kv()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "api-key");
        assert_eq!(entries[0].attributes.enabled, Some(true));
    }

    #[tokio::test]
    async fn test_create_existing_is_conflict() {
        let store = InMemorySecretStore::new();
        store.seed(&kv(), "api-key", "abc").await;

        let err = store.create_entry(&kv(), "api-key", "xyz").await.unwrap_err();
        assert!(matches!(err, BridgeError::Conflict(_)));
        assert_eq!(store.value_of(&kv(), "api-key").await.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemorySecretStore::new();
        let err = store.update_entry(&kv(), "ghost", "x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_appends_version() {
        let store = InMemorySecretStore::new();
        store.seed(&kv(), "token", "v1").await;
        store.update_entry(&kv(), "token", "v2").await.unwrap();

        assert_eq!(store.version_count(&kv(), "token").await, 2);
        let current = store.get_value(&kv(), "token").await.unwrap();
        assert_eq!(current.value.as_deref(), Some("v2"));

        let versions = store.versions(&kv(), "token").await;
        let first = store
            .get_version(&kv(), "token", &versions[0])
            .await
            .unwrap();
        assert_eq!(first.value.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_unknown_version_is_not_found() {
        let store = InMemorySecretStore::new();
        store.seed(&kv(), "token", "v1").await;

        let err = store
            .get_version(&kv(), "token", "nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemorySecretStore::new();
        store.seed(&kv(), "flaky", "1").await;
        store.fail_reads(&kv(), "flaky").await;
        store.fail_writes(&kv(), "flaky").await;
        store.fail_listing(&kv()).await;

        assert!(store.get_value(&kv(), "flaky").await.is_err());
        assert!(store.update_entry(&kv(), "flaky", "2").await.is_err());
        assert!(store.list_entries(&kv()).await.is_err());

        store.clear_failures().await;
        assert!(store.get_value(&kv(), "flaky").await.is_ok());
    }

    #[tokio::test]
    async fn test_call_counters_skip_seeding() {
        let store = InMemorySecretStore::new();
        store.seed(&kv(), "a", "1").await;
        store.list_entries(&kv()).await.unwrap();
        store.get_value(&kv(), "a").await.unwrap();
        store.get_value(&kv(), "a").await.unwrap();

        assert_eq!(
            store.calls(),
            CallCounts {
                list: 1,
                get: 2,
                create: 0,
                update: 0
            }
        );
    }
}
