//! # Value Loader
//!
//! Loads entry values from a [`SecretStoreClient`] through the shared
//! [`ValueCache`], with a semaphore bounding concurrent store reads.
//!
//! ## Triggers
//!
//! - **On demand** ([`ValueLoader::fetch`]): one value, typically because a user
//!   expanded a row. Joins any in-flight fetch for the same key.
//! - **Bulk** ([`ValueLoader::fetch_many`]): one task per key, failures isolated
//!   per key. A [`CancellationToken`] stops keys that have not started yet;
//!   fetches already talking to the store run to completion and still populate
//!   the cache.
//!
//! Only real store calls take a semaphore permit; cache hits and joins never
//! wait on the limiter.

use crate::cache::{CacheKey, FetchResult, ValueCache};
use crate::error::FetchError;
use bridge_traits::error::BridgeError;
use bridge_traits::{SecretStoreClient, StoreRef};
use core_runtime::logging::describe_value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

/// Notified as each bulk fetch settles, in completion order.
pub trait FetchObserver: Send + Sync {
    fn on_fetched(&self, key: &CacheKey, result: &FetchResult);
}

impl<F> FetchObserver for F
where
    F: Fn(&CacheKey, &FetchResult) + Send + Sync,
{
    fn on_fetched(&self, key: &CacheKey, result: &FetchResult) {
        self(key, result)
    }
}

#[derive(Clone)]
pub struct ValueLoader {
    client: Arc<dyn SecretStoreClient>,
    cache: Arc<ValueCache>,
    limiter: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ValueLoader {
    pub fn new(
        client: Arc<dyn SecretStoreClient>,
        cache: Arc<ValueCache>,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            client,
            cache,
            limiter: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn cache(&self) -> &Arc<ValueCache> {
        &self.cache
    }

    pub fn client(&self) -> &Arc<dyn SecretStoreClient> {
        &self.client
    }

    /// Load one value, from cache when fresh.
    #[instrument(skip(self, store), fields(store = %store.display_name()))]
    pub async fn fetch(&self, store: &StoreRef, name: &str) -> FetchResult {
        let key = CacheKey::new(store, name);
        let client = Arc::clone(&self.client);
        let limiter = Arc::clone(&self.limiter);
        let store = store.clone();
        let name = name.to_string();

        self.cache
            .get_or_fetch(key, move || async move {
                let _permit = limiter
                    .acquire_owned()
                    .await
                    .map_err(|_| FetchError::Cancelled { name: name.clone() })?;

                match client.get_value(&store, &name).await {
                    Ok(bundle) => {
                        debug!(name = %name, value = %describe_value(bundle.value.as_deref()), "Loaded value");
                        Ok(bundle.value)
                    }
                    Err(e) => Err(map_store_error(&store, &name, e)),
                }
            })
            .await
    }

    /// Load many values concurrently.
    ///
    /// Returns one result per key, in input order. `observer` sees each result
    /// as soon as it settles.
    #[instrument(skip(self, keys, cancel, observer), fields(count = keys.len()))]
    pub async fn fetch_many(
        &self,
        keys: Vec<CacheKey>,
        cancel: Option<CancellationToken>,
        observer: Option<Arc<dyn FetchObserver>>,
    ) -> Vec<(CacheKey, FetchResult)> {
        // Bounds how many keys are being worked on; the inner limiter bounds
        // store calls across every caller of this loader.
        let gate = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(keys.len());
        let mut cancelled_from = None;

        for (index, key) in keys.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = wait_cancelled(cancel.as_ref()) => None,
                permit = Arc::clone(&gate).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                cancelled_from = Some(index);
                break;
            };

            let loader = self.clone();
            let key = key.clone();
            let observer = observer.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = loader.fetch(&key.store, &key.name).await;
                if let Some(observer) = observer {
                    observer.on_fetched(&key, &result);
                }
                result
            }));
        }

        let mut results = Vec::with_capacity(keys.len());
        for (key, handle) in keys.iter().zip(handles) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(key = %key, error = %e, "Fetch task failed");
                    let result = Err(FetchError::Store {
                        store: key.store.display_name().to_string(),
                        name: key.name.clone(),
                        message: format!("fetch task failed: {}", e),
                    });
                    if let Some(observer) = &observer {
                        observer.on_fetched(key, &result);
                    }
                    result
                }
            };
            results.push((key.clone(), result));
        }

        if let Some(start) = cancelled_from {
            warn!(
                cancelled = keys.len() - start,
                "Bulk fetch cancelled before all keys started"
            );
            for key in &keys[start..] {
                let result = Err(FetchError::Cancelled {
                    name: key.name.clone(),
                });
                if let Some(observer) = &observer {
                    observer.on_fetched(key, &result);
                }
                results.push((key.clone(), result));
            }
        }

        results
    }
}

async fn wait_cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn map_store_error(store: &StoreRef, name: &str, error: BridgeError) -> FetchError {
    match error {
        BridgeError::NotFound(_) => FetchError::NotFound {
            store: store.display_name().to_string(),
            name: name.to_string(),
        },
        other => {
            warn!(name, error = %other, "Store read failed");
            FetchError::Store {
                store: store.display_name().to_string(),
                name: name.to_string(),
                message: other.to_string(),
            }
        }
    }
}
