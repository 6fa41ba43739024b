//! # Core Configuration Module
//!
//! Provides configuration management for the vault sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the injected collaborators and tuning knobs for the
//! value cache, the bulk loader and the event bus. It enforces fail-fast
//! validation so a misconfigured core never starts.
//!
//! ## Required Dependencies
//!
//! - `SecretStoreClient` - The remote store every list/read/write goes through
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - Time source for cache staleness (default: `SystemClock`)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .secret_store(Arc::new(MyStoreClient::new()))
//!     .cache_ttl_secs(120)
//!     .max_concurrent_fetches(4)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Building without a store client fails with `Error::CapabilityMissing`;
//! out-of-range settings fail with `Error::Config` and an actionable message.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, SecretStoreClient, SystemClock};
use std::sync::Arc;

/// Default staleness window for cached values (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default maximum number of cached values.
pub const DEFAULT_CACHE_CAPACITY: usize = 25_000;

/// Default number of store reads allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

const MAX_CACHE_TTL_SECS: u64 = 86_400;
const MAX_CACHE_CAPACITY: usize = 1_000_000;
const MAX_CONCURRENT_FETCHES: usize = 64;

/// Value cache tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Seconds after which a cached value is considered stale
    pub ttl_secs: u64,
    /// Maximum number of cached values before LRU eviction
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Comparison behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComparisonSettings {
    /// Report entries present on both sides as `Match` until their values
    /// load, instead of `Pending`.
    pub legacy_match_placeholder: bool,
}

/// Core configuration for the vault sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Remote secret store client (required)
    pub secret_store: Arc<dyn SecretStoreClient>,

    /// Time source for cache staleness
    pub clock: Arc<dyn Clock>,

    pub cache: CacheSettings,

    /// Upper bound on concurrent store reads during bulk loads
    pub max_concurrent_fetches: usize,

    pub comparison: ComparisonSettings,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("secret_store", &"SecretStoreClient { ... }")
            .field("clock", &"Clock { ... }")
            .field("cache", &self.cache)
            .field("max_concurrent_fetches", &self.max_concurrent_fetches)
            .field("comparison", &self.comparison)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Cache TTL is within 1 second and 24 hours
    /// - Cache capacity is within 1 and 1,000,000 entries
    /// - Fetch concurrency is within 1 and 64
    /// - Event buffer is non-empty
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_secs == 0 {
            return Err(Error::Config(
                "Cache TTL must be at least 1 second".to_string(),
            ));
        }

        if self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(Error::Config(format!(
                "Cache TTL exceeds maximum of 24 hours ({} seconds)",
                MAX_CACHE_TTL_SECS
            )));
        }

        if self.cache.capacity == 0 {
            return Err(Error::Config(
                "Cache capacity must be greater than 0 entries".to_string(),
            ));
        }

        if self.cache.capacity > MAX_CACHE_CAPACITY {
            return Err(Error::Config(format!(
                "Cache capacity exceeds maximum of {} entries",
                MAX_CACHE_CAPACITY
            )));
        }

        if self.max_concurrent_fetches == 0 || self.max_concurrent_fetches > MAX_CONCURRENT_FETCHES
        {
            return Err(Error::Config(format!(
                "max_concurrent_fetches must be between 1 and {}. \
                 Lower it to respect store rate limits rather than disabling the bound.",
                MAX_CONCURRENT_FETCHES
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn secret_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecretStoreClient".to_string(),
        message: "A SecretStoreClient implementation is required to list, read and write entries. \
                 Inject one with CoreConfig::builder().secret_store(...). \
                 For tests and demos use bridge_memory::InMemorySecretStore."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    secret_store: Option<Arc<dyn SecretStoreClient>>,
    clock: Option<Arc<dyn Clock>>,
    cache_ttl_secs: Option<u64>,
    cache_capacity: Option<usize>,
    max_concurrent_fetches: Option<usize>,
    comparison: ComparisonSettings,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the secret store client (required).
    pub fn secret_store(mut self, client: Arc<dyn SecretStoreClient>) -> Self {
        self.secret_store = Some(client);
        self
    }

    /// Sets the time source used for cache staleness checks.
    ///
    /// Default: [`SystemClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets how long a fetched value stays fresh.
    ///
    /// Default: 300 seconds
    pub fn cache_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.cache_ttl_secs = Some(ttl_secs);
        self
    }

    /// Sets the maximum number of cached values.
    ///
    /// Default: 25,000
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Sets the bound on concurrent store reads.
    ///
    /// Default: 8
    pub fn max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = Some(limit);
        self
    }

    /// Report unloaded both-sided entries as `Match` instead of `Pending`.
    ///
    /// Default: false
    pub fn legacy_match_placeholder(mut self, enabled: bool) -> Self {
        self.comparison.legacy_match_placeholder = enabled;
        self
    }

    /// Sets the event bus buffer size.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if the store client is missing or any setting is out
    /// of range.
    pub fn build(self) -> Result<CoreConfig> {
        let secret_store = self.secret_store.ok_or_else(secret_store_missing_error)?;

        let config = CoreConfig {
            secret_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cache: CacheSettings {
                ttl_secs: self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS),
                capacity: self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
            },
            max_concurrent_fetches: self
                .max_concurrent_fetches
                .unwrap_or(DEFAULT_MAX_CONCURRENT_FETCHES),
            comparison: self.comparison,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
