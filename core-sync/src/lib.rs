//! # Comparison & Sync Module
//!
//! Compares two secret stores, tracks per-side value loading, and turns user
//! decisions into writes.
//!
//! ## Overview
//!
//! - Reconciling the entry names of a source and a target store
//! - Loading values lazily or in bulk through a TTL cache with in-flight deduplication
//! - Classifying each name as match, mismatch, source-only, target-only or pending
//! - Planning and executing create/update writes with per-item failure isolation
//! - Splitting imports into new entries and conflicts under a policy
//!
//! ## Components
//!
//! - **Reconciler** (`reconciler`): Union of names with per-side presence
//! - **Value Cache** (`cache`): TTL + LRU cache keyed by store and name
//! - **Value Loader** (`loader`): Bounded concurrent fetching with cancellation
//! - **Fetch State** (`state`): Per-side load state machine
//! - **Classifier** (`classifier`): Status derivation from presence and fetch states
//! - **Comparison Session** (`comparison`): Shared, incrementally updated comparison
//! - **Operations** (`operation`): Write planning from user actions
//! - **Conflict Resolver** (`conflict_resolver`): Import conflict policies
//! - **Sync Job** (`job`): Job lifecycle with validated state transitions
//! - **Executor** (`executor`): Sequential write execution with progress events

pub mod cache;
pub mod classifier;
pub mod comparison;
pub mod conflict_resolver;
pub mod error;
pub mod executor;
pub mod job;
pub mod loader;
pub mod operation;
pub mod reconciler;
pub mod state;

pub use cache::{CacheKey, CacheStats, FetchResult, ValueCache};
pub use classifier::{
    classify, ComparedEntry, ComparisonStats, ComparisonStatus, PendingPlaceholder,
};
pub use comparison::{ComparisonSession, LoadSummary, SessionOptions, Side};
pub use conflict_resolver::{
    ConflictAction, ConflictEntry, ConflictPolicy, ConflictResolver, ImportPlan,
};
pub use error::{FetchError, Result, SyncError};
pub use executor::{SyncExecutor, SyncOutcome, WriteFailure};
pub use job::{JobKind, SyncJob, SyncJobId, SyncJobStats, SyncProgress, SyncStatus};
pub use loader::{FetchObserver, ValueLoader};
pub use operation::{
    plan_actions, plan_all, SyncAction, SyncScope, ValueSource, WriteBatch, WriteKind,
    WriteOperation,
};
pub use reconciler::{reconcile, NamePresence};
pub use state::FetchState;
