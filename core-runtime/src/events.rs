//! # Event Bus System
//!
//! Provides an event-driven channel for the vault sync core using
//! `tokio::sync::broadcast`. Comparison sessions, the sync executor and the
//! import pipeline publish typed events; hosts subscribe to drive progress
//! indicators or audit logs.
//!
//! ## Overview
//!
//! - **Event Types**: `CoreEvent` wraps one enum per domain
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Progress {
//!         job_id: "job-1".to_string(),
//!         current: 1,
//!         total: 4,
//!         percent: 25,
//!         name: "db-password".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the subscriber can continue receiving.
//! - **`RecvError::Closed`**: All senders have been dropped.
//!
//! Emitting with no subscribers returns an error that publishers ignore with
//! `.ok()`; events are advisory and never gate the operation that emits them.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Value loading within a comparison session
    Comparison(ComparisonEvent),
    /// Batch write execution
    Sync(SyncEvent),
    /// Import parsing and planning
    Import(ImportEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Comparison(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Import(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Comparison(ComparisonEvent::ValueFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::ItemFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Import(ImportEvent::CommitRejected { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Completed { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Comparison(ComparisonEvent::LoadAllCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Comparison Events
// ============================================================================

/// Events emitted while a comparison session loads values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ComparisonEvent {
    /// A value finished loading for one side of an entry.
    ValueLoaded {
        session_id: String,
        store: String,
        name: String,
    },
    /// A value fetch failed; the entry is marked errored.
    ValueFailed {
        session_id: String,
        store: String,
        name: String,
        message: String,
    },
    /// A bulk load pass started.
    LoadAllStarted { session_id: String, requested: usize },
    /// A bulk load pass finished.
    LoadAllCompleted {
        session_id: String,
        loaded: usize,
        failed: usize,
        cancelled: usize,
    },
}

impl ComparisonEvent {
    fn description(&self) -> &str {
        match self {
            ComparisonEvent::ValueLoaded { .. } => "Value loaded",
            ComparisonEvent::ValueFailed { .. } => "Failed to load value",
            ComparisonEvent::LoadAllStarted { .. } => "Loading all values",
            ComparisonEvent::LoadAllCompleted { .. } => "Finished loading values",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events related to batch write execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Batch execution started.
    Started {
        job_id: String,
        /// "reconcile" or "import"
        kind: String,
        total: usize,
    },
    /// One operation finished (successfully or not).
    Progress {
        job_id: String,
        current: usize,
        total: usize,
        /// Percentage complete (0-100)
        percent: u8,
        /// Entry the finished operation wrote
        name: String,
    },
    /// A single write failed; the batch continues.
    ItemFailed {
        job_id: String,
        name: String,
        message: String,
    },
    /// Batch finished.
    Completed {
        job_id: String,
        success: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Progress { .. } => "Sync in progress",
            SyncEvent::ItemFailed { .. } => "Sync item failed",
            SyncEvent::Completed { .. } => "Sync completed",
        }
    }
}

// ============================================================================
// Import Events
// ============================================================================

/// Events emitted by the import pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ImportEvent {
    /// Content was parsed.
    Parsed { format: String, entries: usize },
    /// Imports were partitioned against the destination store.
    Planned {
        store: String,
        new_entries: usize,
        conflicts: usize,
        unresolved: usize,
    },
    /// Commit refused because conflicts are unresolved.
    CommitRejected { store: String, unresolved: usize },
}

impl ImportEvent {
    fn description(&self) -> &str {
        match self {
            ImportEvent::Parsed { .. } => "Import parsed",
            ImportEvent::Planned { .. } => "Import planned",
            ImportEvent::CommitRejected { .. } => "Import commit rejected",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified per-subscriber buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let sync_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Sync(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without blocking.
    ///
    /// Returns `None` if no matching events are currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every matching event currently buffered.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(Ok(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(current: usize) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Progress {
            job_id: "job-1".to_string(),
            current,
            total: 3,
            percent: (current * 100 / 3) as u8,
            name: format!("entry-{}", current),
        })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::default();
        assert!(bus.emit(progress(1)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(progress(1)).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), progress(1));
        assert_eq!(sub2.recv().await.unwrap(), progress(1));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Import(_)));

        bus.emit(progress(1)).ok();
        let parsed = CoreEvent::Import(ImportEvent::Parsed {
            format: "dotenv".to_string(),
            entries: 2,
        });
        bus.emit(parsed.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), parsed);
    }

    #[tokio::test]
    async fn test_stream_drain_and_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        for i in 1..=3 {
            bus.emit(progress(i)).ok();
        }
        assert_eq!(stream.drain().len(), 3);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for i in 0..5 {
            bus.emit(progress(i)).ok();
        }
        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let rejected = CoreEvent::Import(ImportEvent::CommitRejected {
            store: "kv".to_string(),
            unresolved: 2,
        });
        assert_eq!(rejected.severity(), EventSeverity::Error);

        let partial = CoreEvent::Sync(SyncEvent::Completed {
            job_id: "j".to_string(),
            success: 2,
            failed: 1,
            skipped: 0,
            duration_ms: 5,
        });
        assert_eq!(partial.severity(), EventSeverity::Warning);

        let clean = CoreEvent::Sync(SyncEvent::Completed {
            job_id: "j".to_string(),
            success: 3,
            failed: 0,
            skipped: 0,
            duration_ms: 5,
        });
        assert_eq!(clean.severity(), EventSeverity::Info);
        assert_eq!(progress(1).severity(), EventSeverity::Debug);
        assert!(EventSeverity::Error > EventSeverity::Warning);
    }

    #[test]
    fn test_event_description() {
        let failed = CoreEvent::Comparison(ComparisonEvent::ValueFailed {
            session_id: "s".to_string(),
            store: "kv".to_string(),
            name: "a".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(failed.description(), "Failed to load value");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Comparison(ComparisonEvent::LoadAllStarted {
            session_id: "s-1".to_string(),
            requested: 4,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Comparison");
        assert_eq!(json["payload"]["event"], "LoadAllStarted");
        assert_eq!(json["payload"]["requested"], 4);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
