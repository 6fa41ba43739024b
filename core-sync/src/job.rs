//! # Sync Job State Machine
//!
//! Tracks one batch execution with validated state transitions.
//!
//! ## State Machine
//!
//! ```text
//! Pending → Running → Completed
//!     ↓         ↓
//!     └──────→ Failed
//!     └──────→ Cancelled
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use bridge_traits::SystemClock;
//! use core_sync::{JobKind, SyncJob, SyncJobStats, SyncStatus};
//!
//! let clock = SystemClock;
//! let job = SyncJob::new(JobKind::Reconcile, 2, &clock);
//! let mut job = job.start(&clock).unwrap();
//! job.update_progress(1, 2, "db-password").unwrap();
//! job.update_progress(2, 2, "api-key").unwrap();
//!
//! let job = job
//!     .complete(SyncJobStats { success: 2, failed: 0, skipped: 0 }, &clock)
//!     .unwrap();
//! assert_eq!(job.status, SyncStatus::Completed);
//! ```

use crate::{Result, SyncError};
use bridge_traits::Clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Running,
    Completed,
    /// Every attempted write failed
    Failed,
    Cancelled,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Completed | SyncStatus::Failed | SyncStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
            SyncStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What produced the batch a job executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Writes selected from a source/target comparison
    Reconcile,
    /// Writes from an import plan
    Import,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Reconcile => "reconcile",
            JobKind::Import => "import",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Progress Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Operations finished so far
    pub current: usize,
    pub total: usize,
    /// Progress percentage (0-100)
    pub percent: u8,
    /// Entry most recently written
    pub current_item: Option<String>,
}

impl SyncProgress {
    pub fn new(total: usize) -> Self {
        Self {
            current: 0,
            total,
            percent: 0,
            current_item: None,
        }
    }

    pub fn update(&mut self, current: usize, total: usize, item: &str) {
        self.current = current;
        self.total = total;
        self.current_item = Some(item.to_string());

        // Calculate percentage (cap at 100)
        self.percent = if total > 0 {
            ((current as f64 / total as f64) * 100.0).min(100.0) as u8
        } else {
            0
        };
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJobStats {
    pub success: usize,
    pub failed: usize,
    /// Items deliberately left alone (e.g. skipped import conflicts)
    pub skipped: usize,
}

// ============================================================================
// Sync Job Entity
// ============================================================================

/// A batch execution with state machine semantics.
///
/// Timestamps are Unix milliseconds read from the [`Clock`] passed to each
/// transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: SyncJobId,
    pub kind: JobKind,
    pub status: SyncStatus,
    pub progress: SyncProgress,
    /// Only available once finished
    pub stats: Option<SyncJobStats>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl SyncJob {
    /// Create a new job in `Pending` state for `total` operations
    pub fn new(kind: JobKind, total: usize, clock: &dyn Clock) -> Self {
        Self {
            id: SyncJobId::new(),
            kind,
            status: SyncStatus::Pending,
            progress: SyncProgress::new(total),
            stats: None,
            error_message: None,
            created_at: clock.now().timestamp_millis(),
            started_at: None,
            completed_at: None,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the job is not in `Pending` state
    pub fn start(mut self, clock: &dyn Clock) -> Result<Self> {
        self.validate_transition(SyncStatus::Running)?;
        self.status = SyncStatus::Running;
        self.started_at = Some(clock.now().timestamp_millis());
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an error if the job is not in `Running` state
    pub fn update_progress(&mut self, current: usize, total: usize, item: &str) -> Result<()> {
        if self.status != SyncStatus::Running {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: "update_progress".to_string(),
                reason: "Job must be running to update progress".to_string(),
            });
        }

        self.progress.update(current, total, item);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the job is not in `Running` state
    pub fn complete(mut self, stats: SyncJobStats, clock: &dyn Clock) -> Result<Self> {
        self.validate_transition(SyncStatus::Completed)?;
        self.status = SyncStatus::Completed;
        self.completed_at = Some(clock.now().timestamp_millis());
        self.stats = Some(stats);
        self.progress.percent = 100;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an error if the job is already terminal
    pub fn fail(
        mut self,
        stats: SyncJobStats,
        error_message: impl Into<String>,
        clock: &dyn Clock,
    ) -> Result<Self> {
        self.validate_transition(SyncStatus::Failed)?;
        self.status = SyncStatus::Failed;
        self.completed_at = Some(clock.now().timestamp_millis());
        self.stats = Some(stats);
        self.error_message = Some(error_message.into());
        Ok(self)
    }

    /// Cancel the job, keeping the counts of what already ran.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is already terminal
    pub fn cancel(mut self, stats: SyncJobStats, clock: &dyn Clock) -> Result<Self> {
        self.validate_transition(SyncStatus::Cancelled)?;
        self.status = SyncStatus::Cancelled;
        self.completed_at = Some(clock.now().timestamp_millis());
        self.stats = Some(stats);
        Ok(self)
    }

    /// Milliseconds between start and completion, if both happened
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => u64::try_from(end - start).ok(),
            _ => None,
        }
    }

    fn validate_transition(&self, to: SyncStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (SyncStatus::Pending, SyncStatus::Running)
                | (SyncStatus::Pending, SyncStatus::Cancelled)
                | (SyncStatus::Running, SyncStatus::Completed)
                | (SyncStatus::Running, SyncStatus::Failed)
                | (SyncStatus::Running, SyncStatus::Cancelled)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: if self.status.is_terminal() {
                    "job already finished".to_string()
                } else {
                    format!("cannot go from {} to {}", self.status, to)
                },
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ManualClock;

    #[test]
    fn test_sync_job_ids_are_unique() {
        assert_ne!(SyncJobId::new(), SyncJobId::new());
    }

    #[test]
    fn test_sync_progress_percent_calculation() {
        let mut progress = SyncProgress::new(0);

        progress.update(0, 0, "a");
        assert_eq!(progress.percent, 0);

        progress.update(1, 3, "a");
        assert_eq!(progress.percent, 33);

        progress.update(3, 3, "c");
        assert_eq!(progress.percent, 100);
        assert_eq!(progress.current_item.as_deref(), Some("c"));

        // Cap at 100% even if current exceeds total
        progress.update(5, 3, "c");
        assert_eq!(progress.percent, 100);
    }

    #[test]
    fn test_sync_job_lifecycle_uses_injected_clock() {
        let clock = ManualClock::default();
        let job = SyncJob::new(JobKind::Import, 4, &clock);
        assert_eq!(job.status, SyncStatus::Pending);
        assert_eq!(job.created_at, clock.now().timestamp_millis());
        assert!(job.duration_ms().is_none());

        let mut job = job.start(&clock).unwrap();
        job.update_progress(2, 4, "b").unwrap();
        assert_eq!(job.progress.percent, 50);

        clock.advance(chrono::Duration::milliseconds(1_500));
        let stats = SyncJobStats {
            success: 3,
            failed: 1,
            skipped: 2,
        };
        let job = job.complete(stats, &clock).unwrap();
        assert_eq!(job.status, SyncStatus::Completed);
        assert_eq!(job.stats, Some(stats));
        assert_eq!(job.progress.percent, 100);
        assert_eq!(job.duration_ms(), Some(1_500));
    }

    #[test]
    fn test_update_progress_requires_running() {
        let mut job = SyncJob::new(JobKind::Reconcile, 1, &ManualClock::default());
        assert!(job.update_progress(1, 1, "a").is_err());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let clock = ManualClock::default();
        let job = SyncJob::new(JobKind::Reconcile, 1, &clock)
            .start(&clock)
            .unwrap();
        assert!(matches!(
            job.start(&clock),
            Err(SyncError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_fail_and_cancel() {
        let clock = ManualClock::default();
        let stats = SyncJobStats {
            failed: 2,
            ..Default::default()
        };
        let failed = SyncJob::new(JobKind::Reconcile, 2, &clock)
            .start(&clock)
            .unwrap()
            .fail(stats, "all 2 writes failed", &clock)
            .unwrap();
        assert_eq!(failed.status, SyncStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("all 2 writes failed"));
        assert_eq!(failed.stats, Some(stats));

        let cancelled = SyncJob::new(JobKind::Import, 3, &clock)
            .cancel(SyncJobStats::default(), &clock)
            .unwrap();
        assert_eq!(cancelled.status, SyncStatus::Cancelled);
    }

    #[test]
    fn test_terminal_states_cannot_transition() {
        let clock = ManualClock::default();
        let completed = SyncJob::new(JobKind::Reconcile, 0, &clock)
            .start(&clock)
            .unwrap()
            .complete(SyncJobStats::default(), &clock)
            .unwrap();

        assert!(completed.clone().start(&clock).is_err());
        assert!(completed
            .clone()
            .fail(SyncJobStats::default(), "late", &clock)
            .is_err());
        assert!(completed.cancel(SyncJobStats::default(), &clock).is_err());
    }
}
