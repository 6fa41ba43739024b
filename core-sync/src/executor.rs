//! # Sync Executor
//!
//! Applies a [`WriteBatch`] to the store one operation at a time.
//!
//! Each operation either succeeds or is recorded as a [`WriteFailure`];
//! execution always continues with the next one. `CopyFrom` values are read
//! through the [`ValueLoader`], so a value already loaded for comparison is not
//! fetched again. Successful writes go straight into the value cache.
//!
//! Progress is tracked on a [`SyncJob`] and published as [`SyncEvent`]s when
//! an event bus is attached. A batch where every attempted write failed ends
//! the job as [`SyncStatus::Failed`].

use crate::cache::CacheKey;
use crate::error::Result;
use crate::job::{JobKind, SyncJob, SyncJobId, SyncJobStats, SyncStatus};
use crate::loader::ValueLoader;
use crate::operation::{ValueSource, WriteBatch, WriteKind, WriteOperation};
use bridge_traits::{Clock, SystemClock};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// One write that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub name: String,
    /// Display name of the store the write targeted
    pub store: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub job_id: SyncJobId,
    pub status: SyncStatus,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Operations never attempted because the batch was cancelled
    pub cancelled: usize,
    pub failures: Vec<WriteFailure>,
    pub duration_ms: u64,
}

impl SyncOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

#[derive(Clone)]
pub struct SyncExecutor {
    loader: ValueLoader,
    events: Option<EventBus>,
    clock: Arc<dyn Clock>,
}

impl SyncExecutor {
    pub fn new(loader: ValueLoader) -> Self {
        Self {
            loader,
            events: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used for job timestamps and durations
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn execute(&self, kind: JobKind, batch: WriteBatch) -> Result<SyncOutcome> {
        self.execute_with_cancel(kind, batch, None).await
    }

    /// Execute `batch`, stopping before the next operation once `cancel` fires.
    ///
    /// An operation that already started always finishes.
    #[instrument(skip(self, batch, cancel), fields(total = batch.operations.len(), skipped = batch.skipped))]
    pub async fn execute_with_cancel(
        &self,
        kind: JobKind,
        batch: WriteBatch,
        cancel: Option<CancellationToken>,
    ) -> Result<SyncOutcome> {
        let WriteBatch {
            operations,
            skipped,
        } = batch;
        let total = operations.len();
        let clock = self.clock.as_ref();

        let mut job = SyncJob::new(kind, total, clock).start(clock)?;
        let job_id = job.id;
        self.emit(SyncEvent::Started {
            job_id: job_id.to_string(),
            kind: kind.to_string(),
            total,
        });

        let mut stats = SyncJobStats {
            skipped,
            ..Default::default()
        };
        let mut failures = Vec::new();
        let mut attempted = 0;

        for (index, operation) in operations.iter().enumerate() {
            if cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
                warn!(remaining = total - index, "Sync cancelled");
                break;
            }

            match self.apply(operation).await {
                Ok(()) => {
                    stats.success += 1;
                    debug!(name = %operation.name, kind = %operation.kind, "Write succeeded");
                }
                Err(e) => {
                    stats.failed += 1;
                    let failure = WriteFailure {
                        name: operation.name.clone(),
                        store: operation.store.display_name().to_string(),
                        message: e.to_string(),
                    };
                    warn!(name = %failure.name, store = %failure.store, error = %failure.message, "Write failed");
                    self.emit(SyncEvent::ItemFailed {
                        job_id: job_id.to_string(),
                        name: failure.name.clone(),
                        message: failure.message.clone(),
                    });
                    failures.push(failure);
                }
            }

            attempted = index + 1;
            job.update_progress(attempted, total, &operation.name)?;
            self.emit(SyncEvent::Progress {
                job_id: job_id.to_string(),
                current: attempted,
                total,
                percent: job.progress.percent,
                name: operation.name.clone(),
            });
        }

        let cancelled = total - attempted;
        let job = if cancelled > 0 {
            job.cancel(stats, clock)?
        } else if attempted > 0 && stats.failed == attempted {
            let message = format!("all {} writes failed", attempted);
            job.fail(stats, message, clock)?
        } else {
            job.complete(stats, clock)?
        };

        let duration_ms = job.duration_ms().unwrap_or_default();
        info!(
            status = %job.status,
            job_id = %job_id,
            success = stats.success,
            failed = stats.failed,
            skipped = stats.skipped,
            cancelled,
            duration_ms,
            "Sync batch finished"
        );
        self.emit(SyncEvent::Completed {
            job_id: job_id.to_string(),
            success: stats.success,
            failed: stats.failed,
            skipped: stats.skipped,
            duration_ms,
        });

        Ok(SyncOutcome {
            job_id,
            status: job.status,
            success: stats.success,
            failed: stats.failed,
            skipped: stats.skipped,
            cancelled,
            failures,
            duration_ms,
        })
    }

    async fn apply(&self, operation: &WriteOperation) -> Result<()> {
        let value = match &operation.value {
            ValueSource::Literal(value) => value.clone(),
            ValueSource::CopyFrom { store, name } => {
                self.loader.fetch(store, name).await?.unwrap_or_default()
            }
        };

        let client = self.loader.client();
        match operation.kind {
            WriteKind::Create => {
                client
                    .create_entry(&operation.store, &operation.name, &value)
                    .await?
            }
            WriteKind::Update => {
                client
                    .update_entry(&operation.store, &operation.name, &value)
                    .await?
            }
        };

        self.loader
            .cache()
            .insert(CacheKey::new(&operation.store, operation.name.as_str()), Some(value))
            .await;
        Ok(())
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }
}
