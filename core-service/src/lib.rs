//! Core service façade.
//!
//! [`VaultSyncService`] wires a host-provided [`SecretStoreClient`] into the
//! comparison, sync and transfer crates. Hosts build a [`CoreConfig`], create
//! one service, and drive every workflow through it:
//!
//! ```no_run
//! # async fn example(config: core_runtime::CoreConfig) -> core_service::Result<()> {
//! use bridge_traits::StoreRef;
//! use core_service::VaultSyncService;
//! use core_sync::SyncScope;
//!
//! let service = VaultSyncService::new(config);
//! let session = service
//!     .compare(StoreRef::new("https://kv-dev.vault.azure.net"), StoreRef::new("https://kv-prod.vault.azure.net"))
//!     .await?;
//! session.load_all(None).await;
//! let outcome = service.sync_all(&session, SyncScope::SourceToTarget).await?;
//! println!("{} written, {} failed", outcome.success, outcome.failed);
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{Clock, SecretStoreClient, StoreRef};
use core_runtime::events::{CoreEvent, EventBus, EventStream, ImportEvent};
use core_runtime::CoreConfig;
use core_sync::{
    plan_actions, plan_all, CacheKey, CacheStats, ComparisonSession, ConflictPolicy,
    ConflictResolver, ImportPlan, JobKind, PendingPlaceholder, SessionOptions, SyncAction,
    SyncError, SyncExecutor, SyncOutcome, SyncScope, ValueCache, ValueLoader, WriteBatch,
    WriteOperation,
};
use core_transfer::{parse_import, render_export, ExportOptions, ExportRecord, TransferFormat};
use tracing::{info, instrument, warn};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct VaultSyncService {
    client: Arc<dyn SecretStoreClient>,
    clock: Arc<dyn Clock>,
    loader: ValueLoader,
    executor: SyncExecutor,
    events: EventBus,
    placeholder: PendingPlaceholder,
}

impl VaultSyncService {
    pub fn new(config: CoreConfig) -> Self {
        let events = EventBus::new(config.event_buffer_size);
        let cache = Arc::new(ValueCache::from_settings(
            &config.cache,
            Arc::clone(&config.clock),
        ));
        let loader = ValueLoader::new(
            Arc::clone(&config.secret_store),
            cache,
            config.max_concurrent_fetches,
        );
        let executor = SyncExecutor::new(loader.clone())
            .with_event_bus(events.clone())
            .with_clock(Arc::clone(&config.clock));

        info!(
            cache_ttl_secs = config.cache.ttl_secs,
            cache_capacity = config.cache.capacity,
            max_concurrent_fetches = config.max_concurrent_fetches,
            "Vault sync service ready"
        );

        Self {
            client: config.secret_store,
            clock: config.clock,
            loader,
            executor,
            events,
            placeholder: PendingPlaceholder::from_legacy_flag(
                config.comparison.legacy_match_placeholder,
            ),
        }
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    /// List both stores and start a comparison session. No values are loaded.
    #[instrument(skip_all, fields(source = %source.display_name(), target = %target.display_name()))]
    pub async fn compare(&self, source: StoreRef, target: StoreRef) -> Result<ComparisonSession> {
        let (source_entries, target_entries) = futures::try_join!(
            self.client.list_entries(&source),
            self.client.list_entries(&target)
        )?;

        Ok(ComparisonSession::new(
            source,
            target,
            &source_entries,
            &target_entries,
            self.loader.clone(),
            SessionOptions {
                placeholder: self.placeholder,
                events: Some(self.events.clone()),
            },
        ))
    }

    /// Re-list both stores of `session`, keeping loaded values that are still current.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn refresh(&self, session: &ComparisonSession) -> Result<()> {
        let (source_entries, target_entries) = futures::try_join!(
            self.client.list_entries(session.source()),
            self.client.list_entries(session.target())
        )?;
        session.refresh(&source_entries, &target_entries);
        Ok(())
    }

    /// Apply the user's selected actions, then refresh the session.
    pub async fn sync(
        &self,
        session: &ComparisonSession,
        actions: &[SyncAction],
    ) -> Result<SyncOutcome> {
        let operations = plan_actions(
            &session.entries(),
            session.source(),
            session.target(),
            actions,
        )?;
        self.run_and_refresh(session, operations).await
    }

    /// Apply every difference covered by `scope`, then refresh the session.
    pub async fn sync_all(
        &self,
        session: &ComparisonSession,
        scope: SyncScope,
    ) -> Result<SyncOutcome> {
        let operations = plan_all(&session.entries(), session.source(), session.target(), scope);
        self.run_and_refresh(session, operations).await
    }

    #[instrument(skip_all, fields(session_id = %session.id(), operations = operations.len()))]
    async fn run_and_refresh(
        &self,
        session: &ComparisonSession,
        operations: Vec<WriteOperation>,
    ) -> Result<SyncOutcome> {
        let written: Vec<(StoreRef, String)> = operations
            .iter()
            .map(|op| (op.store.clone(), op.name.clone()))
            .collect();

        let outcome = self
            .executor
            .execute(JobKind::Reconcile, WriteBatch::new(operations))
            .await?;

        self.refresh(session).await?;

        // Written values are already cached, so these reloads stay local.
        for (store, name) in written {
            let failed = outcome
                .failures
                .iter()
                .any(|f| f.name == name && f.store == store.display_name());
            if failed {
                continue;
            }
            let Some(side) = session.side_of(&store) else {
                continue;
            };
            if let Err(e) = session.load_value(side, &name).await {
                warn!(name = %name, side = %side, error = %e, "Could not reload written value");
            }
        }

        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Import / export
    // ------------------------------------------------------------------

    /// Parse `content` and split it against the current entries of `store`.
    #[instrument(skip(self, content), fields(store = %store.display_name()))]
    pub async fn prepare_import(
        &self,
        store: &StoreRef,
        content: &str,
        format: Option<TransferFormat>,
        policy: ConflictPolicy,
    ) -> Result<ImportPlan> {
        let parsed = parse_import(content, format)?;
        self.emit(ImportEvent::Parsed {
            format: parsed.format.to_string(),
            entries: parsed.entries.len(),
        });

        let existing = self.client.list_entries(store).await?;
        let plan = ConflictResolver::new(policy).partition(store, parsed.entries, &existing);

        self.emit(ImportEvent::Planned {
            store: store.to_string(),
            new_entries: plan.new_entries.len(),
            conflicts: plan.conflicts.len(),
            unresolved: plan.unresolved_count(),
        });
        Ok(plan)
    }

    /// Write an import plan.
    ///
    /// # Errors
    ///
    /// Fails without writing anything while any conflict is unresolved.
    #[instrument(skip_all, fields(store = %plan.store.display_name()))]
    pub async fn commit_import(&self, plan: ImportPlan) -> Result<SyncOutcome> {
        let unresolved = plan.unresolved_count();
        if unresolved > 0 {
            warn!(unresolved, "Import commit rejected");
            self.emit(ImportEvent::CommitRejected {
                store: plan.store.to_string(),
                unresolved,
            });
            return Err(SyncError::Validation { unresolved }.into());
        }

        let batch = plan.into_batch()?;
        Ok(self.executor.execute(JobKind::Import, batch).await?)
    }

    /// Render every entry of `store` in the requested format.
    ///
    /// Values that fail to load are exported empty.
    #[instrument(skip(self, options), fields(store = %store.display_name(), format = %options.format))]
    pub async fn export(&self, store: &StoreRef, options: &ExportOptions) -> Result<String> {
        let entries = self.client.list_entries(store).await?;

        let mut values = if options.include_values {
            let keys = entries
                .iter()
                .map(|entry| CacheKey::new(store, entry.name()))
                .collect();
            self.loader.fetch_many(keys, None, None).await
        } else {
            Vec::new()
        }
        .into_iter();

        let records: Vec<ExportRecord> = entries
            .iter()
            .map(|entry| {
                let value = values.next().and_then(|(key, result)| match result {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(name = %key.name, error = %e, "Exporting entry without value");
                        None
                    }
                });
                ExportRecord::new(entry.name(), value, entry.attributes.clone())
            })
            .collect();

        let rendered = render_export(store, &records, options, self.clock.now())?;
        info!(entries = records.len(), "Export rendered");
        Ok(rendered)
    }

    // ------------------------------------------------------------------
    // Cache & events
    // ------------------------------------------------------------------

    pub async fn cache_stats(&self) -> CacheStats {
        self.loader.cache().stats().await
    }

    pub async fn clear_cache(&self) {
        self.loader.cache().clear().await;
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    fn emit(&self, event: ImportEvent) {
        self.events.emit(CoreEvent::Import(event)).ok();
    }
}
