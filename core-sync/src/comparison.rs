//! # Comparison Session
//!
//! Holds one source/target comparison: the reconciled name set plus the fetch
//! state of every side of every entry.
//!
//! ## Overview
//!
//! A session starts with names only. Values are pulled in either on demand
//! ([`ComparisonSession::load_value`]) or in bulk
//! ([`ComparisonSession::load_all`]); each completion updates that side's
//! [`FetchState`] independently. Readers never see a stored status: every
//! [`ComparedEntry`] is classified from the current state at read time, so a
//! partially loaded session is always internally consistent.
//!
//! Sessions are cheap to clone; clones share state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let session = ComparisonSession::new(source, target, &src, &dst, loader, SessionOptions::default());
//! let summary = session.load_all(None).await;
//! for entry in session.entries() {
//!     println!("{} {}", entry.name, entry.status);
//! }
//! ```

use crate::cache::{CacheKey, FetchResult};
use crate::classifier::{ComparedEntry, ComparisonStats, PendingPlaceholder};
use crate::error::{Result, SyncError};
use crate::loader::{FetchObserver, ValueLoader};
use crate::reconciler::{reconcile, NamePresence};
use crate::state::FetchState;
use bridge_traits::{Entry, StoreRef};
use core_runtime::events::{ComparisonEvent, CoreEvent, EventBus};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Source, Side::Target];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }

    pub fn other(&self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Default)]
pub struct SessionOptions {
    pub placeholder: PendingPlaceholder,
    pub events: Option<EventBus>,
}

/// Outcome of one bulk load pass, counted per requested side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub requested: usize,
    pub loaded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone)]
struct Row {
    presence: NamePresence,
    source: FetchState,
    target: FetchState,
}

impl Row {
    fn new(presence: NamePresence) -> Self {
        Self {
            source: FetchState::initial(presence.in_source),
            target: FetchState::initial(presence.in_target),
            presence,
        }
    }

    fn state(&self, side: Side) -> &FetchState {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    fn state_mut(&mut self, side: Side) -> &mut FetchState {
        match side {
            Side::Source => &mut self.source,
            Side::Target => &mut self.target,
        }
    }

    fn compared(&self, placeholder: PendingPlaceholder) -> ComparedEntry {
        ComparedEntry::build(&self.presence, &self.source, &self.target, placeholder)
    }
}

struct SessionInner {
    id: String,
    source: StoreRef,
    target: StoreRef,
    loader: ValueLoader,
    placeholder: PendingPlaceholder,
    events: Option<EventBus>,
    rows: RwLock<BTreeMap<String, Row>>,
}

#[derive(Clone)]
pub struct ComparisonSession {
    inner: Arc<SessionInner>,
}

impl ComparisonSession {
    pub fn new(
        source: StoreRef,
        target: StoreRef,
        source_entries: &[Entry],
        target_entries: &[Entry],
        loader: ValueLoader,
        options: SessionOptions,
    ) -> Self {
        let rows = reconcile(source_entries, target_entries)
            .into_iter()
            .map(|presence| (presence.name.clone(), Row::new(presence)))
            .collect::<BTreeMap<_, _>>();

        let id = Uuid::new_v4().to_string();
        info!(
            session_id = %id,
            source = %source.display_name(),
            target = %target.display_name(),
            entries = rows.len(),
            "Created comparison session"
        );

        Self {
            inner: Arc::new(SessionInner {
                id,
                source,
                target,
                loader,
                placeholder: options.placeholder,
                events: options.events,
                rows: RwLock::new(rows),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn source(&self) -> &StoreRef {
        &self.inner.source
    }

    pub fn target(&self) -> &StoreRef {
        &self.inner.target
    }

    pub fn store(&self, side: Side) -> &StoreRef {
        match side {
            Side::Source => &self.inner.source,
            Side::Target => &self.inner.target,
        }
    }

    /// Which side `store` is, preferring source when both sides are the same store.
    pub fn side_of(&self, store: &StoreRef) -> Option<Side> {
        Side::BOTH.into_iter().find(|side| self.store(*side) == store)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn fetch_state(&self, side: Side, name: &str) -> Option<FetchState> {
        self.read().get(name).map(|row| row.state(side).clone())
    }

    /// Snapshot of every entry, in name order.
    pub fn entries(&self) -> Vec<ComparedEntry> {
        self.read()
            .values()
            .map(|row| row.compared(self.inner.placeholder))
            .collect()
    }

    pub fn entry(&self, name: &str) -> Option<ComparedEntry> {
        self.read()
            .get(name)
            .map(|row| row.compared(self.inner.placeholder))
    }

    pub fn stats(&self) -> ComparisonStats {
        ComparisonStats::from_entries(&self.entries())
    }

    /// Load one side of one entry on demand.
    ///
    /// A side that is already loading joins the in-flight fetch instead of
    /// starting another one. A loaded side is reloaded (from cache when fresh).
    #[instrument(skip(self), fields(session_id = %self.inner.id))]
    pub async fn load_value(&self, side: Side, name: &str) -> Result<ComparedEntry> {
        {
            let mut rows = self.write();
            let row = rows
                .get_mut(name)
                .ok_or_else(|| SyncError::UnknownEntry(name.to_string()))?;
            let state = row.state_mut(side);
            match state {
                FetchState::NotApplicable => {
                    return Err(SyncError::NotApplicable {
                        store: self.store(side).display_name().to_string(),
                        name: name.to_string(),
                    })
                }
                FetchState::Loading => debug!("Joining load already in progress"),
                _ => state.transition(FetchState::Loading)?,
            }
        }

        let key = CacheKey::new(self.store(side), name);
        let result = self.inner.loader.fetch(&key.store, &key.name).await;
        self.apply(&key, &result);

        self.entry(name)
            .ok_or_else(|| SyncError::UnknownEntry(name.to_string()))
    }

    /// Request every side that has not loaded yet (or failed) in one bounded
    /// fan-out. Entry states update as each fetch completes.
    #[instrument(skip(self, cancel), fields(session_id = %self.inner.id))]
    pub async fn load_all(&self, cancel: Option<CancellationToken>) -> LoadSummary {
        let names: Vec<String> = self.read().keys().cloned().collect();
        self.load_entries(&names, cancel).await
    }

    /// Like [`load_all`](Self::load_all), restricted to `names`.
    pub async fn load_entries(
        &self,
        names: &[String],
        cancel: Option<CancellationToken>,
    ) -> LoadSummary {
        let requested: Vec<(Side, String)> = {
            let mut rows = self.write();
            let mut requested = Vec::new();
            for name in names {
                let Some(row) = rows.get_mut(name) else {
                    continue;
                };
                for side in Side::BOTH {
                    let state = row.state_mut(side);
                    if state.wants_load() && state.transition(FetchState::Loading).is_ok() {
                        requested.push((side, name.clone()));
                    }
                }
            }
            requested
        };

        self.emit(ComparisonEvent::LoadAllStarted {
            session_id: self.inner.id.clone(),
            requested: requested.len(),
        });

        // Both sides may point at the same store; fetch each key once
        let keys: Vec<CacheKey> = requested
            .iter()
            .map(|(side, name)| CacheKey::new(self.store(*side), name.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let session = self.clone();
        let observer: Arc<dyn FetchObserver> =
            Arc::new(move |key: &CacheKey, result: &FetchResult| session.apply(key, result));
        self.inner
            .loader
            .fetch_many(keys, cancel, Some(observer))
            .await;

        let mut summary = LoadSummary {
            requested: requested.len(),
            ..Default::default()
        };
        {
            let rows = self.read();
            for (side, name) in &requested {
                match rows.get(name).map(|row| row.state(*side)) {
                    Some(FetchState::Loaded(_)) => summary.loaded += 1,
                    Some(FetchState::Errored(_)) => summary.failed += 1,
                    Some(FetchState::NotRequested) => summary.cancelled += 1,
                    _ => {}
                }
            }
        }

        info!(
            requested = summary.requested,
            loaded = summary.loaded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Bulk load finished"
        );
        self.emit(ComparisonEvent::LoadAllCompleted {
            session_id: self.inner.id.clone(),
            loaded: summary.loaded,
            failed: summary.failed,
            cancelled: summary.cancelled,
        });
        summary
    }

    /// Replace the name set with fresh listings.
    ///
    /// A side keeps its fetch state when it is still present and its
    /// `updated` timestamp did not change; otherwise it starts over.
    #[instrument(skip_all, fields(session_id = %self.inner.id))]
    pub fn refresh(&self, source_entries: &[Entry], target_entries: &[Entry]) {
        let presences = reconcile(source_entries, target_entries);
        let mut rows = self.write();
        let mut previous = std::mem::take(&mut *rows);

        for presence in presences {
            let row = match previous.remove(&presence.name) {
                Some(old) => Row {
                    source: carry_over(
                        old.source,
                        old.presence.source_entry.as_ref(),
                        presence.source_entry.as_ref(),
                    ),
                    target: carry_over(
                        old.target,
                        old.presence.target_entry.as_ref(),
                        presence.target_entry.as_ref(),
                    ),
                    presence,
                },
                None => Row::new(presence),
            };
            rows.insert(row.presence.name.clone(), row);
        }

        debug!(entries = rows.len(), dropped = previous.len(), "Refreshed session");
    }

    fn apply(&self, key: &CacheKey, result: &FetchResult) {
        let mut events = Vec::new();
        {
            let mut rows = self.write();
            let Some(row) = rows.get_mut(&key.name) else {
                return;
            };

            for side in Side::BOTH {
                if self.store(side) != &key.store {
                    continue;
                }
                let state = row.state_mut(side);
                if *state != FetchState::Loading {
                    continue;
                }

                let next = match result {
                    Ok(value) => FetchState::Loaded(value.clone()),
                    Err(e) if e.is_cancelled() => FetchState::NotRequested,
                    Err(e) => FetchState::Errored(e.to_string()),
                };
                if let Err(e) = state.transition(next) {
                    warn!(name = %key.name, error = %e, "Dropped fetch result");
                    continue;
                }

                match result {
                    Ok(_) => events.push(ComparisonEvent::ValueLoaded {
                        session_id: self.inner.id.clone(),
                        store: key.store.to_string(),
                        name: key.name.clone(),
                    }),
                    Err(e) if !e.is_cancelled() => events.push(ComparisonEvent::ValueFailed {
                        session_id: self.inner.id.clone(),
                        store: key.store.to_string(),
                        name: key.name.clone(),
                        message: e.to_string(),
                    }),
                    Err(_) => {}
                }
            }
        }

        for event in events {
            self.emit(event);
        }
    }

    fn emit(&self, event: ComparisonEvent) {
        if let Some(bus) = &self.inner.events {
            bus.emit(CoreEvent::Comparison(event)).ok();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Row>> {
        self.inner.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Row>> {
        self.inner.rows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ComparisonSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparisonSession")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source)
            .field("target", &self.inner.target)
            .field("entries", &self.len())
            .finish()
    }
}

fn carry_over(state: FetchState, old: Option<&Entry>, new: Option<&Entry>) -> FetchState {
    match (old, new) {
        (_, None) => FetchState::NotApplicable,
        (None, Some(_)) => FetchState::NotRequested,
        (Some(old), Some(new)) => {
            let changed = old.attributes.updated != new.attributes.updated;
            match state {
                FetchState::Loaded(_) | FetchState::Errored(_) if changed => {
                    FetchState::NotRequested
                }
                FetchState::NotApplicable => FetchState::NotRequested,
                other => other,
            }
        }
    }
}
