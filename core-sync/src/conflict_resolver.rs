//! Conflict Resolution for Imports
//!
//! Splits imported entries into those that are new to the destination store
//! and those that collide with an existing entry.
//!
//! ## Overview
//!
//! A collision is a [`ConflictEntry`] carrying the imported value, the existing
//! entry and an optional [`ConflictAction`]. The policy decides the initial
//! action:
//! - **SkipAll**: every conflict starts as `Skip`
//! - **OverrideAll**: every conflict starts as `Override` (writes a new version)
//! - **Ask**: conflicts start unresolved and must be decided one by one
//!
//! An [`ImportPlan`] cannot turn into writes while any conflict is unresolved;
//! [`ImportPlan::into_batch`] fails with [`SyncError::Validation`] instead.
//!
//! ## Usage
//!
//! ```no_run
//! use core_sync::conflict_resolver::{ConflictAction, ConflictPolicy, ConflictResolver};
//! # use bridge_traits::{Entry, StoreRef};
//! # use core_transfer::ImportEntry;
//! # fn example(store: StoreRef, imports: Vec<ImportEntry>, existing: Vec<Entry>) -> core_sync::Result<()> {
//! let resolver = ConflictResolver::new(ConflictPolicy::Ask);
//! let mut plan = resolver.partition(&store, imports, &existing);
//!
//! plan.set_action(0, ConflictAction::Override)?;
//! plan.set_all_actions(ConflictAction::Skip);
//!
//! let batch = plan.into_batch()?;
//! println!("{} writes, {} skipped", batch.operations.len(), batch.skipped);
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SyncError};
use crate::operation::{ValueSource, WriteBatch, WriteOperation};
use bridge_traits::{Entry, StoreRef};
use core_transfer::ImportEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Conflict resolution policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Keep every existing value
    SkipAll,

    /// Write every imported value as a new version
    OverrideAll,

    /// Leave each conflict for the user to decide
    #[default]
    Ask,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::SkipAll => "skip-all",
            ConflictPolicy::OverrideAll => "override-all",
            ConflictPolicy::Ask => "ask",
        }
    }

    fn initial_action(&self) -> Option<ConflictAction> {
        match self {
            ConflictPolicy::SkipAll => Some(ConflictAction::Skip),
            ConflictPolicy::OverrideAll => Some(ConflictAction::Override),
            ConflictPolicy::Ask => None,
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "skip" | "skip-all" | "skipall" => Ok(ConflictPolicy::SkipAll),
            "override" | "override-all" | "overrideall" => Ok(ConflictPolicy::OverrideAll),
            "ask" => Ok(ConflictPolicy::Ask),
            _ => Err(SyncError::InvalidPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    Skip,
    Override,
}

/// An imported entry whose name already exists in the destination store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    pub import_entry: ImportEntry,
    pub existing_entry: Entry,
    /// `None` until decided
    pub action: Option<ConflictAction>,
}

impl ConflictEntry {
    pub fn name(&self) -> &str {
        &self.import_entry.name
    }

    pub fn is_resolved(&self) -> bool {
        self.action.is_some()
    }
}

/// Result of partitioning an import against a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    pub store: StoreRef,
    pub policy: ConflictPolicy,
    pub new_entries: Vec<ImportEntry>,
    pub conflicts: Vec<ConflictEntry>,
}

impl ImportPlan {
    /// Decide the conflict at `index`.
    ///
    /// # Errors
    ///
    /// [`SyncError::ConflictIndexOutOfRange`] when `index` is past the end
    pub fn set_action(&mut self, index: usize, action: ConflictAction) -> Result<()> {
        let len = self.conflicts.len();
        let conflict = self
            .conflicts
            .get_mut(index)
            .ok_or(SyncError::ConflictIndexOutOfRange { index, len })?;
        conflict.action = Some(action);
        Ok(())
    }

    /// Decide the conflict for entry `name`.
    pub fn set_action_for(&mut self, name: &str, action: ConflictAction) -> Result<()> {
        let conflict = self
            .conflicts
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| SyncError::UnknownConflict(name.to_string()))?;
        conflict.action = Some(action);
        Ok(())
    }

    pub fn set_all_actions(&mut self, action: ConflictAction) {
        for conflict in &mut self.conflicts {
            conflict.action = Some(action);
        }
    }

    pub fn unresolved_count(&self) -> usize {
        self.conflicts.iter().filter(|c| !c.is_resolved()).count()
    }

    pub fn can_commit(&self) -> bool {
        self.unresolved_count() == 0
    }

    pub fn skipped_count(&self) -> usize {
        self.conflicts
            .iter()
            .filter(|c| c.action == Some(ConflictAction::Skip))
            .count()
    }

    /// Number of imported entries (new plus conflicting)
    pub fn total(&self) -> usize {
        self.new_entries.len() + self.conflicts.len()
    }

    /// Turn the plan into writes: creates for new entries, updates for overridden conflicts.
    ///
    /// # Errors
    ///
    /// [`SyncError::Validation`] while any conflict is unresolved
    pub fn into_batch(self) -> Result<WriteBatch> {
        let unresolved = self.unresolved_count();
        if unresolved > 0 {
            return Err(SyncError::Validation { unresolved });
        }

        let skipped = self.skipped_count();
        let store = self.store;
        let mut operations: Vec<WriteOperation> = self
            .new_entries
            .into_iter()
            .map(|entry| WriteOperation::create(&store, entry.name, ValueSource::Literal(entry.value)))
            .collect();
        operations.extend(
            self.conflicts
                .into_iter()
                .filter(|c| c.action == Some(ConflictAction::Override))
                .map(|c| {
                    WriteOperation::update(
                        &store,
                        c.import_entry.name,
                        ValueSource::Literal(c.import_entry.value),
                    )
                }),
        );

        debug!(operations = operations.len(), skipped, "Built import batch");
        Ok(WriteBatch {
            operations,
            skipped,
        })
    }
}

/// Partitions imports using a fixed policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    policy: ConflictPolicy,
}

impl ConflictResolver {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Split `imports` into new entries and conflicts with `existing`.
    ///
    /// A name repeated within `imports` keeps its first position and its last value.
    #[instrument(skip(self, store, imports, existing), fields(store = %store.display_name(), policy = %self.policy))]
    pub fn partition(
        &self,
        store: &StoreRef,
        imports: Vec<ImportEntry>,
        existing: &[Entry],
    ) -> ImportPlan {
        let existing_by_name: HashMap<&str, &Entry> =
            existing.iter().map(|e| (e.name(), e)).collect();

        let mut deduped: Vec<ImportEntry> = Vec::with_capacity(imports.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        for entry in imports {
            match positions.get(&entry.name) {
                Some(&index) => {
                    warn!(name = %entry.name, "Duplicate name in import, keeping the last value");
                    deduped[index].value = entry.value;
                }
                None => {
                    positions.insert(entry.name.clone(), deduped.len());
                    deduped.push(entry);
                }
            }
        }

        let mut new_entries = Vec::new();
        let mut conflicts = Vec::new();
        for entry in deduped {
            match existing_by_name.get(entry.name.as_str()) {
                Some(existing_entry) => conflicts.push(ConflictEntry {
                    import_entry: entry,
                    existing_entry: (*existing_entry).clone(),
                    action: self.policy.initial_action(),
                }),
                None => new_entries.push(entry),
            }
        }

        info!(
            new_entries = new_entries.len(),
            conflicts = conflicts.len(),
            "Partitioned import"
        );
        ImportPlan {
            store: store.clone(),
            policy: self.policy,
            new_entries,
            conflicts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::WriteKind;
    use bridge_traits::EntryAttributes;

    fn kv() -> StoreRef {
        StoreRef::new("https://kv-a.vault.azure.net")
    }

    fn existing(names: &[&str]) -> Vec<Entry> {
        names
            .iter()
            .map(|n| Entry::new(format!("{}/secrets/{}", kv(), n), EntryAttributes::default()))
            .collect()
    }

    fn imports() -> Vec<ImportEntry> {
        vec![ImportEntry::new("a", "1"), ImportEntry::new("b", "2")]
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("skip".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::SkipAll);
        assert_eq!(
            "override-all".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::OverrideAll
        );
        assert_eq!("Ask".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Ask);
        assert!("merge".parse::<ConflictPolicy>().is_err());
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Ask);
    }

    #[test]
    fn test_partition_with_skip_policy() {
        let plan = ConflictResolver::new(ConflictPolicy::SkipAll).partition(
            &kv(),
            imports(),
            &existing(&["a"]),
        );

        assert_eq!(plan.new_entries, vec![ImportEntry::new("b", "2")]);
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.conflicts[0].action, Some(ConflictAction::Skip));
        assert!(plan.can_commit());

        let batch = plan.into_batch().unwrap();
        assert_eq!(batch.operations.len(), 1);
        assert_eq!(batch.operations[0].kind, WriteKind::Create);
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn test_partition_with_override_policy() {
        let plan = ConflictResolver::new(ConflictPolicy::OverrideAll).partition(
            &kv(),
            imports(),
            &existing(&["a"]),
        );
        let batch = plan.into_batch().unwrap();

        assert_eq!(batch.skipped, 0);
        let update = batch
            .operations
            .iter()
            .find(|op| op.kind == WriteKind::Update)
            .unwrap();
        assert_eq!(update.name, "a");
        assert_eq!(update.value, ValueSource::Literal("1".into()));
    }

    #[test]
    fn test_ask_policy_blocks_commit_until_resolved() {
        let mut plan = ConflictResolver::new(ConflictPolicy::Ask).partition(
            &kv(),
            imports(),
            &existing(&["a", "b"]),
        );
        assert_eq!(plan.unresolved_count(), 2);
        assert!(!plan.can_commit());
        assert!(matches!(
            plan.clone().into_batch(),
            Err(SyncError::Validation { unresolved: 2 })
        ));

        plan.set_action(0, ConflictAction::Override).unwrap();
        assert_eq!(plan.unresolved_count(), 1);
        plan.set_action_for("b", ConflictAction::Skip).unwrap();
        assert!(plan.can_commit());

        let batch = plan.into_batch().unwrap();
        assert_eq!(batch.operations.len(), 1);
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn test_set_action_errors() {
        let mut plan = ConflictResolver::new(ConflictPolicy::Ask).partition(
            &kv(),
            imports(),
            &existing(&["a"]),
        );
        assert!(matches!(
            plan.set_action(5, ConflictAction::Skip),
            Err(SyncError::ConflictIndexOutOfRange { index: 5, len: 1 })
        ));
        assert!(matches!(
            plan.set_action_for("b", ConflictAction::Skip),
            Err(SyncError::UnknownConflict(_))
        ));

        plan.set_all_actions(ConflictAction::Override);
        assert!(plan.can_commit());
    }

    #[test]
    fn test_duplicate_import_names_keep_last_value() {
        let plan = ConflictResolver::new(ConflictPolicy::Ask).partition(
            &kv(),
            vec![
                ImportEntry::new("a", "first"),
                ImportEntry::new("b", "2"),
                ImportEntry::new("a", "last"),
            ],
            &[],
        );
        assert_eq!(
            plan.new_entries,
            vec![ImportEntry::new("a", "last"), ImportEntry::new("b", "2")]
        );
        assert_eq!(plan.total(), 2);
    }
}
