//! Write operations and how they are planned from a comparison.

use crate::classifier::{ComparedEntry, ComparisonStatus};
use crate::error::{Result, SyncError};
use bridge_traits::StoreRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteKind {
    /// New entry; fails if it already exists
    Create,
    /// New version of an existing entry
    Update,
}

impl WriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteKind::Create => "create",
            WriteKind::Update => "update",
        }
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the value to write comes from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueSource {
    Literal(String),
    /// Resolved through the value loader at execution time
    CopyFrom { store: StoreRef, name: String },
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Literal(value) => f
                .debug_tuple("Literal")
                .field(&format_args!("<{} chars>", value.chars().count()))
                .finish(),
            ValueSource::CopyFrom { store, name } => f
                .debug_struct("CopyFrom")
                .field("store", store)
                .field("name", name)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOperation {
    pub store: StoreRef,
    pub name: String,
    pub kind: WriteKind,
    pub value: ValueSource,
}

impl WriteOperation {
    pub fn create(store: &StoreRef, name: impl Into<String>, value: ValueSource) -> Self {
        Self {
            store: store.clone(),
            name: name.into(),
            kind: WriteKind::Create,
            value,
        }
    }

    pub fn update(store: &StoreRef, name: impl Into<String>, value: ValueSource) -> Self {
        Self {
            store: store.clone(),
            name: name.into(),
            kind: WriteKind::Update,
            value,
        }
    }
}

/// Operations ready for the executor, plus how many items were deliberately skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub operations: Vec<WriteOperation>,
    pub skipped: usize,
}

impl WriteBatch {
    pub fn new(operations: Vec<WriteOperation>) -> Self {
        Self {
            operations,
            skipped: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// A user's selection on one compared entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SyncAction {
    /// Create the entry on the side where it is missing, copying the other side's value
    CopyMissing { name: String },
    /// Create the entry on the side where it is missing with a custom value
    CreateWithValue { name: String, value: String },
    /// Write the source value as a new version of the target entry
    OverwriteTarget { name: String },
}

impl SyncAction {
    pub fn name(&self) -> &str {
        match self {
            SyncAction::CopyMissing { name }
            | SyncAction::CreateWithValue { name, .. }
            | SyncAction::OverwriteTarget { name } => name,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SyncAction::CopyMissing { .. } => "copy missing",
            SyncAction::CreateWithValue { .. } => "create with value",
            SyncAction::OverwriteTarget { .. } => "overwrite target",
        }
    }
}

/// Which differences [`plan_all`] acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncScope {
    /// Copy source-only entries and overwrite mismatches
    #[default]
    SourceToTarget,
    /// Additionally copy target-only entries back to the source
    Bidirectional,
}

impl SyncScope {
    pub fn includes_target_only(&self) -> bool {
        matches!(self, SyncScope::Bidirectional)
    }
}

/// Turn user selections into write operations.
///
/// # Errors
///
/// [`SyncError::InvalidAction`] when a name is unknown, selected twice, or the
/// action does not fit the entry's status.
pub fn plan_actions(
    entries: &[ComparedEntry],
    source: &StoreRef,
    target: &StoreRef,
    actions: &[SyncAction],
) -> Result<Vec<WriteOperation>> {
    let by_name: HashMap<&str, &ComparedEntry> =
        entries.iter().map(|e| (e.name.as_str(), e)).collect();
    let mut seen = HashSet::new();
    let mut operations = Vec::with_capacity(actions.len());

    for action in actions {
        let name = action.name();
        let invalid = |status: &str| SyncError::InvalidAction {
            name: name.to_string(),
            action: action.label().to_string(),
            status: status.to_string(),
        };

        let entry = by_name.get(name).ok_or_else(|| invalid("unknown"))?;
        if !seen.insert(name) {
            return Err(invalid("already selected"));
        }

        let operation = match (action, entry.status) {
            (SyncAction::CopyMissing { .. }, ComparisonStatus::SourceOnly) => {
                WriteOperation::create(target, name, copy_from(source, name))
            }
            (SyncAction::CopyMissing { .. }, ComparisonStatus::TargetOnly) => {
                WriteOperation::create(source, name, copy_from(target, name))
            }
            (SyncAction::CreateWithValue { value, .. }, ComparisonStatus::SourceOnly) => {
                WriteOperation::create(target, name, ValueSource::Literal(value.clone()))
            }
            (SyncAction::CreateWithValue { value, .. }, ComparisonStatus::TargetOnly) => {
                WriteOperation::create(source, name, ValueSource::Literal(value.clone()))
            }
            (SyncAction::OverwriteTarget { .. }, ComparisonStatus::Mismatch) => {
                WriteOperation::update(target, name, copy_from(source, name))
            }
            (_, status) => return Err(invalid(status.as_str())),
        };
        operations.push(operation);
    }

    debug!(count = operations.len(), "Planned selected actions");
    Ok(operations)
}

/// Plan every difference in `entries` according to `scope`.
pub fn plan_all(
    entries: &[ComparedEntry],
    source: &StoreRef,
    target: &StoreRef,
    scope: SyncScope,
) -> Vec<WriteOperation> {
    let operations: Vec<WriteOperation> = entries
        .iter()
        .filter_map(|entry| {
            let name = entry.name.as_str();
            match entry.status {
                ComparisonStatus::SourceOnly => {
                    Some(WriteOperation::create(target, name, copy_from(source, name)))
                }
                ComparisonStatus::Mismatch => {
                    Some(WriteOperation::update(target, name, copy_from(source, name)))
                }
                ComparisonStatus::TargetOnly if scope.includes_target_only() => {
                    Some(WriteOperation::create(source, name, copy_from(target, name)))
                }
                _ => None,
            }
        })
        .collect();

    debug!(count = operations.len(), scope = ?scope, "Planned all differences");
    operations
}

fn copy_from(store: &StoreRef, name: &str) -> ValueSource {
    ValueSource::CopyFrom {
        store: store.clone(),
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> StoreRef {
        StoreRef::new("https://kv-src.vault.azure.net")
    }

    fn dst() -> StoreRef {
        StoreRef::new("https://kv-dst.vault.azure.net")
    }

    fn compared(name: &str, status: ComparisonStatus) -> ComparedEntry {
        ComparedEntry {
            name: name.to_string(),
            status,
            source_entry: None,
            target_entry: None,
            source_value: None,
            target_value: None,
            source_value_fetched: false,
            target_value_fetched: false,
            source_error: None,
            target_error: None,
        }
    }

    fn entries() -> Vec<ComparedEntry> {
        vec![
            compared("same", ComparisonStatus::Match),
            compared("differs", ComparisonStatus::Mismatch),
            compared("only-src", ComparisonStatus::SourceOnly),
            compared("only-dst", ComparisonStatus::TargetOnly),
            compared("loading", ComparisonStatus::Pending),
        ]
    }

    #[test]
    fn test_copy_missing_in_both_directions() {
        let ops = plan_actions(
            &entries(),
            &src(),
            &dst(),
            &[
                SyncAction::CopyMissing {
                    name: "only-src".into(),
                },
                SyncAction::CopyMissing {
                    name: "only-dst".into(),
                },
            ],
        )
        .unwrap();

        assert_eq!(ops[0], WriteOperation::create(&dst(), "only-src", copy_from(&src(), "only-src")));
        assert_eq!(ops[1], WriteOperation::create(&src(), "only-dst", copy_from(&dst(), "only-dst")));
    }

    #[test]
    fn test_create_with_value_and_overwrite() {
        let ops = plan_actions(
            &entries(),
            &src(),
            &dst(),
            &[
                SyncAction::CreateWithValue {
                    name: "only-src".into(),
                    value: "custom".into(),
                },
                SyncAction::OverwriteTarget {
                    name: "differs".into(),
                },
            ],
        )
        .unwrap();

        assert_eq!(ops[0].value, ValueSource::Literal("custom".into()));
        assert_eq!(ops[0].store, dst());
        assert_eq!(ops[1].kind, WriteKind::Update);
        assert_eq!(ops[1].store, dst());
    }

    #[test]
    fn test_invalid_actions_are_rejected() {
        let cases = [
            SyncAction::OverwriteTarget {
                name: "same".into(),
            },
            SyncAction::OverwriteTarget {
                name: "loading".into(),
            },
            SyncAction::CopyMissing {
                name: "differs".into(),
            },
            SyncAction::CopyMissing {
                name: "ghost".into(),
            },
        ];
        for action in cases {
            let err = plan_actions(&entries(), &src(), &dst(), &[action]).unwrap_err();
            assert!(matches!(err, SyncError::InvalidAction { .. }), "{:?}", err);
        }

        let twice = [
            SyncAction::CopyMissing {
                name: "only-src".into(),
            },
            SyncAction::CreateWithValue {
                name: "only-src".into(),
                value: "x".into(),
            },
        ];
        assert!(plan_actions(&entries(), &src(), &dst(), &twice).is_err());
    }

    #[test]
    fn test_plan_all_respects_scope() {
        let one_way = plan_all(&entries(), &src(), &dst(), SyncScope::SourceToTarget);
        let names: Vec<&str> = one_way.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, vec!["differs", "only-src"]);
        assert!(one_way.iter().all(|op| op.store == dst()));

        let both = plan_all(&entries(), &src(), &dst(), SyncScope::Bidirectional);
        assert_eq!(both.len(), 3);
        assert_eq!(both[2].store, src());
    }

    #[test]
    fn test_literal_debug_hides_value() {
        let rendered = format!("{:?}", ValueSource::Literal("hunter2".into()));
        assert!(!rendered.contains("hunter2"));
    }
}
