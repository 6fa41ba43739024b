//! # Name Set Reconciliation
//!
//! Computes the union of entry names across a source and a target store and
//! records, per name, on which side it exists. No values are involved; this is
//! the cheap first pass of every comparison.

use bridge_traits::Entry;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Where a single name exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamePresence {
    pub name: String,
    pub in_source: bool,
    pub in_target: bool,
    pub source_entry: Option<Entry>,
    pub target_entry: Option<Entry>,
}

impl NamePresence {
    pub fn in_both(&self) -> bool {
        self.in_source && self.in_target
    }
}

/// Reconcile two entry listings into a name-sorted presence list.
///
/// Duplicate names within one side collapse onto the first entry seen.
pub fn reconcile(source_entries: &[Entry], target_entries: &[Entry]) -> Vec<NamePresence> {
    let mut names: BTreeMap<String, NamePresence> = BTreeMap::new();

    for entry in source_entries {
        let name = entry.name();
        let presence = names.entry(name.to_string()).or_insert_with(|| empty(name));
        if presence.in_source {
            warn!(name, "Duplicate name in source listing, keeping the first entry");
            continue;
        }
        presence.in_source = true;
        presence.source_entry = Some(entry.clone());
    }

    for entry in target_entries {
        let name = entry.name();
        let presence = names.entry(name.to_string()).or_insert_with(|| empty(name));
        if presence.in_target {
            warn!(name, "Duplicate name in target listing, keeping the first entry");
            continue;
        }
        presence.in_target = true;
        presence.target_entry = Some(entry.clone());
    }

    debug!(
        source = source_entries.len(),
        target = target_entries.len(),
        union = names.len(),
        "Reconciled name sets"
    );
    names.into_values().collect()
}

fn empty(name: &str) -> NamePresence {
    NamePresence {
        name: name.to_string(),
        in_source: false,
        in_target: false,
        source_entry: None,
        target_entry: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::EntryAttributes;

    fn entry(store: &str, name: &str) -> Entry {
        Entry::new(format!("https://{}/secrets/{}", store, name), EntryAttributes::default())
    }

    #[test]
    fn test_union_is_sorted_and_flags_sides() {
        let source = vec![entry("a", "b"), entry("a", "a")];
        let target = vec![entry("t", "c"), entry("t", "b")];

        let result = reconcile(&source, &target);
        let names: Vec<&str> = result.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        assert!(result[0].in_source && !result[0].in_target);
        assert!(result[1].in_both());
        assert!(!result[2].in_source && result[2].in_target);
        assert!(result[2].source_entry.is_none());
    }

    #[test]
    fn test_duplicates_keep_first_entry() {
        let first = Entry::new(
            "https://a/secrets/dup",
            EntryAttributes {
                updated: Some(1),
                ..Default::default()
            },
        );
        let second = Entry::new(
            "https://a/secrets/dup",
            EntryAttributes {
                updated: Some(2),
                ..Default::default()
            },
        );

        let result = reconcile(&[first.clone(), second], &[]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source_entry, Some(first));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(reconcile(&[], &[]).is_empty());
    }
}
