//! # Comparison Classification
//!
//! Pure functions that turn a [`NamePresence`] plus the fetch state of each
//! side into a [`ComparisonStatus`]. Classification is idempotent and safe on
//! partial data: an entry whose values have not all loaded yet is reported
//! with a placeholder status rather than a guess.

use crate::reconciler::NamePresence;
use crate::state::FetchState;
use bridge_traits::Entry;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonStatus {
    Match,
    Mismatch,
    SourceOnly,
    TargetOnly,
    /// Present on both sides, values not yet comparable
    Pending,
}

impl ComparisonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonStatus::Match => "match",
            ComparisonStatus::Mismatch => "mismatch",
            ComparisonStatus::SourceOnly => "source-only",
            ComparisonStatus::TargetOnly => "target-only",
            ComparisonStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reported for both-present entries whose values are not both loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingPlaceholder {
    #[default]
    Pending,
    /// Report `Match` until proven otherwise
    Match,
}

impl PendingPlaceholder {
    pub fn from_legacy_flag(legacy_match: bool) -> Self {
        if legacy_match {
            PendingPlaceholder::Match
        } else {
            PendingPlaceholder::Pending
        }
    }

    fn status(self) -> ComparisonStatus {
        match self {
            PendingPlaceholder::Pending => ComparisonStatus::Pending,
            PendingPlaceholder::Match => ComparisonStatus::Match,
        }
    }
}

pub fn classify(
    presence: &NamePresence,
    source: &FetchState,
    target: &FetchState,
    placeholder: PendingPlaceholder,
) -> ComparisonStatus {
    match (presence.in_source, presence.in_target) {
        (true, false) => ComparisonStatus::SourceOnly,
        (false, true) => ComparisonStatus::TargetOnly,
        // Not produced by reconcile; treat like a placeholder rather than panic
        (false, false) => placeholder.status(),
        (true, true) => match (source, target) {
            (FetchState::Loaded(s), FetchState::Loaded(t)) => {
                if s.as_deref().unwrap_or("") == t.as_deref().unwrap_or("") {
                    ComparisonStatus::Match
                } else {
                    ComparisonStatus::Mismatch
                }
            }
            _ => placeholder.status(),
        },
    }
}

/// One row of a comparison as seen by readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparedEntry {
    pub name: String,
    pub status: ComparisonStatus,
    pub source_entry: Option<Entry>,
    pub target_entry: Option<Entry>,
    #[serde(skip_serializing)]
    pub source_value: Option<String>,
    #[serde(skip_serializing)]
    pub target_value: Option<String>,
    pub source_value_fetched: bool,
    pub target_value_fetched: bool,
    pub source_error: Option<String>,
    pub target_error: Option<String>,
}

impl ComparedEntry {
    pub fn build(
        presence: &NamePresence,
        source: &FetchState,
        target: &FetchState,
        placeholder: PendingPlaceholder,
    ) -> Self {
        Self {
            name: presence.name.clone(),
            status: classify(presence, source, target, placeholder),
            source_entry: presence.source_entry.clone(),
            target_entry: presence.target_entry.clone(),
            source_value: source.value().map(str::to_string),
            target_value: target.value().map(str::to_string),
            source_value_fetched: source.is_loaded(),
            target_value_fetched: target.is_loaded(),
            source_error: source.error().map(str::to_string),
            target_error: target.error().map(str::to_string),
        }
    }
}

/// Counts per status. `total` is always the sum of the other five.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonStats {
    pub total: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub source_only: usize,
    pub target_only: usize,
    pub pending: usize,
}

impl ComparisonStats {
    pub fn from_entries(entries: &[ComparedEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut stats, entry| {
            stats.total += 1;
            match entry.status {
                ComparisonStatus::Match => stats.matches += 1,
                ComparisonStatus::Mismatch => stats.mismatches += 1,
                ComparisonStatus::SourceOnly => stats.source_only += 1,
                ComparisonStatus::TargetOnly => stats.target_only += 1,
                ComparisonStatus::Pending => stats.pending += 1,
            }
            stats
        })
    }

    pub fn differences(&self) -> usize {
        self.mismatches + self.source_only + self.target_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(in_source: bool, in_target: bool) -> NamePresence {
        NamePresence {
            name: "db-password".to_string(),
            in_source,
            in_target,
            source_entry: None,
            target_entry: None,
        }
    }

    fn loaded(value: &str) -> FetchState {
        FetchState::Loaded(Some(value.to_string()))
    }

    #[test]
    fn test_one_sided_ignores_fetch_state() {
        let p = presence(true, false);
        for state in [FetchState::NotRequested, FetchState::Loading, loaded("x")] {
            assert_eq!(
                classify(&p, &state, &FetchState::NotApplicable, PendingPlaceholder::Pending),
                ComparisonStatus::SourceOnly
            );
        }

        let p = presence(false, true);
        assert_eq!(
            classify(
                &p,
                &FetchState::NotApplicable,
                &FetchState::Errored("boom".into()),
                PendingPlaceholder::Match
            ),
            ComparisonStatus::TargetOnly
        );
    }

    #[test]
    fn test_both_loaded() {
        let p = presence(true, true);
        let pending = PendingPlaceholder::Pending;
        assert_eq!(classify(&p, &loaded("1"), &loaded("1"), pending), ComparisonStatus::Match);
        assert_eq!(
            classify(&p, &loaded("1"), &loaded("2"), pending),
            ComparisonStatus::Mismatch
        );
        // Absent value compares equal to the empty string
        assert_eq!(
            classify(&p, &FetchState::Loaded(None), &loaded(""), pending),
            ComparisonStatus::Match
        );
    }

    #[test]
    fn test_placeholder_until_both_loaded() {
        let p = presence(true, true);
        let cases = [
            (FetchState::NotRequested, loaded("1")),
            (FetchState::Loading, FetchState::Loading),
            (loaded("1"), FetchState::Errored("boom".into())),
        ];
        for (source, target) in cases {
            assert_eq!(
                classify(&p, &source, &target, PendingPlaceholder::Pending),
                ComparisonStatus::Pending
            );
            assert_eq!(
                classify(&p, &source, &target, PendingPlaceholder::Match),
                ComparisonStatus::Match
            );
        }
    }

    #[test]
    fn test_stats_sum_to_total() {
        let both = presence(true, true);
        let entries = vec![
            ComparedEntry::build(&both, &loaded("1"), &loaded("1"), PendingPlaceholder::Pending),
            ComparedEntry::build(&both, &loaded("1"), &loaded("2"), PendingPlaceholder::Pending),
            ComparedEntry::build(
                &both,
                &FetchState::NotRequested,
                &FetchState::NotRequested,
                PendingPlaceholder::Pending,
            ),
            ComparedEntry::build(
                &presence(true, false),
                &FetchState::NotRequested,
                &FetchState::NotApplicable,
                PendingPlaceholder::Pending,
            ),
        ];

        let stats = ComparisonStats::from_entries(&entries);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.matches, 1);
        assert_eq!(stats.mismatches, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.source_only, 1);
        assert_eq!(
            stats.total,
            stats.matches + stats.mismatches + stats.source_only + stats.target_only + stats.pending
        );
        assert_eq!(stats.differences(), 2);
    }

    #[test]
    fn test_compared_entry_exposes_fetch_details() {
        let entry = ComparedEntry::build(
            &presence(true, true),
            &loaded("v"),
            &FetchState::Errored("denied".into()),
            PendingPlaceholder::Pending,
        );
        assert!(entry.source_value_fetched);
        assert!(!entry.target_value_fetched);
        assert_eq!(entry.source_value.as_deref(), Some("v"));
        assert_eq!(entry.target_error.as_deref(), Some("denied"));
    }
}
