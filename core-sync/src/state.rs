//! Per-side fetch state of a compared entry.
//!
//! ```text
//! NotRequested → Loading → Loaded
//!       ↑           ↓   ↘
//!       └───────────┘    Errored ──→ Loading
//! Loaded ──→ Loading (reload)
//! NotApplicable (name absent on this side; never moves)
//! ```

use crate::error::{Result, SyncError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "camelCase")]
pub enum FetchState {
    /// The name does not exist on this side
    NotApplicable,
    NotRequested,
    Loading,
    /// `None` when the entry exists without a value
    Loaded(Option<String>),
    Errored(String),
}

impl FetchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchState::NotApplicable => "not_applicable",
            FetchState::NotRequested => "not_requested",
            FetchState::Loading => "loading",
            FetchState::Loaded(_) => "loaded",
            FetchState::Errored(_) => "errored",
        }
    }

    pub fn initial(present: bool) -> Self {
        if present {
            FetchState::NotRequested
        } else {
            FetchState::NotApplicable
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, FetchState::Loaded(_))
    }

    /// Whether a bulk load should request this side.
    pub fn wants_load(&self) -> bool {
        matches!(self, FetchState::NotRequested | FetchState::Errored(_))
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            FetchState::Loaded(value) => value.as_deref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Errored(message) => Some(message),
            _ => None,
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: FetchState) -> Result<()> {
        let valid = matches!(
            (&*self, &next),
            (FetchState::NotRequested, FetchState::Loading)
                | (FetchState::Loading, FetchState::Loaded(_))
                | (FetchState::Loading, FetchState::Errored(_))
                | (FetchState::Loading, FetchState::NotRequested)
                | (FetchState::Errored(_), FetchState::Loading)
                | (FetchState::Loaded(_), FetchState::Loading)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
                reason: match self {
                    FetchState::NotApplicable => "entry is absent on this side".to_string(),
                    _ => format!("cannot go from {} to {}", self.as_str(), next.as_str()),
                },
            });
        }

        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = FetchState::initial(true);
        state.transition(FetchState::Loading).unwrap();
        state
            .transition(FetchState::Loaded(Some("v".to_string())))
            .unwrap();
        assert_eq!(state.value(), Some("v"));

        // Reload
        state.transition(FetchState::Loading).unwrap();
        state.transition(FetchState::Errored("boom".into())).unwrap();
        assert_eq!(state.error(), Some("boom"));

        // Retry
        state.transition(FetchState::Loading).unwrap();
        state.transition(FetchState::NotRequested).unwrap();
    }

    #[test]
    fn test_not_applicable_is_frozen() {
        let mut state = FetchState::initial(false);
        let err = state.transition(FetchState::Loading).unwrap_err();
        assert!(matches!(
            err,
            SyncError::InvalidStateTransition { ref from, .. } if from == "not_applicable"
        ));
        assert_eq!(state, FetchState::NotApplicable);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut state = FetchState::NotRequested;
        assert!(state.transition(FetchState::Loaded(None)).is_err());
        assert!(state.transition(FetchState::Errored("x".into())).is_err());

        let mut loading = FetchState::Loading;
        assert!(loading.transition(FetchState::Loading).is_err());
        assert!(loading.transition(FetchState::NotApplicable).is_err());
    }

    #[test]
    fn test_wants_load() {
        assert!(FetchState::NotRequested.wants_load());
        assert!(FetchState::Errored("x".into()).wants_load());
        assert!(!FetchState::Loading.wants_load());
        assert!(!FetchState::Loaded(None).wants_load());
        assert!(!FetchState::NotApplicable.wants_load());
    }
}
