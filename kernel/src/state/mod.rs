// Index State Tags
//
// The lifecycle tags recorded on each log entry, and the set of tags
// that count as a safe recovery point.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state recorded by a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexState {
    /// Index is being built for the first time.
    Creating,

    /// Index is built and queryable.
    Active,

    /// Index data is being rebuilt from its source.
    Refreshing,

    /// Index files are being compacted.
    Optimizing,

    /// A soft-deleted index is being brought back.
    Restoring,

    /// Index is being soft-deleted.
    Deleting,

    /// Index is soft-deleted.
    Deleted,

    /// Index files are being removed for good.
    Vacuuming,

    /// An in-flight action is being rolled back.
    Cancelling,

    /// Index was vacuumed, or never existed.
    DoesNotExist,
}

impl IndexState {
    pub const ALL: [IndexState; 10] = [
        IndexState::Creating,
        IndexState::Active,
        IndexState::Refreshing,
        IndexState::Optimizing,
        IndexState::Restoring,
        IndexState::Deleting,
        IndexState::Deleted,
        IndexState::Vacuuming,
        IndexState::Cancelling,
        IndexState::DoesNotExist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexState::Creating => "CREATING",
            IndexState::Active => "ACTIVE",
            IndexState::Refreshing => "REFRESHING",
            IndexState::Optimizing => "OPTIMIZING",
            IndexState::Restoring => "RESTORING",
            IndexState::Deleting => "DELETING",
            IndexState::Deleted => "DELETED",
            IndexState::Vacuuming => "VACUUMING",
            IndexState::Cancelling => "CANCELLING",
            IndexState::DoesNotExist => "DOES_NOT_EXIST",
        }
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership test for stable states.
///
/// Only entries whose state is in this set may be promoted to the
/// stable pointer or returned by the stable scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableStates {
    states: BTreeSet<IndexState>,
}

impl StableStates {
    pub fn new(states: impl IntoIterator<Item = IndexState>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }

    pub fn contains(&self, state: IndexState) -> bool {
        self.states.contains(&state)
    }

    pub fn iter(&self) -> impl Iterator<Item = IndexState> + '_ {
        self.states.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for StableStates {
    /// States in which no action is in flight.
    fn default() -> Self {
        Self::new([
            IndexState::Active,
            IndexState::Deleted,
            IndexState::DoesNotExist,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stable_set() {
        let stable = StableStates::default();

        assert!(stable.contains(IndexState::Active));
        assert!(stable.contains(IndexState::Deleted));
        assert!(stable.contains(IndexState::DoesNotExist));

        for state in [
            IndexState::Creating,
            IndexState::Refreshing,
            IndexState::Deleting,
            IndexState::Vacuuming,
        ] {
            assert!(!stable.contains(state), "{state} must not be stable");
        }
    }

    #[test]
    fn serialized_names_match_display() {
        for state in IndexState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
