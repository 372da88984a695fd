//! # Lifecycle Stages
//!
//! Every executable entity occupies exactly one of four stages.
//!
//! | Stage | Meaning | Leaves by |
//! |-------|---------|-----------|
//! | Inactive | not running, no stage process | `activate()` |
//! | Activating | entry work in progress | stage process completes |
//! | Active | running, steady state | `deactivate()` |
//! | Deactivating | exit work in progress | stage process completes |
//!
//! The only legal transition from a stage is to its cyclic successor
//! (`Stage::next`). Fast-forward does not add edges to this cycle: it drives
//! the same transitions synchronously.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of an entity lifecycle.
///
/// Ordered in cycle order so "later in the cycle" is a plain comparison.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Stage {
    #[default]
    Inactive,
    Activating,
    Active,
    Deactivating,
}

impl Stage {
    /// All stages in cycle order.
    pub const ALL: [Stage; 4] = [
        Stage::Inactive,
        Stage::Activating,
        Stage::Active,
        Stage::Deactivating,
    ];

    /// Get the cyclic successor of this stage.
    #[must_use]
    pub fn next(&self) -> Stage {
        match self {
            Stage::Inactive => Stage::Activating,
            Stage::Activating => Stage::Active,
            Stage::Active => Stage::Deactivating,
            Stage::Deactivating => Stage::Inactive,
        }
    }

    /// Check if moving from this stage to `to` is legal.
    #[must_use]
    pub fn can_transition_to(&self, to: Stage) -> bool {
        self.next() == to
    }

    /// Check if the stage advances on its own once its process completes.
    ///
    /// `Active` is left only through an explicit `deactivate()`.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Stage::Activating | Stage::Deactivating)
    }

    /// Check if an entity in this stage is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !matches!(self, Stage::Inactive)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_cycle_returns_to_start() {
        let mut stage = Stage::Inactive;
        for _ in 0..4 {
            stage = stage.next();
        }
        assert_eq!(stage, Stage::Inactive);
    }

    #[test]
    fn only_successor_is_legal() {
        for from in Stage::ALL {
            let legal: Vec<_> = Stage::ALL
                .into_iter()
                .filter(|to| from.can_transition_to(*to))
                .collect();
            assert_eq!(legal, vec![from.next()]);
        }
    }

    #[test]
    fn stage_ordering_follows_cycle() {
        assert!(Stage::Inactive < Stage::Activating);
        assert!(Stage::Activating < Stage::Active);
        assert!(Stage::Active < Stage::Deactivating);
    }

    #[test]
    fn transient_stages() {
        assert!(Stage::Activating.is_transient());
        assert!(Stage::Deactivating.is_transient());
        assert!(!Stage::Active.is_transient());
        assert!(!Stage::Inactive.is_transient());
    }

    #[test]
    fn display_is_variant_name() {
        assert_eq!(Stage::Deactivating.to_string(), "Deactivating");
    }
}
