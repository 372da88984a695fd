//! # Tick Context
//!
//! Everything a stage process may observe or mutate during one tick.
//!
//! The mode is borrowed immutably for the whole tick: a mode swap happens
//! between ticks (or through an explicit reconfiguration pass), never in the
//! middle of one.

use super::Stage;
use crate::mode::Mode;
use crate::primitives::MAX_JOURNAL_ENTRIES;
use crate::types::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

// =============================================================================
// SIGNALS
// =============================================================================

/// Named flags standing in for the outside world.
///
/// Behaviors raise and clear signals; conditions observe them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals(BTreeSet<String>);

impl Signals {
    /// Create an empty signal set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a signal. Returns `true` if it was not already raised.
    pub fn raise(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    /// Clear a signal. Returns `true` if it was raised.
    pub fn clear(&mut self, name: &str) -> bool {
        self.0.remove(name)
    }

    /// Check if a signal is raised.
    #[must_use]
    pub fn is_raised(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Iterate raised signals in name order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of raised signals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no signal is raised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Signals {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// JOURNAL
// =============================================================================

/// One stage change, recorded synchronously when it happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChange {
    pub kind: EntityKind,
    pub name: String,
    pub from: Stage,
    pub to: Stage,
}

/// Ordered record of the stage changes of a run.
///
/// The journal is bounded: once it holds `limit` changes, recording another
/// evicts the oldest half. Callers that need the full history drain it
/// between ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    changes: Vec<StageChange>,
    #[serde(skip, default = "default_limit")]
    limit: usize,
    #[serde(skip)]
    evicted: u64,
}

fn default_limit() -> usize {
    MAX_JOURNAL_ENTRIES
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_limit(MAX_JOURNAL_ENTRIES)
    }
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty journal holding at most `limit` changes (at least 2).
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            changes: Vec::new(),
            limit: limit.max(2),
            evicted: 0,
        }
    }

    /// Append a change.
    pub fn record(&mut self, change: StageChange) {
        if self.changes.len() >= self.limit {
            let count = self.limit / 2;
            self.changes.drain(..count);
            self.evicted += count as u64;
            tracing::debug!(evicted = count, total = self.evicted, "journal full, oldest changes evicted");
        }
        self.changes.push(change);
    }

    /// Changes evicted because the journal was full.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// All recorded changes in order.
    #[must_use]
    pub fn changes(&self) -> &[StageChange] {
        &self.changes
    }

    /// Number of times an entity entered `stage`.
    #[must_use]
    pub fn entries(&self, kind: EntityKind, name: &str, stage: Stage) -> usize {
        self.changes
            .iter()
            .filter(|c| c.kind == kind && c.name == name && c.to == stage)
            .count()
    }

    /// Names of entities of `kind` in the order they were activated.
    #[must_use]
    pub fn activation_order(&self, kind: EntityKind) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.kind == kind && c.to == Stage::Activating)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Remove and return every recorded change.
    pub fn drain(&mut self) -> Vec<StageChange> {
        std::mem::take(&mut self.changes)
    }

    /// Number of recorded changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Per-tick context passed to every lifecycle operation.
pub struct Context<'a> {
    /// Mode in effect for this tick.
    pub mode: &'a Mode,
    /// Simulated time elapsed since the previous tick.
    pub delta: Duration,
    /// World stand-in shared by all leaves.
    pub signals: &'a mut Signals,
    /// Stage change sink.
    pub journal: &'a mut Journal,
}

impl<'a> Context<'a> {
    /// Build a context for one tick.
    pub fn new(
        mode: &'a Mode,
        delta: Duration,
        signals: &'a mut Signals,
        journal: &'a mut Journal,
    ) -> Self {
        Self {
            mode,
            delta,
            signals,
            journal,
        }
    }
}
