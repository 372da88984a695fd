//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the Stepwise engine:
//! - Stable identifiers (`Guid`)
//! - Author-time annotations (`Metadata`)
//! - Entity classification (`EntityKind`)
//! - Error types (`StepwiseError`)
//!
//! ## Determinism Guarantees
//!
//! - `Metadata` is backed by a `BTreeMap`, so serialization order is stable
//! - `Guid` implements `Ord` so identifier tables can use `BTreeMap`

use crate::lifecycle::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable identifier of a step or chapter.
///
/// Guids survive serialization unchanged; they are the only way a transition
/// refers to its target step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(pub Uuid);

impl Guid {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a deterministic identifier from a number (tests and fixtures).
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Guid {
    type Err = StepwiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| StepwiseError::DeserializationError(format!("Invalid guid '{}': {}", s, e)))
    }
}

// =============================================================================
// METADATA
// =============================================================================

/// Opaque author-time annotations attached to an entity.
///
/// The engine never interprets metadata; it is carried through
/// serialization unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, serde_json::Value>);

impl Metadata {
    /// Create empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an annotation, returning the previous value if any.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.0.insert(key.into(), value)
    }

    /// Get an annotation.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Remove an annotation.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.0.remove(key)
    }

    /// Check if there are no annotations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate annotations in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

// =============================================================================
// ENTITY KIND
// =============================================================================

/// The six kinds of executable node in a process graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Process,
    Chapter,
    Step,
    Transition,
    Behavior,
    Condition,
}

impl EntityKind {
    /// Lowercase name used in logs and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Process => "process",
            EntityKind::Chapter => "chapter",
            EntityKind::Step => "step",
            EntityKind::Transition => "transition",
            EntityKind::Behavior => "behavior",
            EntityKind::Condition => "condition",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Stepwise engine.
///
/// - Invalid-state errors are driver or graph contract violations and are
///   always returned to the caller
/// - Reference, identifier and kind errors surface corrupted documents
/// - `LeafFailure` is contained by the leaf wrapper and never stops a run
#[derive(Debug, Error)]
pub enum StepwiseError {
    /// A lifecycle operation was requested from a stage that does not allow it.
    #[error("Invalid state: cannot {operation} {kind} '{name}' while {stage}")]
    InvalidState {
        kind: EntityKind,
        name: String,
        operation: &'static str,
        stage: Stage,
    },

    /// A reference record points to an identifier that does not exist.
    #[error("Unresolved reference: {kind} '{id}' is not present")]
    UnresolvedReference { kind: &'static str, id: String },

    /// The same identifier is used by two entities.
    #[error("Duplicate identifier: {kind} '{id}' appears more than once")]
    DuplicateIdentifier { kind: &'static str, id: String },

    /// A behavior or condition type is not registered.
    #[error("Unknown {category} type: {type_name}")]
    UnknownKind {
        category: &'static str,
        type_name: String,
    },

    /// A leaf's stored properties could not be interpreted.
    #[error("Invalid properties for '{type_name}': {reason}")]
    InvalidProperties { type_name: String, reason: String },

    /// The graph is structurally broken.
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// The document was written by a serializer this build cannot read.
    #[error("Unsupported serializer version: {found} (supported: 1..={supported})")]
    UnsupportedVersion { found: u64, supported: u32 },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An external dependency of a behavior or condition failed.
    #[error("Leaf failure: {0}")]
    LeafFailure(String),

    /// The requested mode is not part of the mode collection.
    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    /// A mode definition conflicts with the built-in modes.
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl StepwiseError {
    /// Build an invalid-state error.
    #[must_use]
    pub fn invalid_state(
        kind: EntityKind,
        name: &str,
        operation: &'static str,
        stage: Stage,
    ) -> Self {
        Self::InvalidState {
            kind,
            name: name.to_string(),
            operation,
            stage,
        }
    }

    /// Check if this error signals corrupted persisted data.
    #[must_use]
    pub fn is_data_corruption(&self) -> bool {
        matches!(
            self,
            StepwiseError::UnresolvedReference { .. }
                | StepwiseError::DuplicateIdentifier { .. }
                | StepwiseError::UnknownKind { .. }
                | StepwiseError::InvalidProperties { .. }
                | StepwiseError::DeserializationError(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
