//! # stepwise-core
//!
//! The deterministic process engine for Stepwise - THE LOGIC.
//!
//! A process is a tree of chapters, steps, transitions, behaviors and
//! conditions. Every node runs the same four-stage lifecycle:
//!
//! ```text
//! Inactive -> Activating -> Active -> Deactivating -> Inactive
//! ```
//!
//! Steps form a directed, possibly cyclic graph inside each chapter, and
//! behaviors may own nested chapters. The graph serializer flattens all of
//! it into an acyclic document and restores it, reading every older
//! document version through a migration chain.
//!
//! ## Architectural Constraints
//!
//! - Single-threaded cooperative execution driven by explicit ticks
//! - Simulated time only: integer milliseconds, no floats
//! - No async, no network dependencies (pure Rust)
//! - Open leaves: new behavior and condition kinds plug in through the
//!   kind traits and the registry, without touching the engine

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod kinds;
pub mod lifecycle;
pub mod metrics;
pub mod mode;
pub mod model;
pub mod primitives;
pub mod registry;
pub mod runner;
pub mod storage;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{EntityKind, Guid, Metadata, StepwiseError};

// =============================================================================
// RE-EXPORTS: Lifecycle and Model
// =============================================================================

pub use lifecycle::{
    Context, EmptyProcess, Entity, EntityData, Journal, LifeCycle, Poll, Signals, Stage,
    StageChange, StageProcess,
};
pub use mode::{Mode, ModeCollection, TypeRule};
pub use model::{
    Behavior, BehaviorData, Chapter, ChapterData, Condition, ConditionData, Process, ProcessData,
    Step, StepData, Transition, TransitionData, walk_chapters,
};

// =============================================================================
// RE-EXPORTS: Leaves
// =============================================================================

pub use kinds::{BehaviorKind, ConditionKind, Contained, LeafData};
pub use registry::KindRegistry;

// =============================================================================
// RE-EXPORTS: Driving, Inspection and Persistence
// =============================================================================

pub use formats::{
    ProcessDocument, ProcessManifest, StorageStrategy, document_from_str, process_from_str,
    process_to_document, process_to_string,
};
pub use metrics::ProcessMetrics;
pub use runner::{RunOutcome, RunStatus, Runner};
pub use storage::FileProcessStore;
pub use validation::{Severity, ValidationIssue, validate_process};
