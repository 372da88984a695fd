//! # Formats Module
//!
//! Persisted shape of a process.
//!
//! - `wire`: version 4 records (flat steps, flat sub-chapters, guid refs)
//! - `serializer`: live graph <-> document, with version dispatch on load
//! - `legacy`: read-only migration chain for versions 1 to 3
//! - `manifest`: split storage across several files

mod legacy;
mod manifest;
mod serializer;
mod wire;

pub use manifest::{
    ChapterFragment, ProcessManifest, StorageStrategy, merge_fragments, split_document,
};
pub use serializer::{
    document_from_str, document_from_value, document_to_process, document_to_string,
    document_version, process_from_str, process_to_document, process_to_string,
};
pub use wire::{
    BehaviorRecord, ChapterRecord, ConditionRecord, ProcessDocument, ProcessRecord, Ref,
    StepRecord, TransitionRecord,
};
