//! # Engine Primitives
//!
//! Hardcoded constants for the Stepwise engine and its persisted formats.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// Current graph serializer version.
///
/// Increment this when the wire layout changes. Older versions stay
/// readable through the migration chain in `formats::legacy`.
pub const SERIALIZER_VERSION: u32 = 4;

/// Oldest serializer version that can still be read.
///
/// Documents without a `$serializerVersion` field are treated as this version.
pub const MIN_SERIALIZER_VERSION: u32 = 1;

/// Current manifest version.
pub const MANIFEST_VERSION: u32 = 1;

/// Name of the version tag in a process document.
pub const SERIALIZER_VERSION_FIELD: &str = "$serializerVersion";

/// Name of the version tag in a manifest document.
pub const MANIFEST_VERSION_FIELD: &str = "$manifestVersion";

/// Maximum size of a single persisted document (64 MB).
///
/// Documents larger than this are rejected before parsing to avoid
/// memory exhaustion from corrupted or hostile files.
pub const MAX_DOCUMENT_SIZE: usize = 64 * 1024 * 1024;

/// Deepest allowed nesting of sub-chapters (root chapters are depth 0).
///
/// Sub-chapters are stored flat and linked by reference, so nothing in the
/// document shape bounds their depth. Loading and saving reject anything
/// deeper.
pub const MAX_CHAPTER_DEPTH: usize = 32;

/// Most stage changes a journal holds before it evicts the oldest half.
pub const MAX_JOURNAL_ENTRIES: usize = 65_536;

/// Name of the built-in mode that skips nothing.
pub const DEFAULT_MODE_NAME: &str = "Default";

/// Default simulated time per tick, in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 100;

/// Default bound on ticks for a single run.
pub const DEFAULT_MAX_TICKS: u64 = 10_000;

/// File extension of process documents.
pub const PROCESS_FILE_EXTENSION: &str = "json";

/// Suffix of manifest documents (`<slug>.manifest.json`).
pub const MANIFEST_FILE_SUFFIX: &str = ".manifest.json";
