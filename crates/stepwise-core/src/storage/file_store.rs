//! # File Process Store
//!
//! A directory of process documents, addressed by slug.
//!
//! ```text
//! <root>/
//!   intro.json                   single file, or primary of a split process
//!   intro.manifest.json          present only for split processes
//!   intro.chapter-0.json         one fragment per root chapter
//! ```
//!
//! Saving with one strategy removes the files of the other, so a slug
//! never has a stale manifest or fragment lying next to it.
//!
//! A save writes every file to a temporary sibling first and renames them
//! into place only once all of them are on disk. Stale side files are
//! pruned last, so a failed save leaves the previous version loadable.

use crate::formats::{
    ChapterFragment, ProcessDocument, ProcessManifest, StorageStrategy, document_from_str,
    document_to_process, document_to_string, merge_fragments, process_to_document,
    split_document,
};
use crate::model::Process;
use crate::primitives::{MANIFEST_FILE_SUFFIX, MAX_DOCUMENT_SIZE, PROCESS_FILE_EXTENSION};
use crate::registry::KindRegistry;
use crate::types::StepwiseError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Process documents stored in one directory.
#[derive(Debug, Clone)]
pub struct FileProcessStore {
    root: PathBuf,
}

impl FileProcessStore {
    /// Open a store, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StepwiseError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the primary document for a process name.
    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(primary_file_name(&slug(name)))
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    /// Save a process under its own name. Returns the primary document path.
    pub fn save(&self, process: &Process, strategy: StorageStrategy) -> Result<PathBuf, StepwiseError> {
        self.save_as(process.name(), process, strategy)
    }

    /// Save a process under `name`, which may differ from the process's own
    /// name (a stored file keeps its file name when rewritten).
    pub fn save_as(
        &self,
        name: &str,
        process: &Process,
        strategy: StorageStrategy,
    ) -> Result<PathBuf, StepwiseError> {
        let slug = slug(name);
        let document = process_to_document(process)?;
        let primary_name = primary_file_name(&slug);

        // Renamed into place in this order; the manifest goes last.
        let mut files: Vec<(String, String)> = Vec::new();
        match strategy {
            StorageStrategy::SingleFile => {
                files.push((primary_name.clone(), document_to_string(&document)?));
            }
            StorageStrategy::SplitByChapter => {
                let (skeleton, fragments) = split_document(document);
                let mut additional = Vec::with_capacity(fragments.len());
                for (index, fragment) in fragments.iter().enumerate() {
                    let file_name = fragment_file_name(&slug, index);
                    files.push((file_name.clone(), to_pretty(fragment)?));
                    additional.push(file_name);
                }
                files.push((primary_name.clone(), document_to_string(&skeleton)?));
                let manifest = ProcessManifest::new(primary_name.clone(), additional);
                files.push((manifest_file_name(&slug), to_pretty(&manifest)?));
            }
        }

        let stale = self.side_files(&slug);
        let mut staged = Vec::with_capacity(files.len());
        for (file_name, contents) in &files {
            staged.push((file_name, self.stage(contents)?));
        }
        for (file_name, temp) in staged {
            let path = self.root.join(file_name);
            temp.persist(&path).map_err(|e| io_error(&path, e.error))?;
        }

        let written: BTreeSet<&str> = files.iter().map(|(file_name, _)| file_name.as_str()).collect();
        for file_name in stale.iter().filter(|f| !written.contains(f.as_str())) {
            remove_if_exists(&self.root.join(file_name))?;
        }

        let primary = self.root.join(primary_name);
        tracing::info!(process = process.name(), %slug, %strategy, path = %primary.display(), "process saved");
        Ok(primary)
    }

    /// Load a process by name.
    pub fn load(&self, name: &str, registry: &KindRegistry) -> Result<Process, StepwiseError> {
        let path = self.path_of(name);
        let manifest = self.root.join(manifest_file_name(&slug(name)));
        if !path.is_file() && !manifest.is_file() {
            return Err(StepwiseError::IoError(format!("no process named '{}'", name)));
        }
        load_path(&path, registry)
    }

    /// Load the raw (migrated, merged) document of a process.
    pub fn load_document(&self, name: &str) -> Result<ProcessDocument, StepwiseError> {
        load_document_path(&self.path_of(name))
    }

    /// Names (slugs) of stored processes, sorted.
    pub fn list(&self) -> Result<Vec<String>, StepwiseError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(slug) = primary_slug(file_name) {
                names.push(slug.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a process and its manifest and fragments.
    ///
    /// Returns false when nothing was stored under the name.
    pub fn delete(&self, name: &str) -> Result<bool, StepwiseError> {
        let slug = slug(name);
        let primary = self.root.join(primary_file_name(&slug));
        let side_files = self.side_files(&slug);
        let existed = primary.is_file() || !side_files.is_empty();
        for file in &side_files {
            remove_if_exists(&self.root.join(file))?;
        }
        remove_if_exists(&primary)?;
        if existed {
            tracing::info!(process = %slug, "process deleted");
        }
        Ok(existed)
    }

    /// The manifest of a slug and every file it names besides the primary
    /// document. Empty when there is no manifest.
    fn side_files(&self, slug: &str) -> BTreeSet<String> {
        let mut files = BTreeSet::new();
        let manifest_name = manifest_file_name(slug);
        let manifest_path = self.root.join(&manifest_name);
        if !manifest_path.is_file() {
            return files;
        }
        match read_manifest(&manifest_path) {
            Ok(manifest) => files.extend(manifest.additional_files),
            Err(e) => tracing::warn!(path = %manifest_path.display(), error = %e, "unreadable manifest, removing it alone"),
        }
        files.insert(manifest_name);
        files
    }

    /// Write contents to a temporary file inside the store directory.
    fn stage(&self, contents: &str) -> Result<NamedTempFile, StepwiseError> {
        let temp = NamedTempFile::new_in(&self.root).map_err(|e| io_error(&self.root, e))?;
        std::fs::write(temp.path(), contents).map_err(|e| io_error(temp.path(), e))?;
        Ok(temp)
    }
}

/// Load a process from a document path, following a manifest next to it
/// when one exists.
pub fn load_path(path: &Path, registry: &KindRegistry) -> Result<Process, StepwiseError> {
    document_to_process(load_document_path(path)?, registry)
}

/// Load a document from a path, migrating legacy versions and merging
/// split fragments.
///
/// `path` may be a primary document or a manifest. When a manifest exists,
/// the primary document is the file it records.
pub fn load_document_path(path: &Path) -> Result<ProcessDocument, StepwiseError> {
    let manifest_path = if is_manifest(path) {
        Some(path.to_path_buf())
    } else {
        manifest_path_for(path).filter(|p| p.is_file())
    };
    let Some(manifest_path) = manifest_path else {
        return document_from_str(&read(path)?);
    };

    let manifest = read_manifest(&manifest_path)?;
    let directory = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let document = document_from_str(&read(&directory.join(&manifest.process_file_name))?)?;
    let mut fragments = Vec::with_capacity(manifest.additional_files.len());
    for file in &manifest.additional_files {
        let fragment_path = directory.join(file);
        let fragment: ChapterFragment = serde_json::from_str(&read(&fragment_path)?)
            .map_err(|e| StepwiseError::DeserializationError(format!("{}: {}", fragment_path.display(), e)))?;
        fragments.push(fragment);
    }
    tracing::debug!(fragments = fragments.len(), path = %manifest_path.display(), "merging split process");
    merge_fragments(document, fragments)
}

/// File-name safe form of a process name: lowercase ASCII letters and
/// digits, runs of anything else collapsed to `-`.
#[must_use]
pub fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("process");
    }
    slug
}

// =============================================================================
// FILE NAMES
// =============================================================================

fn primary_file_name(slug: &str) -> String {
    format!("{}.{}", slug, PROCESS_FILE_EXTENSION)
}

fn manifest_file_name(slug: &str) -> String {
    format!("{}{}", slug, MANIFEST_FILE_SUFFIX)
}

fn fragment_file_name(slug: &str, index: usize) -> String {
    format!("{}.chapter-{}.{}", slug, index, PROCESS_FILE_EXTENSION)
}

/// Slug of a primary document file name, `None` for manifests, fragments
/// and unrelated files.
fn primary_slug(file_name: &str) -> Option<&str> {
    if file_name.ends_with(MANIFEST_FILE_SUFFIX) {
        return None;
    }
    let stem = file_name.strip_suffix(PROCESS_FILE_EXTENSION)?.strip_suffix('.')?;
    if stem.is_empty() || stem.contains('.') {
        return None;
    }
    Some(stem)
}

fn is_manifest(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(MANIFEST_FILE_SUFFIX))
}

fn manifest_path_for(path: &Path) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(PROCESS_FILE_EXTENSION)?.strip_suffix('.')?;
    Some(path.with_file_name(manifest_file_name(stem)))
}

// =============================================================================
// IO HELPERS
// =============================================================================

fn io_error(path: &Path, error: std::io::Error) -> StepwiseError {
    StepwiseError::IoError(format!("{}: {}", path.display(), error))
}

fn read(path: &Path) -> Result<String, StepwiseError> {
    let metadata = std::fs::metadata(path).map_err(|e| io_error(path, e))?;
    if metadata.len() > MAX_DOCUMENT_SIZE as u64 {
        return Err(StepwiseError::DeserializationError(format!(
            "{}: file too large ({} bytes, max {})",
            path.display(),
            metadata.len(),
            MAX_DOCUMENT_SIZE
        )));
    }
    std::fs::read_to_string(path).map_err(|e| io_error(path, e))
}

fn remove_if_exists(path: &Path) -> Result<(), StepwiseError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn read_manifest(path: &Path) -> Result<ProcessManifest, StepwiseError> {
    let manifest: ProcessManifest = serde_json::from_str(&read(path)?)
        .map_err(|e| StepwiseError::DeserializationError(format!("{}: {}", path.display(), e)))?;
    manifest.validate()?;
    Ok(manifest)
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, StepwiseError> {
    serde_json::to_string_pretty(value).map_err(|e| StepwiseError::SerializationError(e.to_string()))
}
