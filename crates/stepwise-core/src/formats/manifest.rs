//! # Process Manifest and Split Storage
//!
//! A process can be stored as one document or split across files:
//!
//! - **single file**: `<slug>.json` holds the whole document, no manifest
//! - **split by chapter**: `<slug>.json` holds the skeleton and the nested
//!   chapters with an empty `Steps` list, each root chapter's steps (nested
//!   chapters' steps included) go to their own fragment, and
//!   `<slug>.manifest.json` lists the fragments
//!
//! A missing manifest always means the single-file layout.

use super::wire::{ProcessDocument, StepRecord};
use crate::primitives::{MANIFEST_VERSION, SERIALIZER_VERSION};
use crate::types::{Guid, StepwiseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How a process is laid out on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageStrategy {
    #[default]
    SingleFile,
    SplitByChapter,
}

impl StorageStrategy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageStrategy::SingleFile => "single-file",
            StorageStrategy::SplitByChapter => "split-by-chapter",
        }
    }
}

impl fmt::Display for StorageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageStrategy {
    type Err = StepwiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-file" => Ok(StorageStrategy::SingleFile),
            "split-by-chapter" => Ok(StorageStrategy::SplitByChapter),
            other => Err(StepwiseError::DeserializationError(format!(
                "unknown storage strategy '{}'",
                other
            ))),
        }
    }
}

/// Side document naming the files of a split process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessManifest {
    #[serde(rename = "$manifestVersion")]
    pub manifest_version: u32,
    pub process_file_name: String,
    #[serde(default)]
    pub additional_files: Vec<String>,
}

impl ProcessManifest {
    #[must_use]
    pub fn new(process_file_name: impl Into<String>, additional_files: Vec<String>) -> Self {
        Self {
            manifest_version: MANIFEST_VERSION,
            process_file_name: process_file_name.into(),
            additional_files,
        }
    }

    /// Check the version and that every file name is a bare name inside
    /// the store directory.
    pub fn validate(&self) -> Result<(), StepwiseError> {
        if self.manifest_version != MANIFEST_VERSION {
            return Err(StepwiseError::UnsupportedVersion {
                found: u64::from(self.manifest_version),
                supported: MANIFEST_VERSION,
            });
        }
        for name in std::iter::once(&self.process_file_name).chain(&self.additional_files) {
            if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
                return Err(StepwiseError::DeserializationError(format!(
                    "manifest names an invalid file '{}'",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Steps owned by one root chapter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChapterFragment {
    #[serde(rename = "$serializerVersion")]
    pub serializer_version: u32,
    pub chapter: Guid,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

/// Move every root chapter tree's steps into its own fragment.
///
/// Steps owned by no chapter stay in the primary document. Step order
/// inside each fragment follows the document.
#[must_use]
pub fn split_document(mut document: ProcessDocument) -> (ProcessDocument, Vec<ChapterFragment>) {
    let owners = step_owners(&document);
    let mut fragments: Vec<ChapterFragment> = document
        .process
        .chapters
        .iter()
        .map(|c| ChapterFragment {
            serializer_version: SERIALIZER_VERSION,
            chapter: c.guid,
            steps: Vec::new(),
        })
        .collect();

    let mut leftover = Vec::new();
    for step in std::mem::take(&mut document.steps) {
        match owners.get(&step.guid).and_then(|&i| fragments.get_mut(i)) {
            Some(fragment) => fragment.steps.push(step),
            None => leftover.push(step),
        }
    }
    document.steps = leftover;
    (document, fragments)
}

/// Put fragment steps back into the primary document.
pub fn merge_fragments(
    mut document: ProcessDocument,
    fragments: Vec<ChapterFragment>,
) -> Result<ProcessDocument, StepwiseError> {
    for fragment in fragments {
        if fragment.serializer_version != SERIALIZER_VERSION {
            return Err(StepwiseError::UnsupportedVersion {
                found: u64::from(fragment.serializer_version),
                supported: SERIALIZER_VERSION,
            });
        }
        if !document.process.chapters.iter().any(|c| c.guid == fragment.chapter) {
            return Err(StepwiseError::UnresolvedReference {
                kind: "chapter",
                id: fragment.chapter.to_string(),
            });
        }
        document.steps.extend(fragment.steps);
    }
    Ok(document)
}

/// Index of the root chapter owning each step.
fn step_owners(document: &ProcessDocument) -> BTreeMap<Guid, usize> {
    let steps: BTreeMap<Guid, &StepRecord> = document.steps.iter().map(|s| (s.guid, s)).collect();
    let sub_chapters: BTreeMap<Guid, _> = document
        .sub_chapters
        .iter()
        .map(|c| (c.guid, c))
        .collect();

    let mut owners = BTreeMap::new();
    for (index, root) in document.process.chapters.iter().enumerate() {
        let mut pending: Vec<Guid> = root.steps.iter().map(|r| r.guid).collect();
        while let Some(guid) = pending.pop() {
            if owners.insert(guid, index).is_some() {
                continue;
            }
            let Some(step) = steps.get(&guid) else {
                continue;
            };
            for behavior in &step.behaviors {
                for reference in &behavior.chapters {
                    if let Some(nested) = sub_chapters.get(&reference.guid) {
                        pending.extend(nested.steps.iter().map(|r| r.guid));
                    }
                }
            }
        }
    }
    owners
}
