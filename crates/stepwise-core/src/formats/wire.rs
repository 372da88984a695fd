//! # Wire Records (serializer version 4)
//!
//! The flat, acyclic shape of a persisted process:
//!
//! ```json
//! {
//!   "$serializerVersion": 4,
//!   "Process": { "Name": "...", "Chapters": [Chapter] },
//!   "Steps": [Step],
//!   "SubChapters": [Chapter]
//! }
//! ```
//!
//! Every step and every nested chapter appears exactly once, in a flat
//! list. Everything that points at a step or a nested chapter holds a
//! [`Ref`] carrying only its guid.

use crate::primitives::SERIALIZER_VERSION;
use crate::types::{Guid, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference record: the guid of a step or chapter stored elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ref {
    pub guid: Guid,
}

impl From<Guid> for Ref {
    fn from(guid: Guid) -> Self {
        Self { guid }
    }
}

/// A whole process document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessDocument {
    #[serde(rename = "$serializerVersion")]
    pub serializer_version: u32,
    pub process: ProcessRecord,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub sub_chapters: Vec<ChapterRecord>,
}

impl ProcessDocument {
    /// Empty document at the current serializer version.
    #[must_use]
    pub fn new(process: ProcessRecord) -> Self {
        Self {
            serializer_version: SERIALIZER_VERSION,
            process,
            steps: Vec::new(),
            sub_chapters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default)]
    pub chapters: Vec<ChapterRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChapterRecord {
    pub guid: Guid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default)]
    pub steps: Vec<Ref>,
    #[serde(default)]
    pub first_step: Option<Ref>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StepRecord {
    pub guid: Guid,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default)]
    pub behaviors: Vec<BehaviorRecord>,
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BehaviorRecord {
    #[serde(rename = "Type")]
    pub type_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "is_empty_properties")]
    pub properties: Value,
    #[serde(default)]
    pub chapters: Vec<Ref>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransitionRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default)]
    pub conditions: Vec<ConditionRecord>,
    #[serde(default)]
    pub target_step: Option<Ref>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionRecord {
    #[serde(rename = "Type")]
    pub type_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "is_empty_properties")]
    pub properties: Value,
}

fn is_empty_properties(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
