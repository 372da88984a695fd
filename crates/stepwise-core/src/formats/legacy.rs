//! # Legacy Document Migration
//!
//! Older serializer versions are read-only. A legacy document is migrated
//! one version at a time, as a raw JSON tree, until it has the current
//! shape:
//!
//! | Version | Steps | Step references | Nested chapters |
//! |---------|-------|-----------------|-----------------|
//! | 1 | inline tree, each step tagged `$id` | inline step or `{"$ref": id}` | inline |
//! | 2 | inline `Steps` list per chapter, with `Guid` | `{"guid": ...}` | inline |
//! | 3 | global `Steps` list | `{"guid": ...}` | inline |
//! | 4 | global `Steps` list | `{"guid": ...}` | global `SubChapters` list |
//!
//! Version 1 documents nest each step inside the transition that first
//! reaches it, so they can be arbitrarily deep. The step walk uses an
//! explicit stack; only chapter nesting recurses.

use crate::primitives::{SERIALIZER_VERSION, SERIALIZER_VERSION_FIELD};
use crate::types::{Guid, StepwiseError};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Migrate a raw document from `from` to the current serializer version.
pub fn migrate(mut document: Value, from: u32) -> Result<Value, StepwiseError> {
    let mut version = from;
    while version < SERIALIZER_VERSION {
        document = match version {
            1 => v1_to_v2(document)?,
            2 => v2_to_v3(document)?,
            3 => v3_to_v4(document)?,
            _ => {
                return Err(StepwiseError::UnsupportedVersion {
                    found: u64::from(version),
                    supported: SERIALIZER_VERSION,
                });
            }
        };
        version += 1;
        object_mut(&mut document, "document")?
            .insert(SERIALIZER_VERSION_FIELD.to_string(), Value::from(version));
        tracing::debug!(version, "document migrated");
    }
    Ok(document)
}

// =============================================================================
// V1 -> V2: assign guids, collect each chapter's steps
// =============================================================================

/// `$id` to guid table shared by the whole document.
#[derive(Default)]
struct IdTable {
    guids: BTreeMap<String, Guid>,
    defined: BTreeSet<String>,
}

impl IdTable {
    fn guid(&mut self, id: &str) -> Guid {
        *self.guids.entry(id.to_string()).or_insert_with(Guid::new)
    }

    fn define(&mut self, id: &str) -> Result<Guid, StepwiseError> {
        if !self.defined.insert(id.to_string()) {
            return Err(StepwiseError::DuplicateIdentifier {
                kind: "step",
                id: id.to_string(),
            });
        }
        Ok(self.guid(id))
    }

    fn check(&self) -> Result<(), StepwiseError> {
        match self.guids.keys().find(|id| !self.defined.contains(*id)) {
            Some(id) => Err(StepwiseError::UnresolvedReference {
                kind: "step",
                id: id.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn v1_to_v2(mut document: Value) -> Result<Value, StepwiseError> {
    let mut ids = IdTable::default();
    let process = process_mut(&mut document)?;
    let chapters = take_array(process, "Chapters")?
        .into_iter()
        .map(|c| chapter_v1(c, &mut ids))
        .collect::<Result<Vec<_>, _>>()?;
    process.insert("Chapters".to_string(), Value::Array(chapters));
    ids.check()?;
    Ok(document)
}

fn chapter_v1(chapter: Value, ids: &mut IdTable) -> Result<Value, StepwiseError> {
    let mut chapter = into_object(chapter, "chapter")?;
    let mut pending = Vec::new();
    let first = step_slot_v1(chapter.remove("FirstStep"), ids, &mut pending)?;

    let mut steps = Vec::new();
    while let Some((guid, step)) = pending.pop() {
        let mut discovered = Vec::new();
        steps.push(step_v1(guid, step, ids, &mut discovered)?);
        pending.extend(discovered.into_iter().rev());
    }

    chapter.remove("$id");
    chapter.insert("Guid".to_string(), Value::String(Guid::new().to_string()));
    chapter.insert("Steps".to_string(), Value::Array(steps));
    chapter.insert("FirstStep".to_string(), first);
    Ok(Value::Object(chapter))
}

/// Turn a step slot (inline step, `$ref` or null) into a guid reference,
/// queueing inline steps for conversion.
fn step_slot_v1(
    slot: Option<Value>,
    ids: &mut IdTable,
    pending: &mut Vec<(Guid, Map<String, Value>)>,
) -> Result<Value, StepwiseError> {
    let step = match slot {
        None | Some(Value::Null) => return Ok(Value::Null),
        Some(value) => into_object(value, "step")?,
    };
    if let Some(target) = step.get("$ref") {
        let id = target
            .as_str()
            .ok_or_else(|| malformed("$ref must be a string"))?;
        return Ok(reference(ids.guid(id)));
    }
    let guid = match step.get("$id") {
        Some(id) => ids.define(id.as_str().ok_or_else(|| malformed("$id must be a string"))?)?,
        None => Guid::new(),
    };
    pending.push((guid, step));
    Ok(reference(guid))
}

fn step_v1(
    guid: Guid,
    mut step: Map<String, Value>,
    ids: &mut IdTable,
    discovered: &mut Vec<(Guid, Map<String, Value>)>,
) -> Result<Value, StepwiseError> {
    step.remove("$id");
    step.insert("Guid".to_string(), Value::String(guid.to_string()));

    let mut behaviors = take_array(&mut step, "Behaviors")?;
    for behavior in &mut behaviors {
        let behavior = as_object_mut(behavior, "behavior")?;
        let nested = take_array(behavior, "Chapters")?
            .into_iter()
            .map(|c| chapter_v1(c, ids))
            .collect::<Result<Vec<_>, _>>()?;
        behavior.insert("Chapters".to_string(), Value::Array(nested));
    }
    step.insert("Behaviors".to_string(), Value::Array(behaviors));

    let mut transitions = take_array(&mut step, "Transitions")?;
    for transition in &mut transitions {
        let transition = as_object_mut(transition, "transition")?;
        let target = step_slot_v1(transition.remove("TargetStep"), ids, discovered)?;
        transition.insert("TargetStep".to_string(), target);
    }
    step.insert("Transitions".to_string(), Value::Array(transitions));

    Ok(Value::Object(step))
}

// =============================================================================
// V2 -> V3: lift per-chapter steps into the global list
// =============================================================================

fn v2_to_v3(mut document: Value) -> Result<Value, StepwiseError> {
    let mut steps = Vec::new();
    let process = process_mut(&mut document)?;
    let chapters = take_array(process, "Chapters")?
        .into_iter()
        .map(|c| lift_steps(c, &mut steps))
        .collect::<Result<Vec<_>, _>>()?;
    process.insert("Chapters".to_string(), Value::Array(chapters));
    object_mut(&mut document, "document")?.insert("Steps".to_string(), Value::Array(steps));
    Ok(document)
}

fn lift_steps(chapter: Value, out: &mut Vec<Value>) -> Result<Value, StepwiseError> {
    let mut chapter = into_object(chapter, "chapter")?;
    let mut references = Vec::new();
    for step in take_array(&mut chapter, "Steps")? {
        let mut step = into_object(step, "step")?;
        let guid = step
            .get("Guid")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("step without Guid"))?
            .to_string();

        let mut behaviors = take_array(&mut step, "Behaviors")?;
        for behavior in &mut behaviors {
            let behavior = as_object_mut(behavior, "behavior")?;
            let nested = take_array(behavior, "Chapters")?
                .into_iter()
                .map(|c| lift_steps(c, out))
                .collect::<Result<Vec<_>, _>>()?;
            behavior.insert("Chapters".to_string(), Value::Array(nested));
        }
        step.insert("Behaviors".to_string(), Value::Array(behaviors));

        references.push(reference_str(guid));
        out.push(Value::Object(step));
    }
    chapter.insert("Steps".to_string(), Value::Array(references));
    Ok(Value::Object(chapter))
}

// =============================================================================
// V3 -> V4: lift nested chapters into SubChapters
// =============================================================================

fn v3_to_v4(mut document: Value) -> Result<Value, StepwiseError> {
    let root = object_mut(&mut document, "document")?;
    let mut sub_chapters = Vec::new();
    if let Some(steps) = root.get_mut("Steps") {
        let steps = steps
            .as_array_mut()
            .ok_or_else(|| malformed("Steps must be an array"))?;
        for step in steps {
            let step = as_object_mut(step, "step")?;
            let Some(behaviors) = step.get_mut("Behaviors") else {
                continue;
            };
            let behaviors = behaviors
                .as_array_mut()
                .ok_or_else(|| malformed("Behaviors must be an array"))?;
            for behavior in behaviors {
                let behavior = as_object_mut(behavior, "behavior")?;
                let mut references = Vec::new();
                for chapter in take_array(behavior, "Chapters")? {
                    let guid = chapter
                        .get("Guid")
                        .and_then(Value::as_str)
                        .ok_or_else(|| malformed("chapter without Guid"))?
                        .to_string();
                    references.push(reference_str(guid));
                    sub_chapters.push(chapter);
                }
                behavior.insert("Chapters".to_string(), Value::Array(references));
            }
        }
    }
    root.insert("SubChapters".to_string(), Value::Array(sub_chapters));
    Ok(document)
}

// =============================================================================
// JSON HELPERS
// =============================================================================

fn malformed(message: &str) -> StepwiseError {
    StepwiseError::DeserializationError(format!("malformed legacy document: {}", message))
}

fn reference(guid: Guid) -> Value {
    reference_str(guid.to_string())
}

fn reference_str(guid: String) -> Value {
    let mut map = Map::new();
    map.insert("guid".to_string(), Value::String(guid));
    Value::Object(map)
}

fn into_object(value: Value, what: &str) -> Result<Map<String, Value>, StepwiseError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(malformed(&format!("{} must be an object", what))),
    }
}

fn as_object_mut<'a>(value: &'a mut Value, what: &str) -> Result<&'a mut Map<String, Value>, StepwiseError> {
    value
        .as_object_mut()
        .ok_or_else(|| malformed(&format!("{} must be an object", what)))
}

fn object_mut<'a>(value: &'a mut Value, what: &str) -> Result<&'a mut Map<String, Value>, StepwiseError> {
    as_object_mut(value, what)
}

fn process_mut(document: &mut Value) -> Result<&mut Map<String, Value>, StepwiseError> {
    let process = object_mut(document, "document")?
        .get_mut("Process")
        .ok_or_else(|| malformed("missing Process"))?;
    as_object_mut(process, "Process")
}

/// Remove an array field; a missing or null field is an empty array.
fn take_array(map: &mut Map<String, Value>, key: &str) -> Result<Vec<Value>, StepwiseError> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(malformed(&format!("{} must be an array", key))),
    }
}
