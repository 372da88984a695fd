//! # Graph Serializer
//!
//! Converts a live process into a flat [`ProcessDocument`] and back.
//!
//! ## Flatten
//!
//! Walks the containment tree only (process, chapters, steps, behaviors,
//! nested chapters). Transition targets are already guids, so the walk
//! never follows a transition and a cyclic step graph costs nothing
//! special.
//!
//! ## Resolve
//!
//! Indexes the flat step and sub-chapter lists by guid, then rebuilds the
//! tree, claiming each record exactly once:
//!
//! - a reference to a missing guid is [`StepwiseError::UnresolvedReference`]
//! - the same guid used twice is [`StepwiseError::DuplicateIdentifier`]
//! - a record claimed by two owners, or a transition aimed outside its
//!   chapter, is [`StepwiseError::InvalidGraph`]
//! - records claimed by nobody are dropped with a warning
//! - sub-chapters nested deeper than [`MAX_CHAPTER_DEPTH`] are
//!   [`StepwiseError::DeserializationError`]
//!
//! ## Determinism
//!
//! Records are emitted in containment order and metadata is key ordered,
//! so saving, loading and saving again yields identical bytes.

use super::legacy;
use super::wire::{
    BehaviorRecord, ChapterRecord, ConditionRecord, ProcessDocument, ProcessRecord, Ref,
    StepRecord, TransitionRecord,
};
use crate::model::{
    Behavior, BehaviorData, Chapter, ChapterData, Condition, ConditionData, Process, ProcessData,
    Step, StepData, Transition, TransitionData,
};
use crate::primitives::{
    MAX_CHAPTER_DEPTH, MAX_DOCUMENT_SIZE, MIN_SERIALIZER_VERSION, SERIALIZER_VERSION,
    SERIALIZER_VERSION_FIELD,
};
use crate::registry::KindRegistry;
use crate::types::{Guid, StepwiseError};
use crate::validation::{Severity, validate_process};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// FLATTEN
// =============================================================================

/// Flatten a process into a document.
///
/// Fails with [`StepwiseError::InvalidGraph`] if the process has
/// error-level validation issues (dangling targets, missing first steps,
/// nesting deeper than [`MAX_CHAPTER_DEPTH`]).
pub fn process_to_document(process: &Process) -> Result<ProcessDocument, StepwiseError> {
    if let Some(issue) = validate_process(process)
        .into_iter()
        .find(|i| i.severity == Severity::Error)
    {
        return Err(StepwiseError::InvalidGraph(issue.message));
    }

    let mut flattener = Flattener::default();
    let chapters = process
        .data()
        .chapters()
        .iter()
        .map(|c| flattener.chapter(c))
        .collect();

    let mut document = ProcessDocument::new(ProcessRecord {
        name: process.name().to_string(),
        metadata: process.metadata().clone(),
        chapters,
    });
    document.steps = flattener.steps;
    document.sub_chapters = flattener.sub_chapters;
    Ok(document)
}

/// Serialize a process to pretty-printed JSON.
pub fn process_to_string(process: &Process) -> Result<String, StepwiseError> {
    document_to_string(&process_to_document(process)?)
}

/// Serialize a document to pretty-printed JSON.
pub fn document_to_string(document: &ProcessDocument) -> Result<String, StepwiseError> {
    serde_json::to_string_pretty(document)
        .map_err(|e| StepwiseError::SerializationError(e.to_string()))
}

#[derive(Default)]
struct Flattener {
    steps: Vec<StepRecord>,
    sub_chapters: Vec<ChapterRecord>,
}

impl Flattener {
    fn chapter(&mut self, chapter: &Chapter) -> ChapterRecord {
        let data = chapter.data();
        for step in data.steps() {
            self.step(step);
        }
        ChapterRecord {
            guid: data.id(),
            name: chapter.name().to_string(),
            metadata: chapter.metadata().clone(),
            steps: data.steps().iter().map(|s| Ref::from(s.data().id())).collect(),
            first_step: data.first_step().map(Ref::from),
        }
    }

    fn step(&mut self, step: &Step) {
        let data = step.data();
        let index = self.steps.len();
        self.steps.push(StepRecord {
            guid: data.id(),
            name: step.name().to_string(),
            description: data.description().to_string(),
            metadata: step.metadata().clone(),
            behaviors: Vec::new(),
            transitions: data.transitions().iter().map(transition_record).collect(),
        });

        let behaviors = data
            .behaviors()
            .iter()
            .map(|b| self.behavior(b))
            .collect();
        self.steps[index].behaviors = behaviors;
    }

    fn behavior(&mut self, behavior: &Behavior) -> BehaviorRecord {
        let data = behavior.data();
        let chapters = data
            .chapters()
            .iter()
            .map(|c| {
                let record = self.chapter(c);
                let reference = Ref::from(record.guid);
                self.sub_chapters.push(record);
                reference
            })
            .collect();
        BehaviorRecord {
            type_name: data.kind().type_name().to_string(),
            name: behavior.name().to_string(),
            metadata: behavior.metadata().clone(),
            properties: data.kind().properties(),
            chapters,
        }
    }
}

fn transition_record(transition: &Transition) -> TransitionRecord {
    let data = transition.data();
    TransitionRecord {
        name: transition.name().to_string(),
        metadata: transition.metadata().clone(),
        conditions: data
            .conditions()
            .iter()
            .map(|c| ConditionRecord {
                type_name: c.data().kind().type_name().to_string(),
                name: c.name().to_string(),
                metadata: c.metadata().clone(),
                properties: c.data().kind().properties(),
            })
            .collect(),
        target_step: data.target().map(Ref::from),
    }
}

// =============================================================================
// PARSE
// =============================================================================

/// Read the serializer version of a raw document.
///
/// A missing version tag means the oldest format.
pub fn document_version(value: &Value) -> Result<u32, StepwiseError> {
    let Some(tag) = value.get(SERIALIZER_VERSION_FIELD) else {
        return Ok(MIN_SERIALIZER_VERSION);
    };
    let found = tag.as_u64().ok_or_else(|| {
        StepwiseError::DeserializationError(format!(
            "{} must be a non-negative integer, got {}",
            SERIALIZER_VERSION_FIELD, tag
        ))
    })?;
    if found < u64::from(MIN_SERIALIZER_VERSION) || found > u64::from(SERIALIZER_VERSION) {
        return Err(StepwiseError::UnsupportedVersion {
            found,
            supported: SERIALIZER_VERSION,
        });
    }
    Ok(found as u32)
}

/// Parse a document of any supported version, migrating it to the current
/// version.
///
/// Rejects input above [`MAX_DOCUMENT_SIZE`] before parsing.
pub fn document_from_str(text: &str) -> Result<ProcessDocument, StepwiseError> {
    if text.len() > MAX_DOCUMENT_SIZE {
        return Err(StepwiseError::DeserializationError(format!(
            "document too large: {} bytes (max {})",
            text.len(),
            MAX_DOCUMENT_SIZE
        )));
    }
    let value: Value = serde_json::from_str(text)
        .map_err(|e| StepwiseError::DeserializationError(e.to_string()))?;
    document_from_value(value)
}

/// Migrate and decode an already parsed document.
pub fn document_from_value(value: Value) -> Result<ProcessDocument, StepwiseError> {
    let version = document_version(&value)?;
    let current = if version < SERIALIZER_VERSION {
        tracing::info!(from = version, to = SERIALIZER_VERSION, "migrating legacy document");
        legacy::migrate(value, version)?
    } else {
        value
    };
    serde_json::from_value(current).map_err(|e| StepwiseError::DeserializationError(e.to_string()))
}

/// Parse and resolve a process of any supported version.
pub fn process_from_str(text: &str, registry: &KindRegistry) -> Result<Process, StepwiseError> {
    document_to_process(document_from_str(text)?, registry)
}

// =============================================================================
// RESOLVE
// =============================================================================

/// Rebuild a live process from a document.
pub fn document_to_process(
    document: ProcessDocument,
    registry: &KindRegistry,
) -> Result<Process, StepwiseError> {
    let mut resolver = Resolver::new(document.steps, document.sub_chapters, registry)?;

    let mut root_ids = BTreeSet::new();
    let mut data = ProcessData::new();
    for record in document.process.chapters {
        if resolver.sub_chapters.contains_key(&record.guid) || !root_ids.insert(record.guid) {
            return Err(duplicate("chapter", record.guid));
        }
        let chapter = resolver.chapter(record, 0)?;
        data = data.with_chapter(chapter);
    }
    resolver.report_orphans();

    Ok(Process::new(document.process.name, data).with_metadata(document.process.metadata))
}

struct Resolver<'r> {
    registry: &'r KindRegistry,
    steps: BTreeMap<Guid, StepRecord>,
    sub_chapters: BTreeMap<Guid, ChapterRecord>,
    claimed_steps: BTreeSet<Guid>,
    claimed_chapters: BTreeSet<Guid>,
}

impl<'r> Resolver<'r> {
    fn new(
        step_records: Vec<StepRecord>,
        chapter_records: Vec<ChapterRecord>,
        registry: &'r KindRegistry,
    ) -> Result<Self, StepwiseError> {
        let mut steps = BTreeMap::new();
        for record in step_records {
            let guid = record.guid;
            if steps.insert(guid, record).is_some() {
                return Err(duplicate("step", guid));
            }
        }
        let mut sub_chapters = BTreeMap::new();
        for record in chapter_records {
            let guid = record.guid;
            if sub_chapters.insert(guid, record).is_some() {
                return Err(duplicate("chapter", guid));
            }
        }
        Ok(Self {
            registry,
            steps,
            sub_chapters,
            claimed_steps: BTreeSet::new(),
            claimed_chapters: BTreeSet::new(),
        })
    }

    fn chapter(&mut self, record: ChapterRecord, depth: usize) -> Result<Chapter, StepwiseError> {
        if depth > MAX_CHAPTER_DEPTH {
            return Err(StepwiseError::DeserializationError(format!(
                "chapter '{}' is nested deeper than {} levels",
                record.name, MAX_CHAPTER_DEPTH
            )));
        }
        let members: BTreeSet<Guid> = record.steps.iter().map(|r| r.guid).collect();
        if members.len() != record.steps.len() {
            return Err(StepwiseError::InvalidGraph(format!(
                "chapter '{}' lists a step more than once",
                record.name
            )));
        }

        let mut data = ChapterData::new(record.guid);
        for reference in &record.steps {
            let step_record = self.claim_step(reference.guid)?;
            let step = self.step(step_record, &record.name, &members, depth)?;
            data.steps_mut().push(step);
        }

        let first_step = match record.first_step {
            Some(reference) if !members.contains(&reference.guid) => {
                return Err(self.outside_chapter(&record.name, reference.guid, "first step"));
            }
            other => other.map(|r| r.guid),
        };
        data.set_first_step(first_step);

        Ok(Chapter::new(record.name, data).with_metadata(record.metadata))
    }

    fn step(
        &mut self,
        record: StepRecord,
        chapter: &str,
        members: &BTreeSet<Guid>,
        depth: usize,
    ) -> Result<Step, StepwiseError> {
        let mut data = StepData::new(record.guid).with_description(record.description);

        for behavior in record.behaviors {
            let kind = self.registry.behavior(&behavior.type_name, behavior.properties)?;
            let mut chapters = Vec::with_capacity(behavior.chapters.len());
            for reference in behavior.chapters {
                let nested = self.claim_chapter(reference.guid)?;
                chapters.push(self.chapter(nested, depth + 1)?);
            }
            data = data.with_behavior(
                Behavior::new(behavior.name, BehaviorData::from_boxed(kind).with_chapters(chapters))
                    .with_metadata(behavior.metadata),
            );
        }

        for transition in record.transitions {
            let target = match transition.target_step {
                Some(reference) if !members.contains(&reference.guid) => {
                    return Err(self.outside_chapter(chapter, reference.guid, "transition target"));
                }
                other => other.map(|r| r.guid),
            };
            let mut transition_data = TransitionData::new(target);
            for condition in transition.conditions {
                let kind = self.registry.condition(&condition.type_name, condition.properties)?;
                transition_data = transition_data.with_condition(
                    Condition::new(condition.name, ConditionData::from_boxed(kind))
                        .with_metadata(condition.metadata),
                );
            }
            data = data.with_transition(
                Transition::new(transition.name, transition_data).with_metadata(transition.metadata),
            );
        }

        Ok(Step::new(record.name, data).with_metadata(record.metadata))
    }

    fn claim_step(&mut self, guid: Guid) -> Result<StepRecord, StepwiseError> {
        match self.steps.remove(&guid) {
            Some(record) => {
                self.claimed_steps.insert(guid);
                Ok(record)
            }
            None if self.claimed_steps.contains(&guid) => Err(StepwiseError::InvalidGraph(
                format!("step {} is owned by more than one chapter", guid),
            )),
            None => Err(unresolved("step", guid)),
        }
    }

    fn claim_chapter(&mut self, guid: Guid) -> Result<ChapterRecord, StepwiseError> {
        match self.sub_chapters.remove(&guid) {
            Some(record) => {
                self.claimed_chapters.insert(guid);
                Ok(record)
            }
            None if self.claimed_chapters.contains(&guid) => Err(StepwiseError::InvalidGraph(
                format!("chapter {} is owned by more than one behavior", guid),
            )),
            None => Err(unresolved("chapter", guid)),
        }
    }

    fn outside_chapter(&self, chapter: &str, guid: Guid, what: &str) -> StepwiseError {
        let known = self.steps.contains_key(&guid) || self.claimed_steps.contains(&guid);
        if known {
            StepwiseError::InvalidGraph(format!(
                "{} {} is not a step of chapter '{}'",
                what, guid, chapter
            ))
        } else {
            unresolved("step", guid)
        }
    }

    fn report_orphans(&self) {
        for (guid, record) in &self.steps {
            tracing::warn!(step = %guid, name = %record.name, "step is not owned by any chapter, dropping it");
        }
        for (guid, record) in &self.sub_chapters {
            tracing::warn!(chapter = %guid, name = %record.name, "chapter is not owned by any behavior, dropping it");
        }
    }
}

fn unresolved(kind: &'static str, guid: Guid) -> StepwiseError {
    StepwiseError::UnresolvedReference {
        kind,
        id: guid.to_string(),
    }
}

fn duplicate(kind: &'static str, guid: Guid) -> StepwiseError {
    StepwiseError::DuplicateIdentifier {
        kind,
        id: guid.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
