//! # Process Validation
//!
//! Structural checks over a process graph, run before saving and on
//! demand from the CLI.
//!
//! | Check | Severity |
//! |-------|----------|
//! | transition target not in the owning chapter | Error |
//! | chapter with steps but no first step, or a dangling first step | Error |
//! | step or chapter guid used twice | Error |
//! | chapter nested deeper than `MAX_CHAPTER_DEPTH` | Error |
//! | step not reachable from the first step | Warning |
//! | chapter without steps | Warning |
//!
//! Errors make a graph unsaveable. Warnings describe graphs that load and
//! run but contain dead parts.

use crate::model::{Chapter, Process, walk_chapters};
use crate::primitives::MAX_CHAPTER_DEPTH;
use crate::types::Guid;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How bad an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// One finding, attributed to the chapter it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub chapter: String,
    pub message: String,
}

impl ValidationIssue {
    fn error(chapter: &Chapter, message: String) -> Self {
        Self {
            severity: Severity::Error,
            chapter: chapter.name().to_string(),
            message,
        }
    }

    fn warning(chapter: &Chapter, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            chapter: chapter.name().to_string(),
            message,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.chapter, self.message)
    }
}

/// Check every chapter of a process, nested chapters included.
///
/// Issues are returned in chapter walk order.
#[must_use]
pub fn validate_process(process: &Process) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut step_ids = BTreeSet::new();
    let mut chapter_ids = BTreeSet::new();

    walk_chapters(process, |chapter, depth| {
        let data = chapter.data();
        // Reported once per branch, at the first level past the limit.
        if depth == MAX_CHAPTER_DEPTH + 1 {
            issues.push(ValidationIssue::error(
                chapter,
                format!("chapter is nested deeper than {} levels", MAX_CHAPTER_DEPTH),
            ));
        }
        if !chapter_ids.insert(data.id()) {
            issues.push(ValidationIssue::error(
                chapter,
                format!("chapter guid {} is used more than once", data.id()),
            ));
        }
        for step in data.steps() {
            if !step_ids.insert(step.data().id()) {
                issues.push(ValidationIssue::error(
                    chapter,
                    format!("step '{}' reuses guid {}", step.name(), step.data().id()),
                ));
            }
        }
        check_chapter(chapter, &mut issues);
    });

    issues
}

fn check_chapter(chapter: &Chapter, issues: &mut Vec<ValidationIssue>) {
    let data = chapter.data();
    if data.steps().is_empty() {
        issues.push(ValidationIssue::warning(chapter, "chapter has no steps".to_string()));
    }

    let names: BTreeMap<Guid, &str> = data
        .steps()
        .iter()
        .map(|s| (s.data().id(), s.name()))
        .collect();

    for step in data.steps() {
        for transition in step.data().transitions() {
            if let Some(target) = transition.data().target()
                && !names.contains_key(&target)
            {
                issues.push(ValidationIssue::error(
                    chapter,
                    format!(
                        "transition '{}' of step '{}' targets unknown step {}",
                        transition.name(),
                        step.name(),
                        target
                    ),
                ));
            }
        }
    }

    let first = match data.first_step() {
        None if data.steps().is_empty() => return,
        None => {
            issues.push(ValidationIssue::error(chapter, "chapter has no first step".to_string()));
            return;
        }
        Some(first) if !names.contains_key(&first) => {
            issues.push(ValidationIssue::error(
                chapter,
                format!("first step {} is not a step of this chapter", first),
            ));
            return;
        }
        Some(first) => first,
    };

    let reachable = reachable_from(chapter, first);
    for (id, name) in &names {
        if !reachable.contains(id) {
            issues.push(ValidationIssue::warning(
                chapter,
                format!("step '{}' is unreachable from the first step", name),
            ));
        }
    }
}

/// Steps reachable from `first` by following transition targets.
pub(crate) fn reachable_from(chapter: &Chapter, first: Guid) -> BTreeSet<Guid> {
    let data = chapter.data();
    let mut reachable = BTreeSet::new();
    let mut stack = vec![first];
    while let Some(id) = stack.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(step) = data.step(id) {
            stack.extend(step.data().transitions().iter().filter_map(|t| t.data().target()));
        }
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChapterData, ProcessData, Step, StepData, Transition, TransitionData};

    fn process_of(chapter: ChapterData) -> Process {
        Process::new("p", ProcessData::new().with_chapter(Chapter::new("main", chapter)))
    }

    #[test]
    fn clean_loop_has_no_issues() {
        let a = Guid::from_u128(1);
        let b = Guid::from_u128(2);
        let chapter = ChapterData::new(Guid::from_u128(10))
            .with_step(Step::new(
                "A",
                StepData::new(a).with_transition(Transition::new("next", TransitionData::to(b))),
            ))
            .with_step(Step::new(
                "B",
                StepData::new(b).with_transition(Transition::new("back", TransitionData::to(a))),
            ));
        assert!(validate_process(&process_of(chapter)).is_empty());
    }

    #[test]
    fn dangling_target_is_an_error() {
        let chapter = ChapterData::new(Guid::from_u128(10)).with_step(Step::new(
            "A",
            StepData::new(Guid::from_u128(1))
                .with_transition(Transition::new("lost", TransitionData::to(Guid::from_u128(9)))),
        ));
        let issues = validate_process(&process_of(chapter));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.contains("lost"));
    }

    #[test]
    fn unreachable_and_empty_are_warnings() {
        let chapter = ChapterData::new(Guid::from_u128(10))
            .with_step(Step::new("A", StepData::new(Guid::from_u128(1))))
            .with_step(Step::new("island", StepData::new(Guid::from_u128(2))));
        let issues = validate_process(&process_of(chapter));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.contains("island"));

        let issues = validate_process(&process_of(ChapterData::new(Guid::from_u128(11))));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn missing_first_step_is_an_error() {
        let mut chapter =
            ChapterData::new(Guid::from_u128(10)).with_step(Step::new("A", StepData::new(Guid::from_u128(1))));
        chapter.set_first_step(None);
        let issues = validate_process(&process_of(chapter));
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].to_string(), "error [main]: chapter has no first step");
    }
}
