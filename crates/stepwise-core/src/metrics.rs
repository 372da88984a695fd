//! # Process Metrics
//!
//! Counts extracted from a process graph for `inspect`-style reporting.
//! Integer only.

use crate::model::{Chapter, Process, walk_chapters};
use crate::types::Guid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Size and shape of a process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    /// Every chapter, nested ones included.
    pub chapter_count: usize,
    /// Chapters owned by behaviors.
    pub nested_chapter_count: usize,
    pub step_count: usize,
    pub behavior_count: usize,
    pub transition_count: usize,
    pub condition_count: usize,
    /// Deepest chapter nesting (0 when only root chapters exist).
    pub max_depth: usize,
    /// Transitions that close a loop back to a step on the current path.
    pub back_edge_count: usize,
}

impl ProcessMetrics {
    /// Create new metrics with all zeros.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compute metrics from a process.
    #[must_use]
    pub fn from_process(process: &Process) -> Self {
        let mut metrics = Self::empty();
        walk_chapters(process, |chapter, depth| {
            metrics.chapter_count += 1;
            if depth > 0 {
                metrics.nested_chapter_count += 1;
            }
            metrics.max_depth = metrics.max_depth.max(depth);

            for step in chapter.data().steps() {
                metrics.step_count += 1;
                metrics.behavior_count += step.data().behaviors().len();
                metrics.transition_count += step.data().transitions().len();
                metrics.condition_count += step
                    .data()
                    .transitions()
                    .iter()
                    .map(|t| t.data().conditions().len())
                    .sum::<usize>();
            }
            metrics.back_edge_count += count_back_edges(chapter);
        });
        metrics
    }

    /// True when the step graph contains at least one loop.
    #[must_use]
    pub fn has_loops(&self) -> bool {
        self.back_edge_count > 0
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

/// Depth-first walk from the first step counting edges into the current
/// path. Explicit stack, so long chains do not grow the call stack.
fn count_back_edges(chapter: &Chapter) -> usize {
    let data = chapter.data();
    let Some(first) = data.first_step() else {
        return 0;
    };
    let targets: BTreeMap<Guid, Vec<Guid>> = data
        .steps()
        .iter()
        .map(|s| {
            let next = s
                .data()
                .transitions()
                .iter()
                .filter_map(|t| t.data().target())
                .collect();
            (s.data().id(), next)
        })
        .collect();
    if !targets.contains_key(&first) {
        return 0;
    }

    let mut marks: BTreeMap<Guid, Mark> = BTreeMap::new();
    let mut stack: Vec<(Guid, usize)> = vec![(first, 0)];
    marks.insert(first, Mark::OnPath);
    let mut back_edges = 0;

    while let Some((id, edge)) = stack.last().copied() {
        let next = targets.get(&id).and_then(|t| t.get(edge)).copied();
        let Some(next) = next else {
            marks.insert(id, Mark::Done);
            stack.pop();
            continue;
        };
        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }
        match marks.get(&next) {
            Some(Mark::OnPath) => back_edges += 1,
            Some(Mark::Done) => {}
            None if targets.contains_key(&next) => {
                marks.insert(next, Mark::OnPath);
                stack.push((next, 0));
            }
            None => {}
        }
    }
    back_edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{Delay, ExecuteChapters, Timeout};
    use crate::model::{
        Behavior, BehaviorData, ChapterData, Condition, ConditionData, ProcessData, Step,
        StepData, Transition, TransitionData,
    };

    #[test]
    fn empty_process_has_zero_metrics() {
        let process = Process::new("p", ProcessData::new());
        assert_eq!(ProcessMetrics::from_process(&process), ProcessMetrics::empty());
    }

    #[test]
    fn counts_nested_structure_and_loops() {
        let a = Guid::from_u128(1);
        let b = Guid::from_u128(2);
        let nested = Chapter::new(
            "nested",
            ChapterData::new(Guid::from_u128(20))
                .with_step(Step::new("inner", StepData::new(Guid::from_u128(21)))),
        );
        let chapter = ChapterData::new(Guid::from_u128(10))
            .with_step(Step::new(
                "A",
                StepData::new(a)
                    .with_behavior(Behavior::new("wait", BehaviorData::new(Delay::new(5))))
                    .with_behavior(Behavior::new(
                        "sub",
                        BehaviorData::new(ExecuteChapters::new()).with_chapters(vec![nested]),
                    ))
                    .with_transition(Transition::new(
                        "next",
                        TransitionData::to(b).with_condition(Condition::new(
                            "t",
                            ConditionData::new(Timeout::new(5)),
                        )),
                    )),
            ))
            .with_step(Step::new(
                "B",
                StepData::new(b)
                    .with_transition(Transition::new("again", TransitionData::to(a)))
                    .with_transition(Transition::new("self", TransitionData::to(b))),
            ));
        let process = Process::new("p", ProcessData::new().with_chapter(Chapter::new("main", chapter)));

        let metrics = ProcessMetrics::from_process(&process);
        assert_eq!(metrics.chapter_count, 2);
        assert_eq!(metrics.nested_chapter_count, 1);
        assert_eq!(metrics.max_depth, 1);
        assert_eq!(metrics.step_count, 3);
        assert_eq!(metrics.behavior_count, 2);
        assert_eq!(metrics.transition_count, 3);
        assert_eq!(metrics.condition_count, 1);
        assert_eq!(metrics.back_edge_count, 2);
        assert!(metrics.has_loops());
    }
}
