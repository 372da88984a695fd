//! Chapters: a step table plus a first step, traversed by following
//! completed transitions.
//!
//! The step table is the target space of every transition inside the
//! chapter. Transitions hold guids, not steps, so a transition back to an
//! earlier step is an ordinary table lookup.

use super::Step;
use crate::lifecycle::{
    Context, Entity, EntityData, Poll, Stage, StageProcess, abort_all, all_inactive, empty,
    update_all,
};
use crate::types::{EntityKind, Guid, StepwiseError};
use std::collections::BTreeSet;

/// A chapter entity.
pub type Chapter = Entity<ChapterData>;

/// Data of a chapter.
#[derive(Debug)]
pub struct ChapterData {
    id: Guid,
    steps: Vec<Step>,
    first_step: Option<Guid>,
}

impl ChapterData {
    #[must_use]
    pub fn new(id: Guid) -> Self {
        Self {
            id,
            steps: Vec::new(),
            first_step: None,
        }
    }

    /// Add a step. The first step added becomes the entry step.
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.add_step(step);
        self
    }

    /// Add a step, returning its guid. The first step added becomes the
    /// entry step.
    pub fn add_step(&mut self, step: Step) -> Guid {
        let id = step.data().id();
        if self.first_step.is_none() {
            self.first_step = Some(id);
        }
        self.steps.push(step);
        id
    }

    #[must_use]
    pub fn id(&self) -> Guid {
        self.id
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut Vec<Step> {
        &mut self.steps
    }

    #[must_use]
    pub fn first_step(&self) -> Option<Guid> {
        self.first_step
    }

    pub fn set_first_step(&mut self, first_step: Option<Guid>) {
        self.first_step = first_step;
    }

    /// Position of a step in the table.
    #[must_use]
    pub fn step_index(&self, id: Guid) -> Option<usize> {
        self.steps.iter().position(|s| s.data().id() == id)
    }

    #[must_use]
    pub fn step(&self, id: Guid) -> Option<&Step> {
        self.steps.iter().find(|s| s.data().id() == id)
    }

    /// The running step, if any.
    #[must_use]
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.stage() != Stage::Inactive)
    }

    pub fn current_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.stage() != Stage::Inactive)
    }

    fn resolve(&self, target: Option<Guid>) -> Result<Option<usize>, StepwiseError> {
        match target {
            None => Ok(None),
            Some(id) => self
                .step_index(id)
                .map(Some)
                .ok_or_else(|| StepwiseError::InvalidGraph(format!(
                    "chapter {} has no step {}",
                    self.id, id
                ))),
        }
    }
}

impl EntityData for ChapterData {
    const KIND: EntityKind = EntityKind::Chapter;

    fn stage_process(&self, stage: Stage) -> Box<dyn StageProcess<Self>> {
        match stage {
            Stage::Active => Box::new(Traversal::Idle),
            Stage::Deactivating => Box::new(Leaving),
            Stage::Inactive | Stage::Activating => empty(),
        }
    }

    fn configure(&mut self, ctx: &mut Context<'_>) -> Result<bool, StepwiseError> {
        for step in &mut self.steps {
            step.configure(ctx)?;
        }
        Ok(false)
    }
}

/// Active stage of a chapter: walks the step graph, one phase change per
/// tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Traversal {
    Idle,
    Running(usize),
    Leaving(usize),
    Finished,
}

impl Traversal {
    fn enter(
        data: &mut ChapterData,
        next: Option<usize>,
        ctx: &mut Context<'_>,
    ) -> Result<Traversal, StepwiseError> {
        let Some(index) = next else {
            tracing::debug!(chapter = %data.id, "chapter finished");
            return Ok(Traversal::Finished);
        };
        let step = &mut data.steps[index];
        tracing::debug!(chapter = %data.id, step = step.name(), "entering step");
        step.activate(ctx)?;
        Ok(Traversal::Running(index))
    }

    fn follow(data: &ChapterData, index: usize) -> Result<Option<usize>, StepwiseError> {
        data.resolve(data.steps[index].data().next_step())
    }
}

impl StageProcess<ChapterData> for Traversal {
    fn update(&mut self, data: &mut ChapterData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        *self = match *self {
            Traversal::Idle => {
                let first = data.resolve(data.first_step)?;
                Traversal::enter(data, first, ctx)?
            }
            Traversal::Running(index) => {
                let step = &mut data.steps[index];
                step.update(ctx)?;
                if step.stage() == Stage::Active && step.is_stage_finished() {
                    tracing::debug!(step = step.name(), "leaving step");
                    step.deactivate(ctx)?;
                    Traversal::Leaving(index)
                } else {
                    Traversal::Running(index)
                }
            }
            Traversal::Leaving(index) => {
                data.steps[index].update(ctx)?;
                if data.steps[index].stage() == Stage::Inactive {
                    let next = Traversal::follow(data, index)?;
                    Traversal::enter(data, next, ctx)?
                } else {
                    Traversal::Leaving(index)
                }
            }
            Traversal::Finished => Traversal::Finished,
        };
        Ok(Poll::ready(*self == Traversal::Finished))
    }

    /// Walk the rest of the path synchronously. A step reached twice in the
    /// same pass ends the walk.
    fn fast_forward(&mut self, data: &mut ChapterData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        let mut visited = BTreeSet::new();
        loop {
            *self = match *self {
                Traversal::Idle => {
                    let first = data.resolve(data.first_step)?;
                    Traversal::enter(data, first, ctx)?
                }
                Traversal::Running(index) | Traversal::Leaving(index) => {
                    visited.insert(index);
                    data.steps[index].fast_forward_to_inactive(ctx)?;
                    match Traversal::follow(data, index)? {
                        Some(next) if visited.contains(&next) => {
                            tracing::debug!(
                                chapter = %data.id,
                                step = data.steps[next].name(),
                                "fast-forward reached a visited step, stopping"
                            );
                            Traversal::Finished
                        }
                        next => Traversal::enter(data, next, ctx)?,
                    }
                }
                Traversal::Finished => return Ok(()),
            };
        }
    }
}

/// Deactivating stage of a chapter: stop the running step.
struct Leaving;

impl StageProcess<ChapterData> for Leaving {
    fn start(&mut self, data: &mut ChapterData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        abort_all(&mut data.steps, ctx)
    }

    fn update(&mut self, data: &mut ChapterData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        update_all(&mut data.steps, ctx)?;
        Ok(all_inactive(&data.steps))
    }

    fn fast_forward(&mut self, data: &mut ChapterData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for step in &mut data.steps {
            step.fast_forward_to_inactive(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Journal, Signals};
    use crate::mode::Mode;
    use crate::model::{StepData, Transition, TransitionData};
    use std::time::Duration;

    fn linear(names: &[&str]) -> Chapter {
        let mut data = ChapterData::new(Guid::from_u128(100));
        for (i, name) in names.iter().enumerate() {
            let mut step = StepData::new(Guid::from_u128(i as u128 + 1));
            if i + 1 < names.len() {
                step = step.with_transition(Transition::new(
                    "next",
                    TransitionData::to(Guid::from_u128(i as u128 + 2)),
                ));
            }
            data.add_step(Step::new(*name, step));
        }
        Chapter::new("chapter", data)
    }

    #[test]
    fn traversal_visits_each_step_once() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut chapter = linear(&["S1", "S2", "S3"]);

        {
            let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
            chapter.activate(&mut ctx).expect("activate");
            for _ in 0..100 {
                if chapter.is_stage_finished() {
                    break;
                }
                chapter.update(&mut ctx).expect("update");
            }
        }
        assert_eq!(chapter.stage(), Stage::Active);
        assert!(chapter.is_stage_finished());
        assert_eq!(
            journal.activation_order(EntityKind::Step),
            vec!["S1", "S2", "S3"]
        );
    }

    #[test]
    fn fast_forward_cuts_cycles() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut data = ChapterData::new(Guid::from_u128(100));
        let a = Guid::from_u128(1);
        let b = Guid::from_u128(2);
        data.add_step(Step::new(
            "A",
            StepData::new(a).with_transition(Transition::new("to-b", TransitionData::to(b))),
        ));
        data.add_step(Step::new(
            "B",
            StepData::new(b).with_transition(Transition::new("to-a", TransitionData::to(a))),
        ));
        let mut chapter = Chapter::new("loop", data);

        {
            let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
            chapter.activate(&mut ctx).expect("activate");
            chapter.mark_to_fast_forward(&mut ctx).expect("ff");
        }
        assert_eq!(chapter.stage(), Stage::Active);
        assert!(chapter.is_stage_finished());
        assert!(chapter.data().current_step().is_none());
        assert_eq!(journal.activation_order(EntityKind::Step), vec!["A", "B"]);
    }

    #[test]
    fn dangling_first_step_is_an_error() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
        let mut data = ChapterData::new(Guid::from_u128(100));
        data.set_first_step(Some(Guid::from_u128(77)));
        let mut chapter = Chapter::new("broken", data);

        chapter.activate(&mut ctx).expect("activate");
        chapter.update(&mut ctx).expect("activating");
        assert!(matches!(
            chapter.update(&mut ctx),
            Err(StepwiseError::InvalidGraph(_))
        ));
    }

    #[test]
    fn deactivation_aborts_running_step() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
        let mut chapter = linear(&["S1", "S2"]);

        chapter.activate(&mut ctx).expect("activate");
        chapter.update(&mut ctx).expect("update");
        chapter.update(&mut ctx).expect("update");
        assert!(chapter.data().current_step().is_some());

        chapter.deactivate(&mut ctx).expect("deactivate");
        for _ in 0..10 {
            chapter.update(&mut ctx).expect("update");
        }
        assert_eq!(chapter.stage(), Stage::Inactive);
        assert!(chapter.data().current_step().is_none());
    }
}
