//! Transitions: edges between steps, gated by conditions.
//!
//! The target is a weak reference (a step guid resolved in the owning
//! chapter's step table), which is what lets the graph contain cycles.

use super::Condition;
use crate::lifecycle::{
    Context, Entity, EntityData, Poll, Stage, StageProcess, abort_all, all_inactive, empty,
    update_all,
};
use crate::types::{EntityKind, Guid, StepwiseError};

/// A transition entity.
pub type Transition = Entity<TransitionData>;

/// Data of a transition.
#[derive(Debug, Default)]
pub struct TransitionData {
    conditions: Vec<Condition>,
    target: Option<Guid>,
    is_completed: bool,
}

impl TransitionData {
    /// Transition to `target`, or ending the chapter when `None`.
    #[must_use]
    pub fn new(target: Option<Guid>) -> Self {
        Self {
            conditions: Vec::new(),
            target,
            is_completed: false,
        }
    }

    /// Transition to `target`.
    #[must_use]
    pub fn to(target: Guid) -> Self {
        Self::new(Some(target))
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }

    #[must_use]
    pub fn target(&self) -> Option<Guid> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<Guid>) {
        self.target = target;
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Check if every condition is completed or skipped.
    #[must_use]
    pub fn conditions_met(&self) -> bool {
        self.conditions
            .iter()
            .all(|c| c.is_skipped() || c.data().is_completed())
    }

    /// Clear the completion flag of every condition.
    pub fn reset_conditions(&mut self) {
        for condition in &mut self.conditions {
            condition.data_mut().set_completed(false);
        }
    }
}

impl EntityData for TransitionData {
    const KIND: EntityKind = EntityKind::Transition;

    fn stage_process(&self, stage: Stage) -> Box<dyn StageProcess<Self>> {
        match stage {
            Stage::Activating => Box::new(Evaluating),
            Stage::Active => Box::new(Completed),
            Stage::Deactivating => Box::new(Leaving),
            Stage::Inactive => empty(),
        }
    }

    fn configure(&mut self, ctx: &mut Context<'_>) -> Result<bool, StepwiseError> {
        for condition in &mut self.conditions {
            condition.configure(ctx)?;
        }
        Ok(false)
    }
}

/// Activating: run the conditions until all are met.
struct Evaluating;

impl StageProcess<TransitionData> for Evaluating {
    fn start(&mut self, data: &mut TransitionData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        data.is_completed = false;
        for condition in &mut data.conditions {
            condition.activate(ctx)?;
        }
        Ok(())
    }

    fn update(&mut self, data: &mut TransitionData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        update_all(&mut data.conditions, ctx)?;
        Ok(Poll::ready(data.conditions_met()))
    }

    fn fast_forward(&mut self, data: &mut TransitionData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for condition in &mut data.conditions {
            condition.mark_to_fast_forward(ctx)?;
        }
        Ok(())
    }
}

/// Active: the transition is completed.
struct Completed;

impl StageProcess<TransitionData> for Completed {
    fn start(&mut self, data: &mut TransitionData, _ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        data.is_completed = true;
        Ok(())
    }

    fn update(&mut self, _data: &mut TransitionData, _ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        Ok(Poll::Done)
    }
}

/// Deactivating: stop the conditions and wait for them.
struct Leaving;

impl StageProcess<TransitionData> for Leaving {
    fn start(&mut self, data: &mut TransitionData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        abort_all(&mut data.conditions, ctx)
    }

    fn update(&mut self, data: &mut TransitionData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        update_all(&mut data.conditions, ctx)?;
        Ok(all_inactive(&data.conditions))
    }

    fn fast_forward(&mut self, data: &mut TransitionData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for condition in &mut data.conditions {
            condition.fast_forward_to_inactive(ctx)?;
        }
        Ok(())
    }
}
