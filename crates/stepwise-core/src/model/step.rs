//! Steps: behaviors on entry and exit, transitions to successors.
//!
//! | Stage | Work |
//! |-------|------|
//! | Activating | reset conditions, activate behaviors, then transitions; done when every behavior is Active |
//! | Active | keep everything running; done once a transition completed |
//! | Deactivating | stop transitions and behaviors; done when all are Inactive |
//!
//! Transitions start activating as soon as every behavior has left
//! `Inactive`, so conditions run alongside behaviors that are still
//! activating.

use super::{Behavior, Transition};
use crate::lifecycle::{
    Context, Entity, EntityData, Poll, Stage, StageProcess, abort_all, all_inactive, empty,
    update_all,
};
use crate::types::{EntityKind, Guid, StepwiseError};

/// A step entity.
pub type Step = Entity<StepData>;

/// Data of a step.
#[derive(Debug)]
pub struct StepData {
    id: Guid,
    description: String,
    behaviors: Vec<Behavior>,
    transitions: Vec<Transition>,
    completed: Option<usize>,
}

impl StepData {
    #[must_use]
    pub fn new(id: Guid) -> Self {
        Self {
            id,
            description: String::new(),
            behaviors: Vec::new(),
            transitions: Vec::new(),
            completed: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behaviors.push(behavior);
        self
    }

    #[must_use]
    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    #[must_use]
    pub fn id(&self) -> Guid {
        self.id
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn behaviors(&self) -> &[Behavior] {
        &self.behaviors
    }

    pub fn behaviors_mut(&mut self) -> &mut Vec<Behavior> {
        &mut self.behaviors
    }

    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transitions_mut(&mut self) -> &mut Vec<Transition> {
        &mut self.transitions
    }

    /// Index of the transition that completed the last active stage.
    #[must_use]
    pub fn completed_transition(&self) -> Option<usize> {
        self.completed
    }

    /// Step to enter next, `None` when the chapter ends here.
    #[must_use]
    pub fn next_step(&self) -> Option<Guid> {
        self.completed
            .and_then(|i| self.transitions.get(i))
            .and_then(|t| t.data().target())
    }

    fn behaviors_started(&self) -> bool {
        self.behaviors.iter().all(|b| b.stage() != Stage::Inactive)
    }

    fn activate_transitions(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for transition in &mut self.transitions {
            if transition.stage() == Stage::Inactive {
                transition.activate(ctx)?;
            }
        }
        Ok(())
    }
}

impl EntityData for StepData {
    const KIND: EntityKind = EntityKind::Step;

    fn stage_process(&self, stage: Stage) -> Box<dyn StageProcess<Self>> {
        match stage {
            Stage::Activating => Box::new(Entering {
                transitions_started: false,
            }),
            Stage::Active => Box::new(Running),
            Stage::Deactivating => Box::new(Leaving),
            Stage::Inactive => empty(),
        }
    }

    fn configure(&mut self, ctx: &mut Context<'_>) -> Result<bool, StepwiseError> {
        for behavior in &mut self.behaviors {
            behavior.configure(ctx)?;
        }
        for transition in &mut self.transitions {
            transition.configure(ctx)?;
        }
        Ok(false)
    }
}

struct Entering {
    transitions_started: bool,
}

impl Entering {
    fn start_transitions(&mut self, data: &mut StepData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        if !self.transitions_started && data.behaviors_started() {
            data.activate_transitions(ctx)?;
            self.transitions_started = true;
        }
        Ok(())
    }
}

impl StageProcess<StepData> for Entering {
    fn start(&mut self, data: &mut StepData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        data.completed = None;
        for transition in &mut data.transitions {
            transition.data_mut().reset_conditions();
        }
        for behavior in &mut data.behaviors {
            behavior.activate(ctx)?;
        }
        self.start_transitions(data, ctx)
    }

    fn update(&mut self, data: &mut StepData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        update_all(&mut data.behaviors, ctx)?;
        self.start_transitions(data, ctx)?;
        if self.transitions_started {
            update_all(&mut data.transitions, ctx)?;
        }
        Ok(Poll::ready(
            data.behaviors.iter().all(|b| b.stage() == Stage::Active),
        ))
    }

    fn fast_forward(&mut self, data: &mut StepData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for behavior in &mut data.behaviors {
            behavior.mark_to_fast_forward(ctx)?;
        }
        self.start_transitions(data, ctx)
    }
}

struct Running;

impl StageProcess<StepData> for Running {
    fn update(&mut self, data: &mut StepData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        update_all(&mut data.behaviors, ctx)?;
        update_all(&mut data.transitions, ctx)?;
        if data.transitions.is_empty() {
            return Ok(Poll::Done);
        }
        data.completed = data.transitions.iter().position(|t| t.data().is_completed());
        Ok(Poll::ready(data.completed.is_some()))
    }

    fn fast_forward(&mut self, data: &mut StepData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        if data.completed.is_some() {
            return Ok(());
        }
        if !data.transitions.iter().any(|t| t.data().is_completed()) {
            if let Some(first) = data.transitions.first_mut() {
                if first.stage() == Stage::Inactive {
                    first.activate(ctx)?;
                }
                first.mark_to_fast_forward(ctx)?;
            }
        }
        data.completed = data.transitions.iter().position(|t| t.data().is_completed());
        Ok(())
    }
}

struct Leaving;

impl StageProcess<StepData> for Leaving {
    fn start(&mut self, data: &mut StepData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        abort_all(&mut data.transitions, ctx)?;
        abort_all(&mut data.behaviors, ctx)
    }

    fn update(&mut self, data: &mut StepData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        update_all(&mut data.transitions, ctx)?;
        update_all(&mut data.behaviors, ctx)?;
        Ok(Poll::ready(
            all_inactive(&data.transitions).is_done() && all_inactive(&data.behaviors).is_done(),
        ))
    }

    fn fast_forward(&mut self, data: &mut StepData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for transition in &mut data.transitions {
            transition.fast_forward_to_inactive(ctx)?;
        }
        for behavior in &mut data.behaviors {
            behavior.fast_forward_to_inactive(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{Delay, SignalCondition};
    use crate::lifecycle::{Journal, Signals};
    use crate::mode::Mode;
    use crate::model::{BehaviorData, Condition, ConditionData, TransitionData};
    use std::time::Duration;

    fn step_with_condition() -> Step {
        let target = Guid::from_u128(2);
        Step::new(
            "S1",
            StepData::new(Guid::from_u128(1))
                .with_behavior(Behavior::new("pause", BehaviorData::new(Delay::new(300))))
                .with_transition(Transition::new(
                    "go",
                    TransitionData::to(target).with_condition(Condition::new(
                        "button",
                        ConditionData::new(SignalCondition::new("pressed")),
                    )),
                )),
        )
    }

    #[test]
    fn conditions_start_while_behaviors_activate() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut ctx = Context::new(&mode, Duration::from_millis(100), &mut signals, &mut journal);
        let mut step = step_with_condition();

        step.activate(&mut ctx).expect("activate");
        let data = step.data();
        assert_eq!(data.behaviors()[0].stage(), Stage::Activating);
        assert_eq!(data.transitions()[0].stage(), Stage::Activating);
        assert_eq!(
            data.transitions()[0].data().conditions()[0].stage(),
            Stage::Activating
        );
    }

    #[test]
    fn completes_through_transition_and_reports_target() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut ctx = Context::new(&mode, Duration::from_millis(100), &mut signals, &mut journal);
        let mut step = step_with_condition();

        step.activate(&mut ctx).expect("activate");
        for _ in 0..5 {
            step.update(&mut ctx).expect("update");
        }
        assert_eq!(step.stage(), Stage::Active);
        assert!(!step.is_stage_finished());

        ctx.signals.raise("pressed");
        step.update(&mut ctx).expect("update");
        step.update(&mut ctx).expect("update");
        assert!(step.is_stage_finished());
        assert_eq!(step.data().next_step(), Some(Guid::from_u128(2)));
    }

    #[test]
    fn reactivation_resets_completed_conditions() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
        let mut step = step_with_condition();

        step.activate(&mut ctx).expect("activate");
        step.mark_to_fast_forward(&mut ctx).expect("ff");
        step.deactivate(&mut ctx).expect("deactivate");
        assert_eq!(step.stage(), Stage::Inactive);
        let condition = &step.data().transitions()[0].data().conditions()[0];
        assert!(condition.data().is_completed());

        ctx.signals.clear("pressed");
        step.activate(&mut ctx).expect("activate");
        let condition = &step.data().transitions()[0].data().conditions()[0];
        assert!(!condition.data().is_completed());
        assert!(step.data().next_step().is_none());
    }

    #[test]
    fn step_without_transitions_finishes_without_target() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
        let mut step = Step::new("end", StepData::new(Guid::from_u128(9)));

        step.activate(&mut ctx).expect("activate");
        step.update(&mut ctx).expect("update");
        step.update(&mut ctx).expect("update");
        assert_eq!(step.stage(), Stage::Active);
        assert!(step.is_stage_finished());
        assert!(step.data().next_step().is_none());
    }
}
