//! Conditions: leaf predicates gating a transition.

use crate::kinds::{ConditionKind, Contained, LeafData};
use crate::lifecycle::{Context, Entity, EntityData, Poll, Stage, StageProcess, empty};
use crate::types::{EntityKind, StepwiseError};
use std::fmt;

/// A condition entity.
pub type Condition = Entity<ConditionData>;

/// Data of a condition: its kind plus the completion flag.
pub struct ConditionData {
    kind: Box<dyn ConditionKind>,
    is_completed: bool,
    failure: Option<String>,
}

impl ConditionData {
    pub fn new(kind: impl ConditionKind + 'static) -> Self {
        Self::from_boxed(Box::new(kind))
    }

    pub fn from_boxed(kind: Box<dyn ConditionKind>) -> Self {
        Self {
            kind,
            is_completed: false,
            failure: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &dyn ConditionKind {
        self.kind.as_ref()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn set_completed(&mut self, completed: bool) {
        self.is_completed = completed;
    }

    /// Reason of the last contained leaf failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

impl fmt::Debug for ConditionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionData")
            .field("type", &self.kind.type_name())
            .field("is_completed", &self.is_completed)
            .field("failure", &self.failure)
            .finish()
    }
}

impl LeafData for ConditionData {
    fn leaf_type(&self) -> &str {
        self.kind.type_name()
    }

    fn record_failure(&mut self, reason: String) {
        self.failure = Some(reason);
    }
}

impl EntityData for ConditionData {
    const KIND: EntityKind = EntityKind::Condition;

    fn stage_process(&self, stage: Stage) -> Box<dyn StageProcess<Self>> {
        match stage {
            Stage::Active => Contained::boxed(Box::new(Evaluate {
                inner: self.kind.active_process(),
            })),
            Stage::Inactive | Stage::Activating | Stage::Deactivating => empty(),
        }
    }

    fn configure(&mut self, ctx: &mut Context<'_>) -> Result<bool, StepwiseError> {
        Ok(ctx
            .mode
            .is_skipped(self.kind.type_name(), self.kind.is_optional()))
    }
}

/// Active stage of a condition: sets the completion flag when the kind's
/// process completes, autocompletes on fast-forward.
struct Evaluate {
    inner: Box<dyn StageProcess<ConditionData>>,
}

impl StageProcess<ConditionData> for Evaluate {
    fn start(&mut self, data: &mut ConditionData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        self.inner.start(data, ctx)
    }

    fn update(&mut self, data: &mut ConditionData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        let poll = self.inner.update(data, ctx)?;
        if poll.is_done() {
            data.is_completed = true;
        }
        Ok(poll)
    }

    fn end(&mut self, data: &mut ConditionData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        self.inner.end(data, ctx)
    }

    fn fast_forward(&mut self, data: &mut ConditionData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        data.is_completed = true;
        self.inner.fast_forward(data, ctx)?;
        data.kind.autocomplete(ctx)
    }
}
