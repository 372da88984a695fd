//! # Leaf Kinds
//!
//! Behaviors and conditions are the leaves of the process graph. The engine
//! does not know what they do: a leaf kind implements [`BehaviorKind`] or
//! [`ConditionKind`], hands out stage processes, and is registered by type
//! name in the [`KindRegistry`](crate::registry::KindRegistry) so documents
//! can be loaded.
//!
//! ## Failure containment
//!
//! Every leaf stage process runs inside [`Contained`]. A
//! [`StepwiseError::LeafFailure`] raised by a leaf is logged and recorded on
//! the leaf, and the stage then stays pending forever. The process remains
//! steerable: a mode can skip the leaf, or it can be fast-forwarded. Every
//! other error propagates unchanged.

pub mod behaviors;
pub mod conditions;

use crate::lifecycle::{Context, Poll, StageProcess};
use crate::model::{BehaviorData, ConditionData};
use crate::types::StepwiseError;
use std::fmt;

pub use behaviors::{Delay, EmitSignal, ExecuteChapters};
pub use conditions::{SignalCondition, Timeout};

// =============================================================================
// KIND TRAITS
// =============================================================================

/// A behavior type: work performed when a step is entered or left.
pub trait BehaviorKind: fmt::Debug {
    /// Registered type name, stored in documents.
    fn type_name(&self) -> &str;

    /// Check if modes may skip this behavior.
    fn is_optional(&self) -> bool {
        false
    }

    /// Persisted configuration of this behavior.
    fn properties(&self) -> serde_json::Value;

    /// Work performed while the behavior is activating.
    fn activating_process(&self) -> Box<dyn StageProcess<BehaviorData>> {
        crate::lifecycle::empty()
    }

    /// Work performed while the behavior is deactivating.
    fn deactivating_process(&self) -> Box<dyn StageProcess<BehaviorData>> {
        crate::lifecycle::empty()
    }
}

/// A condition type: a predicate over the world that gates a transition.
pub trait ConditionKind: fmt::Debug {
    /// Registered type name, stored in documents.
    fn type_name(&self) -> &str;

    /// Check if modes may skip this condition.
    fn is_optional(&self) -> bool {
        false
    }

    /// Persisted configuration of this condition.
    fn properties(&self) -> serde_json::Value;

    /// Process that completes once the condition holds.
    fn active_process(&self) -> Box<dyn StageProcess<ConditionData>>;

    /// Make the world look as if the condition had been met naturally.
    ///
    /// Runs when the condition is fast-forwarded.
    fn autocomplete(&self, _ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        Ok(())
    }
}

// =============================================================================
// FAILURE CONTAINMENT
// =============================================================================

/// Leaf data able to record a contained failure.
pub trait LeafData {
    /// Type name used in logs.
    fn leaf_type(&self) -> &str;

    /// Record that a stage process failed.
    fn record_failure(&mut self, reason: String);
}

/// Stage process wrapper turning leaf failures into a stuck stage.
pub struct Contained<D> {
    inner: Box<dyn StageProcess<D>>,
    failed: bool,
}

impl<D: LeafData> Contained<D> {
    pub fn new(inner: Box<dyn StageProcess<D>>) -> Self {
        Self {
            inner,
            failed: false,
        }
    }

    pub fn boxed(inner: Box<dyn StageProcess<D>>) -> Box<dyn StageProcess<D>>
    where
        D: 'static,
    {
        Box::new(Self::new(inner))
    }

    fn contain(&mut self, data: &mut D, result: Result<(), StepwiseError>) -> Result<(), StepwiseError> {
        match result {
            Err(StepwiseError::LeafFailure(reason)) => {
                tracing::error!(leaf = data.leaf_type(), %reason, "leaf failed, it will not complete on its own");
                self.failed = true;
                data.record_failure(reason);
                Ok(())
            }
            other => other,
        }
    }
}

impl<D: LeafData> StageProcess<D> for Contained<D> {
    fn start(&mut self, data: &mut D, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        let result = self.inner.start(data, ctx);
        self.contain(data, result)
    }

    fn update(&mut self, data: &mut D, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        if self.failed {
            return Ok(Poll::Pending);
        }
        match self.inner.update(data, ctx) {
            Ok(poll) => Ok(poll),
            Err(e) => {
                self.contain(data, Err(e))?;
                Ok(Poll::Pending)
            }
        }
    }

    fn end(&mut self, data: &mut D, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        let result = self.inner.end(data, ctx);
        self.contain(data, result)
    }

    fn fast_forward(&mut self, data: &mut D, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        let result = self.inner.fast_forward(data, ctx);
        self.contain(data, result)
    }
}
