//! # Entity and LifeCycle
//!
//! An [`Entity`] is a named node of the process graph. Its behavior is
//! defined entirely by its data record (`D: EntityData`), which hands out one
//! [`StageProcess`] per stage. The embedded [`LifeCycle`] owns the current
//! stage, the live stage process and the fast-forward marks.
//!
//! ## Fast-forward marks
//!
//! - `mark_to_fast_forward` completes the current stage synchronously and
//!   keeps the mark until the entity is back to `Inactive`, so every later
//!   stage of this pass completes synchronously too.
//! - `mark_to_fast_forward_stage(s)` completes only stage `s`, now if it is
//!   the current stage, or on entry if it comes later in the cycle.

use super::{Context, EmptyProcess, Poll, Stage, StageChange, StageProcess};
use crate::types::{EntityKind, Metadata, StepwiseError};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// ENTITY DATA
// =============================================================================

/// Data record that defines how an entity behaves.
pub trait EntityData: Sized + 'static {
    /// Kind reported in journals and errors.
    const KIND: EntityKind;

    /// Create the process for `stage`.
    ///
    /// Called on every stage entry, including `Inactive`, whose process is
    /// never driven.
    fn stage_process(&self, stage: Stage) -> Box<dyn StageProcess<Self>>;

    /// Re-evaluate skip status under the context's mode and propagate the
    /// reconfiguration to children.
    ///
    /// Returns `true` if this entity itself is skippable.
    fn configure(&mut self, _ctx: &mut Context<'_>) -> Result<bool, StepwiseError> {
        Ok(false)
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Mutable lifecycle state of one entity.
pub struct LifeCycle<D> {
    stage: Stage,
    process: Option<Box<dyn StageProcess<D>>>,
    process_finished: bool,
    fast_forward: bool,
    deferred: BTreeSet<Stage>,
}

impl<D> LifeCycle<D> {
    fn new() -> Self {
        Self {
            stage: Stage::Inactive,
            process: None,
            process_finished: false,
            fast_forward: false,
            deferred: BTreeSet::new(),
        }
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Check if the current stage's process has completed.
    #[must_use]
    pub fn is_stage_finished(&self) -> bool {
        self.process_finished
    }

    /// Check if the persistent fast-forward mark is set.
    #[must_use]
    pub fn is_marked_to_fast_forward(&self) -> bool {
        self.fast_forward
    }

    /// Check if `stage` will be fast-forwarded on entry.
    #[must_use]
    pub fn is_stage_marked(&self, stage: Stage) -> bool {
        self.deferred.contains(&stage)
    }
}

impl<D> fmt::Debug for LifeCycle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifeCycle")
            .field("stage", &self.stage)
            .field("process_finished", &self.process_finished)
            .field("fast_forward", &self.fast_forward)
            .field("deferred", &self.deferred)
            .finish()
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// A named, executable node of the process graph.
pub struct Entity<D: EntityData> {
    name: String,
    metadata: Metadata,
    data: D,
    lifecycle: LifeCycle<D>,
    skipped: bool,
}

impl<D: EntityData> Entity<D> {
    /// Create an inactive entity.
    pub fn new(name: impl Into<String>, data: D) -> Self {
        Self {
            name: name.into(),
            metadata: Metadata::new(),
            data,
            lifecycle: LifeCycle::new(),
            skipped: false,
        }
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    #[must_use]
    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    #[must_use]
    pub fn lifecycle(&self) -> &LifeCycle<D> {
        &self.lifecycle
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.lifecycle.stage
    }

    /// Check if the current stage's process has completed.
    #[must_use]
    pub fn is_stage_finished(&self) -> bool {
        self.lifecycle.process_finished
    }

    /// Check if the current mode skips this entity.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Start the lifecycle: `Inactive -> Activating`.
    ///
    /// Skip status is re-evaluated right after entering `Activating`, so a
    /// skipped entity still runs its stage hooks before fast-forwarding.
    pub fn activate(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        if self.lifecycle.stage != Stage::Inactive {
            return Err(self.invalid_state("activate"));
        }
        self.skipped = false;
        self.enter(Stage::Activating, ctx)?;
        self.configure(ctx)
    }

    /// Drive the current stage process by one tick.
    ///
    /// No-op while `Inactive` or once the current stage process completed.
    pub fn update(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        if self.lifecycle.stage == Stage::Inactive || self.lifecycle.process_finished {
            return Ok(());
        }
        let Some(process) = self.lifecycle.process.as_mut() else {
            return Ok(());
        };
        if process.update(&mut self.data, ctx)?.is_done() {
            self.lifecycle.process_finished = true;
            self.advance(ctx)?;
        }
        Ok(())
    }

    /// End the lifecycle: `Active -> Deactivating`.
    ///
    /// Fails without touching the stage unless the entity is `Active`.
    pub fn deactivate(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        if self.lifecycle.stage != Stage::Active {
            return Err(self.invalid_state("deactivate"));
        }
        if let Some(mut process) = self.lifecycle.process.take() {
            process.end(&mut self.data, ctx)?;
        }
        self.enter(Stage::Deactivating, ctx)
    }

    /// Complete the current stage synchronously and keep completing stages
    /// synchronously until the entity is `Inactive` again.
    ///
    /// No-op while `Inactive`, and while `Active` once the active process
    /// already completed.
    pub fn mark_to_fast_forward(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        match self.lifecycle.stage {
            Stage::Inactive => Ok(()),
            Stage::Active if self.lifecycle.process_finished => Ok(()),
            _ => {
                self.lifecycle.fast_forward = true;
                self.complete_stage(ctx)
            }
        }
    }

    /// Fast-forward `stage` only: now if it is current, on entry if it comes
    /// later in the cycle. Stages already left are ignored.
    pub fn mark_to_fast_forward_stage(
        &mut self,
        stage: Stage,
        ctx: &mut Context<'_>,
    ) -> Result<(), StepwiseError> {
        let current = self.lifecycle.stage;
        if stage == current && current != Stage::Inactive {
            if current == Stage::Active && self.lifecycle.process_finished {
                return Ok(());
            }
            return self.complete_stage(ctx);
        }
        if stage != Stage::Inactive && (current == Stage::Inactive || stage > current) {
            self.lifecycle.deferred.insert(stage);
        }
        Ok(())
    }

    /// Re-evaluate skip status under the context's mode.
    ///
    /// A running entity that just became skippable is fast-forwarded.
    pub fn configure(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        let skippable = self.data.configure(ctx)?;
        let newly_skipped = skippable && !self.skipped;
        self.skipped = skippable;
        if newly_skipped && self.lifecycle.stage != Stage::Inactive {
            let kind = D::KIND;
            tracing::debug!(%kind, name = %self.name, mode = ctx.mode.name(), "skipped by mode");
            self.mark_to_fast_forward(ctx)?;
        }
        Ok(())
    }

    /// Drive a running entity towards `Inactive`.
    ///
    /// `Activating` completes synchronously and then deactivates, `Active`
    /// deactivates, any other stage is left alone.
    pub fn abort(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        match self.lifecycle.stage {
            Stage::Activating => {
                self.complete_stage(ctx)?;
                if self.lifecycle.stage == Stage::Active {
                    self.deactivate(ctx)?;
                }
                Ok(())
            }
            Stage::Active => self.deactivate(ctx),
            Stage::Inactive | Stage::Deactivating => Ok(()),
        }
    }

    /// Run whatever remains of this pass synchronously, ending `Inactive`.
    pub fn fast_forward_to_inactive(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        self.mark_to_fast_forward(ctx)?;
        if self.lifecycle.stage == Stage::Active {
            self.deactivate(ctx)?;
        }
        if self.lifecycle.stage == Stage::Deactivating {
            self.mark_to_fast_forward(ctx)?;
        }
        Ok(())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn enter(&mut self, stage: Stage, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        let from = self.lifecycle.stage;
        debug_assert!(from.can_transition_to(stage));
        self.lifecycle.stage = stage;
        self.lifecycle.process_finished = false;
        let kind = D::KIND;
        tracing::trace!(%kind, name = %self.name, %from, to = %stage, "stage changed");
        ctx.journal.record(StageChange {
            kind,
            name: self.name.clone(),
            from,
            to: stage,
        });

        if stage == Stage::Inactive {
            self.lifecycle.process = None;
            self.lifecycle.fast_forward = false;
            self.lifecycle.deferred.clear();
            self.skipped = false;
            return Ok(());
        }

        let mut process = self.data.stage_process(stage);
        process.start(&mut self.data, ctx)?;
        self.lifecycle.process = Some(process);

        let deferred = self.lifecycle.deferred.remove(&stage);
        if self.lifecycle.fast_forward || deferred {
            self.complete_stage(ctx)?;
        }
        Ok(())
    }

    fn complete_stage(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        if !self.lifecycle.process_finished {
            if let Some(process) = self.lifecycle.process.as_mut() {
                process.fast_forward(&mut self.data, ctx)?;
            }
            self.lifecycle.process_finished = true;
        }
        self.advance(ctx)
    }

    fn advance(&mut self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        let next = match self.lifecycle.stage {
            Stage::Activating => Stage::Active,
            Stage::Deactivating => Stage::Inactive,
            Stage::Inactive | Stage::Active => return Ok(()),
        };
        if let Some(mut process) = self.lifecycle.process.take() {
            process.end(&mut self.data, ctx)?;
        }
        self.enter(next, ctx)
    }

    fn invalid_state(&self, operation: &'static str) -> StepwiseError {
        StepwiseError::invalid_state(D::KIND, &self.name, operation, self.lifecycle.stage)
    }
}

impl<D: EntityData + fmt::Debug> fmt::Debug for Entity<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("kind", &D::KIND)
            .field("name", &self.name)
            .field("stage", &self.lifecycle.stage)
            .field("skipped", &self.skipped)
            .field("data", &self.data)
            .finish()
    }
}

/// Stage process used for stages an entity does not customize.
pub(crate) fn empty<D>() -> Box<dyn StageProcess<D>> {
    Box::new(EmptyProcess)
}

/// Drive every running entity towards `Inactive`.
pub(crate) fn abort_all<D: EntityData>(
    entities: &mut [Entity<D>],
    ctx: &mut Context<'_>,
) -> Result<(), StepwiseError> {
    for entity in entities.iter_mut() {
        entity.abort(ctx)?;
    }
    Ok(())
}

/// Update every entity once, in declaration order.
pub(crate) fn update_all<D: EntityData>(
    entities: &mut [Entity<D>],
    ctx: &mut Context<'_>,
) -> Result<(), StepwiseError> {
    for entity in entities.iter_mut() {
        entity.update(ctx)?;
    }
    Ok(())
}

/// Wait-for-inactive process shared by container deactivation.
pub(crate) fn all_inactive<D: EntityData>(entities: &[Entity<D>]) -> Poll {
    Poll::ready(entities.iter().all(|e| e.stage() == Stage::Inactive))
}

// =============================================================================
// TESTS
// =============================================================================
