//! Behaviors: leaf work performed on step entry and exit.
//!
//! A behavior may own nested chapters. They are part of the containment
//! tree, so the serializer and the mode reconfiguration walk into them.

use super::Chapter;
use crate::kinds::{BehaviorKind, Contained, LeafData};
use crate::lifecycle::{Context, Entity, EntityData, Stage, StageProcess, empty};
use crate::types::{EntityKind, StepwiseError};
use std::fmt;

/// A behavior entity.
pub type Behavior = Entity<BehaviorData>;

/// Data of a behavior: its kind plus any nested chapters.
pub struct BehaviorData {
    kind: Box<dyn BehaviorKind>,
    chapters: Vec<Chapter>,
    failure: Option<String>,
}

impl BehaviorData {
    pub fn new(kind: impl BehaviorKind + 'static) -> Self {
        Self::from_boxed(Box::new(kind))
    }

    pub fn from_boxed(kind: Box<dyn BehaviorKind>) -> Self {
        Self {
            kind,
            chapters: Vec::new(),
            failure: None,
        }
    }

    /// Attach nested chapters.
    #[must_use]
    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = chapters;
        self
    }

    #[must_use]
    pub fn kind(&self) -> &dyn BehaviorKind {
        self.kind.as_ref()
    }

    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapters_mut(&mut self) -> &mut Vec<Chapter> {
        &mut self.chapters
    }

    /// Reason of the last contained leaf failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

impl fmt::Debug for BehaviorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorData")
            .field("type", &self.kind.type_name())
            .field("chapters", &self.chapters)
            .field("failure", &self.failure)
            .finish()
    }
}

impl LeafData for BehaviorData {
    fn leaf_type(&self) -> &str {
        self.kind.type_name()
    }

    fn record_failure(&mut self, reason: String) {
        self.failure = Some(reason);
    }
}

impl EntityData for BehaviorData {
    const KIND: EntityKind = EntityKind::Behavior;

    fn stage_process(&self, stage: Stage) -> Box<dyn StageProcess<Self>> {
        match stage {
            Stage::Activating => Contained::boxed(self.kind.activating_process()),
            Stage::Deactivating => Contained::boxed(self.kind.deactivating_process()),
            Stage::Inactive | Stage::Active => empty(),
        }
    }

    fn configure(&mut self, ctx: &mut Context<'_>) -> Result<bool, StepwiseError> {
        for chapter in &mut self.chapters {
            chapter.configure(ctx)?;
        }
        Ok(ctx
            .mode
            .is_skipped(self.kind.type_name(), self.kind.is_optional()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{Delay, EmitSignal};
    use crate::lifecycle::{Journal, Signals};
    use crate::mode::Mode;
    use std::time::Duration;

    #[test]
    fn delay_holds_activation() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut behavior = Behavior::new("pause", BehaviorData::new(Delay::new(250)));

        let mut ctx = Context::new(&mode, Duration::from_millis(100), &mut signals, &mut journal);
        behavior.activate(&mut ctx).expect("activate");
        behavior.update(&mut ctx).expect("update");
        behavior.update(&mut ctx).expect("update");
        assert_eq!(behavior.stage(), Stage::Activating);
        behavior.update(&mut ctx).expect("update");
        assert_eq!(behavior.stage(), Stage::Active);
    }

    #[test]
    fn emit_signal_reverts_on_exit() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut behavior = Behavior::new(
            "light",
            BehaviorData::new(EmitSignal::new("lamp-on").reverting()),
        );

        let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
        behavior.activate(&mut ctx).expect("activate");
        assert!(ctx.signals.is_raised("lamp-on"));
        behavior.update(&mut ctx).expect("update");
        behavior.deactivate(&mut ctx).expect("deactivate");
        behavior.update(&mut ctx).expect("update");
        assert_eq!(behavior.stage(), Stage::Inactive);
        assert!(!ctx.signals.is_raised("lamp-on"));
    }
}
