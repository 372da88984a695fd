//! Built-in behavior kinds.
//!
//! | type | optional | activation | deactivation |
//! |------|----------|------------|--------------|
//! | `delay` | yes | waits `milliseconds` of simulated time | - |
//! | `emit-signal` | no | raises `signal` | clears it when `revert_on_exit` |
//! | `execute-chapters` | no | runs the nested chapters in parallel | stops them |

use super::BehaviorKind;
use crate::lifecycle::{Context, Poll, Stage, StageProcess, all_inactive};
use crate::model::BehaviorData;
use crate::types::StepwiseError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

// =============================================================================
// DELAY
// =============================================================================

/// Holds the step's activation for a fixed amount of simulated time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Delay {
    pub milliseconds: u64,
}

impl Delay {
    pub const TYPE_NAME: &'static str = "delay";

    #[must_use]
    pub fn new(milliseconds: u64) -> Self {
        Self { milliseconds }
    }
}

impl BehaviorKind for Delay {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn properties(&self) -> serde_json::Value {
        json!({ "milliseconds": self.milliseconds })
    }

    fn activating_process(&self) -> Box<dyn StageProcess<BehaviorData>> {
        Box::new(Wait {
            remaining: Duration::from_millis(self.milliseconds),
        })
    }
}

struct Wait {
    remaining: Duration,
}

impl StageProcess<BehaviorData> for Wait {
    fn update(&mut self, _data: &mut BehaviorData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        self.remaining = self.remaining.saturating_sub(ctx.delta);
        Ok(Poll::ready(self.remaining.is_zero()))
    }

    fn fast_forward(&mut self, _data: &mut BehaviorData, _ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        self.remaining = Duration::ZERO;
        Ok(())
    }
}

// =============================================================================
// EMIT SIGNAL
// =============================================================================

/// Raises a signal when the step is entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmitSignal {
    pub signal: String,
    #[serde(default)]
    pub revert_on_exit: bool,
}

impl EmitSignal {
    pub const TYPE_NAME: &'static str = "emit-signal";

    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            revert_on_exit: false,
        }
    }

    /// Clear the signal again when the behavior deactivates.
    #[must_use]
    pub fn reverting(mut self) -> Self {
        self.revert_on_exit = true;
        self
    }
}

impl BehaviorKind for EmitSignal {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> serde_json::Value {
        json!({ "signal": self.signal, "revert_on_exit": self.revert_on_exit })
    }

    fn activating_process(&self) -> Box<dyn StageProcess<BehaviorData>> {
        Box::new(Raise {
            signal: self.signal.clone(),
        })
    }

    fn deactivating_process(&self) -> Box<dyn StageProcess<BehaviorData>> {
        if self.revert_on_exit {
            Box::new(Lower {
                signal: self.signal.clone(),
            })
        } else {
            crate::lifecycle::empty()
        }
    }
}

struct Raise {
    signal: String,
}

impl StageProcess<BehaviorData> for Raise {
    fn start(&mut self, _data: &mut BehaviorData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        ctx.signals.raise(self.signal.clone());
        Ok(())
    }

    fn update(&mut self, _data: &mut BehaviorData, _ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        Ok(Poll::Done)
    }
}

struct Lower {
    signal: String,
}

impl StageProcess<BehaviorData> for Lower {
    fn start(&mut self, _data: &mut BehaviorData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        ctx.signals.clear(&self.signal);
        Ok(())
    }

    fn update(&mut self, _data: &mut BehaviorData, _ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        Ok(Poll::Done)
    }
}

// =============================================================================
// EXECUTE CHAPTERS
// =============================================================================

/// Runs the behavior's nested chapters in parallel while the step activates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteChapters {}

impl ExecuteChapters {
    pub const TYPE_NAME: &'static str = "execute-chapters";

    #[must_use]
    pub fn new() -> Self {
        Self {}
    }
}

impl BehaviorKind for ExecuteChapters {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn properties(&self) -> serde_json::Value {
        json!({})
    }

    fn activating_process(&self) -> Box<dyn StageProcess<BehaviorData>> {
        Box::new(RunChapters)
    }

    fn deactivating_process(&self) -> Box<dyn StageProcess<BehaviorData>> {
        Box::new(StopChapters)
    }
}

struct RunChapters;

impl StageProcess<BehaviorData> for RunChapters {
    fn start(&mut self, data: &mut BehaviorData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for chapter in data.chapters_mut() {
            chapter.activate(ctx)?;
        }
        Ok(())
    }

    fn update(&mut self, data: &mut BehaviorData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        for chapter in data.chapters_mut() {
            chapter.update(ctx)?;
            if chapter.stage() == Stage::Active && chapter.is_stage_finished() {
                chapter.deactivate(ctx)?;
            }
        }
        Ok(all_inactive(data.chapters()))
    }

    fn fast_forward(&mut self, data: &mut BehaviorData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for chapter in data.chapters_mut() {
            chapter.fast_forward_to_inactive(ctx)?;
        }
        Ok(())
    }
}

struct StopChapters;

impl StageProcess<BehaviorData> for StopChapters {
    fn start(&mut self, data: &mut BehaviorData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for chapter in data.chapters_mut() {
            chapter.abort(ctx)?;
        }
        Ok(())
    }

    fn update(&mut self, data: &mut BehaviorData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        for chapter in data.chapters_mut() {
            chapter.update(ctx)?;
        }
        Ok(all_inactive(data.chapters()))
    }

    fn fast_forward(&mut self, data: &mut BehaviorData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for chapter in data.chapters_mut() {
            chapter.fast_forward_to_inactive(ctx)?;
        }
        Ok(())
    }
}
