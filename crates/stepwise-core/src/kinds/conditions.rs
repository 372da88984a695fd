//! Built-in condition kinds.
//!
//! | type | optional | holds when | autocomplete |
//! |------|----------|------------|--------------|
//! | `timeout` | yes | `milliseconds` of simulated time passed | - |
//! | `signal` | yes | `signal` is raised (cleared again when `consume`) | raises `signal` unless `consume` |

use super::ConditionKind;
use crate::lifecycle::{Context, Poll, StageProcess};
use crate::model::ConditionData;
use crate::types::StepwiseError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Completes after a fixed amount of simulated time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timeout {
    pub milliseconds: u64,
}

impl Timeout {
    pub const TYPE_NAME: &'static str = "timeout";

    #[must_use]
    pub fn new(milliseconds: u64) -> Self {
        Self { milliseconds }
    }
}

impl ConditionKind for Timeout {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn properties(&self) -> serde_json::Value {
        json!({ "milliseconds": self.milliseconds })
    }

    fn active_process(&self) -> Box<dyn StageProcess<ConditionData>> {
        Box::new(Elapsed {
            elapsed: Duration::ZERO,
            limit: Duration::from_millis(self.milliseconds),
        })
    }
}

struct Elapsed {
    elapsed: Duration,
    limit: Duration,
}

impl StageProcess<ConditionData> for Elapsed {
    fn update(&mut self, _data: &mut ConditionData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        self.elapsed = self.elapsed.saturating_add(ctx.delta);
        Ok(Poll::ready(self.elapsed >= self.limit))
    }
}

/// Completes when a signal is raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalCondition {
    pub signal: String,
    /// Clear the signal once observed.
    #[serde(default)]
    pub consume: bool,
    #[serde(default = "default_optional")]
    pub optional: bool,
}

fn default_optional() -> bool {
    true
}

impl SignalCondition {
    pub const TYPE_NAME: &'static str = "signal";

    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            consume: false,
            optional: true,
        }
    }

    #[must_use]
    pub fn consuming(mut self) -> Self {
        self.consume = true;
        self
    }

    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.optional = false;
        self
    }
}

impl ConditionKind for SignalCondition {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn properties(&self) -> serde_json::Value {
        json!({
            "signal": self.signal,
            "consume": self.consume,
            "optional": self.optional,
        })
    }

    fn active_process(&self) -> Box<dyn StageProcess<ConditionData>> {
        Box::new(Watch {
            signal: self.signal.clone(),
            consume: self.consume,
        })
    }

    fn autocomplete(&self, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        if !self.consume {
            ctx.signals.raise(self.signal.clone());
        }
        Ok(())
    }
}

struct Watch {
    signal: String,
    consume: bool,
}

impl StageProcess<ConditionData> for Watch {
    fn update(&mut self, _data: &mut ConditionData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        if !ctx.signals.is_raised(&self.signal) {
            return Ok(Poll::Pending);
        }
        if self.consume {
            ctx.signals.clear(&self.signal);
        }
        Ok(Poll::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Journal, Signals, Stage};
    use crate::mode::Mode;
    use crate::model::Condition;

    #[test]
    fn signal_defaults_from_properties() {
        let parsed: SignalCondition =
            serde_json::from_value(json!({ "signal": "door" })).expect("parse");
        assert_eq!(parsed, SignalCondition::new("door"));
    }

    #[test]
    fn consuming_signal_clears_it() {
        let mode = Mode::default();
        let mut signals: Signals = ["door"].into_iter().collect();
        let mut journal = Journal::new();
        let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
        let mut condition = Condition::new(
            "door",
            ConditionData::new(SignalCondition::new("door").consuming()),
        );

        condition.activate(&mut ctx).expect("activate");
        condition.update(&mut ctx).expect("update");
        condition.update(&mut ctx).expect("update");
        assert_eq!(condition.stage(), Stage::Active);
        assert!(condition.data().is_completed());
        assert!(!ctx.signals.is_raised("door"));
    }

    #[test]
    fn timeout_waits_for_simulated_time() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut ctx = Context::new(&mode, Duration::from_millis(40), &mut signals, &mut journal);
        let mut condition = Condition::new("t", ConditionData::new(Timeout::new(100)));

        condition.activate(&mut ctx).expect("activate");
        condition.update(&mut ctx).expect("activating");
        for _ in 0..2 {
            condition.update(&mut ctx).expect("update");
        }
        assert!(!condition.data().is_completed());
        condition.update(&mut ctx).expect("update");
        assert!(condition.data().is_completed());
    }
}
