//! # Stage Processes
//!
//! A stage process is the work an entity performs while it occupies one
//! stage. The lifecycle creates a fresh process on every stage entry and
//! drives it cooperatively:
//!
//! - `start` once on entry
//! - `update` once per tick until it returns [`Poll::Done`]
//! - `fast_forward` at most once, instead of the remaining updates
//! - `end` once on exit
//!
//! Processes never block. Waiting is expressed by returning
//! [`Poll::Pending`] and being polled again on the next tick.

use super::Context;
use crate::types::StepwiseError;

/// Result of one cooperative update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Still running, poll again next tick.
    Pending,
    /// Stage work complete.
    Done,
}

impl Poll {
    /// Convert a completion flag into a poll result.
    #[must_use]
    pub fn ready(done: bool) -> Self {
        if done { Poll::Done } else { Poll::Pending }
    }

    /// Check if the process completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Poll::Done)
    }
}

/// Work performed by an entity of data type `D` during one stage.
pub trait StageProcess<D> {
    /// Called once when the stage is entered.
    fn start(&mut self, _data: &mut D, _ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        Ok(())
    }

    /// Drive the stage forward by one tick.
    fn update(&mut self, data: &mut D, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError>;

    /// Called once when the stage is left, whether it completed or not.
    fn end(&mut self, _data: &mut D, _ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        Ok(())
    }

    /// Complete the stage synchronously.
    ///
    /// Must leave `data` in the state a natural completion would have.
    fn fast_forward(&mut self, _data: &mut D, _ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        Ok(())
    }
}

/// Process with no work: completes on its first update.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyProcess;

impl<D> StageProcess<D> for EmptyProcess {
    fn update(&mut self, _data: &mut D, _ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        Ok(Poll::Done)
    }
}
