//! # Runner Module
//!
//! The driver that owns a process and everything one run needs: the mode
//! collection, the signal set, the stage-change journal and the simulated
//! clock.
//!
//! The runner is the only place that builds a [`Context`]. The selected
//! mode is borrowed for the whole of one operation, so switching modes
//! always happens between ticks.
//!
//! ## Completion
//!
//! A process never leaves `Active` on its own. Once its chapter sequence
//! finished, [`Runner::tick`] deactivates it, and the run is complete when
//! it is back to `Inactive`.

use crate::lifecycle::{Context, Journal, Signals, Stage, StageChange};
use crate::mode::{Mode, ModeCollection};
use crate::model::{Process, walk_chapters};
use crate::types::{EntityKind, StepwiseError};
use serde::Serialize;
use std::time::Duration;

/// Snapshot of a run for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub process: String,
    pub stage: Stage,
    pub mode: String,
    pub ticks: u64,
    pub elapsed_ms: u64,
    /// Running root chapter.
    pub chapter: Option<String>,
    /// Running step of the running root chapter.
    pub step: Option<String>,
    pub signals: Vec<String>,
    /// Leaves stuck on a contained failure, as `step/leaf: message`.
    pub failures: Vec<String>,
    pub complete: bool,
}

/// Result of [`Runner::run_until_complete`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub completed: bool,
    pub ticks: u64,
    pub elapsed_ms: u64,
    /// Steps in activation order, nested chapters included.
    pub visited_steps: Vec<String>,
}

/// Drives one process.
#[derive(Debug)]
pub struct Runner {
    process: Process,
    modes: ModeCollection,
    signals: Signals,
    journal: Journal,
    ticks: u64,
    elapsed: Duration,
    started: bool,
}

impl Runner {
    /// Create a runner with only the default mode.
    #[must_use]
    pub fn new(process: Process) -> Self {
        Self::with_modes(process, ModeCollection::new())
    }

    /// Create a runner with a set of modes. The collection's selected mode
    /// is used from the first tick.
    #[must_use]
    pub fn with_modes(process: Process, modes: ModeCollection) -> Self {
        Self {
            process,
            modes,
            signals: Signals::new(),
            journal: Journal::new(),
            ticks: 0,
            elapsed: Duration::ZERO,
            started: false,
        }
    }

    /// Replace the journal, e.g. with a smaller bound.
    #[must_use]
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn process(&self) -> &Process {
        &self.process
    }

    /// Take the process back, e.g. to save it.
    #[must_use]
    pub fn into_process(self) -> Process {
        self.process
    }

    #[must_use]
    pub fn modes(&self) -> &ModeCollection {
        &self.modes
    }

    #[must_use]
    pub fn current_mode(&self) -> &Mode {
        self.modes.current()
    }

    #[must_use]
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Take every stage change recorded so far, leaving the journal empty.
    ///
    /// `visited_steps` only sees changes recorded after the last drain.
    pub fn drain_journal(&mut self) -> Vec<StageChange> {
        self.journal.drain()
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Check if the process was started and is back to `Inactive`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.started && self.process.stage() == Stage::Inactive
    }

    /// Step names in activation order, as far as the journal still holds them.
    #[must_use]
    pub fn visited_steps(&self) -> Vec<&str> {
        self.journal.activation_order(EntityKind::Step)
    }

    // =========================================================================
    // DRIVING
    // =========================================================================

    /// Activate the process.
    pub fn start(&mut self) -> Result<(), StepwiseError> {
        self.in_context(Duration::ZERO, |process, ctx| process.activate(ctx))?;
        self.started = true;
        tracing::info!(process = self.process.name(), mode = self.modes.current().name(), "process started");
        Ok(())
    }

    /// Advance simulated time by `delta` and update the process once.
    ///
    /// No-op on an inactive process. Returns the stage after the tick.
    pub fn tick(&mut self, delta: Duration) -> Result<Stage, StepwiseError> {
        if self.process.stage() == Stage::Inactive {
            return Ok(Stage::Inactive);
        }
        self.ticks += 1;
        self.elapsed = self.elapsed.saturating_add(delta);
        self.in_context(delta, |process, ctx| process.update(ctx))?;
        self.finish_if_done()?;
        Ok(self.process.stage())
    }

    /// Start if needed, then tick until the process completes or
    /// `max_ticks` ticks ran.
    pub fn run_until_complete(&mut self, delta: Duration, max_ticks: u64) -> Result<RunOutcome, StepwiseError> {
        if !self.started {
            self.start()?;
        }
        let mut remaining = max_ticks;
        while !self.is_complete() && remaining > 0 {
            self.tick(delta)?;
            remaining -= 1;
        }
        let outcome = self.outcome();
        if !outcome.completed {
            tracing::warn!(
                process = self.process.name(),
                ticks = outcome.ticks,
                "process did not complete within the tick budget"
            );
        }
        Ok(outcome)
    }

    /// Summary of the run so far.
    #[must_use]
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            completed: self.is_complete(),
            ticks: self.ticks,
            elapsed_ms: duration_ms(self.elapsed),
            visited_steps: self.visited_steps().into_iter().map(String::from).collect(),
        }
    }

    /// Switch modes and reconfigure the whole tree at once.
    ///
    /// Running leaves that became skippable are fast-forwarded now.
    pub fn select_mode(&mut self, name: &str) -> Result<(), StepwiseError> {
        self.modes.select(name)?;
        tracing::info!(mode = name, "mode selected");
        self.in_context(Duration::ZERO, |process, ctx| process.configure(ctx))?;
        self.finish_if_done()
    }

    /// Raise a signal. Returns false if it was already raised.
    pub fn raise_signal(&mut self, name: impl Into<String>) -> bool {
        self.signals.raise(name)
    }

    /// Clear a signal. Returns false if it was not raised.
    pub fn clear_signal(&mut self, name: &str) -> bool {
        self.signals.clear(name)
    }

    /// Run the whole process to its end synchronously, starting it first
    /// when needed. Loops are walked once. No-op on a completed run.
    pub fn fast_forward(&mut self) -> Result<(), StepwiseError> {
        if self.is_complete() {
            tracing::debug!(process = self.process.name(), "process already complete, nothing to fast-forward");
            return Ok(());
        }
        if !self.started {
            self.start()?;
        }
        self.in_context(Duration::ZERO, |process, ctx| process.fast_forward_to_inactive(ctx))?;
        tracing::info!(process = self.process.name(), "process fast-forwarded");
        Ok(())
    }

    /// Fast-forward the running step of the running root chapter.
    ///
    /// The chapter follows the step's first transition on the next tick.
    /// Returns the skipped step's name, `None` when no step is running.
    pub fn skip_current_step(&mut self) -> Result<Option<String>, StepwiseError> {
        self.in_context(Duration::ZERO, |process, ctx| {
            let Some(step) = process
                .data_mut()
                .current_chapter_mut()
                .and_then(|c| c.data_mut().current_step_mut())
            else {
                return Ok(None);
            };
            tracing::debug!(step = step.name(), "skipping step");
            step.mark_to_fast_forward(ctx)?;
            Ok(Some(step.name().to_string()))
        })
    }

    /// Snapshot of the run.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        let chapter = self.process.data().current_chapter();
        RunStatus {
            process: self.process.name().to_string(),
            stage: self.process.stage(),
            mode: self.modes.current().name().to_string(),
            ticks: self.ticks,
            elapsed_ms: duration_ms(self.elapsed),
            chapter: chapter.map(|c| c.name().to_string()),
            step: chapter
                .and_then(|c| c.data().current_step())
                .map(|s| s.name().to_string()),
            signals: self.signals.iter().map(String::from).collect(),
            failures: self.failures(),
            complete: self.is_complete(),
        }
    }

    /// Leaves stuck on a contained failure.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        walk_chapters(&self.process, |chapter, _| {
            for step in chapter.data().steps() {
                for behavior in step.data().behaviors() {
                    if let Some(message) = behavior.data().failure() {
                        failures.push(format!("{}/{}: {}", step.name(), behavior.name(), message));
                    }
                }
                for transition in step.data().transitions() {
                    for condition in transition.data().conditions() {
                        if let Some(message) = condition.data().failure() {
                            failures.push(format!("{}/{}: {}", step.name(), condition.name(), message));
                        }
                    }
                }
            }
        });
        failures
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn in_context<T>(
        &mut self,
        delta: Duration,
        operation: impl FnOnce(&mut Process, &mut Context<'_>) -> Result<T, StepwiseError>,
    ) -> Result<T, StepwiseError> {
        let mut ctx = Context::new(self.modes.current(), delta, &mut self.signals, &mut self.journal);
        operation(&mut self.process, &mut ctx)
    }

    fn finish_if_done(&mut self) -> Result<(), StepwiseError> {
        if self.process.stage() == Stage::Active && self.process.is_stage_finished() {
            tracing::info!(process = self.process.name(), ticks = self.ticks, "process finished");
            self.in_context(Duration::ZERO, |process, ctx| process.deactivate(ctx))?;
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
