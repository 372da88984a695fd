//! Processes: the root of the graph, an ordered list of chapters run one
//! after the other.

use super::Chapter;
use crate::lifecycle::{
    Context, Entity, EntityData, Poll, Stage, StageProcess, abort_all, all_inactive, empty,
    update_all,
};
use crate::types::{EntityKind, StepwiseError};

/// A process entity.
pub type Process = Entity<ProcessData>;

/// Data of a process.
#[derive(Debug, Default)]
pub struct ProcessData {
    chapters: Vec<Chapter>,
}

impl ProcessData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_chapter(mut self, chapter: Chapter) -> Self {
        self.chapters.push(chapter);
        self
    }

    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapters_mut(&mut self) -> &mut Vec<Chapter> {
        &mut self.chapters
    }

    /// The running chapter, if any.
    #[must_use]
    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.stage() != Stage::Inactive)
    }

    pub fn current_chapter_mut(&mut self) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.stage() != Stage::Inactive)
    }
}

impl EntityData for ProcessData {
    const KIND: EntityKind = EntityKind::Process;

    fn stage_process(&self, stage: Stage) -> Box<dyn StageProcess<Self>> {
        match stage {
            Stage::Active => Box::new(Sequence::Idle),
            Stage::Deactivating => Box::new(Leaving),
            Stage::Inactive | Stage::Activating => empty(),
        }
    }

    fn configure(&mut self, ctx: &mut Context<'_>) -> Result<bool, StepwiseError> {
        for chapter in &mut self.chapters {
            chapter.configure(ctx)?;
        }
        Ok(false)
    }
}

/// Active stage of a process: chapters in list order, one phase change per
/// tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sequence {
    Idle,
    Running(usize),
    Leaving(usize),
    Finished,
}

impl Sequence {
    fn enter(data: &mut ProcessData, index: usize, ctx: &mut Context<'_>) -> Result<Sequence, StepwiseError> {
        match data.chapters.get_mut(index) {
            Some(chapter) => {
                tracing::debug!(chapter = chapter.name(), "entering chapter");
                chapter.activate(ctx)?;
                Ok(Sequence::Running(index))
            }
            None => Ok(Sequence::Finished),
        }
    }
}

impl StageProcess<ProcessData> for Sequence {
    fn update(&mut self, data: &mut ProcessData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        *self = match *self {
            Sequence::Idle => Sequence::enter(data, 0, ctx)?,
            Sequence::Running(index) => {
                let chapter = &mut data.chapters[index];
                chapter.update(ctx)?;
                if chapter.stage() == Stage::Active && chapter.is_stage_finished() {
                    chapter.deactivate(ctx)?;
                    Sequence::Leaving(index)
                } else {
                    Sequence::Running(index)
                }
            }
            Sequence::Leaving(index) => {
                data.chapters[index].update(ctx)?;
                if data.chapters[index].stage() == Stage::Inactive {
                    Sequence::enter(data, index + 1, ctx)?
                } else {
                    Sequence::Leaving(index)
                }
            }
            Sequence::Finished => Sequence::Finished,
        };
        Ok(Poll::ready(*self == Sequence::Finished))
    }

    fn fast_forward(&mut self, data: &mut ProcessData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        loop {
            *self = match *self {
                Sequence::Idle => Sequence::enter(data, 0, ctx)?,
                Sequence::Running(index) | Sequence::Leaving(index) => {
                    data.chapters[index].fast_forward_to_inactive(ctx)?;
                    Sequence::enter(data, index + 1, ctx)?
                }
                Sequence::Finished => return Ok(()),
            };
        }
    }
}

/// Deactivating stage of a process: stop the running chapter.
struct Leaving;

impl StageProcess<ProcessData> for Leaving {
    fn start(&mut self, data: &mut ProcessData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        abort_all(&mut data.chapters, ctx)
    }

    fn update(&mut self, data: &mut ProcessData, ctx: &mut Context<'_>) -> Result<Poll, StepwiseError> {
        update_all(&mut data.chapters, ctx)?;
        Ok(all_inactive(&data.chapters))
    }

    fn fast_forward(&mut self, data: &mut ProcessData, ctx: &mut Context<'_>) -> Result<(), StepwiseError> {
        for chapter in &mut data.chapters {
            chapter.fast_forward_to_inactive(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Journal, Signals};
    use crate::mode::Mode;
    use crate::model::{ChapterData, Step, StepData};
    use crate::types::Guid;
    use std::time::Duration;

    fn single_step_chapter(id: u128, step: &str) -> Chapter {
        Chapter::new(
            format!("chapter-{}", id),
            ChapterData::new(Guid::from_u128(id)).with_step(Step::new(step, StepData::new(Guid::from_u128(id + 100)))),
        )
    }

    fn two_chapters() -> Process {
        Process::new(
            "p",
            ProcessData::new()
                .with_chapter(single_step_chapter(1, "first"))
                .with_chapter(single_step_chapter(2, "second")),
        )
    }

    #[test]
    fn chapters_run_in_list_order() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut process = two_chapters();
        {
            let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
            process.activate(&mut ctx).expect("activate");
            for _ in 0..100 {
                if process.is_stage_finished() && process.stage() == Stage::Active {
                    break;
                }
                process.update(&mut ctx).expect("update");
            }
        }
        assert_eq!(process.stage(), Stage::Active);
        assert!(process.data().current_chapter().is_none());
        assert_eq!(
            journal.activation_order(EntityKind::Chapter),
            vec!["chapter-1", "chapter-2"]
        );
        assert_eq!(journal.activation_order(EntityKind::Step), vec!["first", "second"]);
    }

    #[test]
    fn fast_forward_visits_every_chapter() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut process = two_chapters();
        {
            let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
            process.activate(&mut ctx).expect("activate");
            process.fast_forward_to_inactive(&mut ctx).expect("fast-forward");
        }
        assert_eq!(process.stage(), Stage::Inactive);
        assert_eq!(journal.entries(EntityKind::Chapter, "chapter-2", Stage::Inactive), 1);
    }

    #[test]
    fn deactivating_mid_run_stops_the_chapter() {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut ctx = Context::new(&mode, Duration::ZERO, &mut signals, &mut journal);
        let mut process = two_chapters();

        process.activate(&mut ctx).expect("activate");
        for _ in 0..3 {
            process.update(&mut ctx).expect("update");
        }
        assert_eq!(process.stage(), Stage::Active);
        assert!(process.data().current_chapter().is_some());

        process.deactivate(&mut ctx).expect("deactivate");
        for _ in 0..20 {
            process.update(&mut ctx).expect("update");
        }
        assert_eq!(process.stage(), Stage::Inactive);
        assert!(process.data().current_chapter().is_none());
    }
}
