//! # Process Model
//!
//! The containment tree of a process:
//!
//! ```text
//! Process -> Chapter -> Step -> Transition -> Condition
//!                          \-> Behavior -> Chapter (nested) -> ...
//! ```
//!
//! Every node is an [`Entity`](crate::lifecycle::Entity) owned by its
//! parent. The only edge that is not ownership is a transition's target,
//! stored as a step guid and resolved in the owning chapter's step table.

mod behavior;
mod chapter;
mod condition;
mod process;
mod step;
mod transition;

pub use behavior::{Behavior, BehaviorData};
pub use chapter::{Chapter, ChapterData};
pub use condition::{Condition, ConditionData};
pub use process::{Process, ProcessData};
pub use step::{Step, StepData};
pub use transition::{Transition, TransitionData};

/// Visit every chapter of a process, nested chapters included, depth first.
///
/// The callback receives the nesting depth (0 for root chapters).
pub fn walk_chapters<'a>(process: &'a Process, mut visit: impl FnMut(&'a Chapter, usize)) {
    let mut stack: Vec<(&'a Chapter, usize)> = process
        .data()
        .chapters()
        .iter()
        .rev()
        .map(|c| (c, 0))
        .collect();
    while let Some((chapter, depth)) = stack.pop() {
        visit(chapter, depth);
        for step in chapter.data().steps().iter().rev() {
            for behavior in step.data().behaviors().iter().rev() {
                for nested in behavior.data().chapters().iter().rev() {
                    stack.push((nested, depth + 1));
                }
            }
        }
    }
}
