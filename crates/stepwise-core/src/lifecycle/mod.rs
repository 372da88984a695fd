//! # Lifecycle Module
//!
//! The stage machine shared by every executable entity.
//!
//! - `stage`: the four stages and their legal cycle
//! - `context`: per-tick context (mode, delta, signals, journal)
//! - `process`: the per-stage strategy trait and poll result
//! - `entity`: the entity wrapper and its lifecycle driver

mod context;
mod entity;
mod process;
mod stage;

pub use context::{Context, Journal, Signals, StageChange};
pub use entity::{Entity, EntityData, LifeCycle};
pub(crate) use entity::{abort_all, all_inactive, empty, update_all};
pub use process::{EmptyProcess, Poll, StageProcess};
pub use stage::Stage;
