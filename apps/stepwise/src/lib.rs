//! # stepwise
//!
//! Command-line front end for `stepwise-core`: configuration loading and
//! the CLI commands. The binary in `main.rs` only initialises logging and
//! dispatches here.

pub mod cli;
pub mod config;

pub use config::{Config, ModeConfig, RuleKind};
