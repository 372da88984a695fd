//! # Stepwise CLI Module
//!
//! This module implements the CLI interface for Stepwise.
//!
//! ## Available Commands
//!
//! - `init` - Write a sample process to the store
//! - `list` - List stored processes
//! - `inspect` - Show metrics and validation issues
//! - `run` - Execute a process
//! - `migrate` - Rewrite a document of any version as the current version
//! - `convert` - Re-save a process with another storage strategy
//! - `modes` - List configured modes

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stepwise_core::{StepwiseError, StorageStrategy};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Stepwise - deterministic step-by-step processes
///
/// Runs branching processes of chapters and steps on a simulated clock.
#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ./stepwise.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Process store directory (overrides config and STEPWISE_STORE)
    #[arg(short = 'S', long, global = true)]
    pub store: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a sample process to the store
    Init {
        /// Process name
        name: String,

        /// Overwrite an existing process with the same name
        #[arg(short, long)]
        force: bool,
    },

    /// List stored processes
    List,

    /// Show metrics and validation issues of a process
    Inspect {
        /// Process name
        name: String,

        /// Also print the chapter and step tree
        #[arg(short, long)]
        detailed: bool,
    },

    /// Execute a process
    Run {
        /// Process name
        name: String,

        /// Mode to run in (default: the configured default mode)
        #[arg(short, long)]
        mode: Option<String>,

        /// Signal raised before the first tick (repeatable)
        #[arg(short, long = "signal")]
        signals: Vec<String>,

        /// Tick budget
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Simulated milliseconds per tick
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Complete the whole process synchronously
        #[arg(long)]
        fast_forward: bool,
    },

    /// Read a document of any supported version and write the current version
    Migrate {
        /// Input document
        input: PathBuf,

        /// Output document
        output: PathBuf,
    },

    /// Re-save a stored process with another storage strategy
    Convert {
        /// Process name
        name: String,

        /// Target strategy (single-file, split-by-chapter)
        #[arg(long)]
        strategy: StorageStrategy,
    },

    /// List configured modes
    Modes,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), StepwiseError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        config.store = store;
    }
    let output = Output {
        json: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Init { name, force }) => {
            cmd_init(&config, output, &name, force).map(|_| ())
        }
        Some(Commands::List) => cmd_list(&config, output).map(|_| ()),
        Some(Commands::Inspect { name, detailed }) => {
            cmd_inspect(&config, output, &name, detailed).map(|_| ())
        }
        Some(Commands::Run {
            name,
            mode,
            signals,
            max_ticks,
            tick_ms,
            fast_forward,
        }) => {
            if let Some(mode) = mode {
                config.default_mode = mode;
            }
            if let Some(max_ticks) = max_ticks {
                config.max_ticks = max_ticks;
            }
            if let Some(tick_ms) = tick_ms {
                config.tick_ms = tick_ms.max(1);
            }
            cmd_run(&config, output, &name, &signals, fast_forward).map(|_| ())
        }
        Some(Commands::Migrate { input, output: target }) => {
            cmd_migrate(output, &input, &target).map(|_| ())
        }
        Some(Commands::Convert { name, strategy }) => {
            cmd_convert(&config, output, &name, strategy).map(|_| ())
        }
        Some(Commands::Modes) => cmd_modes(&config, output),
        None => {
            // No subcommand - list the store by default
            cmd_list(&config, output).map(|_| ())
        }
    }
}
