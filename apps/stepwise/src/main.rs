//! # Stepwise - Process Runner
//!
//! The main binary for the Stepwise lifecycle engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            apps/stepwise (THE BINARY)         │
//! │                                               │
//! │   ┌─────────────┐        ┌────────────────┐   │
//! │   │    CLI      │        │    Config      │   │
//! │   │   (clap)    │        │ (toml + env)   │   │
//! │   └──────┬──────┘        └───────┬────────┘   │
//! │          └───────────┬───────────┘            │
//! │                      ▼                        │
//! │              ┌───────────────┐                │
//! │              │ stepwise-core │                │
//! │              │  (THE LOGIC)  │                │
//! │              └───────────────┘                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! stepwise init "Safety Briefing"
//! stepwise inspect "Safety Briefing" --detailed
//! stepwise run "Safety Briefing" --signal retry --mode Fast
//! stepwise migrate old.json current.json
//! ```

use clap::Parser;
use stepwise::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Initialize tracing. STEPWISE_LOG_FORMAT=json selects machine-parseable output.
    let log_format = std::env::var("STEPWISE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stepwise=info,stepwise_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Stepwise startup banner.
fn print_banner() {
    println!(
        "Stepwise v{} - deterministic step-by-step processes\n",
        env!("CARGO_PKG_VERSION")
    );
}
