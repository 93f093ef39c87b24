// Desktop tooling crate: unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod check;
mod doc;
mod sim;

use anyhow::Result;
use clap::{Parser, Subcommand};
use platform::config;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Dual-core low-power development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the no_std target build, the emulator build, clippy and rustfmt
    Check,
    /// Run unit, integration and doc tests
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Build and optionally open documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Run the two-core emulator
    Sim {
        /// Log filter passed as RUST_LOG (e.g. "debug", "lowpower=trace")
        #[arg(long, default_value = "info")]
        log: String,
        /// Build the emulator in release mode
        #[arg(short, long)]
        release: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => check::run(),
        Commands::Test { unit, integration } => test::run(unit, integration),
        Commands::Doc { open } => doc::run(open),
        Commands::Sim { log, release } => sim::run(&log, release),
    }
}

/// Banner shared by every task.
pub(crate) fn banner(task: &str) -> String {
    format!("{} v{} · {}", config::APP_NAME, config::APP_VERSION, task)
}
