//! Battle client binary.
//!
//! Runs a scenario through an in-process host/guest session and checks that
//! the guest's mirror converged with the host.
//!
//! # Examples
//!
//! ```bash
//! # Play the bundled skirmish at four times normal speed
//! cargo run -p battle-client -- run skirmish --speed 400
//!
//! # Validate data files without running anything
//! cargo run -p battle-client -- check skirmish
//! ```

mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use commands::{Check, Run};

/// Host-authoritative battle runner
#[derive(Parser)]
#[command(name = "battle")]
#[command(about = "Run battle scenarios over a loopback host/guest session", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Play a scenario and compare host and guest state
    Run(Run),

    /// Load config, tables and a scenario and report problems
    Check(Check),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (for BATTLE_SEED, RUST_LOG and friends)
    let _ = dotenvy::dotenv();

    logging::setup_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(cmd) => cmd.execute().await,
        Command::Check(cmd) => cmd.execute(),
    }
}
