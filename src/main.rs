//! Australian Synchrotron Sync Tool
//!
//! Provides CLI interface for mirroring experiment data (EPNs) from the
//! Synchrotron's SFTP service to local storage.

// syncrotron/src/main.rs
mod cache;
mod cli;
mod config;
mod errors;
mod init;
mod sync;
mod transfer;

use clap::Parser;
use std::process::ExitCode;

use cli::{Cli, Command};
use errors::Result;

/// Main entry point for the sync tool
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_app(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run_app(cli: Cli) -> Result<()> {
    match cli.command {
        // Init is the one subcommand that must work without a config file.
        Command::Init(args) => init::run_init_flow(&args),
        Command::Sync(args) => {
            let config_path = config::expand_tilde(&cli.config);
            let settings = config::read(&config_path)?;
            sync::run_sync_flow(&settings, &args).await
        }
    }
}
