// syncrotron/src/sync/mod.rs
pub(crate) mod logic;

use crate::cli::SyncArgs;
use crate::config::Settings;
use crate::errors::Result;

/// Public entry point for the sync process.
/// Orchestrates the transfer flow using the loaded connection settings.
pub async fn run_sync_flow(settings: &Settings, args: &SyncArgs) -> Result<()> {
    logic::perform_sync_orchestration(settings, args).await
}
