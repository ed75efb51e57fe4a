// syncrotron/src/cli.rs
use clap::{Args, Parser, Subcommand};

use crate::cache::TransferOrder;

/// syncrotron helps to synchronise data from the Australian Synchrotron
/// to your storage.
///
/// Start by configuring the Synchrotron remote SFTP service with
/// `syncrotron init`.
#[derive(Parser, Debug)]
#[command(name = "syncrotron", version)]
pub struct Cli {
    /// Path to the connection config file
    #[arg(long, default_value = "~/.as.yaml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Configure and initialise a Synchrotron remote
    Init(InitArgs),

    /// Sync data from the configured Synchrotron remote
    Sync(SyncArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where the config file should be saved
    #[arg(long = "config_path")]
    pub config_path: Option<String>,

    /// SFTP host name
    #[arg(long)]
    pub host: Option<String>,

    /// SFTP port
    #[arg(long)]
    pub port: Option<u16>,

    /// SFTP user name
    #[arg(long)]
    pub user: Option<String>,

    /// Path to your private key
    #[arg(long)]
    pub keypath: Option<String>,

    /// Where the cache DB should be stored
    #[arg(long)]
    pub db: Option<String>,

    /// Overwrite the config if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Destination directory
    #[arg(long, default_value = "./")]
    pub dest: String,

    /// Prefix appended to EPNs to create their remote path
    #[arg(long = "src_prefix", default_value = "/")]
    pub src_prefix: String,

    /// Order of transfers by date
    #[arg(long, value_enum, ignore_case = true, default_value_t = TransferOrder::Asc)]
    pub order: TransferOrder,

    /// Number of EPNs to transfer
    #[arg(long, default_value_t = 50)]
    pub limit: u32,

    /// Use a process-based worker pool for parallelisation
    #[arg(long)]
    pub parallel: bool,

    /// Number of workers. If --parallel, the number of rsync processes
    /// kept in flight
    #[arg(long, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Enable partial transfers
    #[arg(long)]
    pub partial: bool,

    /// Enable compression prior to transfer
    #[arg(long)]
    pub compress: bool,
}
