// syncrotron/src/transfer/mod.rs
pub mod pool;
pub(crate) mod rsync;

use crossbeam_channel::Receiver;
use thiserror::Error;

pub use pool::{ProcessPool, ThreadPool, TransferPool};
pub use rsync::{Remote, RsyncTransfer};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error(
        "rsync executable not found; please install it and make sure it is present in your PATH"
    )]
    RsyncNotFound,

    #[error("failed to launch rsync: {0}")]
    Spawn(String),

    #[error("failed to parse transferred bytes from rsync output: {0:?}")]
    OutputParse(String),

    #[error("rsync transfer failed with code {0}; see the rsync man page for an explanation")]
    Failed(i32),

    #[error("transfer cancel signal received")]
    Cancelled,
}

/// A successful transfer. The byte count is best effort; implementors are
/// not required to account for every byte on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub src: String,
    pub dest: String,
    pub bytes_transferred: u64,
}

pub type TransferOutcome = std::result::Result<TransferResult, TransferError>;

/// A transfer method. Directories are copied recursively; batch outcomes
/// are reported per job, in job order.
pub trait Transfer {
    /// Transfer a single file or directory from `src` to `dest`.
    fn transfer(&self, src: &str, dest: &str) -> TransferOutcome;

    /// Transfer a batch of files or directories into `dest`, using the
    /// worker pool backing this client.
    fn transfer_batch(&self, srcs: &[String], dest: &str) -> Vec<TransferOutcome>;

    /// Signal all in-flight and queued transfers to stop.
    fn cancel(&self);

    /// A channel of byte-count deltas. The sum of deltas adds up to the
    /// total amount of data transferred, best effort; there is no
    /// prescribed update rate.
    fn progress(&self) -> Receiver<u64>;
}
