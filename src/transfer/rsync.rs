// syncrotron/src/transfer/rsync.rs
//
// Transfers files by shelling out to rsync over ssh. Byte counts are
// recovered from rsync's `--out-format=%-10l` output, one line per
// transferred item.

use crossbeam_channel::{Receiver, Sender};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use super::{Transfer, TransferError, TransferOutcome, TransferResult};
use crate::transfer::pool::{TransferJob, TransferPool};

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Remote SSH endpoint for rsync. When absent, transfers run in local
/// mode (plain `rsync SRC DEST`).
#[derive(Debug, Clone)]
pub struct Remote {
    pub host: String,
    pub user: String,
    pub keypath: PathBuf,
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RsyncOptions {
    pub remote: Option<Remote>,
    pub partial: bool,
    pub compress: bool,
}

/// Builds the argument vector for a single rsync invocation.
pub(crate) fn rsync_args(src: &str, dest: &str, opts: &RsyncOptions) -> Vec<String> {
    let mut args = vec!["-rt".to_string()];
    if opts.compress {
        args.push("-z".to_string());
    }
    match &opts.remote {
        Some(remote) => {
            args.push("-e".to_string());
            args.push(format!(
                "ssh -p {} -i {}",
                remote.port,
                remote.keypath.display()
            ));
            if opts.partial {
                args.push("--partial".to_string());
            }
            args.push("--out-format=%-10l".to_string());
            args.push(format!("{}@{}:{}", remote.user, remote.host, src));
        }
        None => {
            if opts.partial {
                args.push("--partial".to_string());
            }
            args.push("--out-format=%-10l".to_string());
            args.push(src.to_string());
        }
    }
    args.push(dest.to_string());
    args
}

/// Parses a transferred byte count from a line of rsync stdout.
///
/// Progress lines rewritten with carriage returns keep only their final
/// segment, and digit grouping commas are stripped.
pub(crate) fn parse_bytes(line: &str) -> std::result::Result<u64, TransferError> {
    let segment = line
        .rsplit('\r')
        .find(|s| !s.trim().is_empty())
        .unwrap_or(line);
    let cleaned = segment.trim().replace(',', "");
    let token = cleaned.split_whitespace().next().unwrap_or("");
    token
        .parse::<u64>()
        .map_err(|_| TransferError::OutputParse(line.to_string()))
}

/// An rsync child process with its stdout drained on a companion thread,
/// accumulating the transferred byte count as lines arrive.
pub(crate) struct ActiveTransfer {
    child: Child,
    reader: Option<thread::JoinHandle<()>>,
    bytes: Arc<AtomicU64>,
    src: String,
    dest: String,
}

/// Launches rsync for a single job. Byte-count deltas are forwarded to
/// the progress channel as they are parsed.
pub(crate) fn spawn_rsync(
    src: &str,
    dest: &str,
    opts: &RsyncOptions,
    progress: &Sender<u64>,
) -> std::result::Result<ActiveTransfer, TransferError> {
    let mut child = Command::new("rsync")
        .args(rsync_args(src, dest, opts))
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| TransferError::Spawn(e.to_string()))?;

    let bytes = Arc::new(AtomicU64::new(0));
    let reader = child.stdout.take().map(|out| {
        let bytes = Arc::clone(&bytes);
        let progress = progress.clone();
        thread::spawn(move || {
            for line in BufReader::new(out).lines().map_while(|l| l.ok()) {
                // Non-numeric lines (file lists, summaries) are not counted.
                if let Ok(delta) = parse_bytes(&line) {
                    bytes.fetch_add(delta, Ordering::SeqCst);
                    let _ = progress.send(delta);
                }
            }
        })
    });

    Ok(ActiveTransfer {
        child,
        reader,
        bytes,
        src: src.to_string(),
        dest: dest.to_string(),
    })
}

impl ActiveTransfer {
    /// Non-blocking check; yields the outcome once the child has exited.
    pub(crate) fn poll(&mut self) -> Option<TransferOutcome> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(self.conclude(status)),
            Ok(None) => None,
            Err(e) => Some(Err(TransferError::Spawn(e.to_string()))),
        }
    }

    /// Kills the child and reports the transfer as cancelled.
    pub(crate) fn abort(&mut self) -> TransferOutcome {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.join_reader();
        Err(TransferError::Cancelled)
    }

    fn conclude(&mut self, status: ExitStatus) -> TransferOutcome {
        self.join_reader();
        if !status.success() {
            return Err(TransferError::Failed(status.code().unwrap_or(-1)));
        }
        Ok(TransferResult {
            src: self.src.clone(),
            dest: self.dest.clone(),
            bytes_transferred: self.bytes.load(Ordering::SeqCst),
        })
    }

    fn join_reader(&mut self) {
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

/// Runs one rsync job to completion, polling for the cancel flag between
/// status checks. Executed on worker threads by the thread pool.
pub(crate) fn run_rsync(
    src: &str,
    dest: &str,
    opts: &RsyncOptions,
    cancel: &AtomicBool,
    progress: &Sender<u64>,
) -> TransferOutcome {
    if cancel.load(Ordering::SeqCst) {
        return Err(TransferError::Cancelled);
    }
    let mut active = spawn_rsync(src, dest, opts, progress)?;
    loop {
        if let Some(outcome) = active.poll() {
            return outcome;
        }
        if cancel.load(Ordering::SeqCst) {
            return active.abort();
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Transfer client backed by the rsync executable and a worker pool.
pub struct RsyncTransfer {
    options: RsyncOptions,
    pool: Box<dyn TransferPool>,
    cancel: Arc<AtomicBool>,
    progress_tx: Sender<u64>,
    progress_rx: Receiver<u64>,
}

impl RsyncTransfer {
    /// Creates a client for the given remote (or local mode when `None`).
    /// Fails when rsync is not installed.
    pub fn new(
        remote: Option<Remote>,
        partial: bool,
        compress: bool,
        pool: Box<dyn TransferPool>,
    ) -> std::result::Result<Self, TransferError> {
        which::which("rsync").map_err(|_| TransferError::RsyncNotFound)?;
        let (progress_tx, progress_rx) = crossbeam_channel::unbounded();
        Ok(RsyncTransfer {
            options: RsyncOptions {
                remote,
                partial,
                compress,
            },
            pool,
            cancel: Arc::new(AtomicBool::new(false)),
            progress_tx,
            progress_rx,
        })
    }
}

impl Transfer for RsyncTransfer {
    fn transfer(&self, src: &str, dest: &str) -> TransferOutcome {
        self.transfer_batch(&[src.to_string()], dest)
            .pop()
            .unwrap_or(Err(TransferError::Cancelled))
    }

    fn transfer_batch(&self, srcs: &[String], dest: &str) -> Vec<TransferOutcome> {
        let jobs = srcs
            .iter()
            .map(|src| TransferJob {
                src: src.clone(),
                dest: dest.to_string(),
            })
            .collect();
        self.pool
            .execute(jobs, &self.options, &self.cancel, &self.progress_tx)
    }

    fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    fn progress(&self) -> Receiver<u64> {
        self.progress_rx.clone()
    }
}
