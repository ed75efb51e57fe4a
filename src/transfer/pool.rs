// syncrotron/src/transfer/pool.rs
//
// Worker pools backing the rsync transfer client. The sync subcommand
// picks one of the two implementations at startup: a lightweight pool of
// worker threads, or a process pool that keeps rsync children in flight
// directly from the dispatching thread.

use crossbeam_channel::Sender;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use super::rsync::{ActiveTransfer, POLL_INTERVAL, RsyncOptions, run_rsync, spawn_rsync};
use super::{TransferError, TransferOutcome};

#[derive(Debug, Clone)]
pub struct TransferJob {
    pub src: String,
    pub dest: String,
}

/// Executes a batch of transfer jobs, returning one outcome per job in
/// job order.
pub trait TransferPool: Send + Sync {
    fn execute(
        &self,
        jobs: Vec<TransferJob>,
        opts: &RsyncOptions,
        cancel: &Arc<AtomicBool>,
        progress: &Sender<u64>,
    ) -> Vec<TransferOutcome>;
}

/// Lightweight pool: a fixed set of worker threads pulling jobs from a
/// shared queue. Each worker supervises one rsync child at a time.
pub struct ThreadPool {
    workers: usize,
}

impl ThreadPool {
    pub fn new(workers: usize) -> Self {
        ThreadPool {
            workers: workers.max(1),
        }
    }
}

impl TransferPool for ThreadPool {
    fn execute(
        &self,
        jobs: Vec<TransferJob>,
        opts: &RsyncOptions,
        cancel: &Arc<AtomicBool>,
        progress: &Sender<u64>,
    ) -> Vec<TransferOutcome> {
        let total = jobs.len();
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        for entry in jobs.into_iter().enumerate() {
            let _ = job_tx.send(entry);
        }
        drop(job_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        thread::scope(|scope| {
            for _ in 0..self.workers.min(total.max(1)) {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    while let Ok((index, job)) = job_rx.recv() {
                        let outcome = run_rsync(&job.src, &job.dest, opts, cancel, progress);
                        let _ = result_tx.send((index, outcome));
                    }
                });
            }
        });
        drop(result_tx);

        let mut outcomes = vec![Err(TransferError::Cancelled); total];
        while let Ok((index, outcome)) = result_rx.recv() {
            outcomes[index] = outcome;
        }
        outcomes
    }
}

/// Parallel pool: launches up to `slots` rsync child processes at a time
/// and polls them to completion from the calling thread. The heavy
/// lifting runs in the children themselves.
pub struct ProcessPool {
    slots: usize,
}

impl ProcessPool {
    pub fn new(slots: usize) -> Self {
        ProcessPool {
            slots: slots.max(1),
        }
    }
}

impl TransferPool for ProcessPool {
    fn execute(
        &self,
        jobs: Vec<TransferJob>,
        opts: &RsyncOptions,
        cancel: &Arc<AtomicBool>,
        progress: &Sender<u64>,
    ) -> Vec<TransferOutcome> {
        let total = jobs.len();
        let mut outcomes: Vec<Option<TransferOutcome>> = vec![None; total];
        let mut queue: VecDeque<_> = jobs.into_iter().enumerate().collect();
        let mut in_flight: Vec<(usize, ActiveTransfer)> = Vec::new();

        while !queue.is_empty() || !in_flight.is_empty() {
            if cancel.load(Ordering::SeqCst) {
                for (index, mut active) in in_flight.drain(..) {
                    outcomes[index] = Some(active.abort());
                }
                for (index, _) in queue.drain(..) {
                    outcomes[index] = Some(Err(TransferError::Cancelled));
                }
                break;
            }

            while in_flight.len() < self.slots {
                let Some((index, job)) = queue.pop_front() else {
                    break;
                };
                match spawn_rsync(&job.src, &job.dest, opts, progress) {
                    Ok(active) => in_flight.push((index, active)),
                    Err(e) => outcomes[index] = Some(Err(e)),
                }
            }

            let mut still_running = Vec::with_capacity(in_flight.len());
            for (index, mut active) in in_flight.drain(..) {
                match active.poll() {
                    Some(outcome) => outcomes[index] = Some(outcome),
                    None => still_running.push((index, active)),
                }
            }
            in_flight = still_running;

            if !in_flight.is_empty() {
                thread::sleep(POLL_INTERVAL);
            }
        }

        outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or(Err(TransferError::Cancelled)))
            .collect()
    }
}
