// syncrotron/src/sync/logic.rs
use std::thread;

use crate::cache::CacheDb;
use crate::cli::SyncArgs;
use crate::config::Settings;
use crate::errors::{AppError, Result};
use crate::transfer::{ProcessPool, Remote, RsyncTransfer, ThreadPool, Transfer, TransferPool};

/// Orchestrates the synchronisation process.
///
/// 1. Opens the cache DB and selects up to `limit` untransferred EPNs in
///    the requested date order.
/// 2. Builds a worker pool (process-based with `--parallel`, thread-based
///    otherwise) and an rsync transfer client for the configured remote.
/// 3. Runs the batch and marks each successful EPN as transferred.
/// 4. Reports the byte total and fails if any transfer failed.
pub async fn perform_sync_orchestration(settings: &Settings, args: &SyncArgs) -> Result<()> {
    println!(
        "⚙️ Starting synchronisation from {}@{}...",
        settings.user, settings.host
    );

    let cache = CacheDb::open(&settings.db).await?;
    let pending = cache.pending_epns(args.order, args.limit).await?;
    if pending.is_empty() {
        println!("Nothing to sync: no untransferred EPNs in the cache DB.");
        return Ok(());
    }
    println!("Found {} EPNs to transfer.", pending.len());

    let pool = build_pool(args.parallel, args.threads);
    let remote = Remote {
        host: settings.host.clone(),
        user: settings.user.clone(),
        keypath: settings.keypath.clone(),
        port: settings.port,
    };
    let client = RsyncTransfer::new(Some(remote), args.partial, args.compress, pool)
        .map_err(|e| AppError::Transfer(e.to_string()))?;

    let progress_rx = client.progress();
    let progress = thread::spawn(move || {
        let mut total: u64 = 0;
        while let Ok(delta) = progress_rx.recv() {
            total += delta;
        }
        total
    });

    let srcs: Vec<String> = pending
        .iter()
        .map(|epn| epn_source_path(&args.src_prefix, epn))
        .collect();
    let outcomes = client.transfer_batch(&srcs, &args.dest);
    // Dropping the client closes the progress channel so the accumulator
    // thread can finish.
    drop(client);

    let mut failures = 0usize;
    for (epn, outcome) in pending.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                println!("✓ {} ({} bytes)", epn, result.bytes_transferred);
                cache.mark_transferred(epn).await?;
            }
            Err(e) => {
                eprintln!("❌ {epn} failed: {e}");
                failures += 1;
            }
        }
    }

    let total_bytes = progress.join().unwrap_or(0);
    let transferred = pending.len() - failures;
    println!("✅ Transferred {transferred} EPNs ({total_bytes} bytes).");

    if failures > 0 {
        return Err(AppError::Transfer(format!(
            "{failures} of {} transfers failed",
            pending.len()
        )));
    }
    Ok(())
}

fn build_pool(parallel: bool, workers: usize) -> Box<dyn TransferPool> {
    if parallel {
        Box::new(ProcessPool::new(workers))
    } else {
        Box::new(ThreadPool::new(workers))
    }
}

/// Joins the source prefix and an EPN into the remote path handed to rsync.
fn epn_source_path(prefix: &str, epn: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), epn)
}
