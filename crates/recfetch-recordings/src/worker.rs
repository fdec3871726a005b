//! Asset download workers

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use recfetch_core::{SharedProgress, ShutdownFlag, WorkQueue, upgrade_to_bar};

use crate::retrieve::Retriever;
use crate::state::AssetJob;
use crate::stats::AssetOutcome;

/// Download `jobs` on up to `workers` threads.
///
/// Outcomes are returned in job order. Jobs not started before shutdown
/// have no outcome.
pub fn process_assets(
    jobs: Vec<AssetJob>,
    retriever: &Retriever,
    workers: usize,
    progress: &SharedProgress,
    shutdown: &ShutdownFlag,
) -> Vec<AssetOutcome> {
    let queue = WorkQueue::new(jobs);
    if queue.is_empty() {
        return Vec::new();
    }
    let outcomes: Mutex<Vec<(usize, AssetOutcome)>> = Mutex::new(Vec::with_capacity(queue.total()));
    let is_tty = progress.is_tty();

    rayon::scope(|s| {
        for _ in 0..workers.clamp(1, queue.total()) {
            s.spawn(|_| {
                while let Some((idx, job)) = queue.claim() {
                    if shutdown.is_requested() {
                        break;
                    }
                    let outcome = process_asset(job, retriever, progress);
                    if !is_tty || outcome.result.is_err() {
                        outcome.log();
                    }
                    outcomes
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((idx, outcome));
                }
            });
        }
    });

    let mut outcomes = outcomes.into_inner().unwrap_or_else(PoisonError::into_inner);
    outcomes.sort_by_key(|(idx, _)| *idx);
    outcomes.into_iter().map(|(_, o)| o).collect()
}

fn process_asset(job: &AssetJob, retriever: &Retriever, progress: &SharedProgress) -> AssetOutcome {
    let start = Instant::now();
    let pb = progress.asset_bar(&job.label);
    if let Some(size) = job.size.filter(|s| *s > 0) {
        upgrade_to_bar(&pb, size);
    }
    pb.set_message("connecting...");

    let result = retriever
        .broker()
        .acquire()
        .and_then(|credential| retriever.fetch(&job.url, &job.dest, &credential, &pb));
    pb.finish_and_clear();

    AssetOutcome {
        label: job.label.clone(),
        result,
        elapsed: start.elapsed(),
    }
}
