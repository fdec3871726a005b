//! Lock-free job queue shared by a bounded pool of download workers

use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed list of jobs claimed one at a time by concurrent workers.
///
/// Each job is handed out exactly once; the claim order is the insertion order.
pub struct WorkQueue<T> {
    jobs: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new(jobs: Vec<T>) -> Self {
        Self {
            jobs,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next job together with its position in the queue
    pub fn claim(&self) -> Option<(usize, &T)> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.jobs.get(i).map(|job| (i, job))
    }

    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
