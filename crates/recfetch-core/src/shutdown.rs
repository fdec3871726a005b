//! Graceful shutdown support via a shared atomic flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared between the signal handler and workers.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown was requested
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Request shutdown. Returns whether it had already been requested.
    ///
    /// Only touches an atomic, so it is safe to call from a signal handler.
    pub fn request(&self) -> bool {
        self.0.swap(true, Ordering::Relaxed)
    }
}
