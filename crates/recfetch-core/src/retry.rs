//! Retry with exponential backoff for transient remote failures

use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::error::FetchError;
use crate::http::HttpConfig;
use crate::shutdown::ShutdownFlag;

/// Slice used to keep backoff sleeps responsive to shutdown
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Exponential backoff: base * 2^(attempt-1) (2s, 4s, 8s, ... for a 2s base)
pub fn backoff_duration(base: Duration, attempt: u32) -> Duration {
    base * 2u32.pow(attempt.saturating_sub(1).min(16))
}

/// Retry a fallible operation with exponential backoff.
///
/// On retryable errors, logs the failure, updates the progress bar, sleeps,
/// and retries up to `config.max_retries` times. Shutdown interrupts the
/// backoff sleep and ends with [`FetchError::Cancelled`].
///
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion / non-retryable error.
pub fn retry_with_backoff<T>(
    label: &str,
    config: &HttpConfig,
    shutdown: &ShutdownFlag,
    pb: &ProgressBar,
    mut attempt_fn: impl FnMut() -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    let max_retries = config.max_retries;
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                pb.set_message(format!("retry {attempt}/{max_retries}..."));
                log::debug!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying...");
                if !sleep_unless_shutdown(backoff_duration(config.backoff_base, attempt), shutdown)
                {
                    return Err(FetchError::Cancelled);
                }
            }
            Err(e) => {
                if !e.is_cancelled() {
                    log::debug!("{label}: giving up: {e}");
                }
                return Err(e);
            }
        }
    }
}

/// Sleep for `total`, waking early on shutdown. Returns false if interrupted.
fn sleep_unless_shutdown(total: Duration, shutdown: &ShutdownFlag) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if shutdown.is_requested() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
