//! recfetch core - shared infrastructure for the recordings pipeline
//!
//! HTTP plumbing, error classification, retry, cancellation, work
//! distribution, progress bars and logging used by the pipeline crates.

pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod work_queue;

// Re-exports for convenience
pub use error::FetchError;
pub use http::{HttpConfig, SHARED_RUNTIME, copy_body, http_client, read_text};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num, upgrade_to_bar};
pub use retry::{backoff_duration, retry_with_backoff};
pub use shutdown::ShutdownFlag;
pub use work_queue::WorkQueue;
