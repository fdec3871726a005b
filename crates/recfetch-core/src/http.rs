//! Shared HTTP client, runtime, and body helpers with stall detection.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but callers drive it synchronously through [`SHARED_RUNTIME`] so the
//! pipeline can run on plain worker threads.

use std::io::{self, Write};
use std::sync::LazyLock;
use std::time::Duration;

use futures_util::StreamExt;

use crate::error::FetchError;
use crate::shutdown::ShutdownFlag;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for remote calls, validated once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Longest wait for the next chunk (or a whole small body) before giving up
    pub read_timeout: Duration,
    /// Transient-failure retries per unit of work (0 = fail fast)
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry
    pub backoff_base: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(8)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

fn stall_error(read_timeout: Duration) -> FetchError {
    FetchError::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("read timeout ({}s with no data)", read_timeout.as_secs()),
    ))
}

/// Read a whole response body as text, bounded by `read_timeout`.
pub async fn read_text(
    response: reqwest::Response,
    read_timeout: Duration,
) -> Result<String, FetchError> {
    match tokio::time::timeout(read_timeout, response.text()).await {
        Ok(body) => body.map_err(FetchError::from_reqwest),
        Err(_) => Err(stall_error(read_timeout)),
    }
}

/// Stream a response body into `out`, returning the number of bytes written.
///
/// Each chunk must arrive within `read_timeout`. The shutdown flag is checked
/// between chunks. `on_progress` receives the running byte count. A body
/// shorter than its advertised `Content-Length` is [`FetchError::Truncated`].
pub async fn copy_body<W: Write>(
    response: reqwest::Response,
    out: &mut W,
    read_timeout: Duration,
    shutdown: &ShutdownFlag,
    mut on_progress: impl FnMut(u64),
) -> Result<u64, FetchError> {
    let expected = response.content_length();
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    loop {
        if shutdown.is_requested() {
            return Err(FetchError::Cancelled);
        }
        let next = match tokio::time::timeout(read_timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => return Err(stall_error(read_timeout)),
        };
        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(FetchError::from_reqwest)?;
        out.write_all(&chunk)?;
        written += chunk.len() as u64;
        on_progress(written);
    }

    match expected {
        Some(expected) if written < expected => Err(FetchError::Truncated {
            expected,
            received: written,
        }),
        _ => Ok(written),
    }
}
