//! Error taxonomy shared by the listing and retrieval stages

use std::path::PathBuf;

use chrono::NaiveDate;

/// Error from authenticating, listing, or retrieving a single unit of work.
///
/// `Unauthorized` is the raw "credential rejected" signal (HTTP 401). Callers
/// recover from it locally with one refresh; when the refreshed credential is
/// rejected too it is escalated to [`FetchError::Auth`].
#[derive(Debug)]
pub enum FetchError {
    /// Identity provider failure or repeated credential rejection
    Auth { message: String },
    /// The remote rejected the current credential
    Unauthorized,
    /// Non-auth HTTP/protocol failure; `status` is `None` for transport errors
    Remote { status: Option<u16>, body: String },
    /// Requested range ends before it starts
    InvalidRange { start: NaiveDate, end: NaiveDate },
    /// Transfer completed with zero bytes
    EmptyDownload { path: PathBuf },
    /// Stream ended before the advertised length
    Truncated { expected: u64, received: u64 },
    Io(std::io::Error),
    /// Shutdown was requested while the work was in flight
    Cancelled,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth { message } => write!(f, "authentication failed: {message}"),
            Self::Unauthorized => f.write_str("credential rejected (HTTP 401)"),
            Self::Remote {
                status: Some(s),
                body,
            } => write!(f, "HTTP {s}: {body}"),
            Self::Remote { status: None, body } => write!(f, "HTTP error: {body}"),
            Self::InvalidRange { start, end } => {
                write!(f, "invalid date range: {end} is before {start}")
            }
            Self::EmptyDownload { path } => {
                write!(f, "downloaded zero bytes for {}", path.display())
            }
            Self::Truncated { expected, received } => {
                write!(f, "stream truncated: {received} of {expected} bytes")
            }
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Longest response body kept in a [`FetchError::Remote`] for diagnostics
const MAX_BODY_CHARS: usize = 512;

impl FetchError {
    /// Create a remote error from a reqwest transport/status error.
    ///
    /// The URL is stripped so signed download links and tokens never reach logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Remote {
            status: e.status().map(|s| s.as_u16()),
            body: e.without_url().to_string(),
        }
    }

    /// Create a remote error from a non-success status and its body.
    pub fn remote(status: u16, body: &str) -> Self {
        let body: String = body.chars().take(MAX_BODY_CHARS).collect();
        Self::Remote {
            status: Some(status),
            body,
        }
    }

    /// Whether a fresh attempt after a backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // No status = connect/read failure; 429 = rate limit
            Self::Remote { status, .. } => {
                matches!(status, None | Some(429) | Some(500..=599))
            }
            Self::Truncated { .. } => true,
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
            Self::Auth { .. }
            | Self::Unauthorized
            | Self::InvalidRange { .. }
            | Self::EmptyDownload { .. }
            | Self::Cancelled => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short machine-friendly name used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } | Self::Unauthorized => "auth",
            Self::Remote { .. } => "remote",
            Self::InvalidRange { .. } => "invalid-range",
            Self::EmptyDownload { .. } => "empty",
            Self::Truncated { .. } => "truncated",
            Self::Io(_) => "io",
            Self::Cancelled => "cancelled",
        }
    }
}
