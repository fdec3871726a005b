//! Pipeline state types: date windows, listed records, and download jobs

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use recfetch_core::FetchError;

/// Inclusive date range submitted to the listing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Build a window, rejecting `end < start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FetchError> {
        if end < start {
            return Err(FetchError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days covered (inclusive)
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One downloadable (or not) file attached to a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    /// Normalized kind, e.g. `audio_only`, `shared_screen_with_speaker_view`
    pub kind: String,
    /// Lowercased extension without the dot
    pub extension: String,
    /// `None` means the remote offers no download for this file
    pub url: Option<String>,
    /// Size advertised by the listing, used for progress only
    pub size: Option<u64>,
}

impl AssetDescriptor {
    /// Unsanitized `kind.ext` file name
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.kind, self.extension)
    }

    pub fn is_downloadable(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// A dated, multi-file record as listed by the remote library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub id: String,
    pub title: String,
    /// Start timestamp exactly as the remote reported it
    pub start_time: String,
    pub assets: Vec<AssetDescriptor>,
}

impl RecordSummary {
    /// Calendar date of the record start, normalized to UTC.
    ///
    /// Accepts RFC 3339 timestamps; timestamps without an offset are taken as
    /// UTC, and a bare `YYYY-MM-DD` date is accepted as is.
    pub fn date(&self) -> Result<NaiveDate, FetchError> {
        let raw = self.start_time.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc).date_naive());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Ok(dt.date());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| FetchError::Remote {
            status: None,
            body: format!("record {}: bad start_time {raw:?}: {e}", self.id),
        })
    }
}

/// A resolved download: where to fetch from and where to commit to
#[derive(Debug, Clone)]
pub struct AssetJob {
    /// Record folder name plus file name, for logs and bars
    pub label: String,
    pub url: String,
    pub dest: PathBuf,
    pub size: Option<u64>,
}
