//! Recordings listing API: wire types and the cursor paginator

use std::collections::VecDeque;

use indicatif::ProgressBar;
use recfetch_core::http::{HttpConfig, SHARED_RUNTIME, http_client, read_text};
use recfetch_core::{FetchError, ShutdownFlag, retry_with_backoff};
use serde::Deserialize;

use crate::auth::{Credential, CredentialBroker};
use crate::state::{AssetDescriptor, DateWindow, RecordSummary};

/// Largest page the listing endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 300;

/// One page of the listing response
#[derive(Debug, Default, Deserialize)]
pub struct RecordingsPage {
    #[serde(default)]
    pub meetings: Vec<Meeting>,
    /// Empty or missing on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl RecordingsPage {
    /// Continuation cursor, with the empty-string sentinel mapped to `None`
    pub fn cursor(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct Meeting {
    #[serde(default)]
    pub uuid: Option<String>,
    /// Numeric on the wire; kept loose so either form decodes
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub recording_files: Option<Vec<RecordingFile>>,
}

#[derive(Debug, Deserialize)]
pub struct RecordingFile {
    #[serde(default)]
    pub recording_type: Option<String>,
    #[serde(default)]
    pub file_extension: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl Meeting {
    pub fn into_record(self) -> RecordSummary {
        let id = match (self.uuid, &self.id) {
            (Some(uuid), _) if !uuid.is_empty() => uuid,
            (_, serde_json::Value::String(s)) => s.clone(),
            (_, serde_json::Value::Null) => String::new(),
            (_, other) => other.to_string(),
        };
        let title = self
            .topic
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        RecordSummary {
            id,
            title,
            start_time: self.start_time.unwrap_or_default(),
            assets: self
                .recording_files
                .unwrap_or_default()
                .into_iter()
                .map(RecordingFile::into_asset)
                .collect(),
        }
    }
}

impl RecordingFile {
    pub fn into_asset(self) -> AssetDescriptor {
        let kind = self
            .recording_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "file".to_string())
            .to_lowercase()
            .replace(' ', "_");
        let extension = self
            .file_extension
            .filter(|e| !e.is_empty())
            .or(self.file_type.filter(|t| !t.is_empty()))
            .unwrap_or_else(|| "dat".to_string())
            .to_lowercase();
        AssetDescriptor {
            kind,
            extension,
            url: self.download_url.filter(|u| !u.is_empty()),
            size: self.file_size,
        }
    }
}

/// Listing endpoint for one user's recordings
#[derive(Debug, Clone)]
pub struct RecordingsApi {
    listing_url: reqwest::Url,
    page_size: u32,
    http: HttpConfig,
}

/// Result of one page fetch: the page and the credential that fetched it
#[derive(Debug)]
pub struct PageStep {
    pub page: RecordingsPage,
    pub credential: Credential,
}

impl RecordingsApi {
    /// `api_base` is the versioned API root, e.g. `https://api.zoom.us/v2`
    pub fn new(
        api_base: &str,
        user_id: &str,
        page_size: u32,
        http: HttpConfig,
    ) -> Result<Self, FetchError> {
        let mut listing_url = reqwest::Url::parse(api_base).map_err(|e| FetchError::Remote {
            status: None,
            body: format!("invalid API base URL {api_base:?}: {e}"),
        })?;
        listing_url
            .path_segments_mut()
            .map_err(|()| FetchError::Remote {
                status: None,
                body: format!("API base URL cannot have a path: {api_base:?}"),
            })?
            .pop_if_empty()
            .extend(["users", user_id, "recordings"]);
        Ok(Self {
            listing_url,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            http,
        })
    }

    pub fn listing_url(&self) -> &str {
        self.listing_url.as_str()
    }

    /// Single request for one page; 401 maps to [`FetchError::Unauthorized`].
    pub fn fetch_page(
        &self,
        window: &DateWindow,
        cursor: Option<&str>,
        credential: &Credential,
    ) -> Result<RecordingsPage, FetchError> {
        let mut query = vec![
            ("from", window.start.to_string()),
            ("to", window.end.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("next_page_token", cursor.to_string()));
        }

        let (status, body) = SHARED_RUNTIME.handle().block_on(async {
            let response = http_client()
                .get(self.listing_url.clone())
                .bearer_auth(credential.token())
                .query(&query)
                .send()
                .await
                .map_err(FetchError::from_reqwest)?;
            let status = response.status().as_u16();
            let body = read_text(response, self.http.read_timeout).await?;
            Ok::<_, FetchError>((status, body))
        })?;

        match status {
            401 => Err(FetchError::Unauthorized),
            200..=299 => serde_json::from_str(&body).map_err(|e| FetchError::Remote {
                status: Some(status),
                body: format!("invalid listing JSON: {e}"),
            }),
            _ => Err(FetchError::remote(status, &body)),
        }
    }

    /// Fetch one page, retrying transient failures and refreshing the
    /// credential at most once on 401.
    pub fn step(
        &self,
        window: &DateWindow,
        cursor: Option<&str>,
        credential: Credential,
        broker: &CredentialBroker,
        shutdown: &ShutdownFlag,
    ) -> Result<PageStep, FetchError> {
        let label = format!("{window} page");
        let mut credential = credential;
        let mut refreshed = false;
        loop {
            let result = retry_with_backoff(
                &label,
                &self.http,
                shutdown,
                &ProgressBar::hidden(),
                || self.fetch_page(window, cursor, &credential),
            );
            match result {
                Ok(page) => return Ok(PageStep { page, credential }),
                Err(FetchError::Unauthorized) if !refreshed => {
                    log::debug!("{label}: credential rejected, refreshing");
                    credential = broker.refresh(&credential)?;
                    refreshed = true;
                }
                Err(FetchError::Unauthorized) => {
                    return Err(FetchError::Auth {
                        message: format!("listing {window} rejected a freshly issued credential"),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Lazily list every record in `window`, following cursors until exhausted.
    pub fn list_window<'a>(
        &'a self,
        window: DateWindow,
        credential: Credential,
        broker: &'a CredentialBroker,
        shutdown: &'a ShutdownFlag,
    ) -> RecordPages<'a> {
        RecordPages {
            api: self,
            broker,
            shutdown,
            window,
            cursor: Cursor::Start,
            buffered: VecDeque::new(),
            credential,
            pages: 0,
        }
    }
}

/// Paginator position
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    HasNextPage(String),
    Exhausted,
}

/// Pull-based iterator over one window's records.
///
/// A page is fetched only when the buffered records run out. After an error
/// is yielded the iterator is exhausted.
#[derive(Debug)]
pub struct RecordPages<'a> {
    api: &'a RecordingsApi,
    broker: &'a CredentialBroker,
    shutdown: &'a ShutdownFlag,
    window: DateWindow,
    cursor: Cursor,
    buffered: VecDeque<RecordSummary>,
    credential: Credential,
    pages: usize,
}

impl RecordPages<'_> {
    /// Credential used by the latest page fetch
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn fetch_next(&mut self, cursor: Option<String>) -> Result<(), FetchError> {
        if self.shutdown.is_requested() {
            return Err(FetchError::Cancelled);
        }
        let step = self.api.step(
            &self.window,
            cursor.as_deref(),
            self.credential.clone(),
            self.broker,
            self.shutdown,
        )?;
        self.credential = step.credential;
        self.pages += 1;

        let next = step.page.cursor().map(str::to_string);
        if next.is_some() && next == cursor {
            return Err(FetchError::Remote {
                status: None,
                body: format!("{}: listing cursor did not advance", self.window),
            });
        }
        log::debug!(
            "{}: page {} with {} records",
            self.window,
            self.pages,
            step.page.meetings.len()
        );
        self.cursor = next.map_or(Cursor::Exhausted, Cursor::HasNextPage);
        self.buffered
            .extend(step.page.meetings.into_iter().map(Meeting::into_record));
        Ok(())
    }
}

impl Iterator for RecordPages<'_> {
    type Item = Result<RecordSummary, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                return Some(Ok(record));
            }
            let cursor = match std::mem::replace(&mut self.cursor, Cursor::Exhausted) {
                Cursor::Exhausted => return None,
                Cursor::Start => None,
                Cursor::HasNextPage(c) => Some(c),
            };
            if let Err(e) = self.fetch_next(cursor) {
                self.cursor = Cursor::Exhausted;
                return Some(Err(e));
            }
        }
    }
}
