//! Runtime configuration, validated once before a run

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use recfetch_core::{FetchError, HttpConfig};

use crate::api::MAX_PAGE_SIZE;
use crate::auth::AccountCredentials;
use crate::retrieve::TokenPlacement;

pub const DEFAULT_API_BASE: &str = "https://api.zoom.us/v2";
pub const DEFAULT_OAUTH_URL: &str = "https://zoom.us/oauth/token";
/// `me` resolves to the user owning the credentials
pub const DEFAULT_USER_ID: &str = "me";
pub const DEFAULT_FOLDER_PREFIX: &str = "Recording";
pub const DEFAULT_WORKERS: usize = 2;
pub const MAX_WORKERS: usize = 8;

/// Runtime configuration for a recordings run
#[derive(Clone)]
pub struct Config {
    pub account_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_id: String,
    /// Inclusive date range
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub output_dir: PathBuf,
    pub folder_prefix: String,
    pub api_base: String,
    pub oauth_url: String,
    pub page_size: u32,
    pub workers: usize,
    pub token_placement: TokenPlacement,
    pub http: HttpConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("account_id", &self.account_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("output_dir", &self.output_dir)
            .field("folder_prefix", &self.folder_prefix)
            .field("api_base", &self.api_base)
            .field("oauth_url", &self.oauth_url)
            .field("page_size", &self.page_size)
            .field("workers", &self.workers)
            .field("token_placement", &self.token_placement)
            .field("http", &self.http)
            .finish()
    }
}

impl Config {
    /// Config for `[start, end]` with default endpoints and tunables.
    ///
    /// Credentials are left empty; [`Config::validate`] rejects them until set.
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            account_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            user_id: DEFAULT_USER_ID.to_string(),
            start,
            end,
            output_dir: PathBuf::from("recordings"),
            folder_prefix: DEFAULT_FOLDER_PREFIX.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            page_size: MAX_PAGE_SIZE,
            workers: DEFAULT_WORKERS,
            token_placement: TokenPlacement::default(),
            http: HttpConfig::default(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.end < self.start {
            return Err(FetchError::InvalidRange {
                start: self.start,
                end: self.end,
            }
            .into());
        }
        for (name, value) in [
            ("account id", &self.account_id),
            ("client id", &self.client_id),
            ("client secret", &self.client_secret),
            ("user id", &self.user_id),
        ] {
            anyhow::ensure!(!value.trim().is_empty(), "{name} is required");
        }
        anyhow::ensure!(
            (1..=MAX_PAGE_SIZE).contains(&self.page_size),
            "page size must be 1..={MAX_PAGE_SIZE}, got {}",
            self.page_size
        );
        anyhow::ensure!(
            (1..=MAX_WORKERS).contains(&self.workers),
            "workers must be 1..={MAX_WORKERS}, got {}",
            self.workers
        );
        for (name, url) in [("API base", &self.api_base), ("OAuth", &self.oauth_url)] {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| anyhow::anyhow!("{name} URL {url:?} is invalid: {e}"))?;
            anyhow::ensure!(
                matches!(parsed.scheme(), "http" | "https"),
                "{name} URL must be http(s): {url}"
            );
        }
        anyhow::ensure!(
            !self.http.read_timeout.is_zero(),
            "read timeout must be positive"
        );
        Ok(())
    }

    /// Identity-provider client built from this config
    pub fn credentials(&self) -> AccountCredentials {
        AccountCredentials {
            oauth_url: self.oauth_url.clone(),
            account_id: self.account_id.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            read_timeout: self.http.read_timeout,
        }
    }
}
