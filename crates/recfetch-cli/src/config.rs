//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use recfetch_recordings::TokenPlacement;
use recfetch_recordings::config::{
    DEFAULT_API_BASE, DEFAULT_FOLDER_PREFIX, DEFAULT_OAUTH_URL, DEFAULT_USER_ID, DEFAULT_WORKERS,
};
use serde::Deserialize;

/// Environment fallbacks for the account section
pub const ENV_ACCOUNT_ID: &str = "RECFETCH_ACCOUNT_ID";
pub const ENV_CLIENT_ID: &str = "RECFETCH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "RECFETCH_CLIENT_SECRET";

/// File configuration for recfetch
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub account: AccountConfig,
    pub api: ApiConfig,
    pub output: OutputConfig,
    pub http: HttpFileConfig,
    pub workers: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            account: AccountConfig::default(),
            api: ApiConfig::default(),
            output: OutputConfig::default(),
            http: HttpFileConfig::default(),
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Identity-provider credentials; values may be `${VAR}` references
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub account_id: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub client_id: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub client_secret: Option<String>,
    pub user_id: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            account_id: std::env::var(ENV_ACCOUNT_ID).ok(),
            client_id: std::env::var(ENV_CLIENT_ID).ok(),
            client_secret: std::env::var(ENV_CLIENT_SECRET).ok(),
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("account_id", &self.account_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub oauth_url: String,
    pub page_size: u32,
    pub token_placement: TokenPlacement,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            page_size: 300,
            token_placement: TokenPlacement::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub folder_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./recordings"),
            folder_prefix: DEFAULT_FOLDER_PREFIX.to_string(),
        }
    }
}

/// HTTP tunables; timeouts in seconds, backoff in milliseconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpFileConfig {
    pub read_timeout: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for HttpFileConfig {
    fn default() -> Self {
        Self {
            read_timeout: 60,
            max_retries: 3,
            backoff_ms: 2000,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl FileConfig {
    /// Load configuration from `explicit`, or from default locations
    ///
    /// Search order:
    /// 1. `--config <path>` (must exist)
    /// 2. ./recfetch.toml (current directory)
    /// 3. <config dir>/recfetch/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local_config = PathBuf::from("recfetch.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "recfetch") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = FileConfig::default();
        assert_eq!(config.output.dir, PathBuf::from("./recordings"));
        assert_eq!(config.output.folder_prefix, "Recording");
        assert_eq!(config.api.page_size, 300);
        assert_eq!(config.api.token_placement, TokenPlacement::Query);
        assert_eq!(config.workers, 2);
        assert_eq!(config.http.max_retries, 3);
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("RECFETCH_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${RECFETCH_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("RECFETCH_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        std::env::set_var("RECFETCH_TEST_SECRET", "s3cret");
        let toml = r#"
workers = 4

[account]
account_id = "acct"
client_id = "cid"
client_secret = "${RECFETCH_TEST_SECRET}"
user_id = "someone@example.com"

[api]
page_size = 100
token_placement = "header"

[output]
dir = "/tmp/recordings"
folder_prefix = "Meeting"

[http]
read_timeout = 30
max_retries = 5
"#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        std::env::remove_var("RECFETCH_TEST_SECRET");

        assert_eq!(config.workers, 4);
        assert_eq!(config.account.account_id.as_deref(), Some("acct"));
        assert_eq!(config.account.client_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.account.user_id, "someone@example.com");
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.api.token_placement, TokenPlacement::Header);
        assert_eq!(config.api.base_url, DEFAULT_API_BASE);
        assert_eq!(config.output.dir, PathBuf::from("/tmp/recordings"));
        assert_eq!(config.output.folder_prefix, "Meeting");
        assert_eq!(config.http.read_timeout, 30);
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.backoff_ms, 2000);
    }

    #[test]
    fn unknown_token_placement_rejected() {
        let toml = r#"
[api]
token_placement = "cookie"
"#;
        assert!(toml::from_str::<FileConfig>(toml).is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let mut account = AccountConfig::default();
        account.client_secret = Some("hunter2".to_string());
        assert!(!format!("{account:?}").contains("hunter2"));
    }

    #[test]
    fn from_file_reads_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recfetch.toml");
        std::fs::write(&path, "[output]\nfolder_prefix = \"Lecture\"\n").unwrap();

        let config = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(config.output.folder_prefix, "Lecture");
        assert_eq!(config.output.dir, PathBuf::from("./recordings"));
        assert_eq!(config.api.base_url, DEFAULT_API_BASE);
    }

    #[test]
    fn malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recfetch.toml");
        std::fs::write(&path, "workers = \"many\"\n").unwrap();

        let err = FileConfig::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let err = FileConfig::load(Some(Path::new("/nonexistent/recfetch.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }
}
