//! Single-asset retrieval with staged writes and atomic commit

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use indicatif::ProgressBar;
use recfetch_core::http::{HttpConfig, SHARED_RUNTIME, copy_body, http_client, read_text};
use recfetch_core::{FetchError, ShutdownFlag, retry_with_backoff, upgrade_to_bar};
use serde::Deserialize;

use crate::auth::{Credential, CredentialBroker};
use crate::naming::part_path;

/// Where the bearer token goes on an asset request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPlacement {
    /// `?access_token=<token>` appended to the download URL
    #[default]
    Query,
    /// `Authorization: Bearer <token>`
    Header,
}

impl FromStr for TokenPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "query" => Ok(Self::Query),
            "header" => Ok(Self::Header),
            other => Err(format!("unknown token placement '{other}' (query, header)")),
        }
    }
}

impl fmt::Display for TokenPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Header => "header",
        })
    }
}

/// Deletes the staging file unless the transfer was committed.
struct PartGuard {
    path: PathBuf,
    committed: bool,
}

impl PartGuard {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self, dest: &Path) -> io::Result<()> {
        fs::rename(&self.path, dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {e}", self.path.display());
            }
        }
    }
}

/// Streams remote assets to disk.
///
/// Bytes land in `<dest>.part` and are renamed to `dest` only after the
/// stream completed with a non-zero length, so the final path never holds a
/// partial file.
#[derive(Debug, Clone)]
pub struct Retriever {
    broker: Arc<CredentialBroker>,
    http: HttpConfig,
    placement: TokenPlacement,
    shutdown: ShutdownFlag,
}

impl Retriever {
    pub fn new(
        broker: Arc<CredentialBroker>,
        http: HttpConfig,
        placement: TokenPlacement,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            broker,
            http,
            placement,
            shutdown,
        }
    }

    pub fn broker(&self) -> &CredentialBroker {
        &self.broker
    }

    /// Download `url` to `dest`, returning the number of bytes committed.
    ///
    /// Transient failures are retried with backoff. A rejected credential is
    /// refreshed once per asset; a second rejection is [`FetchError::Auth`].
    pub fn fetch(
        &self,
        url: &str,
        dest: &Path,
        credential: &Credential,
        pb: &ProgressBar,
    ) -> Result<u64, FetchError> {
        let url = reqwest::Url::parse(url).map_err(|e| FetchError::Remote {
            status: None,
            body: format!("invalid download URL: {e}"),
        })?;
        let label = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut credential = credential.clone();
        let mut refreshed = false;
        loop {
            let result = retry_with_backoff(&label, &self.http, &self.shutdown, pb, || {
                self.transfer(&url, dest, &credential, pb)
            });
            match result {
                Err(FetchError::Unauthorized) if !refreshed => {
                    log::debug!("{label}: credential rejected, refreshing");
                    credential = self.broker.refresh(&credential)?;
                    refreshed = true;
                }
                Err(FetchError::Unauthorized) => {
                    return Err(FetchError::Auth {
                        message: format!("{label}: download rejected a freshly issued credential"),
                    });
                }
                other => return other,
            }
        }
    }

    fn transfer(
        &self,
        url: &reqwest::Url,
        dest: &Path,
        credential: &Credential,
        pb: &ProgressBar,
    ) -> Result<u64, FetchError> {
        if self.shutdown.is_requested() {
            return Err(FetchError::Cancelled);
        }
        let guard = PartGuard::new(part_path(dest));
        let mut out = BufWriter::new(File::create(&guard.path)?);
        pb.set_position(0);

        let read_timeout = self.http.read_timeout;
        let written = SHARED_RUNTIME.handle().block_on(async {
            let request = match self.placement {
                TokenPlacement::Query => http_client()
                    .get(url.clone())
                    .query(&[("access_token", credential.token())]),
                TokenPlacement::Header => {
                    http_client().get(url.clone()).bearer_auth(credential.token())
                }
            };
            let response = request.send().await.map_err(FetchError::from_reqwest)?;
            let status = response.status().as_u16();
            if status == 401 {
                return Err(FetchError::Unauthorized);
            }
            if !response.status().is_success() {
                let body = read_text(response, read_timeout).await.unwrap_or_default();
                return Err(FetchError::remote(status, &body));
            }
            if let Some(total) = response.content_length() {
                upgrade_to_bar(pb, total);
            }
            copy_body(response, &mut out, read_timeout, &self.shutdown, |n| {
                pb.set_position(n)
            })
            .await
        })?;

        let file = out.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;
        drop(file);

        if written == 0 {
            return Err(FetchError::EmptyDownload {
                path: dest.to_path_buf(),
            });
        }
        guard.commit(dest)?;
        Ok(written)
    }
}
