//! Bearer credentials: account-credentials grant and single-flight refresh

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use recfetch_core::http::{SHARED_RUNTIME, http_client, read_text};
use recfetch_core::FetchError;
use serde::Deserialize;

/// Longest identity-provider error body echoed into an auth error
const MAX_ERROR_BODY: usize = 200;

/// Source of fresh bearer tokens (the identity provider).
pub trait TokenSource: Send + Sync {
    fn fetch_token(&self) -> Result<String, FetchError>;
}

/// Opaque bearer token plus the refresh generation that produced it.
///
/// Validity is not tracked client-side; the remote signals a rejected token
/// with HTTP 401 and the holder asks the broker for a replacement.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: Arc<str>,
    generation: u64,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Client-credentials grant against an OAuth token endpoint.
///
/// POSTs `grant_type=account_credentials&account_id=...` with HTTP basic
/// auth and reads `access_token` from the JSON response.
#[derive(Clone)]
pub struct AccountCredentials {
    pub oauth_url: String,
    pub account_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub read_timeout: Duration,
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("oauth_url", &self.oauth_url)
            .field("account_id", &self.account_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

impl TokenSource for AccountCredentials {
    fn fetch_token(&self) -> Result<String, FetchError> {
        let result = SHARED_RUNTIME.handle().block_on(async {
            let response = http_client()
                .post(&self.oauth_url)
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .query(&[
                    ("grant_type", "account_credentials"),
                    ("account_id", self.account_id.as_str()),
                ])
                .send()
                .await
                .map_err(FetchError::from_reqwest)?;
            let status = response.status().as_u16();
            let body = read_text(response, self.read_timeout).await?;
            Ok::<_, FetchError>((status, body))
        });

        let (status, body) = result.map_err(|e| FetchError::Auth {
            message: format!("token request failed: {e}"),
        })?;
        if !(200..300).contains(&status) {
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(FetchError::Auth {
                message: format!("identity provider returned HTTP {status}: {snippet}"),
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| FetchError::Auth {
            message: format!("malformed token response: {e}"),
        })?;
        if parsed.access_token.is_empty() {
            return Err(FetchError::Auth {
                message: "token response has no access_token".to_string(),
            });
        }
        Ok(parsed.access_token)
    }
}

/// Hands out the cached credential and replaces it when a caller reports it stale.
///
/// Refreshes are single-flight: callers that observed the same stale
/// credential queue on one lock, the first performs the identity call, the
/// rest receive its result.
pub struct CredentialBroker {
    source: Box<dyn TokenSource>,
    current: RwLock<Option<Credential>>,
    refresh_lock: Mutex<()>,
}

impl fmt::Debug for CredentialBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBroker")
            .field("current", &self.cached())
            .finish_non_exhaustive()
    }
}

impl CredentialBroker {
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return the cached credential, fetching one if none is held yet.
    pub fn acquire(&self) -> Result<Credential, FetchError> {
        if let Some(current) = self.cached() {
            return Ok(current);
        }
        self.replace(None)
    }

    /// Replace `stale` with a fresh credential.
    ///
    /// If another caller already replaced `stale`, its replacement is
    /// returned without contacting the identity provider again.
    pub fn refresh(&self, stale: &Credential) -> Result<Credential, FetchError> {
        self.replace(Some(stale.generation))
    }

    /// Currently held credential, if any
    pub fn cached(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, stale: Option<u64>) -> Result<Credential, FetchError> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let current = self.cached();
        if let Some(current) = &current {
            let superseded = stale.is_some_and(|g| g != current.generation);
            if stale.is_none() || superseded {
                return Ok(current.clone());
            }
        }

        let token = self.source.fetch_token()?;
        let generation = current.map_or(0, |c| c.generation) + 1;
        let credential = Credential {
            token: Arc::from(token),
            generation,
        };
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        log::debug!("Obtained credential (generation {generation})");
        Ok(credential)
    }
}
