//! Access tokens for the Gmail API from a stored refresh token.
//!
//! The interactive consent flow happens elsewhere; this only reads the
//! authorized-user token file it leaves behind and keeps a short-lived
//! access token fresh.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::MailError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Contents of an authorized-user token file.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Last access token, if the file carries one.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Refresh-token backed access-token source.
pub struct TokenSource {
    http: reqwest::Client,
    credentials: AuthorizedUser,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(credentials: AuthorizedUser) -> Self {
        let cached = match (&credentials.token, &credentials.expiry) {
            (Some(token), Some(expiry)) => DateTime::parse_from_rfc3339(expiry)
                .ok()
                .map(|at| CachedToken {
                    access_token: token.clone(),
                    expires_at: at.with_timezone(&Utc),
                }),
            _ => None,
        };

        Self {
            http: reqwest::Client::new(),
            credentials,
            cached: Mutex::new(cached),
        }
    }

    /// Load credentials from an authorized-user JSON file.
    pub async fn from_file(path: &Path) -> Result<Self, MailError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MailError::TokenFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let credentials: AuthorizedUser =
            serde_json::from_str(&raw).map_err(|e| MailError::TokenFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self::new(credentials))
    }

    /// A currently valid access token, refreshing if needed.
    pub async fn access_token(&self) -> Result<String, MailError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh(Utc::now())
        {
            return Ok(token.access_token.clone());
        }

        let fresh = self.refresh().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn refresh(&self) -> Result<CachedToken, MailError> {
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http
            .post(&self.credentials.token_uri)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::AuthFailed(format!(
                "token refresh returned {status}: {body}"
            )));
        }

        let token: TokenResponse = resp.json().await?;
        tracing::debug!(expires_in = token.expires_in, "Refreshed Gmail access token");
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}
