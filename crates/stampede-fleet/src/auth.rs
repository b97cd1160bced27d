//! Token bootstrap
//!
//! Out-of-band HTTP exchange that turns a username and password into the
//! token a client presents on its connect URL. Nothing here touches the
//! connection or its retry budget.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Shown when the server rejects a request without saying why
pub const FALLBACK_MESSAGE: &str = "unknown error";

/// Per-request limit when none is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("login succeeded but no token was issued")]
    MissingToken,
}

/// Body returned by both `/register` and `/login`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl AuthResponse {
    fn into_result(self) -> Result<Self, AuthError> {
        if self.success {
            return Ok(self);
        }
        let message = self
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        Err(AuthError::Rejected(message))
    }
}

/// HTTP client for the game server's account endpoints
#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
    client: reqwest::Client,
}

impl AuthClient {
    /// Client for `base_url`. Every request, body included, must finish within
    /// `timeout` or it fails with [`AuthError::Http`].
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.post("register", username, password).await?;
        Ok(())
    }

    /// Log in and return the issued token
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        self.post("login", username, password)
            .await?
            .token
            .ok_or(AuthError::MissingToken)
    }

    async fn post(&self, path: &str, username: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {} as {}", url, username);

        let response: AuthResponse = self
            .client
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?
            .json()
            .await?;

        response.into_result()
    }
}
