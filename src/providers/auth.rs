use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use crate::error::AppError;
use super::provider::{AuthorizedClient, Authenticator};

/// Authenticates with an already-issued OAuth access token.
///
/// Obtaining and refreshing the token happens outside this crate; this only
/// binds it to an HTTP client whose every call is bounded by `timeout`.
pub struct TokenAuthenticator {
    token: Option<String>,
    timeout: Duration,
}

impl TokenAuthenticator {
    pub fn new(token: Option<String>, timeout: Duration) -> Self {
        Self { token, timeout }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self) -> Result<AuthorizedClient, AppError> {
        let token = self
            .token
            .as_deref()
            .map(str::trim)
            .map(|t| t.trim_start_matches("Bearer ").trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Auth("GMAIL_ACCESS_TOKEN is not set".to_string()))?;

        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!("Using configured access token");
        Ok(AuthorizedClient {
            http,
            token: token.to_string(),
        })
    }
}
