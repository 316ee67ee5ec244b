use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use crate::error::AppError;
use super::provider::{AuthorizedClient, MailService, MessagePage, RawMessage};

pub struct GmailProvider {
    client: AuthorizedClient,
    base_url: String,
}

impl GmailProvider {
    pub fn new(client: AuthorizedClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self, mailbox: &str) -> String {
        format!(
            "{}/gmail/v1/users/{}/messages",
            self.base_url,
            urlencoding::encode(mailbox)
        )
    }
}

#[async_trait]
impl MailService for GmailProvider {
    async fn list_messages(
        &self,
        mailbox: &str,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage, AppError> {
        // Build query params
        let mut params = vec![
            format!("maxResults={}", page_size),
            format!("q={}", urlencoding::encode(query)),
        ];
        if let Some(token) = page_token {
            params.push(format!("pageToken={}", urlencoding::encode(token)));
        }
        let url = format!("{}?{}", self.messages_url(mailbox), params.join("&"));

        tracing::debug!(%url, "listing messages");
        let res = self
            .client
            .http
            .get(&url)
            .bearer_auth(&self.client.token)
            .send()
            .await?;

        let res = check_status(res, None).await?;
        let page: MessagePage = res.json().await?;
        Ok(page)
    }

    async fn get_raw_message(&self, mailbox: &str, id: &str) -> Result<RawMessage, AppError> {
        // Fetch RAW message (best for parsing fidelity)
        let url = format!(
            "{}/{}?format=raw",
            self.messages_url(mailbox),
            urlencoding::encode(id)
        );

        tracing::debug!(%id, "requesting raw message");
        let res = self
            .client
            .http
            .get(&url)
            .bearer_auth(&self.client.token)
            .send()
            .await?;

        let res = check_status(res, Some(id)).await?;
        let message: RawMessage = res.json().await?;
        Ok(message)
    }
}

/// Map a non-success Gmail response onto the error taxonomy.
async fn check_status(res: Response, message_id: Option<&str>) -> Result<Response, AppError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();
    let err = match (status, message_id) {
        (StatusCode::UNAUTHORIZED, _) => {
            AppError::Auth("Invalid or expired Google token".to_string())
        }
        // rateLimitExceeded / userRateLimitExceeded are retryable, not auth failures
        (StatusCode::FORBIDDEN, _) if !body.contains("ateLimitExceeded") => {
            AppError::Auth(format!("Access to the mailbox was denied: {}", body.trim()))
        }
        (StatusCode::NOT_FOUND, Some(id)) => AppError::NotFound(id.to_string()),
        _ => AppError::Transport(format!("Gmail API returned {}: {}", status, body.trim())),
    };
    Err(err)
}
