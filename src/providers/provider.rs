use async_trait::async_trait;
use crate::error::AppError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct SearchCriteria {
    pub mailbox: String,
    pub query: String,
    pub max_results: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

/// One page of `users.messages.list`.
#[derive(Deserialize, Debug, Default)]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// `users.messages.get?format=raw` response. Keys not listed here are ignored.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub internal_date: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size_estimate: u64,
    #[serde(default)]
    pub raw: String,
}

// Gmail sends sizeEstimate as a number but some proxies stringify it.
fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// An HTTP client already carrying credentials for the mailbox.
#[derive(Clone, Debug)]
pub struct AuthorizedClient {
    pub http: reqwest::Client,
    pub token: String,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<AuthorizedClient, AppError>;
}

#[async_trait]
pub trait MailService: Send + Sync {
    async fn list_messages(
        &self,
        mailbox: &str,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage, AppError>;

    async fn get_raw_message(&self, mailbox: &str, id: &str) -> Result<RawMessage, AppError>;
}
