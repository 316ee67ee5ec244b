use serde::{Deserialize, Serialize};

/// Top-level headers copied onto a record. Absent headers are not serialized.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    #[serde(rename = "From", skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(rename = "To", skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(rename = "Subject", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "Date", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "Message-ID", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(rename = "In-Reply-To", skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

/// One fetched message with its HTML body decoded and cleaned.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    pub id: String,
    pub thread_id: String,
    pub internal_date: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub size_estimate: u64,
    #[serde(flatten)]
    pub headers: MessageHeaders,
    pub raw_html: String,
    pub pretty_html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    pub quotes_removed: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    MalformedMessage,
    TransportError,
    Internal,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SkippedMessage {
    pub id: String,
    pub reason: SkipReason,
    pub detail: String,
}

/// Outcome of one run: records in search order plus the ids that were skipped.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BatchReport {
    pub messages: Vec<NormalizedMessage>,
    pub skipped: Vec<SkippedMessage>,
}
