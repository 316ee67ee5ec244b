use crate::config::Config;
use crate::error::AppError;
use crate::model::{MessageHeaders, NormalizedMessage};
use crate::providers::provider::RawMessage;

use super::charset::CharsetDetector;
use super::decoder::{decode_base64_body, decode_base64_url, decode_quoted_printable, decode_text};
use super::markdown::MarkdownRenderer;
use super::mime::{self, MimeMessage, MimePart};
use super::sanitizer::HtmlSanitizer;

/// Turns one raw Gmail message into a [`NormalizedMessage`].
///
/// Stateless apart from its configuration, so one instance is shared by every
/// worker.
#[derive(Clone, Debug, Default)]
pub struct MessageNormalizer {
    detector: CharsetDetector,
    sanitizer: HtmlSanitizer,
    markdown: Option<MarkdownRenderer>,
}

impl MessageNormalizer {
    pub fn new(
        detector: CharsetDetector,
        sanitizer: HtmlSanitizer,
        markdown: Option<MarkdownRenderer>,
    ) -> Self {
        Self {
            detector,
            sanitizer,
            markdown,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self::new(
            CharsetDetector::new(config.fallback_charset.clone()),
            HtmlSanitizer::new(&config.quote_selector)?,
            config.render_markdown.then(MarkdownRenderer::default),
        ))
    }

    pub fn normalize(
        &self,
        raw: &RawMessage,
        remove_quoted: bool,
    ) -> Result<NormalizedMessage, AppError> {
        let malformed = |reason: String| AppError::MalformedMessage {
            id: raw.id.clone(),
            reason,
        };

        let document = decode_base64_url(&raw.raw)
            .map_err(|e| malformed(format!("raw field is not base64url: {}", e)))?;
        let message = mime::parse(&document).map_err(|e| malformed(e.to_string()))?;

        let html_parts: Vec<String> = message
            .root
            .leaves()
            .into_iter()
            .filter(|part| part.content_type == "text/html")
            .map(|part| self.decode_part(part))
            .collect();

        tracing::debug!(id = %raw.id, html_parts = html_parts.len(), "decoded message body");

        let raw_html = html_parts.join("\n");
        let (pretty_html, markdown) = if raw_html.is_empty() {
            (String::new(), self.markdown.as_ref().map(|_| String::new()))
        } else {
            let pretty = self.sanitizer.clean(&raw_html, remove_quoted);
            let markdown = self.markdown.as_ref().map(|r| r.render(&pretty));
            (pretty, markdown)
        };

        Ok(NormalizedMessage {
            id: raw.id.clone(),
            thread_id: raw.thread_id.clone(),
            internal_date: raw.internal_date.clone(),
            label_ids: raw.label_ids.clone(),
            snippet: raw.snippet.clone(),
            size_estimate: raw.size_estimate,
            headers: extract_headers(message),
            raw_html,
            pretty_html,
            markdown,
            quotes_removed: remove_quoted,
        })
    }

    /// Transfer-decode a leaf, then decode its text with the detected charset.
    fn decode_part(&self, part: &MimePart) -> String {
        let (bytes, serialized) = match part.transfer_encoding().as_deref() {
            Some("base64") => {
                let bytes = decode_base64_body(&part.body);
                // Detect against the decoded payload; the base64 text says nothing.
                let serialized = part.to_bytes_with_body(&bytes);
                (bytes, serialized)
            }
            _ => (decode_quoted_printable(&part.body), part.to_bytes()),
        };
        let charset = self.detector.detect(&serialized);
        decode_text(&bytes, &charset)
    }
}

/// Subject, From and To come back RFC 2047 decoded; the rest as sent.
fn extract_headers(message: MimeMessage) -> MessageHeaders {
    let root = &message.root;
    let get = |name: &str| root.header(name).map(str::to_string);

    MessageHeaders {
        from: message.from.or_else(|| get("From")),
        to: message.to.or_else(|| get("To")),
        subject: message.subject.or_else(|| get("Subject")),
        date: get("Date"),
        message_id: get("Message-ID"),
        in_reply_to: get("In-Reply-To"),
    }
}
