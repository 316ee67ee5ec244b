//! End-to-end pipeline tests against an in-memory mailbox.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use gmail_search::config::Config;
use gmail_search::error::AppError;
use gmail_search::model::SkipReason;
use gmail_search::pipeline::{CancellationFlag, Pipeline};
use gmail_search::providers::provider::{MailService, MessagePage, MessageRef, RawMessage};
use gmail_search::services::normalizer::MessageNormalizer;
use gmail_search::services::sanitizer::HtmlSanitizer;

enum Entry {
    Mime(&'static str),
    Missing,
    Unauthorized,
    Flaky,
}

#[derive(Default)]
struct FakeMailbox {
    order: Vec<&'static str>,
    entries: HashMap<&'static str, Entry>,
    /// Per-id fetch delay in milliseconds.
    delays: HashMap<&'static str, u64>,
    /// Trip this flag while fetching the given id.
    cancel_on: Option<(&'static str, CancellationFlag)>,
    search_fails: bool,
}

impl FakeMailbox {
    fn with(mut self, id: &'static str, entry: Entry) -> Self {
        self.order.push(id);
        self.entries.insert(id, entry);
        self
    }
}

#[async_trait]
impl MailService for FakeMailbox {
    async fn list_messages(
        &self,
        _mailbox: &str,
        _query: &str,
        page_size: u32,
        _page_token: Option<&str>,
    ) -> Result<MessagePage, AppError> {
        if self.search_fails {
            return Err(AppError::Transport("Gmail API returned 503".to_string()));
        }
        let messages = self
            .order
            .iter()
            .take(page_size as usize)
            .map(|id| MessageRef {
                id: id.to_string(),
                thread_id: format!("thread-{}", id),
            })
            .collect();
        Ok(MessagePage {
            messages,
            next_page_token: None,
        })
    }

    async fn get_raw_message(&self, _mailbox: &str, id: &str) -> Result<RawMessage, AppError> {
        if let Some(ms) = self.delays.get(id) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        if let Some((cancel_id, flag)) = &self.cancel_on {
            if *cancel_id == id {
                flag.cancel();
            }
        }
        match self.entries.get(id) {
            Some(Entry::Mime(mime)) => Ok(RawMessage {
                id: id.to_string(),
                thread_id: format!("thread-{}", id),
                internal_date: "1700000000000".to_string(),
                label_ids: vec!["SENT".to_string()],
                snippet: String::new(),
                size_estimate: mime.len() as u64,
                raw: URL_SAFE_NO_PAD.encode(mime),
            }),
            Some(Entry::Unauthorized) => Err(AppError::Auth("Invalid or expired Google token".into())),
            Some(Entry::Flaky) => Err(AppError::Transport("request timed out".into())),
            Some(Entry::Missing) | None => Err(AppError::NotFound(id.to_string())),
        }
    }
}

const SIMPLE: &str = "Subject: hello\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>hello</p>\n";

const NO_BOUNDARY: &str = "Subject: broken\n\
Content-Type: multipart/alternative\n\
\n\
<p>never parsed</p>\n";

const REPLY: &str = "From: me@example.com\r\n\
Subject: Re: lunch\r\n\
Content-Type: multipart/alternative; boundary=\"000000000000abcdef\"\r\n\
\r\n\
--000000000000abcdef\r\n\
Content-Type: text/plain; charset=\"UTF-8\"\r\n\
\r\n\
Works for me\r\n\
\r\n\
On Mon, Alice wrote:\r\n\
> lunch tomorrow?\r\n\
--000000000000abcdef\r\n\
Content-Type: text/html; charset=\"UTF-8\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
<div dir=3D\"ltr\">Works for me</div><br><div class=3D\"gmail_quote\"><div dir=\r\n\
=3D\"ltr\" class=3D\"gmail_attr\">On Mon, Alice wrote:<br></div><blockquote class=\r\n\
=3D\"gmail_quote\">lunch tomorrow?</blockquote></div>\r\n\
--000000000000abcdef--\r\n";

const TWO_HTML_PARTS: &str = "From: =?UTF-8?B?Sm9zw6k=?= <j@x.test>\n\
Subject: two parts\n\
Content-Type: multipart/alternative; boundary=b\n\
\n\
--b\n\
Content-Type: text/html\n\
\n\
<div>new text</div>\n\
--b\n\
Content-Type: text/html\n\
\n\
<div class=\"gmail_quote\">old quoted text</div>\n\
--b--\n";

fn config(concurrency: usize) -> Config {
    Config {
        concurrency,
        render_markdown: false,
        ..Config::default()
    }
}

fn pipeline(mailbox: FakeMailbox, config: &Config) -> Pipeline {
    let normalizer = Arc::new(MessageNormalizer::from_config(config).unwrap());
    Pipeline::new(Arc::new(mailbox), normalizer, config)
}

fn ids(report: &gmail_search::model::BatchReport) -> Vec<&str> {
    report.messages.iter().map(|m| m.id.as_str()).collect()
}

// ─── Test 1: malformed message is isolated ───────────────────────

#[tokio::test]
async fn test_malformed_message_is_skipped() {
    let mailbox = FakeMailbox::default()
        .with("1", Entry::Mime(SIMPLE))
        .with("2", Entry::Mime(SIMPLE))
        .with("3", Entry::Mime(NO_BOUNDARY))
        .with("4", Entry::Mime(SIMPLE))
        .with("5", Entry::Mime(SIMPLE));

    let report = pipeline(mailbox, &config(2))
        .run(&CancellationFlag::default())
        .await
        .unwrap();

    assert_eq!(ids(&report), vec!["1", "2", "4", "5"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "3");
    assert_eq!(report.skipped[0].reason, SkipReason::MalformedMessage);
}

// ─── Test 2: not-found and transport failures are per message ────

#[tokio::test]
async fn test_missing_and_flaky_messages_are_skipped() {
    let mailbox = FakeMailbox::default()
        .with("a", Entry::Mime(SIMPLE))
        .with("b", Entry::Missing)
        .with("c", Entry::Flaky)
        .with("d", Entry::Mime(SIMPLE));

    let report = pipeline(mailbox, &config(4))
        .run(&CancellationFlag::default())
        .await
        .unwrap();

    assert_eq!(ids(&report), vec!["a", "d"]);
    let reasons: Vec<(&str, SkipReason)> = report
        .skipped
        .iter()
        .map(|s| (s.id.as_str(), s.reason))
        .collect();
    assert_eq!(
        reasons,
        vec![("b", SkipReason::NotFound), ("c", SkipReason::TransportError)]
    );
}

// ─── Test 3: auth failure aborts the run ─────────────────────────

#[tokio::test]
async fn test_auth_failure_aborts() {
    let mailbox = FakeMailbox::default()
        .with("a", Entry::Mime(SIMPLE))
        .with("b", Entry::Unauthorized)
        .with("c", Entry::Mime(SIMPLE));

    let result = pipeline(mailbox, &config(1))
        .run(&CancellationFlag::default())
        .await;
    assert!(matches!(result, Err(AppError::Auth(_))));
}

#[tokio::test]
async fn test_search_failure_aborts() {
    let mailbox = FakeMailbox {
        search_fails: true,
        ..FakeMailbox::default()
    }
    .with("a", Entry::Mime(SIMPLE));

    let result = pipeline(mailbox, &config(1))
        .run(&CancellationFlag::default())
        .await;
    assert!(matches!(result, Err(AppError::Transport(_))));
}

// ─── Test 4: reply round trip ────────────────────────────────────

#[tokio::test]
async fn test_reply_quote_is_removed_and_stable() {
    let mailbox = FakeMailbox::default().with("r", Entry::Mime(REPLY));

    let report = pipeline(mailbox, &config(1))
        .run(&CancellationFlag::default())
        .await
        .unwrap();

    let msg = &report.messages[0];
    assert_eq!(msg.headers.subject.as_deref(), Some("Re: lunch"));
    assert!(msg.raw_html.contains("lunch tomorrow?"));
    assert!(msg.pretty_html.contains("Works for me"));
    assert!(!msg.pretty_html.contains("lunch tomorrow?"));
    assert!(!msg.pretty_html.contains("gmail_quote"));
    assert!(msg.quotes_removed);

    let sanitizer = HtmlSanitizer::default();
    assert_eq!(sanitizer.clean(&msg.pretty_html, true), msg.pretty_html);
}

#[tokio::test]
async fn test_quote_in_separate_html_part_is_removed() {
    let mailbox = FakeMailbox::default().with("q", Entry::Mime(TWO_HTML_PARTS));

    let report = pipeline(mailbox, &config(1))
        .run(&CancellationFlag::default())
        .await
        .unwrap();

    let msg = &report.messages[0];
    assert!(msg.raw_html.contains("old quoted text"));
    assert!(!msg.pretty_html.contains("old quoted text"));
    assert_eq!(msg.pretty_html, "<div>\n new text\n</div>\n");
    assert_eq!(msg.headers.from.as_deref(), Some("José <j@x.test>"));
}

#[tokio::test]
async fn test_quotes_kept_when_disabled() {
    let mailbox = FakeMailbox::default().with("r", Entry::Mime(REPLY));
    let config = Config {
        remove_quoted: false,
        ..config(1)
    };

    let report = pipeline(mailbox, &config)
        .run(&CancellationFlag::default())
        .await
        .unwrap();

    let msg = &report.messages[0];
    assert!(msg.pretty_html.contains("lunch tomorrow?"));
    assert!(!msg.quotes_removed);
}

// ─── Test 5: order and bounds ────────────────────────────────────

#[tokio::test]
async fn test_results_keep_search_order_despite_latency() {
    let mut mailbox = FakeMailbox::default()
        .with("slow", Entry::Mime(SIMPLE))
        .with("medium", Entry::Mime(SIMPLE))
        .with("fast", Entry::Mime(SIMPLE));
    mailbox.delays = HashMap::from([("slow", 60), ("medium", 30), ("fast", 0)]);

    let report = pipeline(mailbox, &config(3))
        .run(&CancellationFlag::default())
        .await
        .unwrap();
    assert_eq!(ids(&report), vec!["slow", "medium", "fast"]);
}

#[tokio::test]
async fn test_max_results_limits_fetches() {
    let mailbox = FakeMailbox::default()
        .with("1", Entry::Mime(SIMPLE))
        .with("2", Entry::Mime(SIMPLE))
        .with("3", Entry::Mime(SIMPLE));
    let config = Config {
        max_results: 2,
        ..config(2)
    };

    let report = pipeline(mailbox, &config)
        .run(&CancellationFlag::default())
        .await
        .unwrap();
    assert_eq!(ids(&report), vec!["1", "2"]);
}

// ─── Test 6: cancellation ────────────────────────────────────────

#[tokio::test]
async fn test_cancellation_stops_new_fetches() {
    let cancel = CancellationFlag::default();
    let mut mailbox = FakeMailbox::default()
        .with("1", Entry::Mime(SIMPLE))
        .with("2", Entry::Mime(SIMPLE))
        .with("3", Entry::Mime(SIMPLE))
        .with("4", Entry::Mime(SIMPLE));
    mailbox.cancel_on = Some(("2", cancel.clone()));

    let report = pipeline(mailbox, &config(1)).run(&cancel).await.unwrap();

    // "2" was already in flight when the flag tripped and still completes.
    assert_eq!(ids(&report), vec!["1", "2"]);
    assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_returns_empty_report() {
    let cancel = CancellationFlag::default();
    cancel.cancel();
    let mailbox = FakeMailbox::default().with("1", Entry::Mime(SIMPLE));

    let report = pipeline(mailbox, &config(1)).run(&cancel).await.unwrap();
    assert!(report.messages.is_empty());
}
