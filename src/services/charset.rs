use std::sync::LazyLock;

use chardetng::EncodingDetector;
use regex::bytes::Regex;

use super::decoder::decode_quoted_printable;

static CHARSET_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*"?([A-Za-z0-9._:\-]+)"?"#).expect("valid charset regex")
});

/// Works out which charset a MIME part's text is written in.
#[derive(Clone, Debug)]
pub struct CharsetDetector {
    fallback: String,
}

impl Default for CharsetDetector {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FALLBACK_CHARSET)
    }
}

impl CharsetDetector {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
        }
    }

    /// Declared `charset=` parameter, else a statistical guess, else the fallback.
    ///
    /// `part` is the serialized part (headers and still-encoded body).
    pub fn detect(&self, part: &[u8]) -> String {
        if let Some(declared) = declared_charset(part) {
            return declared;
        }
        if let Some(guessed) = guess_charset(&decode_quoted_printable(part)) {
            tracing::debug!(charset = %guessed, "guessed charset from content");
            return guessed;
        }
        self.fallback.clone()
    }
}

/// First `charset=` parameter whose label the decoder recognises, as written.
fn declared_charset(part: &[u8]) -> Option<String> {
    CHARSET_PARAM
        .captures_iter(part)
        .filter_map(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
        .find(|label| encoding_rs::Encoding::for_label(label.as_bytes()).is_some())
}

/// Byte-level guess. Empty and pure-ASCII input carry no signal.
fn guess_charset(bytes: &[u8]) -> Option<String> {
    if bytes.is_ascii() {
        return None;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Some("UTF-8".to_string());
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    Some(detector.guess(None, true).name().to_string())
}
