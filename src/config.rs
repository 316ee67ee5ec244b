use std::path::PathBuf;
use std::str::FromStr;

use dotenvy::dotenv;

pub const DEFAULT_MAILBOX: &str = "me";
pub const DEFAULT_QUERY: &str = "from:me";
pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const DEFAULT_QUOTE_SELECTOR: &str = ".gmail_quote";
pub const DEFAULT_FALLBACK_CHARSET: &str = "UTF-8";
pub const DEFAULT_API_BASE_URL: &str = "https://gmail.googleapis.com";

#[derive(Clone, Debug)]
pub struct Config {
    /// `me` means the authenticated account.
    pub mailbox: String,
    pub query: String,
    pub max_results: u32,
    pub remove_quoted: bool,
    pub render_markdown: bool,
    pub quote_selector: String,
    pub fallback_charset: String,
    /// Upper bound on messages fetched and normalized at the same time.
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub api_base_url: String,
    pub output_dir: PathBuf,
    /// Also write every record to `<id>.json`.
    pub save_each: bool,
    pub access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mailbox: DEFAULT_MAILBOX.to_string(),
            query: DEFAULT_QUERY.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            remove_quoted: true,
            render_markdown: true,
            quote_selector: DEFAULT_QUOTE_SELECTOR.to_string(),
            fallback_charset: DEFAULT_FALLBACK_CHARSET.to_string(),
            concurrency: 4,
            timeout_secs: 30,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            output_dir: PathBuf::from("."),
            save_each: false,
            access_token: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, anyhow::Error> {
        dotenv().ok(); // Load .env if present (dev mode)

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let config = Self {
            mailbox: get("GMAIL_MAILBOX").unwrap_or(defaults.mailbox),
            query: get("GMAIL_QUERY").unwrap_or(defaults.query),
            max_results: parse_or("GMAIL_MAX_RESULTS", get("GMAIL_MAX_RESULTS"), defaults.max_results)?,
            remove_quoted: parse_flag("GMAIL_REMOVE_QUOTED", get("GMAIL_REMOVE_QUOTED"), defaults.remove_quoted)?,
            render_markdown: parse_flag("GMAIL_RENDER_MARKDOWN", get("GMAIL_RENDER_MARKDOWN"), defaults.render_markdown)?,
            quote_selector: get("GMAIL_QUOTE_SELECTOR").unwrap_or(defaults.quote_selector),
            fallback_charset: get("GMAIL_FALLBACK_CHARSET").unwrap_or(defaults.fallback_charset),
            concurrency: parse_or("GMAIL_CONCURRENCY", get("GMAIL_CONCURRENCY"), defaults.concurrency)?,
            timeout_secs: parse_or("GMAIL_TIMEOUT_SECS", get("GMAIL_TIMEOUT_SECS"), defaults.timeout_secs)?,
            api_base_url: get("GMAIL_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            output_dir: get("GMAIL_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            save_each: parse_flag("GMAIL_SAVE_EACH", get("GMAIL_SAVE_EACH"), defaults.save_each)?,
            access_token: get("GMAIL_ACCESS_TOKEN"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_results == 0 {
            anyhow::bail!("GMAIL_MAX_RESULTS must be a positive integer");
        }
        if self.concurrency == 0 {
            anyhow::bail!("GMAIL_CONCURRENCY must be a positive integer");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("GMAIL_TIMEOUT_SECS must be a positive integer");
        }
        if encoding_rs::Encoding::for_label(self.fallback_charset.as_bytes()).is_none() {
            anyhow::bail!("GMAIL_FALLBACK_CHARSET '{}' is not a known charset", self.fallback_charset);
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, anyhow::Error> {
    match value {
        Some(v) => v
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", key, v)),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, value: Option<String>, default: bool) -> Result<bool, anyhow::Error> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow::anyhow!("{} must be a boolean, got '{}'", key, other)),
    }
}
