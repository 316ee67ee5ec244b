use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Gmail API transport error: {0}")]
    Transport(String),
    #[error("Message not found: {0}")]
    NotFound(String),
    #[error("Malformed message {id}: {reason}")]
    MalformedMessage { id: String, reason: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Transport(format!("request timed out: {}", e))
        } else {
            AppError::Transport(e.to_string())
        }
    }
}

impl AppError {
    /// Errors that end the whole run rather than a single message.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Auth(_) | AppError::Config(_))
    }
}
