// src/error.rs
//! Error kinds shared across the bot.
//!
//! Each component seam gets its own enum so callers can decide what is fatal:
//! validation errors go back to the dashboard caller, fetch/dispatch errors end
//! up in the activity log, startup errors stop the process.

use reqwest::StatusCode;

/// Bad configuration input. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid `{field}`: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// News API failure. The current tick is skipped.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("news API key unauthorized")]
    Unauthorized,
    #[error("news API rate limit exceeded")]
    RateLimited,
    #[error("news API returned HTTP {0}")]
    Http(StatusCode),
    #[error("news API error: {0}")]
    Api(String),
    #[error("news API request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("news API response could not be decoded: {0}")]
    Decode(String),
    #[error("news API call timed out after {0}s")]
    Timeout(u64),
}

/// Messaging API failure for a single payload. The tick continues.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("messaging API credentials rejected")]
    Unauthorized,
    #[error("messaging API rate limit exceeded")]
    RateLimited,
    #[error("message rejected ({code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("messaging API returned HTTP {0}")]
    Http(StatusCode),
    #[error("messaging API request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("messaging API call timed out after {0}s")]
    Timeout(u64),
}

/// Missing credentials or unusable initial configuration. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("invalid initial configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
    #[error("could not load configuration from {path}: {message}")]
    ConfigSource { path: String, message: String },
}
