//! Error types for EventFeed.
//!
//! Library crates use [`EventFeedError`] via `thiserror`.
//! The CLI wraps this with `color-eyre`; the server maps it to HTTP statuses.

use std::path::PathBuf;

/// Top-level error type for all EventFeed operations.
#[derive(Debug, thiserror::Error)]
pub enum EventFeedError {
    /// Configuration loading or validation error (including missing API keys).
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// Search provider returned an error response.
    #[error("search error: {0}")]
    Search(String),

    /// Language-model extraction failed (API error, malformed or invalid output).
    #[error("extraction error: {0}")]
    Extraction(String),

    /// The language-model provider rejected the call for quota / rate-limit reasons.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Parsing error (dates, config values, JSON).
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EventFeedError>;

impl EventFeedError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this failure should be reported as a quota / rate-limit problem.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }

    /// Reclassify an error returned by a language-model provider.
    ///
    /// Providers do not always surface a 429 status distinctly, so a provider
    /// failure whose message mentions `429` or `quota` becomes
    /// [`QuotaExceeded`](Self::QuotaExceeded). Apply this only to errors the
    /// provider produced, never to locally built messages.
    pub fn classify_provider(self) -> Self {
        let message = match &self {
            Self::QuotaExceeded(_) => return self,
            Self::Extraction(message) | Self::Network(message) => message,
            _ => return self,
        };
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("quota") {
            Self::QuotaExceeded(message.clone())
        } else {
            self
        }
    }

    /// Whether a bounded retry may help (transient transport or provider errors).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Search(_))
    }
}
