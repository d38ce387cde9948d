//! Unified error handling for the svitlo crate
//!
//! A single `Error` enum covers the ingestion pipeline and the serving
//! layer. The distinction that matters operationally:
//!
//! - ingestion failures ([`Error::SourceUnavailable`],
//!   [`Error::MalformedPublication`]) are recovered at the trigger
//!   boundary and never touch persisted state;
//! - client-input failures ([`Error::InvalidQueue`], [`Error::InvalidDate`])
//!   map to HTTP 400 and are never a system fault;
//! - [`Error::NotFound`] is a legitimately empty result, not a failure.

use std::io;

use thiserror::Error;

/// Unified error type for the svitlo crate
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream source could not be reached after retries
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Fetched content contained no recognizable schedule
    #[error("malformed publication: {0}")]
    MalformedPublication(String),

    /// Caller-supplied queue id fails validation
    #[error("invalid queue id: {0} (expected 1.1 \u{2013} 6.2)")]
    InvalidQueue(String),

    /// Caller-supplied date fails validation
    #[error("invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// Valid queue/date with no stored entry
    #[error("no schedule stored for queue {queue} on {date}")]
    NotFound { queue: String, date: String },

    /// An ingestion cycle awaited from a concurrent trigger failed
    #[error("ingestion failed: {0}")]
    Ingest(String),

    /// Database errors
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying the operation could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SourceUnavailable(_) | Self::Http(_) | Self::Io(_) => true,
            Self::MalformedPublication(_)
            | Self::InvalidQueue(_)
            | Self::InvalidDate(_)
            | Self::NotFound { .. }
            | Self::Ingest(_)
            | Self::Database(_)
            | Self::Config(_) => false,
        }
    }

    /// Whether the error was caused by caller input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidQueue(_) | Self::InvalidDate(_))
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(Error::SourceUnavailable("timeout".into()).is_recoverable());
        assert!(!Error::MalformedPublication("empty".into()).is_recoverable());
        assert!(!Error::InvalidQueue("7.1".into()).is_recoverable());
    }

    #[test]
    fn client_error_classification() {
        assert!(Error::InvalidQueue("7.1".into()).is_client_error());
        assert!(Error::InvalidDate("15.01.2026".into()).is_client_error());
        assert!(!Error::SourceUnavailable("down".into()).is_client_error());
        assert!(!Error::NotFound {
            queue: "1.1".into(),
            date: "2026-01-15".into()
        }
        .is_client_error());
    }

    #[test]
    fn display_names_the_valid_range() {
        let err = Error::InvalidQueue("7.1".to_string());
        assert!(err.to_string().contains("7.1"));
        assert!(err.to_string().contains("6.2"));
    }
}
