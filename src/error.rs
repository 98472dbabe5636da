//! Centralized error types for mailsift.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailsift library.
///
/// Extraction itself never fails (bad encodings degrade to lossy text), and
/// classification failures are carried inside
/// [`Classification::Failed`](crate::classify::Classification). What is left
/// here are the faults a caller must handle: unreadable input, unparseable
/// messages and configuration problems.
#[derive(Error, Debug)]
pub enum MailsiftError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The raw bytes could not be parsed as an RFC 5322 message.
    #[error("MIME parsing error: {0}")]
    MimeError(String),

    /// A provider payload (e.g. Gmail JSON) did not have the expected shape.
    #[error("Invalid message payload: {0}")]
    InvalidPayload(String),

    /// The configuration file is unreadable or its values are unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The subword tokenizer tables could not be loaded.
    #[error("Tokenizer unavailable: {0}")]
    Tokenizer(String),

    /// The HTTP client for the completion endpoint could not be built.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// A label sink rejected a lookup, creation or attachment.
    #[error("Label sink error: {0}")]
    Sink(String),
}

/// Convenience alias for `Result<T, MailsiftError>`.
pub type Result<T> = std::result::Result<T, MailsiftError>;

impl MailsiftError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `MailsiftError::io`).
impl From<std::io::Error> for MailsiftError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

impl From<serde_json::Error> for MailsiftError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}
