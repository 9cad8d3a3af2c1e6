//! Error types for medline-dl
//!
//! This module provides the error handling for the library:
//! - A single crate-level [`Error`] with one variant per failure kind
//! - [`FormatError`] for malformed compressed streams and markup documents
//! - Classification of `std::io::Error` values that carry a [`FormatError`]

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for medline-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for medline-dl
///
/// Per-file failures are reported individually in
/// [`DownloadReport`](crate::types::DownloadReport) and
/// [`ExtractionReport`](crate::types::ExtractionReport); only a failed listing
/// request is fatal to a whole run.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency_limit")
        key: Option<String>,
    },

    /// The remote endpoint could not be reached or refused the request
    #[error("connection to {url} failed: {reason}")]
    Connection {
        /// The URL that was requested
        url: String,
        /// What went wrong (transport error or HTTP status)
        reason: String,
    },

    /// A compressed stream or markup document is malformed
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A record node lacks its mandatory identifier
    #[error("malformed record #{index}: {reason}")]
    MalformedRecord {
        /// 1-based position of the record node within its document
        index: usize,
        /// Why the record was rejected
        reason: String,
    },

    /// A file appeared at the target path while the download was in flight
    #[error("target already exists: {path}")]
    TargetExists {
        /// The target path that was not overwritten
        path: PathBuf,
    },

    /// The operation was cancelled before it completed
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

/// Malformed input data
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// The byte stream is not valid gzip data
    #[error("invalid gzip stream: {reason}")]
    Gzip {
        /// Decoder message
        reason: String,
    },

    /// The document is not well-formed markup
    #[error("malformed document at byte {position}: {reason}")]
    Markup {
        /// Byte offset in the decompressed document where parsing failed
        position: u64,
        /// Parser message
        reason: String,
    },
}

impl Error {
    /// Create a configuration error for `key`
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Create a connection error for `url`
    pub fn connection(url: impl Into<String>, reason: impl ToString) -> Self {
        Error::Connection {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify an I/O error, unwrapping a [`FormatError`] raised inside a reader.
    ///
    /// [`GzipStream`](crate::decompress::GzipStream) reports corrupt input as an
    /// `io::Error` whose payload is a `FormatError`; everything else stays `Io`.
    /// A `reqwest::Error` surfacing from a streamed response body becomes
    /// `Connection`.
    pub fn from_io(err: std::io::Error) -> Self {
        if let Some(http) = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        {
            return Error::Connection {
                url: http.url().map(|u| u.to_string()).unwrap_or_default(),
                reason: http.to_string(),
            };
        }
        if !err.get_ref().is_some_and(|inner| inner.is::<FormatError>()) {
            return Error::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<FormatError>()) {
            Some(Ok(format)) => Error::Format(*format),
            _ => Error::Io(std::io::Error::other("format error payload lost")),
        }
    }

    /// Short machine-readable name of the error kind, used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Connection { .. } => "connection_error",
            Error::Format(_) => "format_error",
            Error::MalformedRecord { .. } => "malformed_record",
            Error::TargetExists { .. } => "target_exists",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io_error",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::from_io(err)
    }
}

impl From<FormatError> for std::io::Error {
    fn from(err: FormatError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}
