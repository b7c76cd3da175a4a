//! Error types for feedgen operations.
//!
//! This module defines the main error type [`FeedgenError`] which represents
//! every failure that aborts a source's run: configuration problems detected
//! ahead of time, transport failures, and markup, feed or state parse errors.
//!
//! Field-level problems (a link without `href`, a timestamp that does not
//! match its format) are not errors. They are reported as
//! [`FieldIssue`](crate::extract::FieldIssue) diagnostics next to the
//! extracted records.
//!
//! # Example
//!
//! ```rust
//! use feedgen_core::{FeedgenError, Result};
//!
//! fn require_url(url: &str) -> Result<&str> {
//!     if url.is_empty() {
//!         return Err(FeedgenError::ConfigError("no url has been set for this feed".to_string()));
//!     }
//!     Ok(url)
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for feed generation.
///
/// # Example
///
/// ```rust
/// use feedgen_core::{FeedgenError, compile};
///
/// match compile("div[[") {
///     Ok(_) => unreachable!(),
///     Err(FeedgenError::InvalidSelector { selector, .. }) => assert_eq!(selector, "div[["),
///     Err(e) => panic!("unexpected error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum FeedgenError {
    /// HTTP request errors from reqwest.
    ///
    /// This variant wraps network errors, DNS failures, connection issues,
    /// and other HTTP-related problems.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed")]
    HttpError(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("Request to {url} failed with status {status}")]
    HttpStatus { status: u16, url: String },

    /// Request timeout.
    ///
    /// Returned when an HTTP request exceeds the configured timeout duration.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTML parsing or rendering errors.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// A selector string could not be compiled.
    ///
    /// Surfaced when a source is constructed, before anything is fetched.
    #[error("Invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    /// The field map has no `Container` selector.
    #[error("Missing an item Container selector")]
    MissingContainer,

    /// A timestamp format string could not be compiled.
    #[error("Invalid time format `{format}`: {message}")]
    InvalidTimeFormat { format: String, message: String },

    /// Source configuration errors.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An upstream RSS/Atom/JSON feed could not be parsed.
    #[error("Failed to parse upstream feed: {0}")]
    FeedParseError(String),

    /// A structured API answered with an unexpected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Persisted reconciliation state exists but could not be decoded.
    #[error("Corrupt state file {path}: {message}")]
    StateError { path: PathBuf, message: String },

    /// Output document could not be written.
    #[error("Failed to serialize feed: {0}")]
    Serialization(String),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for FeedgenError.
///
/// This is a convenience alias for `std::result::Result<T, FeedgenError>`.
pub type Result<T> = std::result::Result<T, FeedgenError>;
