//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request timed out. Worth another attempt.
    #[display("timed out fetching '{_0}'")]
    Timeout(#[error(not(source))] String),
    /// Connection refused, DNS failure, TLS failure and friends.
    #[display("network error fetching '{_0}'")]
    Network(#[error(not(source))] String),
    /// The server answered with a non-success status.
    #[display("HTTP {_1} fetching '{_0}'")]
    Status(#[error(not(source))] String, u16),
    #[display("invalid URL: '{_0}'")]
    InvalidUrl(#[error(not(source))] String),
    /// The response body could not be read to the end.
    #[display("unable to read response body of '{_0}'")]
    Body(#[error(not(source))] String),
    /// The response body is larger than the configured ceiling.
    #[display("response body of '{_0}' exceeds {_1} bytes")]
    TooLarge(#[error(not(source))] String, u64),
    /// The HTTP client could not be constructed.
    #[display("unable to build HTTP client")]
    Client,
    /// Every attempt allowed by the retry policy failed; the last failure is
    /// the child of this error.
    #[display("unable to access url '{url}' after {attempts} attempts")]
    Exhausted { url: String, attempts: u32 },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
