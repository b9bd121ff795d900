//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The merged configuration does not deserialise; the figment error is
    /// the child and names the offending key and source.
    #[display("invalid configuration")]
    Invalid,
    /// A setting has a value outside of its accepted range.
    #[display("invalid value for '{_0}'")]
    OutOfRange(#[error(not(source))] &'static str),
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The configuration file extension is not one of toml, yaml, yml, json.
    #[display("unsupported configuration format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// The platform has no cache directory (no home directory); set
    /// `cache_dir` and `media_dir` explicitly.
    #[display("unable to determine a cache directory")]
    NoCacheDirectory,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::OutOfRange("fetch.max_attempts").to_string(), "invalid value for 'fetch.max_attempts'");
        assert_eq!(
            ErrorKind::NotFound(PathBuf::from("/etc/carto.toml")).to_string(),
            "configuration file not found: /etc/carto.toml"
        );
    }
}
