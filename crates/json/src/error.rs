//! JSON Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.

use derive_more::{Display, Error};

/// A JSON error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for JSON operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is not valid JSON. Positions are 1-based and point at the
    /// offending character (or one past the last character on premature end
    /// of input). Don't retry with the same input.
    #[display("{message} at line {line}, col {column}")]
    Decode {
        message: String,
        line: u64,
        column: u64,
    },
    /// The underlying reader or writer failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_display_includes_position() {
        let kind = ErrorKind::Decode { message: "unexpected end of input".to_string(), line: 3, column: 14 };
        assert_eq!(kind.to_string(), "unexpected end of input at line 3, col 14");
    }

    #[test]
    fn only_io_is_retryable() {
        assert!(ErrorKind::Io.is_retryable());
        assert!(!ErrorKind::Decode { message: String::new(), line: 1, column: 1 }.is_retryable());
    }
}
