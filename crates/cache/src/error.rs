//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.

use carto_json::ErrorKind as JsonErrorKind;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Everything detected while loading the index files is corruption: the
/// cache directory has to be repaired by hand, nothing is discarded
/// automatically.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An index file is not valid JSON.
    #[display("invalid JSON: {_0}")]
    Json(JsonErrorKind),
    /// An index file exists but could not be read.
    #[display("unable to read index file {}", _0.display())]
    Index(#[error(not(source))] PathBuf),
    /// A file in the cache directory could not be opened, created or written.
    #[display("I/O error on {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// A properties key is not a non-negative decimal integer.
    #[display("invalid id '{_0}'")]
    InvalidId(#[error(not(source))] String),
    /// A properties value lacks `charsetName` or `baseUri`.
    #[display("invalid properties for id {_0}")]
    InvalidProperties(#[error(not(source))] u64),
    #[display("duplicate id {_0}")]
    DuplicateId(#[error(not(source))] u64),
    #[display("duplicate baseUri '{_0}'")]
    DuplicateBaseUri(#[error(not(source))] String),
    /// An alias value is not a non-negative integer.
    #[display("invalid id for alias '{_0}'")]
    InvalidAlias(#[error(not(source))] String),
    /// An alias points at an id with no entry.
    #[display("unknown id {_0}")]
    UnknownId(#[error(not(source))] u64),
    #[display("duplicate url '{_0}'")]
    DuplicateAlias(#[error(not(source))] String),
    /// The page could not be fetched; the fetch error is the child.
    #[display("unable to fetch '{_0}'")]
    Fetch(#[error(not(source))] String),
    /// Following canonical links from this URL never settles on a page that
    /// names itself as canonical.
    #[display("canonical links starting at '{_0}' do not converge")]
    CanonicalLoop(#[error(not(source))] String),
    #[display("unable to read cached document {_0}")]
    BodyUnreadable(#[error(not(source))] u64),
    #[display("unable to write cached document {_0}")]
    BodyUnwritable(#[error(not(source))] u64),
    /// A media file name would escape the media directory.
    #[display("invalid media file name '{_0}'")]
    InvalidFileName(#[error(not(source))] String),
    /// A file description page has no link to the original media file.
    #[display("no media link on '{_0}'")]
    MissingMediaLink(#[error(not(source))] String),
    #[display("unable to store media file {}", _0.display())]
    Media(#[error(not(source))] PathBuf),
}

impl From<JsonErrorKind> for ErrorKind {
    fn from(kind: JsonErrorKind) -> Self {
        Self::Json(kind)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Media(_))
    }

    /// Returns `true` if the cache directory is inconsistent and needs
    /// manual attention.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Json(JsonErrorKind::Decode { .. })
                | Self::InvalidId(_)
                | Self::InvalidProperties(_)
                | Self::DuplicateId(_)
                | Self::DuplicateBaseUri(_)
                | Self::InvalidAlias(_)
                | Self::UnknownId(_)
                | Self::DuplicateAlias(_)
                | Self::BodyUnreadable(_)
        )
    }
}
