//! Fetcher trait and implementations.
//!
//! A [`Fetcher`] performs exactly one attempt at downloading a URL. Retrying
//! is the caller's business, see [`RetryPolicy`](crate::RetryPolicy).

mod http;

pub use self::http::{HttpFetcher, HttpOptions};
use crate::error::Result;
use std::sync::Arc;

/// Raw result of a successful fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// Final URL, after redirects.
    pub url: String,
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Body bytes, exactly as received (after transfer decoding).
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: impl Into<String>, content_type: Option<String>, body: impl Into<Vec<u8>>) -> Self {
        Self { url: url.into(), content_type, body: body.into() }
    }
}

/// Downloads a URL.
///
/// Implementations must report timeouts as
/// [`ErrorKind::Timeout`](crate::error::ErrorKind::Timeout) so the retry
/// policy can tell them apart from failures that will not go away.
///
/// # Examples
///
/// ```
/// use carto_fetch::{Fetcher, error::Result};
///
/// fn body_len(fetcher: &dyn Fetcher, url: &str) -> Result<usize> {
///     Ok(fetcher.fetch(url)?.body.len())
/// }
/// ```
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Response>;
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn fetch(&self, url: &str) -> Result<Response> {
        (**self).fetch(url)
    }
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn fetch(&self, url: &str) -> Result<Response> {
        (**self).fetch(url)
    }
}
