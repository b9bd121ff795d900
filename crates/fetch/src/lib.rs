//! Fetching HTML pages for the document cache.
//!
//! - [`Fetcher`] makes a single attempt at downloading a URL, [`HttpFetcher`]
//!   being the real implementation.
//! - [`RetryPolicy`] wraps attempts in a bounded loop with quadratic backoff,
//!   sleeping through a [`Sleeper`] so tests never wait.
//! - [`Document`] is what a response becomes once parsed: the HTML tree, its
//!   charset and its canonical URL.

mod consts;
mod document;
pub mod error;
mod fetcher;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod retry;

pub use crate::document::Document;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::fetcher::{Fetcher, HttpFetcher, HttpOptions, Response};
pub use crate::retry::{NoSleep, RetryPolicy, Sleeper, ThreadSleeper};

/// Fetches `url` under `policy` and parses the result.
///
/// Returns the raw response alongside the document, since callers storing
/// the page need the body bytes exactly as received.
pub fn fetch_document(
    fetcher: &dyn Fetcher,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    url: &str,
) -> Result<(Response, Document)> {
    let response = policy.run(url, sleeper, |_| fetcher.fetch(url))?;
    let document = Document::from_response(url, &response);
    Ok((response, document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFetcher, html_page};

    #[test]
    fn test_fetch_document_retries_timeouts() {
        let url = "https://fr.wikipedia.org/wiki/Monaco";
        let fetcher = MockFetcher::new()
            .with_page(url, html_page(Some(url), "<p>Monaco</p>"))
            .with_failures(url, ErrorKind::Timeout(url.to_string()), 1);
        let (response, document) = fetch_document(&fetcher, &RetryPolicy::default(), &NoSleep, url).unwrap();
        assert_eq!(fetcher.calls(url), 2);
        assert_eq!(response.url, url);
        assert_eq!(document.base_uri(), url);
    }
}
