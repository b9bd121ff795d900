//! Scripted fetcher and recording sleeper for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{ErrorKind, Result};
use crate::fetcher::{Fetcher, Response};
use crate::retry::Sleeper;

#[derive(Debug)]
struct Failure {
    kind: ErrorKind,
    /// `None` fails forever.
    remaining: Option<u32>,
}

/// In-memory [`Fetcher`] serving scripted pages.
///
/// Unknown URLs answer with [`ErrorKind::Status`] 404. Every call is counted
/// per URL, whether it succeeds or not.
///
/// # Examples
///
/// ```
/// use carto_fetch::Fetcher;
/// use carto_fetch::mock::{MockFetcher, html_page};
///
/// let fetcher = MockFetcher::new()
///     .with_page("https://a/x", html_page(Some("https://a/x"), "<p>x</p>"));
/// assert!(fetcher.fetch("https://a/x").is_ok());
/// assert!(fetcher.fetch("https://a/y").is_err());
/// assert_eq!(fetcher.calls("https://a/x"), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: HashMap<String, Response>,
    failures: Mutex<HashMap<String, Failure>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `html` as a UTF-8 page at `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        let response = Response::new(url.clone(), Some("text/html; charset=UTF-8".to_string()), html.into().into_bytes());
        self.with_response(url, response)
    }

    /// Serves an arbitrary response at `url`; the response URL may differ to
    /// simulate a redirect.
    pub fn with_response(mut self, url: impl Into<String>, response: Response) -> Self {
        self.pages.insert(url.into(), response);
        self
    }

    /// Every fetch of `url` fails with `kind`.
    pub fn with_failure(self, url: impl Into<String>, kind: ErrorKind) -> Self {
        self.insert_failure(url.into(), kind, None)
    }

    /// The first `times` fetches of `url` fail with `kind`, later ones fall
    /// through to the scripted page.
    pub fn with_failures(self, url: impl Into<String>, kind: ErrorKind, times: u32) -> Self {
        self.insert_failure(url.into(), kind, Some(times))
    }

    fn insert_failure(self, url: String, kind: ErrorKind, remaining: Option<u32>) -> Self {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).insert(url, Failure { kind, remaining });
        self
    }

    /// Number of fetches of `url` so far.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).get(url).copied().unwrap_or(0)
    }

    /// Number of fetches of any URL so far.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).values().sum()
    }

    fn scripted_failure(&self, url: &str) -> Option<ErrorKind> {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let failure = failures.get_mut(url)?;
        match &mut failure.remaining {
            None => Some(failure.kind.clone()),
            Some(0) => None,
            Some(remaining) => {
                *remaining -= 1;
                Some(failure.kind.clone())
            },
        }
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &str) -> Result<Response> {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner).entry(url.to_string()).or_default() += 1;
        if let Some(kind) = self.scripted_failure(url) {
            exn::bail!(kind);
        }
        match self.pages.get(url) {
            Some(response) => Ok(response.clone()),
            None => exn::bail!(ErrorKind::Status(url.to_string(), 404)),
        }
    }
}

/// [`Sleeper`] that returns at once and remembers every requested delay.
///
/// Clones share the same record.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
    }
}

/// Minimal HTML page, optionally declaring a canonical URL.
pub fn html_page(canonical: Option<&str>, body: &str) -> String {
    let link = canonical.map(|href| format!(r#"<link rel="canonical" href="{href}">"#)).unwrap_or_default();
    format!(r#"<!DOCTYPE html><html><head><meta charset="UTF-8">{link}<title>page</title></head><body>{body}</body></html>"#)
}
