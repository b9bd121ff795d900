//! Blocking HTTP fetcher.

use exn::ResultExt;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{Fetcher, Response};
use crate::error::{ErrorKind, Result};

/// Settings for [`HttpFetcher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpOptions {
    pub user_agent: String,
    pub timeout: Duration,
    /// Refuse bodies larger than this; `None` means unbounded.
    pub max_body_bytes: Option<u64>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: concat!("carto/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            max_body_bytes: None,
        }
    }
}

/// [`Fetcher`] backed by a blocking `reqwest` client.
///
/// Redirects are followed; the [`Response::url`] is the final one. Request
/// and body read timeouts both become [`ErrorKind::Timeout`].
///
/// ```no_run
/// use carto_fetch::{Fetcher, HttpFetcher, HttpOptions};
///
/// # fn example() -> carto_fetch::error::Result<()> {
/// let fetcher = HttpFetcher::new(HttpOptions::default())?;
/// let response = fetcher.fetch("https://fr.wikipedia.org/wiki/Liste_des_pays_du_monde")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    max_body_bytes: Option<u64>,
}

impl HttpFetcher {
    pub fn new(options: HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent)
            .timeout(options.timeout)
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self { client, max_body_bytes: options.max_body_bytes })
    }

    fn classify(url: &str, err: &reqwest::Error) -> ErrorKind {
        if err.is_timeout() {
            ErrorKind::Timeout(url.to_string())
        } else if err.is_builder() {
            ErrorKind::InvalidUrl(url.to_string())
        } else if err.is_body() || err.is_decode() {
            ErrorKind::Body(url.to_string())
        } else {
            ErrorKind::Network(url.to_string())
        }
    }

    fn check_size(&self, url: &str, size: Option<u64>) -> Result<()> {
        if let Some(limit) = self.max_body_bytes
            && let Some(size) = size
            && size > limit
        {
            exn::bail!(ErrorKind::TooLarge(url.to_string(), limit));
        }
        Ok(())
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    fn fetch(&self, url: &str) -> Result<Response> {
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(err) => {
                let kind = Self::classify(url, &err);
                return Err(err).or_raise(|| kind);
            },
        };
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(url.to_string(), status.as_u16()));
        }
        self.check_size(url, response.content_length())?;
        let final_url = response.url().to_string();
        let content_type = response.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok()).map(str::to_string);
        let body = match response.bytes() {
            Ok(body) => body,
            Err(err) => {
                let kind = Self::classify(url, &err);
                return Err(err).or_raise(|| kind);
            },
        };
        self.check_size(url, Some(body.len() as u64))?;
        debug!(url, final_url = %final_url, size = body.len(), "fetched");
        Ok(Response { url: final_url, content_type, body: body.to_vec() })
    }
}
