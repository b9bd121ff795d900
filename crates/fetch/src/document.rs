//! Parsed HTML documents and the metadata the cache needs from them.

use reqwest::Url;
use scraper::html::Select;
use scraper::{Html, Selector};
use std::borrow::Cow;
use tracing::{debug, warn};

use crate::consts;
use crate::fetcher::Response;

/// A parsed HTML page together with the charset it was decoded with and the
/// canonical URL it declares for itself.
#[derive(Clone, Debug)]
pub struct Document {
    html: Html,
    charset: String,
    base_uri: String,
}

impl Document {
    /// Decodes `bytes` with `charset` and parses the result.
    ///
    /// UTF-8 is decoded lossily, ISO-8859-1 and US-ASCII are mapped byte for
    /// byte. Anything else falls back to lossy UTF-8.
    pub fn parse(bytes: &[u8], charset: &str, base_uri: &str) -> Self {
        let charset = normalise_charset(charset);
        let html = Html::parse_document(&decode(bytes, &charset));
        Self { html, charset, base_uri: base_uri.to_string() }
    }

    /// Builds a document from a raw response to a request for
    /// `requested_url`.
    ///
    /// The charset comes from the `Content-Type` header, then
    /// `<meta charset>`, then `<meta http-equiv="Content-Type">`, then
    /// defaults to UTF-8. The base URI is the `link[rel=canonical]` target,
    /// resolved against the response URL when relative, or `requested_url`
    /// when the page declares none.
    pub fn from_response(requested_url: &str, response: &Response) -> Self {
        let header_charset = response.content_type.as_deref().and_then(charset_param);
        let sniffed = Html::parse_document(&String::from_utf8_lossy(&response.body));
        let charset = normalise_charset(
            header_charset.or_else(|| declared_charset(&sniffed)).as_deref().unwrap_or(consts::DEFAULT_CHARSET),
        );
        let html = match charset.as_str() {
            consts::DEFAULT_CHARSET => sniffed,
            other => Html::parse_document(&decode(&response.body, other)),
        };
        let base_uri = canonical_url(&html, &response.url).unwrap_or_else(|| requested_url.to_string());
        debug!(requested_url, base_uri = %base_uri, charset = %charset, "parsed document");
        Self { html, charset, base_uri }
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Canonical URL of the document.
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> Select<'a, 'b> {
        self.html.select(selector)
    }

    /// `href` of the first element matching `selector` that has one, resolved
    /// against the base URI.
    pub fn absolute_href(&self, selector: &Selector) -> Option<String> {
        let href = self.select(selector).find_map(|element| element.value().attr("href"))?.trim();
        match Url::parse(&self.base_uri).and_then(|base| base.join(href)) {
            Ok(url) => Some(url.to_string()),
            Err(err) => {
                warn!(href, base_uri = %self.base_uri, error = %err, "unable to resolve link");
                None
            },
        }
    }

    /// Serialised HTML of the whole tree.
    pub fn to_html(&self) -> String {
        self.html.html()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.charset == other.charset && self.base_uri == other.base_uri && self.html.html() == other.html.html()
    }
}

fn charset_param(value: &str) -> Option<String> {
    consts::CHARSET_PARAM_REGEX.captures(value).map(|caps| caps[1].to_string())
}

fn declared_charset(html: &Html) -> Option<String> {
    if let Some(charset) = html
        .select(&consts::META_CHARSET_SELECTOR)
        .filter_map(|meta| meta.value().attr("charset"))
        .map(str::trim)
        .find(|charset| !charset.is_empty())
    {
        return Some(charset.to_string());
    }
    html.select(&consts::META_HTTP_EQUIV_SELECTOR)
        .filter(|meta| meta.value().attr("http-equiv").is_some_and(|name| name.eq_ignore_ascii_case("content-type")))
        .filter_map(|meta| meta.value().attr("content"))
        .find_map(charset_param)
}

fn canonical_url(html: &Html, response_url: &str) -> Option<String> {
    let href = html
        .select(&consts::CANONICAL_SELECTOR)
        .filter_map(|link| link.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())?;
    // Absolute targets are kept verbatim so they compare equal to the URL
    // that was asked for.
    if Url::parse(href).is_ok() {
        return Some(href.to_string());
    }
    match Url::parse(response_url).and_then(|base| base.join(href)) {
        Ok(resolved) => Some(resolved.to_string()),
        Err(err) => {
            warn!(href, response_url, error = %err, "unable to resolve canonical URL");
            None
        },
    }
}

fn normalise_charset(charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => consts::DEFAULT_CHARSET.to_string(),
        "iso-8859-1" | "iso8859-1" | "latin1" | "l1" => "ISO-8859-1".to_string(),
        "us-ascii" | "ascii" => "US-ASCII".to_string(),
        _ => charset.trim().to_string(),
    }
}

fn decode<'a>(bytes: &'a [u8], charset: &str) -> Cow<'a, str> {
    match charset {
        consts::DEFAULT_CHARSET => String::from_utf8_lossy(bytes),
        "ISO-8859-1" => Cow::Owned(bytes.iter().map(|&byte| char::from(byte)).collect()),
        "US-ASCII" => Cow::Owned(
            bytes.iter().map(|&byte| if byte.is_ascii() { char::from(byte) } else { char::REPLACEMENT_CHARACTER }).collect(),
        ),
        other => {
            warn!(charset = other, "unsupported charset, decoding as UTF-8");
            String::from_utf8_lossy(bytes)
        },
    }
}
