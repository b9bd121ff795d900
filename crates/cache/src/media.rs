//! Media files (flags, maps) downloaded next to the document cache.

use carto_fetch::{Document, ErrorKind as FetchErrorKind, Fetcher, RetryPolicy, Sleeper};
use exn::{OptionExt, ResultExt};
use scraper::Selector;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, instrument};

use crate::error::{ErrorKind, Result};
use crate::paths::validate_file_name;

// Link to the original file on a Wikimedia Commons file description page.
static FULL_MEDIA_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.fullMedia a[href]").unwrap());

/// Directory of downloaded media files, stored verbatim under caller-chosen
/// names.
///
/// Files are only ever downloaded once: an existing file is trusted as is.
#[derive(Clone, Debug)]
pub struct MediaStore {
    dir: PathBuf,
    policy: RetryPolicy,
}

impl MediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), policy: RetryPolicy::default() }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `file_name` is (or would be) stored.
    pub fn path(&self, file_name: &str) -> Result<PathBuf> {
        Ok(self.dir.join(validate_file_name(file_name)?))
    }

    /// Makes sure `file_name` exists, downloading it from `url` if it does
    /// not.
    ///
    /// Unlike pages, any failure to download is retried up to the policy's
    /// ceiling; only malformed URLs fail straight away.
    #[instrument(skip(self, fetcher, sleeper))]
    pub fn ensure(&self, url: &str, file_name: &str, fetcher: &dyn Fetcher, sleeper: &dyn Sleeper) -> Result<PathBuf> {
        let path = self.path(file_name)?;
        if path.is_file() {
            debug!(path = %path.display(), "media file already present");
            return Ok(path);
        }
        let response = self
            .policy
            .run_with(url, sleeper, is_worth_retrying, |_| fetcher.fetch(url))
            .or_raise(|| ErrorKind::Fetch(url.to_string()))?;

        fs::create_dir_all(&self.dir).or_raise(|| ErrorKind::Media(self.dir.clone()))?;
        // Written aside first so an interrupted download is never mistaken
        // for a complete file.
        let partial = path.with_file_name(format!("{file_name}.part"));
        fs::write(&partial, &response.body).or_raise(|| ErrorKind::Media(partial.clone()))?;
        fs::rename(&partial, &path).or_raise(|| ErrorKind::Media(path.clone()))?;
        info!(path = %path.display(), size = response.body.len(), "stored media file");
        Ok(path)
    }

    /// Same as [`ensure`](Self::ensure), for the original file linked from a
    /// Wikimedia Commons file description page.
    pub fn ensure_from_page(
        &self,
        page: &Document,
        file_name: &str,
        fetcher: &dyn Fetcher,
        sleeper: &dyn Sleeper,
    ) -> Result<PathBuf> {
        let url = page
            .absolute_href(&FULL_MEDIA_SELECTOR)
            .ok_or_raise(|| ErrorKind::MissingMediaLink(page.base_uri().to_string()))?;
        self.ensure(&url, file_name, fetcher, sleeper)
    }
}

fn is_worth_retrying(kind: &FetchErrorKind) -> bool {
    !matches!(kind, FetchErrorKind::InvalidUrl(_) | FetchErrorKind::Client)
}
