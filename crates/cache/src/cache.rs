//! URL to document resolution.

use carto_fetch::{Document, Fetcher, RetryPolicy, Sleeper, ThreadSleeper, fetch_document};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::entry::CacheEntry;
use crate::error::{ErrorKind, Result};
use crate::index::Index;

/// Persistent, grow-only cache of HTML pages, keyed by URL.
///
/// Each page is stored once, under the canonical URL it declares. Any other
/// URL that led to it is remembered as an alias, so asking for it again costs
/// nothing. Entries are never refreshed or removed.
///
/// A cache directory must not be used by two instances at once.
///
/// # Examples
///
/// ```no_run
/// use carto_cache::DocumentCache;
/// use carto_fetch::{HttpFetcher, HttpOptions};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = HttpFetcher::new(HttpOptions::default())?;
/// let mut cache = DocumentCache::open("/var/cache/carto/documents", fetcher)?;
/// let document = cache.get("https://fr.wikipedia.org/wiki/Liste_des_pays_du_monde")?;
/// println!("{}", document.base_uri());
/// # Ok(())
/// # }
/// ```
pub struct DocumentCache {
    index: Index,
    fetcher: Box<dyn Fetcher>,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl DocumentCache {
    /// Loads the cache stored in `dir`, creating nothing until the first new
    /// page is fetched.
    ///
    /// # Errors
    ///
    /// Fails if an index file cannot be read or is inconsistent: an invalid
    /// or duplicated id, a duplicated canonical URL, an alias to an unknown
    /// id, a duplicated alias, or a missing body file.
    pub fn open(dir: impl Into<PathBuf>, fetcher: impl Fetcher + 'static) -> Result<Self> {
        Ok(Self {
            index: Index::load(dir)?,
            fetcher: Box::new(fetcher),
            policy: RetryPolicy::default(),
            sleeper: Box::new(ThreadSleeper),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Returns the document for `url`, fetching and storing it first if no
    /// URL resolving to it has been seen before.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Fetch`] when the page cannot be downloaded (timeouts are
    /// retried according to the retry policy first),
    /// [`ErrorKind::CanonicalLoop`] when canonical links go round in circles,
    /// and I/O kinds when the cache directory cannot be written.
    #[instrument(skip(self))]
    pub fn get(&mut self, url: &str) -> Result<&Document> {
        let id = self.resolve(url, &mut Vec::new())?;
        self.index.entries().get(&id).map(CacheEntry::document).ok_or_raise(|| ErrorKind::UnknownId(id))
    }

    /// `visited` holds the URLs whose canonical link led here.
    fn resolve(&mut self, url: &str, visited: &mut Vec<String>) -> Result<u64> {
        if let Some(id) = self.index.id_of(url) {
            debug!(url, id, "cache hit");
            return Ok(id);
        }
        let (response, document) = fetch_document(&*self.fetcher, &self.policy, &*self.sleeper, url)
            .or_raise(|| ErrorKind::Fetch(url.to_string()))?;
        if document.base_uri() == url {
            return self.index.insert_document(&response.body, document);
        }

        let canonical = document.base_uri().to_string();
        visited.push(url.to_string());
        if visited.contains(&canonical) {
            exn::bail!(ErrorKind::CanonicalLoop(visited[0].clone()));
        }
        let id = self.resolve(&canonical, visited)?;
        info!(url, canonical = %canonical, id, "cached new alias");
        self.index.insert_id(url.to_string(), id)?;
        Ok(id)
    }

    /// Number of entries (not counting aliases).
    pub fn len(&self) -> usize {
        self.index.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.entries().is_empty()
    }

    /// Id of the entry `url` resolves to, if it has been resolved before.
    pub fn id_of(&self, url: &str) -> Option<u64> {
        self.index.id_of(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.id_of(url).is_some()
    }

    pub fn entry(&self, id: u64) -> Option<&CacheEntry> {
        self.index.entries().get(&id)
    }

    /// Entries in the order they were first stored.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.index.entries().values()
    }

    /// URLs resolving to an entry whose canonical URL is different, with
    /// that entry's id.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, u64)> {
        self.index.aliases()
    }

    pub fn dir(&self) -> &Path {
        self.index.dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carto_fetch::NoSleep;
    use carto_fetch::mock::{MockFetcher, html_page};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_canonical_loop_is_detected() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_page("https://a/1", html_page(Some("https://a/2"), "1"))
                .with_page("https://a/2", html_page(Some("https://a/1"), "2")),
        );
        let mut cache = DocumentCache::open(dir.path(), Arc::clone(&fetcher)).unwrap().with_sleeper(NoSleep);
        let err = cache.get("https://a/1").unwrap_err();
        assert_eq!(*err, ErrorKind::CanonicalLoop("https://a/1".to_string()));
        assert_eq!(fetcher.total_calls(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_alias_chain_records_every_hop() {
        let dir = tempdir().unwrap();
        let fetcher = MockFetcher::new()
            .with_page("https://a/1", html_page(Some("https://a/2"), "1"))
            .with_page("https://a/2", html_page(Some("https://a/3"), "2"))
            .with_page("https://a/3", html_page(Some("https://a/3"), "3"));
        let mut cache = DocumentCache::open(dir.path(), fetcher).unwrap().with_sleeper(NoSleep);
        assert_eq!(cache.get("https://a/1").unwrap().base_uri(), "https://a/3");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.aliases().collect::<Vec<_>>(), [("https://a/2", 0), ("https://a/1", 0)]);
    }

    #[test]
    fn test_fetch_failure_leaves_cache_untouched() {
        let dir = tempdir().unwrap();
        let mut cache = DocumentCache::open(dir.path(), MockFetcher::new()).unwrap().with_sleeper(NoSleep);
        let err = cache.get("https://a/missing").unwrap_err();
        assert_eq!(*err, ErrorKind::Fetch("https://a/missing".to_string()));
        assert!(!cache.contains("https://a/missing"));
        assert!(!dir.path().join("properties.json").exists());
    }
}
