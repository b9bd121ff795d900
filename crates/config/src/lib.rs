//! Layered configuration.
//!
//! Later layers override earlier ones:
//! 1. built-in defaults,
//! 2. an optional configuration file (TOML, YAML or JSON, by extension),
//! 3. environment variables prefixed with `CARTO_`, nested keys separated by
//!    a double underscore (`CARTO_FETCH__MAX_ATTEMPTS=5`).

pub mod error;

use carto_fetch::{HttpOptions, RetryPolicy};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub use crate::error::{Error, ErrorKind, Result};

const ENV_PREFIX: &str = "CARTO_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where the document cache keeps its index and body files.
    pub cache_dir: PathBuf,
    /// Where downloaded media files go.
    pub media_dir: PathBuf,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Attempts per URL, the first one included.
    pub max_attempts: u32,
    /// The wait after failed attempt `i` is `i² × backoff_unit_ms`.
    pub backoff_unit_ms: u64,
    /// No limit when unset.
    pub max_body_bytes: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let http = HttpOptions::default();
        let retry = RetryPolicy::default();
        Self {
            user_agent: http.user_agent,
            timeout_secs: http.timeout.as_secs(),
            max_attempts: retry.max_attempts,
            backoff_unit_ms: u64::try_from(retry.backoff_unit.as_millis()).unwrap_or(u64::MAX),
            max_body_bytes: http.max_body_bytes,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_unit_ms))
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_body_bytes: self.max_body_bytes,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            exn::bail!(ErrorKind::OutOfRange("fetch.max_attempts"));
        }
        if self.timeout_secs == 0 {
            exn::bail!(ErrorKind::OutOfRange("fetch.timeout_secs"));
        }
        if self.user_agent.trim().is_empty() {
            exn::bail!(ErrorKind::OutOfRange("fetch.user_agent"));
        }
        Ok(())
    }
}

impl Config {
    /// Built-in defaults: both directories under the platform's cache
    /// directory for carto.
    pub fn defaults() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "carto").ok_or_raise(|| ErrorKind::NoCacheDirectory)?;
        Ok(Self::in_dir(dirs.cache_dir()))
    }

    /// Defaults, with both directories under `root`.
    pub fn in_dir(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self { cache_dir: root.join("documents"), media_dir: root.join("media"), fetch: FetchConfig::default() }
    }

    /// Loads and validates the configuration.
    ///
    /// # Errors
    ///
    /// Fails if `file` is given but missing or of an unknown format, or if a
    /// value is missing or has the wrong type or range.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file)?.extract().or_raise(|| ErrorKind::Invalid)?;
        config.fetch.validate()?;
        debug!(cache_dir = %config.cache_dir.display(), media_dir = %config.media_dir.display(), "loaded configuration");
        Ok(config)
    }

    /// The layered providers, for callers that want to merge their own on
    /// top before extracting.
    ///
    /// Without a platform cache directory, `cache_dir` and `media_dir` have
    /// no default and must come from the file or the environment.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let defaults = match Self::defaults() {
            Ok(defaults) => Figment::from(Serialized::defaults(defaults)),
            Err(err) => {
                debug!(error = %*err, "no default directories");
                without_directories()
            }
        };
        Self::layered(defaults, file, ENV_PREFIX)
    }

    fn layered(mut figment: Figment, file: Option<&Path>, env_prefix: &str) -> Result<Figment> {
        if let Some(path) = file {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(env_prefix).split("__")))
    }
}

fn without_directories() -> Figment {
    Figment::from(Serialized::default("fetch", FetchConfig::default()))
}
