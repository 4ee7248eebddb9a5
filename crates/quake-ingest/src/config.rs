//! Collector configuration
//!
//! Everything is read from the process environment (a `.env` file is loaded
//! first when present). Defaults reproduce the production job.

use crate::error::ConfigError;
use crate::reconcile::DEFAULT_MAX_RECORDS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Kandilli Observatory "last 500 events" listing (HTML with one `<pre>` block)
pub const DEFAULT_KANDILLI_URL: &str = "http://www.koeri.boun.edu.tr/scripts/lst0.asp";

/// AFAD recent events feed
pub const DEFAULT_AFAD_URL: &str = "https://deprem.afad.gov.tr/last-earthquakes.json";

/// Local path of the published dataset, also the snapshot read on startup
pub const DEFAULT_OUTPUT_PATH: &str = "public/data/deprem_data.json";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_PUBLISH_REPO: &str = "bedirhan327/deprem-veri-collector";
pub const DEFAULT_PUBLISH_BRANCH: &str = "main";

pub const DEFAULT_USER_AGENT: &str = "quake-ingest/0.1";

/// Remote store settings for the published dataset
#[derive(Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// GitHub REST API base URL
    pub api_base_url: String,

    /// Repository in `owner/name` form
    pub repository: String,

    pub branch: String,

    /// Path of the dataset inside the repository
    pub remote_path: String,

    /// API token; only needed when actually publishing
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

// Keeps the token out of debug logs
impl std::fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishConfig")
            .field("api_base_url", &self.api_base_url)
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("remote_path", &self.remote_path)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_GITHUB_API_URL.to_string(),
            repository: DEFAULT_PUBLISH_REPO.to_string(),
            branch: DEFAULT_PUBLISH_BRANCH.to_string(),
            remote_path: DEFAULT_OUTPUT_PATH.to_string(),
            token: None,
        }
    }
}

/// Configuration for one collector run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub kandilli_url: String,
    pub afad_url: String,

    /// Local dataset file (read as snapshot, then overwritten)
    pub output_path: PathBuf,

    /// Retention cap applied after deduplication
    pub max_records: usize,

    /// Per-request timeout for feeds and the publish API
    pub timeout_secs: u64,

    /// Attempts per network operation, including the first
    pub max_retries: u32,

    /// Base delay for exponential backoff between attempts
    pub retry_backoff_ms: u64,

    /// Abort the run when any single source fails instead of continuing
    pub require_all_sources: bool,

    pub user_agent: String,

    pub publish: PublishConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            kandilli_url: DEFAULT_KANDILLI_URL.to_string(),
            afad_url: DEFAULT_AFAD_URL.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            max_records: DEFAULT_MAX_RECORDS,
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            require_all_sources: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            publish: PublishConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Load configuration from environment variables
    ///
    /// Unparseable numeric values are reported rather than silently replaced
    /// by defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let output_path = std::env::var("QUAKE_OUTPUT_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_path);
        let remote_path = std::env::var("QUAKE_PUBLISH_PATH")
            .unwrap_or_else(|_| output_path.to_string_lossy().replace('\\', "/"));

        let config = Self {
            kandilli_url: env_or("QUAKE_KANDILLI_URL", defaults.kandilli_url),
            afad_url: env_or("QUAKE_AFAD_URL", defaults.afad_url),
            output_path,
            max_records: env_parse("QUAKE_MAX_RECORDS", defaults.max_records)?,
            timeout_secs: env_parse("QUAKE_HTTP_TIMEOUT_SECS", defaults.timeout_secs)?,
            max_retries: env_parse("QUAKE_MAX_RETRIES", defaults.max_retries)?,
            retry_backoff_ms: env_parse("QUAKE_RETRY_BACKOFF_MS", defaults.retry_backoff_ms)?,
            require_all_sources: env_parse(
                "QUAKE_REQUIRE_ALL_SOURCES",
                defaults.require_all_sources,
            )?,
            user_agent: env_or("QUAKE_USER_AGENT", defaults.user_agent),
            publish: PublishConfig {
                api_base_url: env_or("QUAKE_GITHUB_API_URL", defaults.publish.api_base_url),
                repository: env_or("QUAKE_PUBLISH_REPO", defaults.publish.repository),
                branch: env_or("QUAKE_PUBLISH_BRANCH", defaults.publish.branch),
                remote_path,
                token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kandilli_url.is_empty() {
            return Err(ConfigError::Invalid("Kandilli URL cannot be empty".to_string()));
        }

        if self.afad_url.is_empty() {
            return Err(ConfigError::Invalid("AFAD URL cannot be empty".to_string()));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Output path cannot be empty".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("Timeout must be greater than 0".to_string()));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "Max retries must allow at least one attempt".to_string(),
            ));
        }

        if !self.publish.repository.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "Publish repository must be 'owner/name', got '{}'",
                self.publish.repository
            )));
        }

        if self.publish.remote_path.is_empty() {
            return Err(ConfigError::Invalid("Publish path cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Token required for publishing
    pub fn publish_token(&self) -> Result<&str, ConfigError> {
        self.publish
            .token
            .as_deref()
            .ok_or(ConfigError::MissingVar("GITHUB_TOKEN"))
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidVar {
            key,
            value: raw.clone(),
        }),
        Err(_) => Ok(default),
    }
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    kandilli_url: Option<String>,
    afad_url: Option<String>,
    output_path: Option<PathBuf>,
    max_records: Option<usize>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
    require_all_sources: Option<bool>,
    publish: Option<PublishConfig>,
}

impl IngestConfigBuilder {
    pub fn kandilli_url(mut self, url: impl Into<String>) -> Self {
        self.kandilli_url = Some(url.into());
        self
    }

    pub fn afad_url(mut self, url: impl Into<String>) -> Self {
        self.afad_url = Some(url.into());
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = Some(ms);
        self
    }

    pub fn require_all_sources(mut self, require: bool) -> Self {
        self.require_all_sources = Some(require);
        self
    }

    pub fn publish(mut self, publish: PublishConfig) -> Self {
        self.publish = Some(publish);
        self
    }

    pub fn build(self) -> IngestConfig {
        let default = IngestConfig::default();

        IngestConfig {
            kandilli_url: self.kandilli_url.unwrap_or(default.kandilli_url),
            afad_url: self.afad_url.unwrap_or(default.afad_url),
            output_path: self.output_path.unwrap_or(default.output_path),
            max_records: self.max_records.unwrap_or(default.max_records),
            timeout_secs: self.timeout_secs.unwrap_or(default.timeout_secs),
            max_retries: self.max_retries.unwrap_or(default.max_retries),
            retry_backoff_ms: self.retry_backoff_ms.unwrap_or(default.retry_backoff_ms),
            require_all_sources: self
                .require_all_sources
                .unwrap_or(default.require_all_sources),
            user_agent: default.user_agent,
            publish: self.publish.unwrap_or(default.publish),
        }
    }
}
