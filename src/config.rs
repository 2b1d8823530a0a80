//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Directory under `$HOME` that holds the default database.
const DEFAULT_DATA_DIR: &str = ".linkedin-mcp-scheduler";
const DEFAULT_DB_FILE: &str = "scheduled.db";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 30;

const DEFAULT_API_BASE: &str = "https://api.linkedin.com";
const DEFAULT_API_VERSION: &str = "202501";

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Path of the SQLite job table.
    pub db_path: PathBuf,
    /// Time between dispatch cycles.
    pub poll_interval: Duration,
    /// Upper bound on a single publish request.
    pub publish_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            publish_timeout: Duration::from_secs(DEFAULT_PUBLISH_TIMEOUT_SECS),
        }
    }
}

impl SchedulerConfig {
    /// Build config from environment variables.
    ///
    /// - `DB_PATH` overrides the database location.
    /// - `POLL_INTERVAL_SECONDS` sets the dispatch interval (default 60).
    /// - `PUBLISH_TIMEOUT_SECONDS` bounds each publish call (default 30).
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = std::env::var("DB_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let poll_interval = Duration::from_secs(parse_secs(
            "POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?);
        let publish_timeout = Duration::from_secs(parse_secs(
            "PUBLISH_TIMEOUT_SECONDS",
            DEFAULT_PUBLISH_TIMEOUT_SECS,
        )?);

        Ok(Self {
            db_path,
            poll_interval,
            publish_timeout,
        })
    }
}

/// Settings for the LinkedIn Posts API.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub api_base: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_PUBLISH_TIMEOUT_SECS),
        }
    }
}

impl PublisherConfig {
    /// Build config from `LINKEDIN_API_BASE` and `LINKEDIN_API_VERSION`.
    pub fn from_env(timeout: Duration) -> Self {
        let api_base = std::env::var("LINKEDIN_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let api_version = std::env::var("LINKEDIN_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        Self {
            api_base,
            api_version,
            timeout,
        }
    }
}

/// `$HOME/.linkedin-mcp-scheduler/scheduled.db`, or relative to the cwd when
/// `HOME` is unset.
pub fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(DEFAULT_DATA_DIR)
        .join(DEFAULT_DB_FILE)
}

fn parse_secs(key: &str, default: u64) -> Result<u64, ConfigError> {
    secs_from(key, std::env::var(key).ok().as_deref(), default)
}

fn secs_from(key: &str, raw: Option<&str>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?} is not a whole number of seconds: {e}"),
    })?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(secs)
}
