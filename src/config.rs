//! Configuration loader and validator for the job scraper.
//!
//! Settings are built once at process start (defaults, then an optional YAML
//! file, then environment overrides) and handed to every component.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::ingest::MAX_RESULTS_PER_SITE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value {value:?} for environment variable {var}")]
    Env { var: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub storage: Storage,
    pub logging: Logging,
    pub api: Api,
    pub scraping: Scraping,
    pub throttle: Throttle,
    pub retention: Retention,
    pub worker: Worker,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Storage {
    pub db_path: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            db_path: "./data/jobs.db".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Logging {
    pub path: String,
    pub level: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            path: "./logs".into(),
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Api {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            debug: false,
        }
    }
}

/// Scrape request sizing and the external scraping service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Scraping {
    pub default_results_per_site: u32,
    pub max_results_per_request: u32,
    /// Applied to the scraping service's HTTP client only.
    pub timeout_seconds: u64,
    pub endpoint: String,
}

impl Default for Scraping {
    fn default() -> Self {
        Self {
            default_results_per_site: 25,
            max_results_per_request: 200,
            timeout_seconds: 1800,
            endpoint: "http://127.0.0.1:8000/".into(),
        }
    }
}

/// Insert chunking and the pauses between scrape calls, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Throttle {
    pub batch_size: usize,
    pub batch_delay: u64,
    pub site_delay: u64,
    pub country_delay: u64,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_delay: 10,
            site_delay: 30,
            country_delay: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Retention {
    pub cleanup_days: u32,
    pub log_retention_days: u32,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            cleanup_days: 14,
            log_retention_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Worker {
    pub poll_interval_ms: u64,
}

impl Default for Worker {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

impl Throttle {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_secs(self.batch_delay)
    }

    pub fn site_pause(&self) -> Duration {
        Duration::from_secs(self.site_delay)
    }

    pub fn country_pause(&self) -> Duration {
        Duration::from_secs(self.country_delay)
    }
}

impl Settings {
    /// Ensure the database parent directory and the log directory exist.
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = Path::new(&self.storage.db_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::create_dir_all(&self.logging.path)
    }

    pub fn log_file(&self, component: &str) -> PathBuf {
        Path::new(&self.logging.path).join(format!("{component}.log"))
    }

    /// Apply environment-style overrides. `lookup` returns the raw value for a
    /// variable name, if set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DB_PATH") {
            self.storage.db_path = v;
        }
        if let Some(v) = lookup("LOG_PATH") {
            self.logging.path = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("API_HOST") {
            self.api.host = v;
        }
        if let Some(v) = lookup("API_DEBUG") {
            self.api.debug = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("SCRAPER_URL") {
            self.scraping.endpoint = v;
        }
        override_num(&lookup, "API_PORT", &mut self.api.port)?;
        override_num(
            &lookup,
            "DEFAULT_RESULTS_PER_SITE",
            &mut self.scraping.default_results_per_site,
        )?;
        override_num(
            &lookup,
            "MAX_RESULTS_PER_REQUEST",
            &mut self.scraping.max_results_per_request,
        )?;
        override_num(&lookup, "SCRAPING_TIMEOUT", &mut self.scraping.timeout_seconds)?;
        override_num(&lookup, "BATCH_SIZE", &mut self.throttle.batch_size)?;
        override_num(&lookup, "BATCH_DELAY", &mut self.throttle.batch_delay)?;
        override_num(&lookup, "SITE_DELAY", &mut self.throttle.site_delay)?;
        override_num(&lookup, "COUNTRY_DELAY", &mut self.throttle.country_delay)?;
        override_num(&lookup, "CLEANUP_DAYS", &mut self.retention.cleanup_days)?;
        override_num(
            &lookup,
            "LOG_RETENTION_DAYS",
            &mut self.retention.log_retention_days,
        )?;
        override_num(
            &lookup,
            "WORKER_POLL_INTERVAL_MS",
            &mut self.worker.poll_interval_ms,
        )?;
        Ok(())
    }
}

fn override_num<F, T>(lookup: &F, var: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(value) = lookup(var) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value })?;
    }
    Ok(())
}

/// Load settings: defaults, then the YAML file at `path` (or `config.yaml` if
/// present in the working directory), then process environment overrides.
/// An explicitly given path must exist.
pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut cfg = match path {
        Some(p) => parse(&fs::read_to_string(p)?)?,
        None => {
            let default = Path::new("config.yaml");
            if default.exists() {
                parse(&fs::read_to_string(default)?)?
            } else {
                Settings::default()
            }
        }
    };
    cfg.apply_env(|key| std::env::var(key).ok())?;
    validate(&cfg)?;
    Ok(cfg)
}

fn parse(content: &str) -> Result<Settings, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Settings) -> Result<(), ConfigError> {
    if cfg.storage.db_path.trim().is_empty() {
        return Err(ConfigError::Invalid("storage.db_path must be non-empty"));
    }
    if cfg.logging.path.trim().is_empty() {
        return Err(ConfigError::Invalid("logging.path must be non-empty"));
    }
    if cfg.api.host.trim().is_empty() {
        return Err(ConfigError::Invalid("api.host must be non-empty"));
    }
    if cfg.throttle.batch_size == 0 {
        return Err(ConfigError::Invalid("throttle.batch_size must be > 0"));
    }
    if cfg.scraping.max_results_per_request == 0
        || cfg.scraping.max_results_per_request > MAX_RESULTS_PER_SITE
    {
        return Err(ConfigError::Invalid(
            "scraping.max_results_per_request must be in 1..=200",
        ));
    }
    if cfg.scraping.default_results_per_site == 0
        || cfg.scraping.default_results_per_site > cfg.scraping.max_results_per_request
    {
        return Err(ConfigError::Invalid(
            "scraping.default_results_per_site must be in 1..=max_results_per_request",
        ));
    }
    if cfg.worker.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("worker.poll_interval_ms must be > 0"));
    }
    Ok(())
}

/// Example YAML content with every key at its default value.
pub fn example() -> &'static str {
    r#"storage:
  db_path: "./data/jobs.db"

logging:
  path: "./logs"
  level: "info"

api:
  host: "127.0.0.1"
  port: 5000
  debug: false

scraping:
  default_results_per_site: 25
  max_results_per_request: 200
  timeout_seconds: 1800
  endpoint: "http://127.0.0.1:8000/"

throttle:
  batch_size: 50
  batch_delay: 10
  site_delay: 30
  country_delay: 60

retention:
  cleanup_days: 14
  log_retention_days: 7

worker:
  poll_interval_ms: 1000
"#
}
