//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate:
//! 1. Built-in defaults (the [`defaults`] module)
//! 2. An optional TOML file (`inshop.toml` or an explicit path)
//! 3. `INSHOP_*` environment variables, `__` separating nested keys
//!    (e.g. `INSHOP_AGGREGATION__DEADLINE_MS=5000`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::domain::product::SortOrder;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraping: ScrapingConfig,
    pub aggregation: AggregationConfig,
    pub tasks: TaskConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
}

/// Source adapter settings shared by every site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Minimum interval between two requests to the same source
    pub request_delay_ms: u64,

    /// Pool the `User-Agent` header is drawn from, per request
    pub user_agents: Vec<String>,

    pub follow_redirects: bool,

    /// Result pages fetched per source and query
    pub max_pages: u32,

    /// Base URL per source, keyed by lower-cased source name
    pub base_url_overrides: HashMap<String, String>,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            request_delay_ms: defaults::REQUEST_DELAY_MS,
            user_agents: defaults::USER_AGENTS.iter().map(ToString::to_string).collect(),
            follow_redirects: true,
            max_pages: defaults::MAX_PAGES,
            base_url_overrides: HashMap::new(),
        }
    }
}

impl ScrapingConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub const fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn base_url_override(&self, source_name: &str) -> Option<&str> {
        self.base_url_overrides
            .get(&source_name.to_lowercase())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Overall deadline for one fan-out across sources
    pub deadline_ms: u64,

    pub cache_ttl_seconds: u64,

    pub default_sort: SortOrder,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: defaults::AGGREGATION_DEADLINE_MS,
            cache_ttl_seconds: defaults::CACHE_TTL_SECONDS,
            default_sort: SortOrder::default(),
        }
    }
}

impl AggregationConfig {
    pub const fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Finished tasks older than this are garbage-collected
    pub retention_seconds: u64,
    pub gc_interval_seconds: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            retention_seconds: defaults::TASK_RETENTION_SECONDS,
            gc_interval_seconds: defaults::TASK_GC_INTERVAL_SECONDS,
        }
    }
}

impl TaskConfig {
    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub const fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_seconds)
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs (file output only)
    pub json_format: bool,

    pub console_output: bool,
    pub file_output: bool,

    /// Directory for log files; defaults to the user data directory
    pub log_dir: Option<PathBuf>,

    /// Daily-rotated file name prefix
    pub file_prefix: String,

    /// Module-specific log level filters (e.g., "sqlx": "warn", "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            file_prefix: defaults::LOG_FILE_PREFIX.to_string(),
            module_filters: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (or `inshop.toml` when present) and the
    /// environment, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path),
            None => config::File::with_name(defaults::CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;

        info!(
            "Configuration loaded (deadline {}ms, cache ttl {}s)",
            config.aggregation.deadline_ms, config.aggregation.cache_ttl_seconds
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Validation { message });

        if self.scraping.request_timeout_seconds == 0 {
            return invalid("scraping.request_timeout_seconds must be greater than 0".into());
        }
        if self.scraping.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return invalid("scraping.user_agents must contain at least one entry".into());
        }
        if self.scraping.max_pages == 0 {
            return invalid("scraping.max_pages must be at least 1".into());
        }
        for (name, url) in &self.scraping.base_url_overrides {
            if let Err(e) = Url::parse(url) {
                return invalid(format!("scraping.base_url_overrides.{name}: {e}"));
            }
        }
        if self.aggregation.deadline_ms == 0 {
            return invalid("aggregation.deadline_ms must be greater than 0".into());
        }
        if self.tasks.gc_interval_seconds == 0 {
            return invalid("tasks.gc_interval_seconds must be greater than 0".into());
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be greater than 0".into());
        }
        if !self.logging.console_output && !self.logging.file_output {
            return invalid("logging needs console_output or file_output".into());
        }
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    pub const CONFIG_FILE: &str = "inshop";
    pub const ENV_PREFIX: &str = "INSHOP";

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;
    pub const REQUEST_DELAY_MS: u64 = 1000;
    pub const MAX_PAGES: u32 = 1;

    pub const AGGREGATION_DEADLINE_MS: u64 = 20_000;
    pub const CACHE_TTL_SECONDS: u64 = 300;

    /// One day
    pub const TASK_RETENTION_SECONDS: u64 = 86_400;
    pub const TASK_GC_INTERVAL_SECONDS: u64 = 600;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_PREFIX: &str = "inshop.log";

    pub const DATABASE_URL: &str = "sqlite://data/inshop.db";
    pub const DATABASE_MAX_CONNECTIONS: u32 = 5;

    pub const USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    ];
}
