//! Logging system configuration and initialization
//!
//! - `RUST_LOG` overrides everything when set
//! - Otherwise the configured level applies, with sqlx/reqwest/hyper kept quiet
//!   unless `trace` is requested
//! - Console output and a daily-rotated file (optionally JSON) can be combined

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the process lifetime
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

const QUIET_DIRECTIVES: &[&str] = &[
    "sqlx::query=warn",
    "sqlx::sqlite=warn",
    "reqwest=info",
    "hyper=warn",
    "hyper_util=warn",
    "h2=warn",
    "html5ever=warn",
    "selectors=warn",
];

/// Directory log files are written to when the config does not name one
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inshop")
        .join("logs")
}

/// Build the filter used when `RUST_LOG` is not set
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    if !config.level.to_lowercase().contains("trace") {
        for directive in QUIET_DIRECTIVES {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    for (module, level) in &config.module_filters {
        let directive = format!("{module}={level}");
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("Invalid module filter: {directive}"))?,
        );
    }
    Ok(filter)
}

/// Initialize the global subscriber. Fails if one is already installed.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(config)?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_timer(ChronoUtc::rfc_3339())
                .with_target(false)
                .boxed(),
        );
    }

    let mut log_dir = None;
    if config.file_output {
        let dir = config.log_dir.clone().unwrap_or_else(default_log_directory);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let (writer, guard) = non_blocking(rolling::daily(&dir, &config.file_prefix));
        LOG_GUARD
            .set(guard)
            .map_err(|_| anyhow!("Logging already initialized"))?;

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false);
        let file_layer = if config.json_format {
            file_layer
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            file_layer.with_target(true).boxed()
        };
        layers.push(file_layer);
        log_dir = Some(dir);
    }

    if layers.is_empty() {
        return Err(anyhow!("No logging output configured"));
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!("Logging system initialized (level: {})", config.level);
    if let Some(dir) = log_dir {
        info!("Log directory: {}", dir.display());
    }
    Ok(())
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_module_overrides() {
        let mut config = LoggingConfig::default();
        config
            .module_filters
            .insert("inshop_aggregator::infrastructure".into(), "debug".into());
        let filter = build_filter(&config).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("sqlx::query=warn"));
        assert!(rendered.contains("inshop_aggregator::infrastructure=debug"));
    }

    #[test]
    fn test_trace_level_keeps_dependencies_verbose() {
        let config = LoggingConfig {
            level: "trace".into(),
            ..LoggingConfig::default()
        };
        let rendered = build_filter(&config).unwrap().to_string();
        assert!(!rendered.contains("sqlx::query=warn"));
    }

    #[test]
    fn test_invalid_level_is_an_error() {
        let config = LoggingConfig {
            level: "inshop=loudest".into(),
            ..LoggingConfig::default()
        };
        assert!(build_filter(&config).is_err());
    }

    #[test]
    fn test_default_log_directory_is_namespaced() {
        assert!(default_log_directory().ends_with("inshop/logs"));
    }
}
