//! INShop command line entry point
//!
//! Runs one aggregation for the query given on the command line and prints
//! the report as JSON.
//!
//! ```text
//! inshop [--config <path>] [--gender men|women|unisex] [--sort <order>] <query...>
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tokio_util::sync::CancellationToken;
use tracing::info;

use inshop_aggregator::application::{AggregationRequest, Aggregator, CatalogHandle};
use inshop_aggregator::domain::{Gender, SortOrder, SourceRepository, TaskRegistry};
use inshop_aggregator::infrastructure::{
    AppConfig, DatabaseConnection, ResultCache, SqliteCatalog, build_default_adapters,
    init_logging_with_config,
};

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    gender: Option<Gender>,
    sort: Option<SortOrder>,
    query: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| anyhow!("{flag} needs a value"));
        match arg.as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--gender" => {
                let raw = value("--gender")?;
                parsed.gender = Some(raw.parse().map_err(|e| anyhow!("{e}"))?);
            }
            "--sort" => {
                let raw = value("--sort")?;
                parsed.sort = Some(raw.parse().map_err(|e| anyhow!("{e}"))?);
            }
            flag if flag.starts_with("--") => bail!("Unknown option {flag}"),
            _ => parsed.query.push(arg),
        }
    }

    if parsed.query.is_empty() {
        bail!("Usage: inshop [--config <path>] [--gender men|women|unisex] [--sort <order>] <query...>");
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging_with_config(&config.logging)?;

    let database = DatabaseConnection::new(&config.database.url, config.database.max_connections).await?;
    database.migrate().await?;
    let store = Arc::new(SqliteCatalog::new(database.pool().clone()));
    store
        .initialize_defaults()
        .await
        .context("Failed to seed default sources")?;

    let adapters = build_default_adapters(&config.scraping)?;
    let aggregator = Aggregator::new(
        adapters,
        CatalogHandle::new(store),
        Arc::new(ResultCache::new()),
        config.aggregation.clone(),
    )
    .with_max_pages(config.scraping.max_pages);

    let registry = TaskRegistry::new();
    let shutdown = CancellationToken::new();
    let gc = registry.spawn_gc_loop(
        config.tasks.gc_interval(),
        config.tasks.retention(),
        shutdown.clone(),
    );

    let mut request = AggregationRequest::new(args.query.join(" "), args.gender);
    request.sort = args.sort;
    let report = aggregator.aggregate_with(request).await?;

    info!(
        "{} products from {} sources",
        report.products.len(),
        report.sources.len()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    shutdown.cancel();
    gc.await.context("Task gc loop panicked")?;
    Ok(())
}
