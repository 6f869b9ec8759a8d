pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::fetcher::CpiFetcher;
use crate::providers::util::HttpOptions;
use crate::providers::{BackupApiProvider, SeriesApiProvider};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Schedule { months: Option<u32> },
    Cpi { count: usize },
}

/// Wires the configured sources and the cache store into a fetcher.
pub fn build_fetcher(config: &AppConfig) -> Result<CpiFetcher> {
    let options = HttpOptions::from(&config.http);

    let primary = SeriesApiProvider::new(
        &config.sources.primary.url,
        config.sources.primary.value_kind,
        options.clone(),
    )
    .context("Failed to create primary CPI client")?;

    let recheck_interval = chrono::TimeDelta::try_hours(config.cache.recheck_hours)
        .with_context(|| {
            format!(
                "Invalid cache.recheck_hours: {}",
                config.cache.recheck_hours
            )
        })?;

    let mut fetcher = CpiFetcher::new(store::open_store(config), Arc::new(primary))
        .with_recheck_interval(recheck_interval);

    if let Some(backup) = &config.sources.backup {
        let backup = BackupApiProvider::new(&backup.url, backup.value_unit, options)
            .context("Failed to create backup CPI client")?;
        fetcher = fetcher.with_backup(Arc::new(backup));
    }
    Ok(fetcher)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("rentcpi starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let fetcher = build_fetcher(&config)?;

    match command {
        AppCommand::Schedule { months } => cli::schedule::run(&fetcher, &config, months).await,
        AppCommand::Cpi { count } => cli::cpi::run(&fetcher, count).await,
    }
}
