mod db;
mod ledger;
mod sync;
#[cfg(test)]
mod testing;
mod transformations;
mod types;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use db::DbPool;
use ledger::PgLedger;
use sync::{build_pipelines, PgDerivedStore, Scheduler};
use types::config::sync::SyncConfig;

const DEFAULT_CONFIG_PATH: &str = "config/config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = SyncConfig::load(&config_path)?;

    if let Some(secs) = env::var("SYNC_POLL_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        config.poll_interval_secs = secs;
    }

    load_required_env_vars(&config)?;

    let derived_url = env::var(&config.database_url_env_var)
        .with_context(|| format!("env var {} not set", config.database_url_env_var))?;
    let derived_pool = Arc::new(
        DbPool::new(&derived_url, config.pool_size)
            .await
            .context("failed to create derived database pool")?,
    );
    derived_pool
        .run_migrations()
        .await
        .context("failed to run database migrations")?;

    let ledger_pool = if config.ledger_url_env_var() == config.database_url_env_var {
        derived_pool.clone()
    } else {
        let ledger_url = env::var(config.ledger_url_env_var())
            .with_context(|| format!("env var {} not set", config.ledger_url_env_var()))?;
        Arc::new(
            DbPool::new(&ledger_url, config.pool_size)
                .await
                .context("failed to create ledger database pool")?,
        )
    };

    let ledger = Arc::new(PgLedger::new(ledger_pool));
    let store = Arc::new(PgDerivedStore::new(derived_pool));

    let mut scheduler = Scheduler::new();
    for pipeline in build_pipelines(&config, ledger, store) {
        scheduler.add(pipeline);
    }

    if scheduler.handles().is_empty() {
        tracing::warn!("All pipelines are disabled, nothing to do");
        return Ok(());
    }

    tracing::info!(
        "Started {} sync pipeline(s), poll interval {}s",
        scheduler.handles().len(),
        config.poll_interval_secs
    );

    scheduler.trigger_all();
    run_until_shutdown(&scheduler, config.poll_interval_secs).await?;

    tracing::info!("Shutting down, waiting for in-flight passes");
    scheduler.shutdown().await;
    tracing::info!("All sync workers stopped");
    Ok(())
}

/// Ensures the database URL env vars are set, loading .env if needed.
fn load_required_env_vars(config: &SyncConfig) -> anyhow::Result<()> {
    let required = [
        config.database_url_env_var.as_str(),
        config.ledger_url_env_var(),
    ];

    if required.iter().all(|var| env::var(var).is_ok()) {
        return Ok(());
    }

    dotenvy::dotenv().with_context(|| {
        format!("Missing env vars {:?} and failed to load .env file", required)
    })?;

    let still_missing: Vec<&str> = required
        .iter()
        .filter(|var| env::var(var).is_err())
        .copied()
        .collect();

    anyhow::ensure!(
        still_missing.is_empty(),
        "Missing required env vars after loading .env: {:?}",
        still_missing
    );

    Ok(())
}

/// Re-trigger every pipeline on a fixed interval until Ctrl-C.
async fn run_until_shutdown(scheduler: &Scheduler, poll_interval_secs: u64) -> anyhow::Result<()> {
    if poll_interval_secs == 0 {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(poll_interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for shutdown signal")?;
                return Ok(());
            }
            _ = ticker.tick() => {
                scheduler.trigger_all();
                for handle in scheduler.handles() {
                    let status = handle.status();
                    tracing::debug!(
                        "{}: {:?}, high-water mark {}, {} passes ok, {} failed",
                        handle.name(),
                        status.state,
                        status.high_water_mark,
                        status.passes_completed,
                        status.passes_failed
                    );
                }
            }
        }
    }
}
