use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use seller_analytic::{AnalyticServiceConfig, StatisticAggregator};
use seller_broker::{start_pipeline, AmqpBus, MessageBus};
use seller_common::{file_config::load_config, AppConfig, StatisticEvent};
use seller_store::PgAnalyticStore;

#[derive(Parser)]
#[command(name = "analytic-service", about = "Derives seller analytics from daily statistics")]
struct Cli {
    /// Path to broker topology TOML file
    #[arg(long, default_value = "./config/analytic.toml")]
    config: PathBuf,

    /// Skip running database migrations on startup
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting analytic-service");

    let cli = Cli::parse();
    let topology: AnalyticServiceConfig = load_config(&cli.config)?;
    let config = AppConfig::from_env()?;

    let pool = seller_store::connect(&config)
        .await
        .context("Failed to connect to database")?;
    if !cli.skip_migrations {
        seller_store::migrate(&pool).await?;
    }

    let amqp = Arc::new(
        AmqpBus::connect(&config.amqp_url)
            .await
            .context("Failed to connect to broker")?,
    );
    let bus: Arc<dyn MessageBus> = amqp.clone();

    let aggregator = Arc::new(StatisticAggregator::new(Arc::new(PgAnalyticStore::new(pool))));
    let pipeline =
        start_pipeline::<StatisticEvent, _>("analytic", bus, topology.statistic, aggregator)
            .await
            .context("Failed to declare statistic topology")?;

    tracing::info!("analytic-service running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
        result = pipeline => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Statistic pipeline task panicked");
            }
            tracing::warn!("Statistic pipeline stopped, shutting down");
        }
    }

    amqp.close().await?;
    Ok(())
}
