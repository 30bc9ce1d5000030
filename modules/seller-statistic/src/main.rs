use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use seller_broker::{start_pipeline, AmqpBus, MessageBus, Publisher};
use seller_common::{file_config::load_config, AppConfig, OrderEvent, StatisticEvent};
use seller_statistic::{OrderAggregator, StatisticServiceConfig};
use seller_store::PgStatisticStore;

#[derive(Parser)]
#[command(name = "statistic-service", about = "Folds order events into daily statistics")]
struct Cli {
    /// Path to broker topology TOML file
    #[arg(long, default_value = "./config/statistic.toml")]
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

    tracing::info!("Starting statistic-service");

    let cli = Cli::parse();
    let topology: StatisticServiceConfig = load_config(&cli.config)?;
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

    let publisher = Publisher::<StatisticEvent>::declare(bus.clone(), topology.statistic)
        .await
        .context("Failed to declare statistic exchange")?;
    let aggregator = Arc::new(OrderAggregator::new(
        Arc::new(PgStatisticStore::new(pool)),
        publisher,
    ));

    let pipeline = start_pipeline::<OrderEvent, _>("statistic", bus, topology.order, aggregator)
        .await
        .context("Failed to declare order topology")?;

    tracing::info!("statistic-service running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
        result = pipeline => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Order pipeline task panicked");
            }
            tracing::warn!("Order pipeline stopped, shutting down");
        }
    }

    amqp.close().await?;
    Ok(())
}
