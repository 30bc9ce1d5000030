//! Operator CLI: run migrations, publish a test order, inspect or forget
//! a day's aggregates.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use seller_broker::{AmqpBus, MessageBus, Publisher, PublisherConfig};
use seller_common::{file_config::load_config, parse_date, AppConfig, OrderEvent, OrderStatus};
use seller_store::{AggregateStore, AggregateTable, PgAnalyticStore, PgStatisticStore};

#[derive(Parser)]
#[command(name = "seller", about = "Seller statistics pipeline tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Publish one order event, as the buyer service would
    PublishOrder {
        /// Publisher topology TOML file
        #[arg(long, default_value = "./config/buyer.toml")]
        config: PathBuf,

        #[arg(long)]
        order_id: i64,

        /// Order date, YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// 0 = new, 1 = completed, 2 = cancelled
        #[arg(long, default_value_t = OrderStatus::COMPLETED)]
        status: i64,

        #[arg(long, default_value = "0")]
        revenue: Decimal,

        #[arg(long, default_value_t = 0)]
        products: i64,
    },

    /// Show the statistic row for a day
    Statistic {
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
    },

    /// Show the analytics row for a day
    Analytic {
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
    },

    /// Soft-delete a day's row so the next event starts it over
    Forget {
        #[arg(long, value_enum)]
        table: Table,

        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Table {
    Statistics,
    Analytics,
}

impl From<Table> for AggregateTable {
    fn from(table: Table) -> Self {
        match table {
            Table::Statistics => AggregateTable::Statistics,
            Table::Analytics => AggregateTable::Analytics,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Migrate => {
            let pool = seller_store::connect(&AppConfig::from_env()?).await?;
            seller_store::migrate(&pool).await?;
        }
        Command::PublishOrder {
            config,
            order_id,
            date,
            status,
            revenue,
            products,
        } => {
            let event = OrderEvent {
                order_id,
                order_date: date,
                order_status: OrderStatus::from(status),
                total_revenue: revenue,
                total_product_sold: products,
            };
            publish_order(&config, &event).await?;
        }
        Command::Statistic { date } => {
            let pool = seller_store::connect(&AppConfig::from_env()?).await?;
            let row = PgStatisticStore::new(pool).get_by_date(date).await?;
            print_row(date, row)?;
        }
        Command::Analytic { date } => {
            let pool = seller_store::connect(&AppConfig::from_env()?).await?;
            let row = PgAnalyticStore::new(pool).get_by_date(date).await?;
            print_row(date, row)?;
        }
        Command::Forget { table, date } => {
            let pool = seller_store::connect(&AppConfig::from_env()?).await?;
            let deleted = match AggregateTable::from(table) {
                AggregateTable::Statistics => PgStatisticStore::new(pool).soft_delete(date).await?,
                AggregateTable::Analytics => PgAnalyticStore::new(pool).soft_delete(date).await?,
            };
            if deleted {
                tracing::info!(table = AggregateTable::from(table).name(), %date, "Row soft-deleted");
            } else {
                tracing::warn!(table = AggregateTable::from(table).name(), %date, "No live row");
            }
        }
    }

    Ok(())
}

async fn publish_order(config_path: &std::path::Path, event: &OrderEvent) -> Result<()> {
    let topology: PublisherConfig = load_config(config_path)?;
    let amqp = Arc::new(
        AmqpBus::connect(&AppConfig::broker_from_env()?)
            .await
            .context("Failed to connect to broker")?,
    );
    let bus: Arc<dyn MessageBus> = amqp.clone();

    let publisher = Publisher::<OrderEvent>::declare(bus, topology).await?;
    publisher.publish(event).await?;
    tracing::info!(
        order_id = event.order_id,
        exchange = publisher.exchange(),
        "Order event published"
    );

    amqp.close().await?;
    Ok(())
}

fn print_row<T: serde::Serialize>(date: NaiveDate, row: Option<T>) -> Result<()> {
    match row {
        Some(row) => println!("{}", serde_json::to_string_pretty(&row)?),
        None => println!("No activity recorded for {date}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_order_defaults_to_completed() {
        let cli = Cli::try_parse_from([
            "seller",
            "publish-order",
            "--order-id",
            "1",
            "--date",
            "2022-01-01",
            "--revenue",
            "100.50",
        ])
        .unwrap();

        match cli.command {
            Command::PublishOrder {
                status,
                revenue,
                products,
                config,
                ..
            } => {
                assert_eq!(status, OrderStatus::COMPLETED);
                assert_eq!(revenue, Decimal::new(10050, 2));
                assert_eq!(products, 0);
                assert_eq!(config, PathBuf::from("./config/buyer.toml"));
            }
            _ => panic!("expected publish-order"),
        }
    }

    #[test]
    fn read_commands_reject_malformed_dates() {
        assert!(Cli::try_parse_from(["seller", "statistic", "--date", "2022,01-01"]).is_err());
        assert!(Cli::try_parse_from(["seller", "analytic", "--date", "2022-01-01"]).is_ok());
    }

    #[test]
    fn forget_takes_a_table_name() {
        let cli =
            Cli::try_parse_from(["seller", "forget", "--table", "analytics", "--date", "2022-01-01"])
                .unwrap();
        match cli.command {
            Command::Forget { table, date } => {
                assert_eq!(AggregateTable::from(table), AggregateTable::Analytics);
                assert_eq!(date, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
            }
            _ => panic!("expected forget"),
        }
        let unknown =
            Cli::try_parse_from(["seller", "forget", "--table", "orders", "--date", "2022-01-01"]);
        assert!(unknown.is_err());
    }
}
