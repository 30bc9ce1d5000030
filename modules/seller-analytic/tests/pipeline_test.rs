//! Both stages wired through one in-memory broker, using the shipped
//! topology files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use seller_analytic::{AnalyticServiceConfig, StatisticAggregator};
use seller_broker::{start_pipeline, MemoryBroker, MessageBus, Publisher, PublisherConfig};
use seller_common::file_config::load_config;
use seller_common::{DailyAnalytic, DailyStatistic, OrderEvent, StatisticEvent};
use seller_statistic::{OrderAggregator, StatisticServiceConfig};
use seller_store::MemoryAggregateStore;

fn config_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../config")
        .join(name)
}

struct Pipeline {
    broker: MemoryBroker,
    orders: Publisher<OrderEvent>,
    statistics: Arc<MemoryAggregateStore<DailyStatistic>>,
    analytics: Arc<MemoryAggregateStore<DailyAnalytic>>,
    statistic_task: tokio::task::JoinHandle<()>,
    analytic_task: tokio::task::JoinHandle<()>,
    order_queue: String,
    statistic_queue: String,
}

async fn start() -> Pipeline {
    let statistic_config: StatisticServiceConfig =
        load_config(&config_path("statistic.toml")).unwrap();
    let analytic_config: AnalyticServiceConfig =
        load_config(&config_path("analytic.toml")).unwrap();
    let buyer_config: PublisherConfig = load_config(&config_path("buyer.toml")).unwrap();

    let broker = MemoryBroker::new();
    let bus: Arc<dyn MessageBus> = Arc::new(broker.clone());

    let statistics = Arc::new(MemoryAggregateStore::<DailyStatistic>::new());
    let analytics = Arc::new(MemoryAggregateStore::<DailyAnalytic>::new());

    let order_queue = statistic_config.order.queue.name.clone();
    let statistic_queue = analytic_config.statistic.queue.name.clone();

    let statistic_publisher =
        Publisher::<StatisticEvent>::declare(bus.clone(), statistic_config.statistic)
            .await
            .unwrap();
    let statistic_task = start_pipeline::<OrderEvent, _>(
        "statistic",
        bus.clone(),
        statistic_config.order,
        Arc::new(OrderAggregator::new(statistics.clone(), statistic_publisher)),
    )
    .await
    .unwrap();

    let analytic_task = start_pipeline::<StatisticEvent, _>(
        "analytic",
        bus.clone(),
        analytic_config.statistic,
        Arc::new(StatisticAggregator::new(analytics.clone())),
    )
    .await
    .unwrap();

    let orders = Publisher::<OrderEvent>::declare(bus, buyer_config)
        .await
        .unwrap();

    Pipeline {
        broker,
        orders,
        statistics,
        analytics,
        statistic_task,
        analytic_task,
        order_queue,
        statistic_queue,
    }
}

impl Pipeline {
    /// Close the queues stage by stage and wait for both loops to drain.
    async fn drain(&mut self) {
        self.broker.close_queue(&self.order_queue);
        (&mut self.statistic_task).await.unwrap();
        self.broker.close_queue(&self.statistic_queue);
        (&mut self.analytic_task).await.unwrap();
    }
}

fn jan(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, d).unwrap()
}

#[tokio::test]
async fn completed_order_flows_to_analytics() {
    let mut pipeline = start().await;

    let order: OrderEvent = serde_json::from_value(serde_json::json!({
        "order_id": 1,
        "order_date": "2022-01-01",
        "order_status": 1,
        "total_revenue": 100,
        "total_product_sold": 4
    }))
    .unwrap();
    pipeline.orders.publish(&order).await.unwrap();

    pipeline.drain().await;

    let statistic = &pipeline.statistics.rows()[0];
    assert_eq!(statistic.date, jan(1));
    assert_eq!(statistic.completed_order, 1);
    assert_eq!(statistic.total_revenue, Decimal::from(100));
    assert_eq!(statistic.total_product_sold, 4);

    let published: Vec<StatisticEvent> = pipeline.broker.published_as("statistic");
    assert_eq!(
        published,
        vec![StatisticEvent {
            total_revenue: Decimal::from(100),
            completed_order: 1,
            canceled_order: 0,
            total_order: 0,
            date: "2022-01-01".to_string(),
        }]
    );

    let analytic = &pipeline.analytics.rows()[0];
    assert_eq!(analytic.date, jan(1));
    assert_eq!(analytic.average_order_value, Decimal::from(100));
    assert_eq!(analytic.sales_conversion_rate, Decimal::ZERO);
    assert_eq!(analytic.cancellation_order_rate, Decimal::ZERO);
}

#[tokio::test]
async fn bad_messages_do_not_stop_the_pipeline() {
    let mut pipeline = start().await;

    pipeline
        .broker
        .inject(&pipeline.order_queue, "order.created", "{ not json")
        .unwrap();

    let bad_date = OrderEvent {
        order_date: "2022,01-01".to_string(),
        ..OrderEvent::default()
    };
    pipeline.orders.publish(&bad_date).await.unwrap();

    for status in [0, 1, 2] {
        let event = OrderEvent {
            order_id: status + 10,
            order_date: "2022-01-02".to_string(),
            order_status: status.into(),
            total_revenue: Decimal::from(40),
            total_product_sold: 2,
        };
        pipeline.orders.publish(&event).await.unwrap();
    }

    pipeline.drain().await;

    let statistics = pipeline.statistics.rows();
    assert_eq!(statistics.len(), 1);
    assert_eq!(statistics[0].date, jan(2));
    assert_eq!(statistics[0].total_order, 1);
    assert_eq!(statistics[0].completed_order, 1);
    assert_eq!(statistics[0].cancelled_order, 1);

    // One snapshot per applied order, each folded into the same analytics row.
    assert_eq!(pipeline.broker.published("statistic").len(), 3);
    assert_eq!(pipeline.analytics.creates(), 1);
    assert_eq!(pipeline.analytics.updates(), 2);

    let analytic = &pipeline.analytics.rows()[0];
    assert_eq!(analytic.average_order_value, Decimal::from(40));
    assert_eq!(analytic.sales_conversion_rate, Decimal::from(100));
    assert_eq!(analytic.cancellation_order_rate, Decimal::from(100));
}
