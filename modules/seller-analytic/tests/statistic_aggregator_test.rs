//! Statistic-event folding against the in-memory store.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use seller_analytic::StatisticAggregator;
use seller_broker::{EventHandler, HandleOutcome};
use seller_common::{DailyAnalytic, StatisticEvent};
use seller_store::{AggregateStore, MemoryAggregateStore};

fn setup() -> (Arc<MemoryAggregateStore<DailyAnalytic>>, StatisticAggregator) {
    let store = Arc::new(MemoryAggregateStore::<DailyAnalytic>::new());
    let aggregator = StatisticAggregator::new(store.clone());
    (store, aggregator)
}

fn snapshot(date: &str, revenue: i64, completed: i64, cancelled: i64, total: i64) -> StatisticEvent {
    StatisticEvent {
        total_revenue: Decimal::from(revenue),
        completed_order: completed,
        canceled_order: cancelled,
        total_order: total,
        date: date.to_string(),
    }
}

fn jan(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, d).unwrap()
}

#[tokio::test]
async fn snapshots_overwrite_counters_on_one_row() {
    let (store, aggregator) = setup();

    aggregator.handle(snapshot("2022-01-01", 100, 1, 0, 2)).await;
    aggregator.handle(snapshot("2022-01-01", 250, 2, 1, 4)).await;

    assert_eq!((store.creates(), store.updates()), (1, 1));
    let analytic = aggregator.analytics_for(jan(1)).await.unwrap().unwrap();
    assert_eq!(analytic.total_revenue, Decimal::from(250));
    assert_eq!(analytic.completed_order, 2);
    assert_eq!(analytic.cancelled_order, 1);
    assert_eq!(analytic.total_order, 4);
    assert_eq!(analytic.average_order_value, Decimal::from(125));
    assert_eq!(analytic.sales_conversion_rate, Decimal::from(50));
    assert_eq!(analytic.cancellation_order_rate, Decimal::from(25));
}

#[tokio::test]
async fn guarded_ratios_survive_a_zero_snapshot() {
    let (_store, aggregator) = setup();

    aggregator.handle(snapshot("2022-01-01", 300, 3, 1, 4)).await;
    aggregator.handle(snapshot("2022-01-01", 0, 0, 0, 0)).await;

    let analytic = aggregator.analytics_for(jan(1)).await.unwrap().unwrap();
    assert_eq!(analytic.total_order, 0);
    assert_eq!(analytic.average_order_value, Decimal::from(100));
    assert_eq!(analytic.sales_conversion_rate, Decimal::from(75));
    assert_eq!(analytic.cancellation_order_rate, Decimal::from(25));
}

#[tokio::test]
async fn malformed_date_is_dropped_before_the_store() {
    let (store, aggregator) = setup();
    store.fail_reads(true);

    let outcome = aggregator.handle(snapshot("01/01/2022", 1, 1, 0, 1)).await;

    assert!(matches!(outcome, HandleOutcome::Dropped(_)));
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn store_failure_is_reported_as_failed() {
    let (store, aggregator) = setup();
    store.fail_writes(true);

    let outcome = aggregator.handle(snapshot("2022-01-01", 1, 1, 0, 1)).await;

    assert!(matches!(outcome, HandleOutcome::Failed(_)));
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn soft_deleted_day_starts_over() {
    let (store, aggregator) = setup();
    aggregator.handle(snapshot("2022-01-01", 300, 3, 1, 4)).await;

    assert!(store.soft_delete(jan(1)).await.unwrap());

    aggregator.handle(snapshot("2022-01-01", 50, 1, 0, 0)).await;
    let analytic = aggregator.analytics_for(jan(1)).await.unwrap().unwrap();
    assert_eq!(analytic.average_order_value, Decimal::from(50));
    assert_eq!(analytic.sales_conversion_rate, Decimal::ZERO);
    assert_eq!(store.creates(), 2);
}
