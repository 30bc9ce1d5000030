use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use seller_broker::{EventHandler, HandleOutcome, Publisher};
use seller_common::{parse_date, DailyStatistic, OrderEvent, StatisticEvent};
use seller_store::{AggregateStore, StoreError};
use tracing::{debug, error, warn};

use crate::error::{FoldError, Result};
use crate::fold::apply_order;

/// Keeps the `statistics` table current from order events and announces
/// every new daily snapshot downstream.
pub struct OrderAggregator {
    store: Arc<dyn AggregateStore<DailyStatistic>>,
    publisher: Publisher<StatisticEvent>,
}

impl OrderAggregator {
    pub fn new(
        store: Arc<dyn AggregateStore<DailyStatistic>>,
        publisher: Publisher<StatisticEvent>,
    ) -> Self {
        Self { store, publisher }
    }

    /// Fold the event into its day's row atomically. Returns the row as
    /// stored.
    ///
    /// A malformed `order_date` fails before the store is touched. An event
    /// that would overflow a counter leaves the row as it was.
    pub async fn fold(&self, event: &OrderEvent) -> Result<DailyStatistic> {
        let date = parse_date(&event.order_date)?;

        let folded = self
            .store
            .fold_by_date(
                date,
                Box::new(move |statistic: &mut DailyStatistic| {
                    apply_order(statistic, event).map_err(|e| StoreError::Rejected(e.to_string()))
                }),
            )
            .await;

        match folded {
            Ok(statistic) => Ok(statistic),
            Err(StoreError::Rejected(reason)) => Err(FoldError::Overflow(reason)),
            Err(e) => Err(e.into()),
        }
    }

    /// The stored statistic for one day, if any order touched it.
    pub async fn statistics_for(&self, date: NaiveDate) -> Result<Option<DailyStatistic>> {
        Ok(self.store.get_by_date(date).await?)
    }
}

#[async_trait]
impl EventHandler<OrderEvent> for OrderAggregator {
    async fn handle(&self, event: OrderEvent) -> HandleOutcome {
        let statistic = match self.fold(&event).await {
            Ok(statistic) => statistic,
            Err(FoldError::InvalidDate(e)) => {
                warn!(order_id = event.order_id, error = %e, "Dropping order event");
                return HandleOutcome::Dropped(e.to_string());
            }
            Err(e @ FoldError::Overflow(_)) => {
                warn!(
                    order_id = event.order_id,
                    order_date = %event.order_date,
                    error = %e,
                    "Dropping order event"
                );
                return HandleOutcome::Dropped(e.to_string());
            }
            Err(e) => {
                error!(
                    order_id = event.order_id,
                    order_date = %event.order_date,
                    error = %e,
                    "Failed to fold order event"
                );
                return HandleOutcome::Failed(e.to_string());
            }
        };

        debug!(
            order_id = event.order_id,
            date = %statistic.date,
            completed_order = statistic.completed_order,
            cancelled_order = statistic.cancelled_order,
            total_order = statistic.total_order,
            "Order event folded"
        );

        // The row stays written even if the announcement is lost.
        if let Err(e) = self.publisher.publish(&StatisticEvent::from(&statistic)).await {
            warn!(date = %statistic.date, error = %e, "Failed to publish statistic event");
        }

        HandleOutcome::Applied
    }
}
