use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use seller_broker::{EventHandler, HandleOutcome};
use seller_common::{parse_date, DailyAnalytic, StatisticEvent};
use seller_store::AggregateStore;
use tracing::{debug, error, warn};

use crate::error::{FoldError, Result};
use crate::fold::apply_statistic;

/// Keeps the `analytics` table current from statistic snapshots.
pub struct StatisticAggregator {
    store: Arc<dyn AggregateStore<DailyAnalytic>>,
}

impl StatisticAggregator {
    pub fn new(store: Arc<dyn AggregateStore<DailyAnalytic>>) -> Self {
        Self { store }
    }

    pub async fn fold(&self, event: &StatisticEvent) -> Result<DailyAnalytic> {
        let date = parse_date(&event.date)?;

        let analytic = self
            .store
            .fold_by_date(
                date,
                Box::new(move |analytic: &mut DailyAnalytic| {
                    apply_statistic(analytic, event);
                    Ok(())
                }),
            )
            .await?;

        Ok(analytic)
    }

    pub async fn analytics_for(&self, date: NaiveDate) -> Result<Option<DailyAnalytic>> {
        Ok(self.store.get_by_date(date).await?)
    }
}

#[async_trait]
impl EventHandler<StatisticEvent> for StatisticAggregator {
    async fn handle(&self, event: StatisticEvent) -> HandleOutcome {
        match self.fold(&event).await {
            Ok(analytic) => {
                debug!(
                    date = %analytic.date,
                    average_order_value = %analytic.average_order_value,
                    sales_conversion_rate = %analytic.sales_conversion_rate,
                    cancellation_order_rate = %analytic.cancellation_order_rate,
                    "Statistic event folded"
                );
                HandleOutcome::Applied
            }
            Err(FoldError::InvalidDate(e)) => {
                warn!(error = %e, "Dropping statistic event");
                HandleOutcome::Dropped(e.to_string())
            }
            Err(e) => {
                error!(date = %event.date, error = %e, "Failed to fold statistic event");
                HandleOutcome::Failed(e.to_string())
            }
        }
    }
}
