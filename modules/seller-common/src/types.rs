use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A row of running counters keyed by a single calendar date.
pub trait DailyAggregate: Clone + Send + Sync + 'static {
    /// The zero-valued row a day starts from.
    fn zero(date: NaiveDate) -> Self;

    fn date(&self) -> NaiveDate;

    /// Storage identity, once the row exists.
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);
}

/// One day of order statistics, accumulated from order events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatistic {
    /// Storage identity. `None` until the row has been created.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub total_revenue: Decimal,
    pub total_product_sold: i64,
    pub completed_order: i64,
    pub cancelled_order: i64,
    pub total_order: i64,
}

impl DailyStatistic {
    /// The zero-valued statistic a fold starts from when no row exists yet.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            id: None,
            date,
            total_revenue: Decimal::ZERO,
            total_product_sold: 0,
            completed_order: 0,
            cancelled_order: 0,
            total_order: 0,
        }
    }
}

impl DailyAggregate for DailyStatistic {
    fn zero(date: NaiveDate) -> Self {
        Self::empty(date)
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

/// One day of seller analytics, derived from the latest statistic snapshot.
///
/// Counters are overwritten from each snapshot; the three ratios are only
/// replaced when their inputs are non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAnalytic {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub total_revenue: Decimal,
    pub completed_order: i64,
    pub cancelled_order: i64,
    pub total_order: i64,
    pub average_order_value: Decimal,
    pub sales_conversion_rate: Decimal,
    pub cancellation_order_rate: Decimal,
}

impl DailyAnalytic {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            id: None,
            date,
            total_revenue: Decimal::ZERO,
            completed_order: 0,
            cancelled_order: 0,
            total_order: 0,
            average_order_value: Decimal::ZERO,
            sales_conversion_rate: Decimal::ZERO,
            cancellation_order_rate: Decimal::ZERO,
        }
    }
}

impl DailyAggregate for DailyAnalytic {
    fn zero(date: NaiveDate) -> Self {
        Self::empty(date)
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
