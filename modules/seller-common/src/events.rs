//! Wire payloads exchanged between services over the broker.
//!
//! Field names and the `YYYY-MM-DD` date strings are the contract between the
//! buyer, statistic and analytic services. Decimals travel as JSON numbers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::date::format_date;
use crate::types::DailyStatistic;

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Order lifecycle status as carried in `order_status`.
///
/// Any integer is accepted on the wire. Codes outside 0..=2 are kept verbatim
/// in `Other` and fold like `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum OrderStatus {
    #[default]
    New,
    Completed,
    Cancelled,
    Other(i64),
}

impl OrderStatus {
    pub const NEW: i64 = 0;
    pub const COMPLETED: i64 = 1;
    pub const CANCELLED: i64 = 2;

    pub fn code(self) -> i64 {
        i64::from(self)
    }
}

impl From<i64> for OrderStatus {
    fn from(code: i64) -> Self {
        match code {
            Self::NEW => OrderStatus::New,
            Self::COMPLETED => OrderStatus::Completed,
            Self::CANCELLED => OrderStatus::Cancelled,
            other => OrderStatus::Other(other),
        }
    }
}

impl From<OrderStatus> for i64 {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::New => OrderStatus::NEW,
            OrderStatus::Completed => OrderStatus::COMPLETED,
            OrderStatus::Cancelled => OrderStatus::CANCELLED,
            OrderStatus::Other(code) => code,
        }
    }
}

// ---------------------------------------------------------------------------
// OrderEvent
// ---------------------------------------------------------------------------

/// Emitted by the buyer service once per order state transition.
///
/// Missing fields decode to zero values; an absent `order_date` therefore
/// arrives as `""` and is rejected by the aggregator, not by the decoder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderEvent {
    pub order_id: i64,
    pub order_date: String,
    pub order_status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    pub total_product_sold: i64,
}

// ---------------------------------------------------------------------------
// StatisticEvent
// ---------------------------------------------------------------------------

/// Derived snapshot of one day's statistics, published after every fold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticEvent {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    pub completed_order: i64,
    pub canceled_order: i64,
    pub total_order: i64,
    pub date: String,
}

impl From<&DailyStatistic> for StatisticEvent {
    fn from(stat: &DailyStatistic) -> Self {
        Self {
            total_revenue: stat.total_revenue,
            completed_order: stat.completed_order,
            canceled_order: stat.cancelled_order,
            total_order: stat.total_order,
            date: format_date(stat.date),
        }
    }
}
