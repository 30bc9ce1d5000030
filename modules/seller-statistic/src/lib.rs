//! Order-event stage: folds order lifecycle events into the daily
//! statistic and republishes the result as a statistic event.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod fold;

pub use aggregator::OrderAggregator;
pub use config::StatisticServiceConfig;
pub use error::{FoldError, Result};
pub use fold::{apply_order, Overflow};
