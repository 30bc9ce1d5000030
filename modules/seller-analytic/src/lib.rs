//! Statistic-event stage: turns each daily statistic snapshot into the
//! seller-facing analytics row. Terminal stage, nothing is republished.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod fold;

pub use aggregator::StatisticAggregator;
pub use config::AnalyticServiceConfig;
pub use error::{FoldError, Result};
pub use fold::apply_statistic;
