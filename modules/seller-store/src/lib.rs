//! Date-keyed persistence for the daily aggregates.

pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;
pub mod store;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use error::{Result, StoreError};
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryAggregateStore;
pub use postgres::{connect, migrate, AggregateTable, PgAnalyticStore, PgStatisticStore};
pub use store::{AggregateStore, Fold};
