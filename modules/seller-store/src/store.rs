use async_trait::async_trait;
use chrono::NaiveDate;
use seller_common::DailyAggregate;

use crate::error::Result;

/// In-place change applied to a day's row by [`AggregateStore::fold_by_date`].
/// Returning an error leaves the stored row untouched.
pub type Fold<'a, A> = Box<dyn FnOnce(&mut A) -> Result<()> + Send + 'a>;

/// Persistence for one kind of daily aggregate.
///
/// At most one live row exists per date. Soft-deleted rows are invisible to
/// every method and do not block a new row for the same date.
#[async_trait]
pub trait AggregateStore<A: DailyAggregate>: Send + Sync {
    /// Exact-date lookup. `None` means nothing was recorded for that day.
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<A>>;

    /// Insert a new row. Fails with `DuplicateDate` if the date is taken.
    async fn create(&self, aggregate: &A) -> Result<A>;

    /// Overwrite the live row for `aggregate.date()` with the given values.
    async fn update(&self, aggregate: &A) -> Result<A>;

    /// Load the live row for `date` (or a zero row when there is none),
    /// apply `fold` and write the result, as one atomic step. Concurrent
    /// folds on the same date apply one after the other.
    async fn fold_by_date<'a>(&self, date: NaiveDate, fold: Fold<'a, A>) -> Result<A>;

    /// Stamp the live row as deleted. Returns whether a row was affected.
    async fn soft_delete(&self, date: NaiveDate) -> Result<bool>;
}
