//! Postgres stores for the `statistics` and `analytics` tables.
//!
//! `fold_by_date` claims the date with an `INSERT ... ON CONFLICT DO
//! NOTHING`, locks the live row with `FOR UPDATE`, then folds and writes
//! inside the same transaction. Concurrent folds on one date therefore
//! queue on the row lock and each sees the previous one's result.
//! Plain `create` / `update` do not read-modify-write; a concurrent
//! `create` for a taken date surfaces as [`StoreError::DuplicateDate`].

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use seller_common::{AppConfig, DailyAnalytic, DailyStatistic};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::store::{AggregateStore, Fold};

/// Open a pool sized from configuration.
pub async fn connect(config: &AppConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

/// Run the embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Migrations applied");
    Ok(())
}

/// The two aggregate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateTable {
    Statistics,
    Analytics,
}

impl AggregateTable {
    pub fn name(self) -> &'static str {
        match self {
            AggregateTable::Statistics => "statistics",
            AggregateTable::Analytics => "analytics",
        }
    }
}

async fn soft_delete(pool: &PgPool, table: AggregateTable, date: NaiveDate) -> Result<bool> {
    let sql = format!(
        "UPDATE {} SET deleted_at = now(), updated_at = now() \
         WHERE date = $1 AND deleted_at IS NULL",
        table.name()
    );
    let result = sqlx::query(&sql).bind(date).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

async fn lock_live_row(
    conn: &mut PgConnection,
    table: AggregateTable,
    date: NaiveDate,
) -> Result<i64> {
    let sql = format!(
        "SELECT id FROM {} WHERE date = $1 AND deleted_at IS NULL FOR UPDATE",
        table.name()
    );
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(date)
        .fetch_optional(conn)
        .await?
        .ok_or(StoreError::NotFound(date))
}

/// Ensure a live row exists for `date`. A second claim on a fresh date
/// waits for the first transaction and then does nothing.
async fn claim_date(conn: &mut PgConnection, table: AggregateTable, date: NaiveDate) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (date) VALUES ($1) \
         ON CONFLICT (date) WHERE deleted_at IS NULL DO NOTHING",
        table.name()
    );
    sqlx::query(&sql).bind(date).execute(conn).await?;
    Ok(())
}

fn insert_error(date: NaiveDate, error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateDate(date),
        _ => StoreError::Database(error),
    }
}

// ---------------------------------------------------------------------------
// statistics
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct StatisticRow {
    id: i64,
    date: NaiveDate,
    total_revenue: Decimal,
    total_product_sold: i64,
    completed_order: i64,
    cancelled_order: i64,
    total_order: i64,
}

impl From<StatisticRow> for DailyStatistic {
    fn from(row: StatisticRow) -> Self {
        Self {
            id: Some(row.id),
            date: row.date,
            total_revenue: row.total_revenue,
            total_product_sold: row.total_product_sold,
            completed_order: row.completed_order,
            cancelled_order: row.cancelled_order,
            total_order: row.total_order,
        }
    }
}

async fn write_statistic(
    conn: &mut PgConnection,
    id: i64,
    statistic: &DailyStatistic,
) -> Result<DailyStatistic> {
    let row = sqlx::query_as::<_, StatisticRow>(
        r#"
        UPDATE statistics
        SET total_revenue = $2,
            total_product_sold = $3,
            completed_order = $4,
            cancelled_order = $5,
            total_order = $6,
            updated_at = now()
        WHERE id = $1
        RETURNING id, date, total_revenue, total_product_sold,
                  completed_order, cancelled_order, total_order
        "#,
    )
    .bind(id)
    .bind(statistic.total_revenue)
    .bind(statistic.total_product_sold)
    .bind(statistic.completed_order)
    .bind(statistic.cancelled_order)
    .bind(statistic.total_order)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

#[derive(Clone)]
pub struct PgStatisticStore {
    pool: PgPool,
}

impl PgStatisticStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AggregateStore<DailyStatistic> for PgStatisticStore {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailyStatistic>> {
        let row = sqlx::query_as::<_, StatisticRow>(
            r#"
            SELECT id, date, total_revenue, total_product_sold,
                   completed_order, cancelled_order, total_order
            FROM statistics
            WHERE date = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn create(&self, statistic: &DailyStatistic) -> Result<DailyStatistic> {
        let row = sqlx::query_as::<_, StatisticRow>(
            r#"
            INSERT INTO statistics
                (date, total_revenue, total_product_sold,
                 completed_order, cancelled_order, total_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, date, total_revenue, total_product_sold,
                      completed_order, cancelled_order, total_order
            "#,
        )
        .bind(statistic.date)
        .bind(statistic.total_revenue)
        .bind(statistic.total_product_sold)
        .bind(statistic.completed_order)
        .bind(statistic.cancelled_order)
        .bind(statistic.total_order)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| insert_error(statistic.date, e))?;

        Ok(row.into())
    }

    async fn update(&self, statistic: &DailyStatistic) -> Result<DailyStatistic> {
        let mut tx = self.pool.begin().await?;
        let id = lock_live_row(&mut tx, AggregateTable::Statistics, statistic.date).await?;
        let stored = write_statistic(&mut tx, id, statistic).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn fold_by_date<'a>(
        &self,
        date: NaiveDate,
        fold: Fold<'a, DailyStatistic>,
    ) -> Result<DailyStatistic> {
        let mut tx = self.pool.begin().await?;
        claim_date(&mut tx, AggregateTable::Statistics, date).await?;

        let row = sqlx::query_as::<_, StatisticRow>(
            r#"
            SELECT id, date, total_revenue, total_product_sold,
                   completed_order, cancelled_order, total_order
            FROM statistics
            WHERE date = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;

        let id = row.id;
        let mut statistic = DailyStatistic::from(row);
        fold(&mut statistic)?;

        let stored = write_statistic(&mut tx, id, &statistic).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn soft_delete(&self, date: NaiveDate) -> Result<bool> {
        soft_delete(&self.pool, AggregateTable::Statistics, date).await
    }
}

// ---------------------------------------------------------------------------
// analytics
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct AnalyticRow {
    id: i64,
    date: NaiveDate,
    total_revenue: Decimal,
    completed_order: i64,
    cancelled_order: i64,
    total_order: i64,
    average_order_value: Decimal,
    sales_conversion_rate: Decimal,
    cancellation_order_rate: Decimal,
}

impl From<AnalyticRow> for DailyAnalytic {
    fn from(row: AnalyticRow) -> Self {
        Self {
            id: Some(row.id),
            date: row.date,
            total_revenue: row.total_revenue,
            completed_order: row.completed_order,
            cancelled_order: row.cancelled_order,
            total_order: row.total_order,
            average_order_value: row.average_order_value,
            sales_conversion_rate: row.sales_conversion_rate,
            cancellation_order_rate: row.cancellation_order_rate,
        }
    }
}

async fn write_analytic(
    conn: &mut PgConnection,
    id: i64,
    analytic: &DailyAnalytic,
) -> Result<DailyAnalytic> {
    let row = sqlx::query_as::<_, AnalyticRow>(
        r#"
        UPDATE analytics
        SET total_revenue = $2,
            completed_order = $3,
            cancelled_order = $4,
            total_order = $5,
            average_order_value = $6,
            sales_conversion_rate = $7,
            cancellation_order_rate = $8,
            updated_at = now()
        WHERE id = $1
        RETURNING id, date, total_revenue, completed_order, cancelled_order, total_order,
                  average_order_value, sales_conversion_rate, cancellation_order_rate
        "#,
    )
    .bind(id)
    .bind(analytic.total_revenue)
    .bind(analytic.completed_order)
    .bind(analytic.cancelled_order)
    .bind(analytic.total_order)
    .bind(analytic.average_order_value)
    .bind(analytic.sales_conversion_rate)
    .bind(analytic.cancellation_order_rate)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

#[derive(Clone)]
pub struct PgAnalyticStore {
    pool: PgPool,
}

impl PgAnalyticStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AggregateStore<DailyAnalytic> for PgAnalyticStore {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailyAnalytic>> {
        let row = sqlx::query_as::<_, AnalyticRow>(
            r#"
            SELECT id, date, total_revenue, completed_order, cancelled_order, total_order,
                   average_order_value, sales_conversion_rate, cancellation_order_rate
            FROM analytics
            WHERE date = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn create(&self, analytic: &DailyAnalytic) -> Result<DailyAnalytic> {
        let row = sqlx::query_as::<_, AnalyticRow>(
            r#"
            INSERT INTO analytics
                (date, total_revenue, completed_order, cancelled_order, total_order,
                 average_order_value, sales_conversion_rate, cancellation_order_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, date, total_revenue, completed_order, cancelled_order, total_order,
                      average_order_value, sales_conversion_rate, cancellation_order_rate
            "#,
        )
        .bind(analytic.date)
        .bind(analytic.total_revenue)
        .bind(analytic.completed_order)
        .bind(analytic.cancelled_order)
        .bind(analytic.total_order)
        .bind(analytic.average_order_value)
        .bind(analytic.sales_conversion_rate)
        .bind(analytic.cancellation_order_rate)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| insert_error(analytic.date, e))?;

        Ok(row.into())
    }

    async fn update(&self, analytic: &DailyAnalytic) -> Result<DailyAnalytic> {
        let mut tx = self.pool.begin().await?;
        let id = lock_live_row(&mut tx, AggregateTable::Analytics, analytic.date).await?;
        let stored = write_analytic(&mut tx, id, analytic).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn fold_by_date<'a>(
        &self,
        date: NaiveDate,
        fold: Fold<'a, DailyAnalytic>,
    ) -> Result<DailyAnalytic> {
        let mut tx = self.pool.begin().await?;
        claim_date(&mut tx, AggregateTable::Analytics, date).await?;

        let row = sqlx::query_as::<_, AnalyticRow>(
            r#"
            SELECT id, date, total_revenue, completed_order, cancelled_order, total_order,
                   average_order_value, sales_conversion_rate, cancellation_order_rate
            FROM analytics
            WHERE date = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;

        let id = row.id;
        let mut analytic = DailyAnalytic::from(row);
        fold(&mut analytic)?;

        let stored = write_analytic(&mut tx, id, &analytic).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn soft_delete(&self, date: NaiveDate) -> Result<bool> {
        soft_delete(&self.pool, AggregateTable::Analytics, date).await
    }
}
