use seller_common::{DailyStatistic, OrderEvent, OrderStatus};

/// A counter that cannot absorb the event without overflowing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} would overflow")]
pub struct Overflow(pub &'static str);

fn bump(counter: i64, by: i64, field: &'static str) -> Result<i64, Overflow> {
    counter.checked_add(by).ok_or(Overflow(field))
}

/// Fold one order event into the day's running counters.
///
/// Exactly one counter group moves per event: a completed order adds its
/// revenue and products, a cancelled order counts as cancelled, and every
/// other status (new or unknown) counts toward `total_order`.
///
/// On overflow nothing is changed.
pub fn apply_order(statistic: &mut DailyStatistic, event: &OrderEvent) -> Result<(), Overflow> {
    match event.order_status {
        OrderStatus::Completed => {
            let revenue = statistic
                .total_revenue
                .checked_add(event.total_revenue)
                .ok_or(Overflow("total_revenue"))?;
            let products = bump(
                statistic.total_product_sold,
                event.total_product_sold,
                "total_product_sold",
            )?;
            let completed = bump(statistic.completed_order, 1, "completed_order")?;

            statistic.total_revenue = revenue;
            statistic.total_product_sold = products;
            statistic.completed_order = completed;
        }
        OrderStatus::Cancelled => {
            statistic.cancelled_order = bump(statistic.cancelled_order, 1, "cancelled_order")?;
        }
        OrderStatus::New | OrderStatus::Other(_) => {
            statistic.total_order = bump(statistic.total_order, 1, "total_order")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn order(status: OrderStatus, revenue: i64, products: i64) -> OrderEvent {
        OrderEvent {
            order_id: 1,
            order_date: "2022-01-01".to_string(),
            order_status: status,
            total_revenue: Decimal::from(revenue),
            total_product_sold: products,
        }
    }

    fn empty() -> DailyStatistic {
        DailyStatistic::empty(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap())
    }

    #[test]
    fn completed_adds_revenue_products_and_count() {
        let mut stat = empty();
        apply_order(&mut stat, &order(OrderStatus::Completed, 100, 4)).unwrap();
        apply_order(&mut stat, &order(OrderStatus::Completed, 50, 1)).unwrap();

        assert_eq!(stat.total_revenue, Decimal::from(150));
        assert_eq!(stat.total_product_sold, 5);
        assert_eq!(stat.completed_order, 2);
        assert_eq!(stat.cancelled_order, 0);
        assert_eq!(stat.total_order, 0);
    }

    #[test]
    fn cancelled_only_counts_cancellation() {
        let mut stat = empty();
        apply_order(&mut stat, &order(OrderStatus::Cancelled, 100, 4)).unwrap();

        assert_eq!(stat.cancelled_order, 1);
        assert_eq!(stat.total_revenue, Decimal::ZERO);
        assert_eq!(stat.total_product_sold, 0);
        assert_eq!(stat.completed_order, 0);
        assert_eq!(stat.total_order, 0);
    }

    #[test]
    fn new_and_unknown_statuses_count_toward_total() {
        let mut stat = empty();
        apply_order(&mut stat, &order(OrderStatus::New, 100, 4)).unwrap();
        apply_order(&mut stat, &order(OrderStatus::Other(9), 100, 4)).unwrap();

        assert_eq!(stat.total_order, 2);
        assert_eq!(stat.total_revenue, Decimal::ZERO);
        assert_eq!(stat.completed_order, 0);
        assert_eq!(stat.cancelled_order, 0);
    }

    #[test]
    fn revenue_overflow_changes_nothing() {
        let mut stat = empty();
        stat.total_revenue = Decimal::MAX;
        stat.completed_order = 7;

        let mut event = order(OrderStatus::Completed, 0, 3);
        event.total_revenue = Decimal::ONE;

        assert_eq!(apply_order(&mut stat, &event), Err(Overflow("total_revenue")));
        assert_eq!(stat.total_revenue, Decimal::MAX);
        assert_eq!(stat.total_product_sold, 0);
        assert_eq!(stat.completed_order, 7);
    }

    #[test]
    fn counter_overflow_is_reported() {
        let mut stat = empty();
        stat.total_order = i64::MAX;
        stat.total_product_sold = i64::MAX;

        assert_eq!(
            apply_order(&mut stat, &order(OrderStatus::New, 0, 0)),
            Err(Overflow("total_order"))
        );
        assert_eq!(
            apply_order(&mut stat, &order(OrderStatus::Completed, 1, 1)),
            Err(Overflow("total_product_sold"))
        );
        assert_eq!(stat.total_revenue, Decimal::ZERO);
        assert_eq!(stat.completed_order, 0);
    }
}
