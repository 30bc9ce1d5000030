use rust_decimal::Decimal;
use seller_common::{DailyAnalytic, StatisticEvent};

/// Decimal places kept on every derived ratio.
pub const RATIO_SCALE: u32 = 4;

const PERCENT: Decimal = Decimal::ONE_HUNDRED;

/// Overwrite the counters from a statistic snapshot and refresh the ratios.
///
/// Each ratio is only recomputed when both of its inputs are positive;
/// otherwise it keeps whatever the row held before (zero for a new row).
pub fn apply_statistic(analytic: &mut DailyAnalytic, event: &StatisticEvent) {
    analytic.total_revenue = event.total_revenue;
    analytic.completed_order = event.completed_order;
    analytic.cancelled_order = event.canceled_order;
    analytic.total_order = event.total_order;

    let revenue = event.total_revenue;
    let completed = Decimal::from(event.completed_order);
    let cancelled = Decimal::from(event.canceled_order);
    let total = Decimal::from(event.total_order);

    if revenue > Decimal::ZERO && completed > Decimal::ZERO {
        analytic.average_order_value = (revenue / completed).round_dp(RATIO_SCALE);
    }
    if completed > Decimal::ZERO && total > Decimal::ZERO {
        analytic.sales_conversion_rate = (completed * PERCENT / total).round_dp(RATIO_SCALE);
    }
    if cancelled > Decimal::ZERO && total > Decimal::ZERO {
        analytic.cancellation_order_rate = (cancelled * PERCENT / total).round_dp(RATIO_SCALE);
    }
}
