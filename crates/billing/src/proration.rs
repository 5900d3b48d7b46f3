//! Proration arithmetic for mid-cycle tier and interval changes
//!
//! Pure date/amount math, no I/O. Everything is integer minor units so the
//! calculation can neither lose nor fabricate fractions of a cent: each share
//! is a single division rounded half up, and the net amount is the exact
//! difference of the two rounded shares.

use time::Date;

use crate::error::{BillingError, BillingResult};

/// Breakdown of a mid-cycle price change.
///
/// `net_amount_cents` may be negative (downgrade); the tier-change service
/// treats `net <= 0` as an immediate free switch and `net > 0` as a charge
/// to collect before the switch applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proration {
    pub total_days: i64,
    pub days_used: i64,
    pub days_remaining: i64,
    pub unused_credit_cents: i64,
    pub new_charge_cents: i64,
    pub net_amount_cents: i64,
}

/// Compute the prorated credit/charge for switching from `old_price_cents`
/// to `new_price_cents` on `effective_date`, inside the billing period
/// `[period_start, period_end)`.
///
/// Day convention: the period covers `period_end - period_start` days,
/// start inclusive, end exclusive. `effective_date` must satisfy
/// `period_start <= effective_date <= period_end`; the remaining-day count
/// is clamped into `[0, total_days]`.
pub fn prorate(
    old_price_cents: i64,
    new_price_cents: i64,
    period_start: Date,
    period_end: Date,
    effective_date: Date,
) -> BillingResult<Proration> {
    let total_days = (period_end - period_start).whole_days();
    if total_days <= 0 {
        return Err(BillingError::InvalidProrationWindow(format!(
            "Period {} .. {} has no billable days",
            period_start, period_end
        )));
    }

    if effective_date < period_start || effective_date > period_end {
        return Err(BillingError::InvalidProrationWindow(format!(
            "Effective date {} is outside period {} .. {}",
            effective_date, period_start, period_end
        )));
    }

    let days_remaining = (period_end - effective_date).whole_days().clamp(0, total_days);

    let unused_credit_cents = daily_share(old_price_cents, days_remaining, total_days);
    let new_charge_cents = daily_share(new_price_cents, days_remaining, total_days);

    Ok(Proration {
        total_days,
        days_used: total_days - days_remaining,
        days_remaining,
        unused_credit_cents,
        new_charge_cents,
        net_amount_cents: new_charge_cents - unused_credit_cents,
    })
}

/// Value of `days_remaining` days out of a `total_days`-day period priced at
/// `price_cents`, rounded half up to a whole cent.
///
/// Currency rounding here is always round-half-up, never banker's rounding,
/// so statements match what the payment gateway charges.
fn daily_share(price_cents: i64, days_remaining: i64, total_days: i64) -> i64 {
    debug_assert!(total_days > 0);
    let numerator = price_cents * days_remaining;
    (2 * numerator + total_days) / (2 * total_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_upgrade_mid_cycle() {
        // 30-day period, old $10, new $30, switch on day 10 (20 days left):
        // credit 6.67, charge 20.00, net 13.33
        let p = prorate(
            1_000,
            3_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            date!(2026 - 03 - 11),
        )
        .unwrap();

        assert_eq!(p.total_days, 30);
        assert_eq!(p.days_remaining, 20);
        assert_eq!(p.days_used, 10);
        assert_eq!(p.unused_credit_cents, 667);
        assert_eq!(p.new_charge_cents, 2_000);
        assert_eq!(p.net_amount_cents, 1_333);
    }

    #[test]
    fn test_downgrade_is_non_positive() {
        let p = prorate(
            3_000,
            1_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            date!(2026 - 03 - 16),
        )
        .unwrap();

        assert!(p.net_amount_cents <= 0);
        assert_eq!(p.net_amount_cents, p.new_charge_cents - p.unused_credit_cents);
    }

    #[test]
    fn test_switch_on_period_start_charges_full_difference() {
        let p = prorate(
            1_000,
            3_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            date!(2026 - 03 - 01),
        )
        .unwrap();

        assert_eq!(p.days_remaining, 30);
        assert_eq!(p.unused_credit_cents, 1_000);
        assert_eq!(p.new_charge_cents, 3_000);
        assert_eq!(p.net_amount_cents, 2_000);
    }

    #[test]
    fn test_switch_on_period_end_is_free() {
        let p = prorate(
            1_000,
            3_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            date!(2026 - 03 - 31),
        )
        .unwrap();

        assert_eq!(p.days_remaining, 0);
        assert_eq!(p.unused_credit_cents, 0);
        assert_eq!(p.new_charge_cents, 0);
        assert_eq!(p.net_amount_cents, 0);
    }

    #[test]
    fn test_effective_date_outside_window_rejected() {
        let err = prorate(
            1_000,
            3_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            date!(2026 - 04 - 01),
        )
        .unwrap_err();
        assert!(matches!(err, BillingError::InvalidProrationWindow(_)));

        let err = prorate(
            1_000,
            3_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            date!(2026 - 02 - 28),
        )
        .unwrap_err();
        assert!(matches!(err, BillingError::InvalidProrationWindow(_)));
    }

    #[test]
    fn test_zero_length_period_rejected() {
        let err = prorate(
            1_000,
            3_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 01),
        )
        .unwrap_err();
        assert!(matches!(err, BillingError::InvalidProrationWindow(_)));
    }

    #[test]
    fn test_rounding_is_half_up() {
        // 1 cent over 2 days with 1 remaining: 0.5 rounds up to 1
        assert_eq!(daily_share(1, 1, 2), 1);
        // 10.00 over 30 days, 20 remaining: 666.66... rounds to 667
        assert_eq!(daily_share(1_000, 20, 30), 667);
        // 10.00 over 30 days, 10 remaining: 333.33... rounds to 333
        assert_eq!(daily_share(1_000, 10, 30), 333);
        // exact thirds of 9.99: 666.0 stays 666
        assert_eq!(daily_share(999, 20, 30), 666);
    }
}
