//! Money rounding and conversion helpers.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! All helpers operate on `rust_decimal::Decimal`.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places stored for monetary quantities.
pub const MONEY_SCALE: u32 = 2;

/// Rounds a monetary amount to two decimal places using Banker's Rounding.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Converts a local-currency amount to USD given a rate in local units per USD.
///
/// Returns `None` when the rate is zero or missing.
#[must_use]
pub fn to_usd(local: Decimal, rate: Option<Decimal>) -> Option<Decimal> {
    match rate {
        Some(r) if !r.is_zero() => Some(round_money(local / r)),
        _ => None,
    }
}

/// Sums optional amounts, coalescing `None` to zero.
#[must_use]
pub fn sum_or_zero<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    amounts
        .into_iter()
        .map(|a| a.unwrap_or(Decimal::ZERO))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_bankers() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.00));
        assert_eq!(round_money(dec!(1.015)), dec!(1.02));
        assert_eq!(round_money(dec!(1.014)), dec!(1.01));
    }

    #[test]
    fn test_to_usd() {
        assert_eq!(to_usd(dec!(100), Some(dec!(2))), Some(dec!(50.00)));
        assert_eq!(to_usd(dec!(100), Some(dec!(0))), None);
        assert_eq!(to_usd(dec!(100), None), None);
    }

    #[test]
    fn test_sum_or_zero_coalesces_nulls() {
        let total = sum_or_zero([Some(dec!(10.50)), None, Some(dec!(4.50))]);
        assert_eq!(total, dec!(15.00));
    }

    #[test]
    fn test_sum_or_zero_empty() {
        let total = sum_or_zero(std::iter::empty());
        assert_eq!(total, Decimal::ZERO);
    }
}
