//! Exchange rate collaborator interface.
//!
//! Rates are expressed as local currency units per USD. The provider is an
//! external collaborator (a db-backed implementation lives in the persistence
//! layer); the core only defines the lookup contract.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Digital currency pegged 1:1 to USD; never consults the provider.
pub const USDC: &str = "USDC";

/// Exchange rate lookup collaborator.
pub trait ExchangeRateProvider {
    /// Returns the rate (local units per USD) for `currency` as of `as_of`.
    fn rate(&self, currency: &str, as_of: NaiveDate) -> Option<Decimal>;
}

/// Resolves the exchange rate for a currency, short-circuiting USDC to 1.0.
#[must_use]
pub fn exchange_rate_for(
    provider: &dyn ExchangeRateProvider,
    currency: &str,
    as_of: NaiveDate,
) -> Option<Decimal> {
    if currency == USDC {
        return Some(Decimal::ONE);
    }
    provider.rate(currency, as_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct OneRate(Decimal);

    impl ExchangeRateProvider for OneRate {
        fn rate(&self, _currency: &str, _as_of: NaiveDate) -> Option<Decimal> {
            Some(self.0)
        }
    }

    struct NoRates;

    impl ExchangeRateProvider for NoRates {
        fn rate(&self, _currency: &str, _as_of: NaiveDate) -> Option<Decimal> {
            None
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn test_usdc_is_hardcoded_to_one() {
        // Even a provider with a different answer is never consulted.
        let provider = OneRate(dec!(42));
        assert_eq!(
            exchange_rate_for(&provider, USDC, day()),
            Some(Decimal::ONE)
        );
        assert_eq!(exchange_rate_for(&NoRates, USDC, day()), Some(Decimal::ONE));
    }

    #[test]
    fn test_other_currencies_use_provider() {
        let provider = OneRate(dec!(36.57));
        assert_eq!(exchange_rate_for(&provider, "UAH", day()), Some(dec!(36.57)));
        assert_eq!(exchange_rate_for(&NoRates, "UAH", day()), None);
    }
}
