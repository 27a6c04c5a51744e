//! Property tests for the delivery classification table.
//!
//! For every delivered/entitlement pair the classification must follow the
//! five-way policy exactly, both in the resulting status and in the stored
//! delivered quantity.

use proptest::prelude::*;
use rust_decimal::Decimal;

use aidra_shared::types::round_money;

use crate::payment::PaymentStatus;

use super::error::ReconciliationError;
use super::importer::classify_delivery;

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn entitlements() -> impl Strategy<Value = Decimal> {
    // Representative entitlements from tiny to large, in cents.
    prop::sample::select(vec![
        money(1),
        money(100),
        money(50_000),
        money(123_456),
        money(10_000_000),
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_negative_is_erroneous_and_stores_nothing(
        cents in -10_000_000i64..-1,
        entitlement in entitlements(),
    ) {
        let (status, stored) = classify_delivery("RCPT-1", money(cents), entitlement).unwrap();
        prop_assert_eq!(status, PaymentStatus::TransactionErroneous);
        prop_assert_eq!(stored, None);
    }

    #[test]
    fn prop_zero_is_not_distributed(entitlement in entitlements()) {
        let (status, stored) = classify_delivery("RCPT-1", Decimal::ZERO, entitlement).unwrap();
        prop_assert_eq!(status, PaymentStatus::NotDistributed);
        prop_assert_eq!(stored, Some(Decimal::ZERO));
    }

    #[test]
    fn prop_between_is_partial_with_rounded_amount(
        fraction in 1u32..100,
        entitlement in entitlements(),
    ) {
        let delivered = entitlement * Decimal::new(i64::from(fraction), 2);
        prop_assume!(delivered > Decimal::ZERO && delivered < entitlement);

        let (status, stored) = classify_delivery("RCPT-1", delivered, entitlement).unwrap();
        prop_assert_eq!(status, PaymentStatus::DistributionPartial);
        prop_assert_eq!(stored, Some(round_money(delivered)));
    }

    #[test]
    fn prop_equal_is_successful(entitlement in entitlements()) {
        let (status, stored) = classify_delivery("RCPT-1", entitlement, entitlement).unwrap();
        prop_assert_eq!(status, PaymentStatus::DistributionSuccessful);
        prop_assert_eq!(stored, Some(round_money(entitlement)));
    }

    #[test]
    fn prop_greater_fails_the_row(
        excess_cents in 1i64..10_000_000,
        entitlement in entitlements(),
    ) {
        let delivered = entitlement + money(excess_cents);
        let err = classify_delivery("RCPT-1", delivered, entitlement).unwrap_err();
        prop_assert!(matches!(
            err,
            ReconciliationError::DeliveredExceedsEntitlement { .. }
        ));
    }
}
