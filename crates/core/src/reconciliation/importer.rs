//! Application of reconciliation rows to a plan's payments.

use rust_decimal::Decimal;

use aidra_shared::types::{round_money, to_usd};

use crate::aggregator;
use crate::payment::{Payment, PaymentStatus};
use crate::plan::{PaymentPlan, PlanStatus};
use crate::verification::{self, PaymentVerification};

use super::error::ReconciliationError;
use super::types::ReconciliationRow;

/// Derives a payment's status and stored delivered quantity from a reported
/// delivery.
///
/// The five-way policy, checked in order against the entitlement `e`:
/// negative deliveries are erroneous and store nothing, zero is
/// not-distributed, below `e` is partial (rounded to two decimals), exactly
/// `e` is successful, and above `e` fails the whole import.
pub fn classify_delivery(
    payment_code: &str,
    delivered: Decimal,
    entitlement: Decimal,
) -> Result<(PaymentStatus, Option<Decimal>), ReconciliationError> {
    if delivered < Decimal::ZERO {
        return Ok((PaymentStatus::TransactionErroneous, None));
    }
    if delivered.is_zero() {
        return Ok((PaymentStatus::NotDistributed, Some(Decimal::ZERO)));
    }
    if delivered > entitlement {
        return Err(ReconciliationError::DeliveredExceedsEntitlement {
            payment_code: payment_code.to_string(),
            delivered: round_money(delivered),
            entitlement: round_money(entitlement),
        });
    }
    if delivered == entitlement {
        Ok((PaymentStatus::DistributionSuccessful, Some(round_money(delivered))))
    } else {
        Ok((PaymentStatus::DistributionPartial, Some(round_money(delivered))))
    }
}

/// What a reconciliation import did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Payments updated by the import.
    pub updated: usize,
    /// True once no eligible payment remains pending; the repository closes
    /// the plan via the finish transition when this is set.
    pub is_reconciled: bool,
}

/// Stateless service applying a reconciliation workbook to a plan.
pub struct ReconciliationImporter;

impl ReconciliationImporter {
    /// Applies parsed reconciliation rows to the plan's payments.
    ///
    /// Every row is classified first; only when the whole batch passes are
    /// payments, verifications, and the plan's money fields mutated, so an
    /// error from any row leaves everything untouched for the repository to
    /// roll back cheaply.
    pub fn import(
        plan: &mut PaymentPlan,
        payments: &mut [Payment],
        verifications: &mut [PaymentVerification],
        rows: &[ReconciliationRow],
    ) -> Result<ImportOutcome, ReconciliationError> {
        if !matches!(plan.status, PlanStatus::Accepted | PlanStatus::Finished) {
            return Err(ReconciliationError::PlanNotReconcilable {
                status: plan.status,
            });
        }

        // Pass 1: resolve and classify everything in memory.
        let mut staged = Vec::with_capacity(rows.len());
        for row in rows {
            let index = payments
                .iter()
                .position(|p| p.is_eligible() && p.code == row.payment_code)
                .ok_or_else(|| ReconciliationError::UnknownPayment {
                    payment_code: row.payment_code.clone(),
                })?;
            let entitlement = payments[index].entitlement_quantity.ok_or_else(|| {
                ReconciliationError::MissingEntitlement {
                    payment_code: row.payment_code.clone(),
                }
            })?;

            let (status, stored) =
                classify_delivery(&row.payment_code, row.delivered_quantity, entitlement)?;
            staged.push((index, status, stored, row));
        }

        // Pass 2: apply the whole batch.
        for &(index, status, stored, row) in &staged {
            let payment = &mut payments[index];
            payment.status = status;
            payment.delivered_quantity = stored;
            payment.delivered_quantity_usd =
                stored.and_then(|amount| to_usd(amount, plan.exchange_rate));
            payment.delivery_date = row.delivery_date;
            if row.fsp_auth_code.is_some() {
                payment.fsp_auth_code = row.fsp_auth_code.clone();
            }

            if let Some(linked) = verifications
                .iter_mut()
                .find(|v| v.payment_id == payment.id)
            {
                verification::sync_with_delivery(linked, status, stored);
            }
        }

        aggregator::update_money_fields(plan, payments);
        plan.bump_version();

        let is_reconciled = !payments
            .iter()
            .any(|p| p.is_eligible() && p.status == PaymentStatus::Pending);

        Ok(ImportOutcome {
            updated: staged.len(),
            is_reconciled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentState;
    use crate::verification::VerificationStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn plan_in(status: PlanStatus) -> PaymentPlan {
        let mut plan = PaymentPlan::new_targeting(
            Uuid::new_v4(),
            "PP-2026-000001".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now(),
        );
        plan.status = status;
        plan.currency = "PLN".to_string();
        plan.exchange_rate = Some(dec!(4));
        plan
    }

    fn payment(plan: &PaymentPlan, sequence: usize, entitlement: Decimal) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            code: format!("RCPT-2026-000001-{sequence:07}"),
            plan_id: plan.id,
            household_id: Uuid::new_v4(),
            head_of_household_id: None,
            collector_id: Uuid::new_v4(),
            status: PaymentStatus::Pending,
            state: PaymentState::Active,
            currency: plan.currency.clone(),
            entitlement_quantity: Some(entitlement),
            entitlement_quantity_usd: to_usd(entitlement, plan.exchange_rate),
            delivered_quantity: None,
            delivered_quantity_usd: None,
            delivery_date: None,
            fsp_id: None,
            delivery_mechanism: None,
            has_valid_wallet: true,
            signature: None,
            snapshot: None,
            source_payment_id: None,
            split_id: None,
            fsp_auth_code: None,
        }
    }

    fn row(payment: &Payment, delivered: Decimal) -> ReconciliationRow {
        ReconciliationRow {
            payment_code: payment.code.clone(),
            delivered_quantity: delivered,
            delivery_date: Some(Utc::now()),
            fsp_auth_code: Some("AUTH-1".to_string()),
        }
    }

    #[test]
    fn test_classify_all_five_branches() {
        let code = "RCPT-1";
        let e = dec!(500.00);

        assert_eq!(
            classify_delivery(code, dec!(-1), e).unwrap(),
            (PaymentStatus::TransactionErroneous, None)
        );
        assert_eq!(
            classify_delivery(code, Decimal::ZERO, e).unwrap(),
            (PaymentStatus::NotDistributed, Some(Decimal::ZERO))
        );
        assert_eq!(
            classify_delivery(code, dec!(120.505), e).unwrap(),
            (PaymentStatus::DistributionPartial, Some(dec!(120.50)))
        );
        assert_eq!(
            classify_delivery(code, dec!(500.00), e).unwrap(),
            (PaymentStatus::DistributionSuccessful, Some(dec!(500.00)))
        );
        let err = classify_delivery(code, dec!(666.00), e).unwrap_err();
        assert!(matches!(
            err,
            ReconciliationError::DeliveredExceedsEntitlement { .. }
        ));
    }

    #[test]
    fn test_import_requires_accepted_or_finished() {
        let mut plan = plan_in(PlanStatus::Locked);
        let err =
            ReconciliationImporter::import(&mut plan, &mut [], &mut [], &[]).unwrap_err();
        assert!(matches!(err, ReconciliationError::PlanNotReconcilable { .. }));

        let mut plan = plan_in(PlanStatus::Finished);
        assert!(ReconciliationImporter::import(&mut plan, &mut [], &mut [], &[]).is_ok());
    }

    #[test]
    fn test_import_updates_payment_verification_and_totals() {
        let mut plan = plan_in(PlanStatus::Accepted);
        let mut payments = vec![payment(&plan, 1, dec!(500.00))];
        let mut verifications = vec![PaymentVerification::new_pending(payments[0].id)];
        let rows = vec![row(&payments[0], dec!(500.00))];

        let outcome =
            ReconciliationImporter::import(&mut plan, &mut payments, &mut verifications, &rows)
                .unwrap();

        assert_eq!(outcome.updated, 1);
        assert!(outcome.is_reconciled);
        assert_eq!(payments[0].status, PaymentStatus::DistributionSuccessful);
        assert_eq!(payments[0].delivered_quantity, Some(dec!(500.00)));
        assert_eq!(payments[0].delivered_quantity_usd, Some(dec!(125.00)));
        assert_eq!(payments[0].fsp_auth_code.as_deref(), Some("AUTH-1"));
        assert_eq!(verifications[0].status, VerificationStatus::Received);
        assert_eq!(plan.total_delivered_quantity, dec!(500.00));
        assert_eq!(plan.total_undelivered_quantity, dec!(0.00));
    }

    #[test]
    fn test_import_is_all_or_nothing() {
        let mut plan = plan_in(PlanStatus::Accepted);
        let mut payments = vec![
            payment(&plan, 1, dec!(500.00)),
            payment(&plan, 2, dec!(500.00)),
        ];
        let mut verifications = vec![];
        let rows = vec![
            row(&payments[0], dec!(500.00)),
            row(&payments[1], dec!(666.00)),
        ];

        let err =
            ReconciliationImporter::import(&mut plan, &mut payments, &mut verifications, &rows)
                .unwrap_err();

        assert!(err
            .to_string()
            .contains("Delivered quantity 666.00 is bigger than Entitlement quantity 500.00"));
        // The valid first row was not applied either.
        assert_eq!(payments[0].status, PaymentStatus::Pending);
        assert_eq!(payments[0].delivered_quantity, None);
        assert_eq!(plan.total_delivered_quantity, Decimal::ZERO);
    }

    #[test]
    fn test_import_not_reconciled_while_payments_pending() {
        let mut plan = plan_in(PlanStatus::Accepted);
        let mut payments = vec![
            payment(&plan, 1, dec!(500.00)),
            payment(&plan, 2, dec!(300.00)),
        ];
        let rows = vec![row(&payments[0], dec!(500.00))];

        let outcome =
            ReconciliationImporter::import(&mut plan, &mut payments, &mut [], &rows).unwrap();

        assert!(!outcome.is_reconciled);
        assert_eq!(payments[1].status, PaymentStatus::Pending);
    }

    #[test]
    fn test_import_erroneous_stores_null_not_negative() {
        let mut plan = plan_in(PlanStatus::Accepted);
        let mut payments = vec![payment(&plan, 1, dec!(500.00))];
        let mut verifications = vec![PaymentVerification::new_pending(payments[0].id)];
        let rows = vec![row(&payments[0], dec!(-20.00))];

        ReconciliationImporter::import(&mut plan, &mut payments, &mut verifications, &rows)
            .unwrap();

        assert_eq!(payments[0].status, PaymentStatus::TransactionErroneous);
        assert_eq!(payments[0].delivered_quantity, None);
        assert_eq!(verifications[0].status, VerificationStatus::Pending);
        assert_eq!(verifications[0].received_amount, None);
    }

    #[test]
    fn test_import_unknown_payment_fails() {
        let mut plan = plan_in(PlanStatus::Accepted);
        let mut payments = vec![payment(&plan, 1, dec!(500.00))];
        let rows = vec![ReconciliationRow {
            payment_code: "RCPT-MISSING".to_string(),
            delivered_quantity: dec!(10.00),
            delivery_date: None,
            fsp_auth_code: None,
        }];

        let err = ReconciliationImporter::import(&mut plan, &mut payments, &mut [], &rows)
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::UnknownPayment { .. }));
    }

    #[test]
    fn test_import_skips_ineligible_payments_when_matching() {
        let mut plan = plan_in(PlanStatus::Accepted);
        let mut payments = vec![payment(&plan, 1, dec!(500.00))];
        payments[0].state = PaymentState::Excluded { reason: None };
        let rows = vec![row(&payments[0], dec!(500.00))];

        let err = ReconciliationImporter::import(&mut plan, &mut payments, &mut [], &rows)
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::UnknownPayment { .. }));
    }
}
