//! Bulk payment materialization.
//!
//! Everything here is validated in memory first: the repository only issues
//! its bulk insert/update once the whole batch has passed, so a late failure
//! can never leave a partially-written plan behind.

use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;

use aidra_shared::types::{round_money, to_usd};

use crate::household::{DeliveryMechanism, Household, Individual};
use crate::plan::PaymentPlan;

use super::error::GeneratorError;
use super::signature::payment_signature;
use super::snapshot::HouseholdSnapshot;
use super::types::{Payment, PaymentState, PaymentStatus};

/// One targeting-result row: a household and its resolved primary collector.
#[derive(Debug, Clone)]
pub struct HouseholdWithCollector {
    /// The targeted household.
    pub household: Household,
    /// Head of the household, if recorded.
    pub head_of_household_id: Option<Uuid>,
    /// The individual holding the primary collector role, if any.
    pub primary_collector: Option<Individual>,
}

/// Stateless service materializing payment rows for a plan.
pub struct PaymentGenerator;

impl PaymentGenerator {
    /// Creates one payment per targeted household.
    ///
    /// Fails fast on a household without a primary collector (invariant broken
    /// upstream) and on a duplicate household in the list; both abort the whole
    /// batch. A collector whose account data does not satisfy the delivery
    /// mechanism still gets a payment row, flagged via `has_valid_wallet`.
    pub fn create_payments(
        plan: &PaymentPlan,
        rows: &[HouseholdWithCollector],
        mechanism: Option<&DeliveryMechanism>,
    ) -> Result<Vec<Payment>, GeneratorError> {
        let mut seen = HashSet::with_capacity(rows.len());
        let mut payments = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            if !seen.insert(row.household.id) {
                return Err(GeneratorError::DuplicateHousehold {
                    household_code: row.household.code.clone(),
                });
            }

            let collector = row.primary_collector.as_ref().ok_or_else(|| {
                GeneratorError::MissingPrimaryCollector {
                    household_code: row.household.code.clone(),
                }
            })?;

            payments.push(Self::build_payment(
                plan,
                row,
                collector,
                mechanism,
                index,
                None,
                None,
            ));
        }

        Ok(payments)
    }

    /// Writes entitlement-formula results back onto a plan's payments.
    ///
    /// Sets the local and USD quantities and refreshes each payment's
    /// signature, since the signature covers entitlement data.
    pub fn apply_entitlements(
        plan: &PaymentPlan,
        payments: &mut [Payment],
        values: &[(Uuid, Decimal)],
    ) -> Result<(), GeneratorError> {
        for &(payment_id, amount) in values {
            let payment = payments
                .iter_mut()
                .find(|p| p.id == payment_id)
                .ok_or(GeneratorError::UnknownPayment { payment_id })?;

            let amount = round_money(amount);
            payment.entitlement_quantity = Some(amount);
            payment.entitlement_quantity_usd = to_usd(amount, plan.exchange_rate);
            if let Some(snapshot) = &payment.snapshot {
                payment.signature = Some(payment_signature(
                    snapshot,
                    payment.entitlement_quantity,
                    &payment.currency,
                ));
            }
        }
        Ok(())
    }

    /// Selects the source plan's payments that qualify for a follow-up.
    ///
    /// A payment qualifies when its status is in the failed set and it is
    /// still eligible; households that have been withdrawn, or that a sibling
    /// follow-up plan in the same cycle already claims, are skipped so nobody
    /// is compensated twice.
    #[must_use]
    pub fn unsuccessful_payments_for_follow_up<'a>(
        source_payments: &'a [Payment],
        withdrawn_households: &HashSet<Uuid>,
        claimed_by_sibling: &HashSet<Uuid>,
    ) -> Vec<&'a Payment> {
        source_payments
            .iter()
            .filter(|p| p.is_eligible() && p.status.is_failed())
            .filter(|p| !withdrawn_households.contains(&p.household_id))
            .filter(|p| !claimed_by_sibling.contains(&p.household_id))
            .collect()
    }

    /// Materializes follow-up payments from unsuccessful source payments.
    ///
    /// Entitlement quantities and currency are copied verbatim from the
    /// original payment; snapshots and signatures are taken fresh.
    pub fn create_follow_up_payments(
        follow_up: &PaymentPlan,
        sources: &[(Payment, HouseholdWithCollector)],
        mechanism: Option<&DeliveryMechanism>,
    ) -> Result<Vec<Payment>, GeneratorError> {
        let mut seen = HashSet::with_capacity(sources.len());
        let mut payments = Vec::with_capacity(sources.len());

        for (index, (source, row)) in sources.iter().enumerate() {
            if !seen.insert(row.household.id) {
                return Err(GeneratorError::DuplicateHousehold {
                    household_code: row.household.code.clone(),
                });
            }

            let collector = row.primary_collector.as_ref().ok_or_else(|| {
                GeneratorError::MissingPrimaryCollector {
                    household_code: row.household.code.clone(),
                }
            })?;

            let mut payment = Self::build_payment(
                follow_up,
                row,
                collector,
                mechanism,
                index,
                source.entitlement_quantity,
                Some(source.id),
            );
            payment.currency = source.currency.clone();
            payment.entitlement_quantity_usd = source.entitlement_quantity_usd;
            payments.push(payment);
        }

        Ok(payments)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_payment(
        plan: &PaymentPlan,
        row: &HouseholdWithCollector,
        collector: &Individual,
        mechanism: Option<&DeliveryMechanism>,
        index: usize,
        entitlement_quantity: Option<Decimal>,
        source_payment_id: Option<Uuid>,
    ) -> Payment {
        let snapshot = HouseholdSnapshot::capture(&row.household, collector);
        let entitlement_quantity = entitlement_quantity.map(round_money);
        let signature = payment_signature(&snapshot, entitlement_quantity, &plan.currency);

        Payment {
            id: Uuid::new_v4(),
            code: receipt_code(&plan.code, index + 1),
            plan_id: plan.id,
            household_id: row.household.id,
            head_of_household_id: row.head_of_household_id,
            collector_id: collector.id,
            status: PaymentStatus::Pending,
            state: PaymentState::Active,
            currency: plan.currency.clone(),
            entitlement_quantity,
            entitlement_quantity_usd: entitlement_quantity
                .and_then(|q| to_usd(q, plan.exchange_rate)),
            delivered_quantity: None,
            delivered_quantity_usd: None,
            delivery_date: None,
            fsp_id: plan.fsp_id,
            delivery_mechanism: plan.delivery_mechanism.clone(),
            has_valid_wallet: has_valid_wallet(collector, mechanism),
            signature: Some(signature),
            snapshot: Some(snapshot),
            source_payment_id,
            split_id: None,
            fsp_auth_code: None,
        }
    }
}

/// Derives a payment's external ID from its plan code and sequence number.
fn receipt_code(plan_code: &str, sequence: usize) -> String {
    let suffix = plan_code.strip_prefix("PP").unwrap_or(plan_code);
    format!("RCPT{suffix}-{sequence:07}")
}

/// True when the collector's account data carries a non-empty value for every
/// field the mechanism requires. No mechanism assigned means no constraint.
fn has_valid_wallet(collector: &Individual, mechanism: Option<&DeliveryMechanism>) -> bool {
    mechanism.is_none_or(|m| {
        m.required_fields.iter().all(|field| {
            collector
                .account_data
                .get(field)
                .is_some_and(|value| !value.is_empty())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::household::Sex;
    use crate::plan::{PaymentPlan, PlanStatus};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

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
        plan
    }

    fn row(code: &str, with_collector: bool) -> HouseholdWithCollector {
        let household_id = Uuid::new_v4();
        HouseholdWithCollector {
            household: Household {
                id: household_id,
                code: code.to_string(),
                size: 3,
                admin_area_1: None,
                admin_area_2: None,
                admin_area_3: None,
                is_withdrawn: false,
                vulnerability_score: None,
            },
            head_of_household_id: None,
            primary_collector: with_collector.then(|| Individual {
                id: Uuid::new_v4(),
                code: format!("IND-{code}"),
                household_id,
                full_name: "Ana Diaz".to_string(),
                birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                sex: Sex::Female,
                account_data: BTreeMap::new(),
            }),
        }
    }

    #[test]
    fn test_create_payments_one_per_household() {
        let plan = plan_in(PlanStatus::Open);
        let rows = vec![row("HH-A", true), row("HH-B", true)];

        let payments = PaymentGenerator::create_payments(&plan, &rows, None).unwrap();

        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].code, "RCPT-2026-000001-0000001");
        assert_eq!(payments[1].code, "RCPT-2026-000001-0000002");
        for payment in &payments {
            assert_eq!(payment.status, PaymentStatus::Pending);
            assert!(payment.is_eligible());
            assert_eq!(payment.currency, "PLN");
            assert!(payment.signature.is_some());
            assert!(payment.snapshot.is_some());
            assert!(payment.has_valid_wallet);
        }
    }

    #[test]
    fn test_create_payments_missing_collector_fails_fast() {
        let plan = plan_in(PlanStatus::Open);
        let rows = vec![row("HH-A", true), row("HH-B", false)];

        let err = PaymentGenerator::create_payments(&plan, &rows, None).unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::MissingPrimaryCollector { ref household_code } if household_code == "HH-B"
        ));
    }

    #[test]
    fn test_create_payments_duplicate_household_aborts_all() {
        let plan = plan_in(PlanStatus::Open);
        let mut rows = vec![row("HH-A", true)];
        rows.push(rows[0].clone());

        let err = PaymentGenerator::create_payments(&plan, &rows, None).unwrap_err();
        assert!(matches!(err, GeneratorError::DuplicateHousehold { .. }));
    }

    #[test]
    fn test_wallet_flag_does_not_fail_the_batch() {
        let plan = plan_in(PlanStatus::Open);
        let mechanism = DeliveryMechanism {
            code: "MOBILE_MONEY".to_string(),
            name: "Mobile Money".to_string(),
            required_fields: vec!["phone_number".to_string()],
        };

        let mut with_wallet = row("HH-A", true);
        if let Some(collector) = with_wallet.primary_collector.as_mut() {
            collector
                .account_data
                .insert("phone_number".to_string(), "+48123".to_string());
        }
        let without_wallet = row("HH-B", true);

        let payments =
            PaymentGenerator::create_payments(&plan, &[with_wallet, without_wallet], Some(&mechanism))
                .unwrap();
        assert!(payments[0].has_valid_wallet);
        assert!(!payments[1].has_valid_wallet);
    }

    #[test]
    fn test_apply_entitlements_sets_usd_and_resigns() {
        let mut plan = plan_in(PlanStatus::Locked);
        plan.exchange_rate = Some(dec!(4));
        let rows = vec![row("HH-A", true)];
        let mut payments = PaymentGenerator::create_payments(&plan, &rows, None).unwrap();
        let before = payments[0].signature.clone();

        PaymentGenerator::apply_entitlements(
            &plan,
            &mut payments,
            &[(payments[0].id, dec!(200.00))],
        )
        .unwrap();

        assert_eq!(payments[0].entitlement_quantity, Some(dec!(200.00)));
        assert_eq!(payments[0].entitlement_quantity_usd, Some(dec!(50.00)));
        assert_ne!(payments[0].signature, before);
    }

    #[test]
    fn test_apply_entitlements_unknown_payment() {
        let plan = plan_in(PlanStatus::Locked);
        let mut payments = vec![];
        let err =
            PaymentGenerator::apply_entitlements(&plan, &mut payments, &[(Uuid::new_v4(), dec!(1))])
                .unwrap_err();
        assert!(matches!(err, GeneratorError::UnknownPayment { .. }));
    }

    fn failed_payment(plan: &PaymentPlan, row: &HouseholdWithCollector) -> Payment {
        let mut payments =
            PaymentGenerator::create_payments(plan, std::slice::from_ref(row), None).unwrap();
        let mut payment = payments.remove(0);
        payment.status = PaymentStatus::TransactionErroneous;
        payment.entitlement_quantity = Some(dec!(500.00));
        payment
    }

    #[test]
    fn test_unsuccessful_selection_skips_withdrawn_and_claimed() {
        let plan = plan_in(PlanStatus::Finished);
        let rows = [row("HH-A", true), row("HH-B", true), row("HH-C", true)];
        let payments: Vec<Payment> = rows.iter().map(|r| failed_payment(&plan, r)).collect();

        let withdrawn = HashSet::from([rows[1].household.id]);
        let claimed = HashSet::from([rows[2].household.id]);

        let selected =
            PaymentGenerator::unsuccessful_payments_for_follow_up(&payments, &withdrawn, &claimed);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].household_id, rows[0].household.id);
    }

    #[test]
    fn test_follow_up_payments_copy_entitlement_verbatim() {
        let source_plan = plan_in(PlanStatus::Finished);
        let source_row = row("HH-A", true);
        let source = failed_payment(&source_plan, &source_row);

        let mut follow_up = plan_in(PlanStatus::Open);
        follow_up.is_follow_up = true;
        follow_up.source_plan_id = Some(source_plan.id);

        let payments = PaymentGenerator::create_follow_up_payments(
            &follow_up,
            &[(source.clone(), source_row)],
            None,
        )
        .unwrap();

        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].entitlement_quantity, Some(dec!(500.00)));
        assert_eq!(payments[0].currency, source.currency);
        assert_eq!(payments[0].source_payment_id, Some(source.id));
        assert_eq!(payments[0].status, PaymentStatus::Pending);
    }
}
