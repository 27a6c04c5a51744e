//! Table-driven and property-based tests for the plan transition machinery.
//!
//! The central guarantee: for every (action, status) pair the table does not
//! list as legal, the action fails and leaves the status untouched.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::fx::ExchangeRateProvider;
use crate::payment::{Payment, PaymentState, PaymentStatus};

use super::error::PlanError;
use super::service::{OpenInput, PlanService};
use super::transitions::{allowed_sources, target_status, PlanAction, ALL_ACTIONS};
use super::types::{PaymentPlan, PlanStatus, ALL_STATUSES};

struct FlatRate;

impl ExchangeRateProvider for FlatRate {
    fn rate(&self, _currency: &str, _as_of: NaiveDate) -> Option<Decimal> {
        Some(dec!(4))
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn plan_in(status: PlanStatus) -> PaymentPlan {
    let mut plan = PaymentPlan::new_targeting(
        Uuid::new_v4(),
        "PP-2026-000001".to_string(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        Utc::now(),
    );
    plan.status = status;
    // Satisfy every non-status precondition so that only transition legality
    // can make an action fail.
    plan.fsp_id = Some(Uuid::new_v4());
    plan.delivery_mechanism = Some("CASH".to_string());
    plan
}

fn eligible_payment(plan: &PaymentPlan) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        code: "RCPT-2026-000001-0000001".to_string(),
        plan_id: plan.id,
        household_id: Uuid::new_v4(),
        head_of_household_id: None,
        collector_id: Uuid::new_v4(),
        status: PaymentStatus::Pending,
        state: PaymentState::Active,
        currency: plan.currency.clone(),
        entitlement_quantity: Some(dec!(100)),
        entitlement_quantity_usd: Some(dec!(25)),
        delivered_quantity: None,
        delivered_quantity_usd: None,
        delivery_date: None,
        fsp_id: plan.fsp_id,
        delivery_mechanism: plan.delivery_mechanism.clone(),
        has_valid_wallet: true,
        signature: None,
        snapshot: None,
        source_payment_id: None,
        split_id: None,
        fsp_auth_code: None,
    }
}

fn invoke(action: PlanAction, plan: &mut PaymentPlan) -> Result<(), PlanError> {
    let now = Utc::now();
    let mut payments = vec![eligible_payment(plan)];

    match action {
        PlanAction::TpLock => {
            PlanService::tp_lock(plan, &mut payments, &HashMap::new(), now)
        }
        PlanAction::TpUnlock => PlanService::tp_unlock(plan, &mut payments, now).map(|_| ()),
        PlanAction::TpRebuild => PlanService::tp_rebuild(plan).map(|_| ()),
        PlanAction::Draft => PlanService::draft(plan, now),
        PlanAction::Open => PlanService::open(
            plan,
            &mut payments,
            &OpenInput {
                dispersion_start_date: today(),
                dispersion_end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
                currency: if plan.currency.is_empty() {
                    "PLN".to_string()
                } else {
                    plan.currency.clone()
                },
            },
            &FlatRate,
            today(),
            now,
        ),
        PlanAction::Lock => PlanService::lock(
            plan,
            &mut payments,
            &HashSet::new(),
            &HashMap::new(),
            today(),
            now,
        ),
        PlanAction::Unlock => {
            PlanService::unlock(plan, &mut payments, &HashMap::new(), today(), now)
        }
        PlanAction::LockFsp => PlanService::lock_fsp(plan, &mut payments, now),
        PlanAction::UnlockFsp => PlanService::unlock_fsp(plan, now),
        PlanAction::SendForApproval => {
            PlanService::send_for_approval(plan, &[], Uuid::new_v4(), now).map(|_| ())
        }
        PlanAction::Finish => PlanService::status_finished(plan, now),
    }
}

#[test]
fn every_action_status_pair_follows_the_table() {
    for action in ALL_ACTIONS {
        for status in ALL_STATUSES {
            let mut plan = plan_in(status);
            let result = invoke(action, &mut plan);

            if allowed_sources(action).contains(&status) {
                assert!(
                    result.is_ok(),
                    "{action} from {status} should succeed: {result:?}"
                );
                assert_eq!(
                    plan.status,
                    target_status(action, status),
                    "{action} from {status} landed on the wrong status"
                );
            } else {
                let err = result.expect_err(&format!("{action} from {status} should fail"));
                assert!(
                    matches!(err, PlanError::IllegalTransition { .. }),
                    "{action} from {status} failed with {err:?} instead of an illegal transition"
                );
                assert_eq!(plan.status, status, "{action} from {status} mutated the status");
            }
        }
    }
}

fn arb_status() -> impl Strategy<Value = PlanStatus> {
    proptest::sample::select(ALL_STATUSES.to_vec())
}

fn arb_action() -> impl Strategy<Value = PlanAction> {
    proptest::sample::select(ALL_ACTIONS.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A legal transition always bumps the optimistic-concurrency token; an
    /// illegal one never does.
    #[test]
    fn prop_version_moves_only_on_success(action in arb_action(), status in arb_status()) {
        let mut plan = plan_in(status);
        let before = plan.version;

        match invoke(action, &mut plan) {
            Ok(()) => prop_assert!(plan.version > before),
            Err(_) => prop_assert_eq!(plan.version, before),
        }
    }

    /// Status transitions only ever land on the table's target status.
    #[test]
    fn prop_status_lands_on_table_target(action in arb_action(), status in arb_status()) {
        let mut plan = plan_in(status);
        if invoke(action, &mut plan).is_ok() {
            prop_assert_eq!(plan.status, target_status(action, status));
        } else {
            prop_assert_eq!(plan.status, status);
        }
    }
}
