//! Payment plan lifecycle actions.
//!
//! Each action validates against the transition table, mutates the plan (and
//! its payments) in memory, and returns any background tasks to emit. The
//! repository applies the result inside one database transaction, so an error
//! from any of these functions means nothing was persisted.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::aggregator::{self, MemberDemographics};
use crate::approval::{required_counts, AcceptanceThreshold, ApprovalProcess};
use crate::fx::{exchange_rate_for, ExchangeRateProvider};
use crate::payment::{Payment, PaymentState, RemovalReason};
use crate::tasks::{Outbox, ScheduledTask};

use super::error::PlanError;
use super::transitions::{check, check_background, PlanAction};
use super::types::{
    BackgroundAction, BuildStatus, DeliveryMechanismAssignment, PaymentPlan, PlanStatus,
};

/// Inputs of the `open` transition.
#[derive(Debug, Clone)]
pub struct OpenInput {
    /// First day of the dispersion window.
    pub dispersion_start_date: NaiveDate,
    /// Last day of the dispersion window; must be strictly in the future.
    pub dispersion_end_date: NaiveDate,
    /// Plan currency; frozen by this transition.
    pub currency: String,
}

/// Stateless service executing plan lifecycle actions.
pub struct PlanService;

impl PlanService {
    /// Locks the targeting population.
    ///
    /// When vulnerability-score bounds are set on the plan, payments whose
    /// household score falls outside them are soft-removed. Households
    /// without a computed score are kept.
    pub fn tp_lock(
        plan: &mut PaymentPlan,
        payments: &mut [Payment],
        scores: &HashMap<Uuid, Decimal>,
        now: DateTime<Utc>,
    ) -> Result<(), PlanError> {
        let target = check(PlanAction::TpLock, plan.status)?;

        if plan.vulnerability_score_min.is_some() || plan.vulnerability_score_max.is_some() {
            for payment in payments.iter_mut().filter(|p| p.is_eligible()) {
                let Some(score) = scores.get(&payment.household_id) else {
                    continue;
                };
                let below = plan.vulnerability_score_min.is_some_and(|min| *score < min);
                let above = plan.vulnerability_score_max.is_some_and(|max| *score > max);
                if below || above {
                    payment.state = PaymentState::Removed {
                        reason: RemovalReason::VulnerabilityScore,
                    };
                }
            }
        }

        plan.set_status(target, now);
        Ok(())
    }

    /// Unlocks the targeting population.
    ///
    /// Restores payments removed by the vulnerability-score filter and
    /// schedules an asynchronous statistics rebuild.
    pub fn tp_unlock(
        plan: &mut PaymentPlan,
        payments: &mut [Payment],
        now: DateTime<Utc>,
    ) -> Result<Outbox, PlanError> {
        let target = check(PlanAction::TpUnlock, plan.status)?;

        for payment in payments.iter_mut() {
            if matches!(
                payment.state,
                PaymentState::Removed {
                    reason: RemovalReason::VulnerabilityScore
                }
            ) {
                payment.state = PaymentState::Active;
            }
        }

        plan.set_status(target, now);
        let mut outbox = Outbox::new();
        outbox.push(ScheduledTask::UpdatePopulationStats { plan_id: plan.id });
        Ok(outbox)
    }

    /// Requests an asynchronous full population rebuild.
    pub fn tp_rebuild(plan: &mut PaymentPlan) -> Result<Outbox, PlanError> {
        check(PlanAction::TpRebuild, plan.status)?;

        plan.build_status = Some(BuildStatus::Pending);
        plan.bump_version();
        let mut outbox = Outbox::new();
        outbox.push(ScheduledTask::RebuildPopulation { plan_id: plan.id });
        Ok(outbox)
    }

    /// Promotes the targeting population to a draft payment plan.
    ///
    /// Requires the FSP and delivery mechanism to be chosen already.
    pub fn draft(plan: &mut PaymentPlan, now: DateTime<Utc>) -> Result<(), PlanError> {
        let target = check(PlanAction::Draft, plan.status)?;
        Self::require_fsp(plan)?;
        plan.set_status(target, now);
        Ok(())
    }

    /// Opens the draft for dispersion.
    ///
    /// Validates the dispersion end date, freezes currency and exchange rate,
    /// back-fills the currency onto payments, and recomputes money fields.
    /// The repository activates the owning program cycle in the same
    /// transaction.
    pub fn open(
        plan: &mut PaymentPlan,
        payments: &mut [Payment],
        input: &OpenInput,
        rates: &dyn ExchangeRateProvider,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), PlanError> {
        let target = check(PlanAction::Open, plan.status)?;

        if input.dispersion_end_date <= today {
            return Err(PlanError::DispersionEndDateNotInFuture {
                end_date: input.dispersion_end_date,
            });
        }

        if plan.currency.is_empty() {
            plan.currency = input.currency.clone();
        } else if plan.currency != input.currency {
            return Err(PlanError::CurrencyImmutable {
                current: plan.currency.clone(),
                requested: input.currency.clone(),
            });
        }

        if plan.exchange_rate.is_none() {
            plan.exchange_rate = Some(
                exchange_rate_for(rates, &plan.currency, today).ok_or_else(|| {
                    PlanError::MissingExchangeRate {
                        currency: plan.currency.clone(),
                    }
                })?,
            );
        }

        plan.dispersion_start_date = Some(input.dispersion_start_date);
        plan.dispersion_end_date = Some(input.dispersion_end_date);

        for payment in payments.iter_mut() {
            payment.currency = plan.currency.clone();
        }

        plan.set_status(target, now);
        aggregator::update_money_fields(plan, payments);
        Ok(())
    }

    /// Locks the open plan's population.
    ///
    /// Marks hard-conflicted payments, requires at least one eligible payment
    /// to remain, and recomputes population and money fields.
    pub fn lock(
        plan: &mut PaymentPlan,
        payments: &mut [Payment],
        hard_conflicted: &HashSet<Uuid>,
        members_by_household: &HashMap<Uuid, Vec<MemberDemographics>>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), PlanError> {
        let target = check(PlanAction::Lock, plan.status)?;

        for payment in payments.iter_mut() {
            if payment.is_eligible() && hard_conflicted.contains(&payment.id) {
                payment.state = PaymentState::Conflicted;
            }
        }

        if !payments.iter().any(Payment::is_eligible) {
            return Err(PlanError::NoEligiblePayments);
        }

        plan.set_status(target, now);
        aggregator::update_population_counts(plan, payments, members_by_household, today);
        aggregator::update_money_fields(plan, payments);
        Ok(())
    }

    /// Unlocks a locked plan back to open.
    ///
    /// Clears the background-action status, restores conflicted payments, and
    /// recomputes population and money fields.
    pub fn unlock(
        plan: &mut PaymentPlan,
        payments: &mut [Payment],
        members_by_household: &HashMap<Uuid, Vec<MemberDemographics>>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), PlanError> {
        let target = check(PlanAction::Unlock, plan.status)?;

        plan.background_action = None;
        for payment in payments.iter_mut() {
            if payment.state == PaymentState::Conflicted {
                payment.state = PaymentState::Active;
            }
        }

        plan.set_status(target, now);
        aggregator::update_population_counts(plan, payments, members_by_household, today);
        aggregator::update_money_fields(plan, payments);
        Ok(())
    }

    /// Records the plan's ordered delivery-mechanism choices.
    ///
    /// Every mechanism must be bound to an FSP; the highest-priority binding
    /// becomes the plan-level assignment.
    pub fn assign_delivery_mechanisms(
        plan: &mut PaymentPlan,
        assignments: &[DeliveryMechanismAssignment],
    ) -> Result<(), PlanError> {
        if matches!(
            plan.status,
            PlanStatus::LockedFsp
                | PlanStatus::InApproval
                | PlanStatus::InAuthorization
                | PlanStatus::InReview
                | PlanStatus::Accepted
                | PlanStatus::Finished
        ) {
            return Err(PlanError::InvalidMechanismAssignment {
                reason: format!("not allowed in status {}", plan.status),
            });
        }

        let Some(first) = assignments.first() else {
            return Err(PlanError::InvalidMechanismAssignment {
                reason: "at least one delivery mechanism is required".to_string(),
            });
        };

        let mut seen = HashSet::new();
        for assignment in assignments {
            if !seen.insert(assignment.mechanism.as_str()) {
                return Err(PlanError::InvalidMechanismAssignment {
                    reason: format!("duplicate mechanism {}", assignment.mechanism),
                });
            }
            if assignment.fsp_id.is_none() {
                return Err(PlanError::InvalidMechanismAssignment {
                    reason: format!("mechanism {} is not bound to an FSP", assignment.mechanism),
                });
            }
        }

        plan.fsp_id = first.fsp_id;
        plan.delivery_mechanism = Some(first.mechanism.clone());
        plan.bump_version();
        Ok(())
    }

    /// Binds the FSP and delivery mechanism onto the plan and its payments.
    ///
    /// Fails when any eligible payment still lacks an entitlement quantity.
    pub fn lock_fsp(
        plan: &mut PaymentPlan,
        payments: &mut [Payment],
        now: DateTime<Utc>,
    ) -> Result<(), PlanError> {
        let target = check(PlanAction::LockFsp, plan.status)?;
        Self::require_fsp(plan)?;

        for payment in payments.iter_mut() {
            if payment.fsp_id.is_none() {
                payment.fsp_id = plan.fsp_id;
            }
            if payment.delivery_mechanism.is_none() {
                payment.delivery_mechanism = plan.delivery_mechanism.clone();
            }
        }

        if let Some(missing) = payments
            .iter()
            .find(|p| p.is_eligible() && p.entitlement_quantity.is_none())
        {
            return Err(PlanError::MissingEntitlement {
                payment_code: missing.code.clone(),
            });
        }

        plan.set_status(target, now);
        Ok(())
    }

    /// Releases the FSP binding.
    pub fn unlock_fsp(plan: &mut PaymentPlan, now: DateTime<Utc>) -> Result<(), PlanError> {
        let target = check(PlanAction::UnlockFsp, plan.status)?;
        plan.set_status(target, now);
        Ok(())
    }

    /// Sends the plan into the acceptance process.
    ///
    /// Creates the approval process with required-count snapshots taken from
    /// the threshold table and schedules an approver notification.
    pub fn send_for_approval(
        plan: &mut PaymentPlan,
        thresholds: &[AcceptanceThreshold],
        sent_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(ApprovalProcess, Outbox), PlanError> {
        let target = check(PlanAction::SendForApproval, plan.status)?;

        let counts = required_counts(thresholds, plan.total_entitled_quantity_usd);
        let process = ApprovalProcess::new(plan.id, counts, sent_by, now);

        plan.set_status(target, now);
        let mut outbox = Outbox::new();
        outbox.push(ScheduledTask::NotifyApprovers {
            plan_id: plan.id,
            action: PlanAction::SendForApproval.as_str().to_string(),
        });
        Ok((process, outbox))
    }

    /// Closes a fully reconciled plan.
    pub fn status_finished(plan: &mut PaymentPlan, now: DateTime<Utc>) -> Result<(), PlanError> {
        let target = check(PlanAction::Finish, plan.status)?;
        plan.set_status(target, now);
        Ok(())
    }

    /// Starts a background job of the given class.
    ///
    /// Legal when no job is outstanding or when retrying from this class's
    /// terminal error state.
    pub fn start_background_action(
        plan: &mut PaymentPlan,
        action: BackgroundAction,
    ) -> Result<(), PlanError> {
        check_background(action, plan.status, plan.background_action)?;
        plan.background_action = Some(action);
        plan.bump_version();
        Ok(())
    }

    /// Clears the background-action status after a successful job.
    pub fn complete_background_action(plan: &mut PaymentPlan) {
        plan.background_action = None;
        plan.bump_version();
    }

    /// Drops the outstanding background job into its terminal error state.
    pub fn fail_background_action(plan: &mut PaymentPlan) {
        if let Some(action) = plan.background_action {
            plan.background_action = Some(action.error_state());
            plan.bump_version();
        }
    }

    /// Manually excludes households from the plan without deleting payments.
    ///
    /// Guarded by the `ExcludingBeneficiaries` background action, which
    /// enforces the legal primary statuses.
    pub fn exclude_households(
        plan: &mut PaymentPlan,
        payments: &mut [Payment],
        household_codes: &[String],
        reason: Option<&str>,
    ) -> Result<(), PlanError> {
        for code in household_codes {
            let payment = payments
                .iter_mut()
                .find(|p| {
                    p.snapshot
                        .as_ref()
                        .is_some_and(|s| s.household_code == *code)
                })
                .ok_or_else(|| PlanError::UnknownHousehold {
                    household_code: code.clone(),
                })?;
            payment.state = PaymentState::Excluded {
                reason: reason.map(ToString::to_string),
            };
        }

        plan.excluded_household_ids = Some(household_codes.join(", "));
        plan.exclusion_reason = reason.map(ToString::to_string);
        plan.bump_version();
        Ok(())
    }

    fn require_fsp(plan: &PaymentPlan) -> Result<(), PlanError> {
        if plan.fsp_id.is_some() && plan.delivery_mechanism.is_some() {
            Ok(())
        } else {
            Err(PlanError::FspNotAssigned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::household::Sex;
    use crate::payment::PaymentStatus;
    use rust_decimal_macros::dec;

    fn plan_in(status: PlanStatus) -> PaymentPlan {
        let mut plan = PaymentPlan::new_targeting(
            Uuid::new_v4(),
            "PP-2026-000001".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now(),
        );
        plan.status = status;
        plan
    }

    fn payment_for(plan: &PaymentPlan, entitlement: Option<Decimal>) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            code: format!("RCPT-{}", Uuid::new_v4()),
            plan_id: plan.id,
            household_id: Uuid::new_v4(),
            head_of_household_id: None,
            collector_id: Uuid::new_v4(),
            status: PaymentStatus::Pending,
            state: PaymentState::Active,
            currency: plan.currency.clone(),
            entitlement_quantity: entitlement,
            entitlement_quantity_usd: None,
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

    struct FlatRate(Decimal);

    impl ExchangeRateProvider for FlatRate {
        fn rate(&self, _currency: &str, _as_of: NaiveDate) -> Option<Decimal> {
            Some(self.0)
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn open_input() -> OpenInput {
        OpenInput {
            dispersion_start_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            dispersion_end_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            currency: "PLN".to_string(),
        }
    }

    #[test]
    fn test_tp_lock_applies_score_filter() {
        let mut plan = plan_in(PlanStatus::TpOpen);
        plan.vulnerability_score_min = Some(dec!(10));
        plan.vulnerability_score_max = Some(dec!(50));

        let mut payments = vec![
            payment_for(&plan, None),
            payment_for(&plan, None),
            payment_for(&plan, None),
        ];
        let scores = HashMap::from([
            (payments[0].household_id, dec!(30)),
            (payments[1].household_id, dec!(5)),
        ]);

        PlanService::tp_lock(&mut plan, &mut payments, &scores, Utc::now()).unwrap();

        assert_eq!(plan.status, PlanStatus::TpLocked);
        assert!(payments[0].is_eligible());
        assert!(matches!(payments[1].state, PaymentState::Removed { .. }));
        // No computed score: kept.
        assert!(payments[2].is_eligible());
    }

    #[test]
    fn test_tp_unlock_restores_removed_payments() {
        let mut plan = plan_in(PlanStatus::TpLocked);
        let mut payments = vec![payment_for(&plan, None)];
        payments[0].state = PaymentState::Removed {
            reason: RemovalReason::VulnerabilityScore,
        };

        let outbox = PlanService::tp_unlock(&mut plan, &mut payments, Utc::now()).unwrap();

        assert_eq!(plan.status, PlanStatus::TpOpen);
        assert!(payments[0].is_eligible());
        assert_eq!(
            outbox.tasks(),
            &[ScheduledTask::UpdatePopulationStats { plan_id: plan.id }]
        );
    }

    #[test]
    fn test_tp_rebuild_marks_build_pending_and_keeps_status() {
        let mut plan = plan_in(PlanStatus::TpLocked);
        plan.build_status = Some(BuildStatus::Ok);

        let outbox = PlanService::tp_rebuild(&mut plan).unwrap();

        assert_eq!(plan.status, PlanStatus::TpLocked);
        assert_eq!(plan.build_status, Some(BuildStatus::Pending));
        assert_eq!(
            outbox.tasks(),
            &[ScheduledTask::RebuildPopulation { plan_id: plan.id }]
        );
    }

    #[test]
    fn test_draft_requires_fsp() {
        let mut plan = plan_in(PlanStatus::TpLocked);
        let err = PlanService::draft(&mut plan, Utc::now()).unwrap_err();
        assert!(matches!(err, PlanError::FspNotAssigned));
        assert_eq!(plan.status, PlanStatus::TpLocked);

        plan.fsp_id = Some(Uuid::new_v4());
        plan.delivery_mechanism = Some("CASH".to_string());
        PlanService::draft(&mut plan, Utc::now()).unwrap();
        assert_eq!(plan.status, PlanStatus::Draft);
    }

    #[test]
    fn test_open_validates_dispersion_end_date() {
        let mut plan = plan_in(PlanStatus::Draft);
        let mut input = open_input();
        input.dispersion_end_date = today();

        let err = PlanService::open(
            &mut plan,
            &mut [],
            &input,
            &FlatRate(dec!(4)),
            today(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::DispersionEndDateNotInFuture { .. }));
        assert_eq!(plan.status, PlanStatus::Draft);
    }

    #[test]
    fn test_open_freezes_currency_and_rate_and_backfills() {
        let mut plan = plan_in(PlanStatus::Draft);
        let mut payments = vec![payment_for(&plan, None)];

        PlanService::open(
            &mut plan,
            &mut payments,
            &open_input(),
            &FlatRate(dec!(4)),
            today(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(plan.status, PlanStatus::Open);
        assert_eq!(plan.currency, "PLN");
        assert_eq!(plan.exchange_rate, Some(dec!(4)));
        assert_eq!(payments[0].currency, "PLN");
    }

    #[test]
    fn test_open_rejects_currency_change() {
        let mut plan = plan_in(PlanStatus::Draft);
        plan.currency = "UAH".to_string();

        let err = PlanService::open(
            &mut plan,
            &mut [],
            &open_input(),
            &FlatRate(dec!(4)),
            today(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::CurrencyImmutable { .. }));
    }

    #[test]
    fn test_lock_marks_conflicts_and_requires_eligible_payment() {
        let mut plan = plan_in(PlanStatus::Open);
        plan.currency = "PLN".to_string();
        let mut payments = vec![payment_for(&plan, Some(dec!(100))), payment_for(&plan, None)];
        let conflicted = HashSet::from([payments[1].id]);

        PlanService::lock(
            &mut plan,
            &mut payments,
            &conflicted,
            &HashMap::new(),
            today(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(plan.status, PlanStatus::Locked);
        assert!(payments[0].is_eligible());
        assert_eq!(payments[1].state, PaymentState::Conflicted);
        assert_eq!(plan.total_entitled_quantity, dec!(100));
    }

    #[test]
    fn test_lock_fails_when_all_payments_conflict() {
        let mut plan = plan_in(PlanStatus::Open);
        let mut payments = vec![payment_for(&plan, None)];
        let conflicted = HashSet::from([payments[0].id]);

        let err = PlanService::lock(
            &mut plan,
            &mut payments,
            &conflicted,
            &HashMap::new(),
            today(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::NoEligiblePayments));
        assert_eq!(plan.status, PlanStatus::Open);
    }

    #[test]
    fn test_unlock_restores_conflicts_and_clears_background() {
        let mut plan = plan_in(PlanStatus::Locked);
        plan.background_action = Some(BackgroundAction::RuleEngineError);
        let mut payments = vec![payment_for(&plan, Some(dec!(100)))];
        payments[0].state = PaymentState::Conflicted;

        PlanService::unlock(&mut plan, &mut payments, &HashMap::new(), today(), Utc::now())
            .unwrap();

        assert_eq!(plan.status, PlanStatus::Open);
        assert_eq!(plan.background_action, None);
        assert!(payments[0].is_eligible());
    }

    #[test]
    fn test_assign_delivery_mechanisms_sets_plan_pair() {
        let mut plan = plan_in(PlanStatus::Locked);
        let fsp = Uuid::new_v4();

        PlanService::assign_delivery_mechanisms(
            &mut plan,
            &[DeliveryMechanismAssignment {
                mechanism: "CASH".to_string(),
                fsp_id: Some(fsp),
                order: 1,
            }],
        )
        .unwrap();

        assert_eq!(plan.fsp_id, Some(fsp));
        assert_eq!(plan.delivery_mechanism.as_deref(), Some("CASH"));
    }

    #[test]
    fn test_assign_delivery_mechanisms_rejects_unbound() {
        let mut plan = plan_in(PlanStatus::Locked);
        let err = PlanService::assign_delivery_mechanisms(
            &mut plan,
            &[DeliveryMechanismAssignment {
                mechanism: "CASH".to_string(),
                fsp_id: None,
                order: 1,
            }],
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidMechanismAssignment { .. }));
    }

    #[test]
    fn test_lock_fsp_backfills_and_requires_entitlements() {
        let mut plan = plan_in(PlanStatus::Locked);
        plan.fsp_id = Some(Uuid::new_v4());
        plan.delivery_mechanism = Some("CASH".to_string());
        let mut payments = vec![payment_for(&plan, Some(dec!(100)))];

        PlanService::lock_fsp(&mut plan, &mut payments, Utc::now()).unwrap();

        assert_eq!(plan.status, PlanStatus::LockedFsp);
        assert_eq!(payments[0].fsp_id, plan.fsp_id);
        assert_eq!(payments[0].delivery_mechanism.as_deref(), Some("CASH"));
    }

    #[test]
    fn test_lock_fsp_fails_on_missing_entitlement() {
        let mut plan = plan_in(PlanStatus::Locked);
        plan.fsp_id = Some(Uuid::new_v4());
        plan.delivery_mechanism = Some("CASH".to_string());
        let mut payments = vec![payment_for(&plan, None)];
        let code = payments[0].code.clone();

        let err = PlanService::lock_fsp(&mut plan, &mut payments, Utc::now()).unwrap_err();
        assert!(
            matches!(err, PlanError::MissingEntitlement { ref payment_code } if *payment_code == code)
        );
        assert_eq!(plan.status, PlanStatus::Locked);
    }

    #[test]
    fn test_send_for_approval_creates_process_and_notifies() {
        let mut plan = plan_in(PlanStatus::LockedFsp);
        plan.total_entitled_quantity_usd = dec!(1000);
        let sender = Uuid::new_v4();

        let (process, outbox) =
            PlanService::send_for_approval(&mut plan, &[], sender, Utc::now()).unwrap();

        assert_eq!(plan.status, PlanStatus::InApproval);
        assert_eq!(process.payment_plan_id, plan.id);
        assert_eq!(process.sent_for_approval_by, sender);
        // No threshold row matched: all counts default to 1.
        assert_eq!(process.approval_number_required, 1);
        assert_eq!(process.authorization_number_required, 1);
        assert_eq!(process.finance_release_number_required, 1);
        assert_eq!(outbox.tasks().len(), 1);
    }

    #[test]
    fn test_background_action_lifecycle() {
        let mut plan = plan_in(PlanStatus::Locked);

        PlanService::start_background_action(&mut plan, BackgroundAction::RuleEngineRun).unwrap();
        assert_eq!(
            plan.background_action,
            Some(BackgroundAction::RuleEngineRun)
        );

        // A second start while in progress fails.
        let err = PlanService::start_background_action(&mut plan, BackgroundAction::RuleEngineRun)
            .unwrap_err();
        assert!(matches!(err, PlanError::BackgroundActionInProgress { .. }));

        PlanService::fail_background_action(&mut plan);
        assert_eq!(
            plan.background_action,
            Some(BackgroundAction::RuleEngineError)
        );

        // Retry from the error state is allowed.
        PlanService::start_background_action(&mut plan, BackgroundAction::RuleEngineRun).unwrap();
        PlanService::complete_background_action(&mut plan);
        assert_eq!(plan.background_action, None);
    }

    #[test]
    fn test_exclude_households_marks_payments() {
        let mut plan = plan_in(PlanStatus::Locked);
        let mut payments = vec![payment_for(&plan, Some(dec!(100)))];
        payments[0].snapshot = Some(crate::payment::HouseholdSnapshot {
            household_code: "HH-2026-000007".to_string(),
            size: 2,
            admin_area_1: None,
            admin_area_2: None,
            admin_area_3: None,
            collector: crate::payment::CollectorSnapshot {
                code: "IND-1".to_string(),
                full_name: "Ana Diaz".to_string(),
                account_data: std::collections::BTreeMap::new(),
            },
        });

        PlanService::exclude_households(
            &mut plan,
            &mut payments,
            &["HH-2026-000007".to_string()],
            Some("duplicate registration"),
        )
        .unwrap();

        assert!(matches!(payments[0].state, PaymentState::Excluded { .. }));
        assert_eq!(
            plan.excluded_household_ids.as_deref(),
            Some("HH-2026-000007")
        );
        assert_eq!(plan.exclusion_reason.as_deref(), Some("duplicate registration"));
    }

    #[test]
    fn test_exclude_unknown_household_fails() {
        let mut plan = plan_in(PlanStatus::Locked);
        let mut payments = vec![];
        let err = PlanService::exclude_households(
            &mut plan,
            &mut payments,
            &["HH-MISSING".to_string()],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::UnknownHousehold { .. }));
    }

    #[test]
    fn test_lock_recomputes_population_counts() {
        let mut plan = plan_in(PlanStatus::Open);
        let mut payments = vec![payment_for(&plan, Some(dec!(10)))];
        let members = HashMap::from([(
            payments[0].household_id,
            vec![MemberDemographics {
                birth_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
                sex: Sex::Female,
            }],
        )]);

        PlanService::lock(
            &mut plan,
            &mut payments,
            &HashSet::new(),
            &members,
            today(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(plan.female_children_count, 1);
        assert_eq!(plan.total_households_count, 1);
    }
}
