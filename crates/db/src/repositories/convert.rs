//! Conversions between entity models and core domain types.
//!
//! Decoding is strict: a status/state string no core enum recognizes is a
//! data-integrity error, never a silent default. Encoding always writes the
//! full set of mutable columns, so repositories do not track per-field dirt.

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::Set;
use uuid::Uuid;

use aidra_core::approval::{AcceptanceThreshold, Approval, ApprovalProcess, ApprovalType};
use aidra_core::household::{Household, Individual, Sex};
use aidra_core::payment::{
    HouseholdSnapshot, Payment, PaymentState, PaymentStatus, RemovalReason,
};
use aidra_core::plan::{BackgroundAction, BuildStatus, PaymentPlan, PlanStatus};
use aidra_core::verification::{PaymentVerification, VerificationStatus};
use aidra_shared::{AppError, AppResult};

use crate::entities::{
    acceptance_thresholds, approval_processes, approvals, households, individuals, payment_plans,
    payment_verifications, payments,
};

fn integrity(what: &str, value: &str) -> AppError {
    tracing::error!(%value, "unknown {what} in storage");
    AppError::DataIntegrity(format!("unknown {what} '{value}'"))
}

fn count_from(value: i32, what: &str) -> AppResult<u32> {
    u32::try_from(value).map_err(|_| integrity(what, &value.to_string()))
}

// ============================================================================
// Payment plans
// ============================================================================

pub(crate) fn plan_from_model(model: &payment_plans::Model) -> AppResult<PaymentPlan> {
    let status =
        PlanStatus::parse(&model.status).ok_or_else(|| integrity("plan status", &model.status))?;
    let background_action = model
        .background_action
        .as_deref()
        .map(|value| {
            BackgroundAction::parse(value).ok_or_else(|| integrity("background action", value))
        })
        .transpose()?;
    let build_status = model
        .build_status
        .as_deref()
        .map(|value| BuildStatus::parse(value).ok_or_else(|| integrity("build status", value)))
        .transpose()?;

    Ok(PaymentPlan {
        id: model.id,
        code: model.code.clone(),
        status,
        status_date: model.status_date.with_timezone(&Utc),
        background_action,
        build_status,
        currency: model.currency.clone(),
        dispersion_start_date: model.dispersion_start_date,
        dispersion_end_date: model.dispersion_end_date,
        exchange_rate: model.exchange_rate,
        total_entitled_quantity: model.total_entitled_quantity,
        total_entitled_quantity_usd: model.total_entitled_quantity_usd,
        total_delivered_quantity: model.total_delivered_quantity,
        total_delivered_quantity_usd: model.total_delivered_quantity_usd,
        total_undelivered_quantity: model.total_undelivered_quantity,
        total_undelivered_quantity_usd: model.total_undelivered_quantity_usd,
        male_children_count: model.male_children_count,
        female_children_count: model.female_children_count,
        male_adults_count: model.male_adults_count,
        female_adults_count: model.female_adults_count,
        total_households_count: model.total_households_count,
        total_individuals_count: model.total_individuals_count,
        is_follow_up: model.is_follow_up,
        source_plan_id: model.source_plan_id,
        program_cycle_id: model.program_cycle_id,
        targeting_criteria_id: model.targeting_criteria_id,
        fsp_id: model.fsp_id,
        delivery_mechanism: model.delivery_mechanism.clone(),
        vulnerability_score_min: model.vulnerability_score_min,
        vulnerability_score_max: model.vulnerability_score_max,
        excluded_household_ids: model.excluded_household_ids.clone(),
        exclusion_reason: model.exclusion_reason.clone(),
        export_file_name: model.export_file_name.clone(),
        version: model.version,
    })
}

pub(crate) fn apply_plan(
    model: payment_plans::Model,
    plan: &PaymentPlan,
    now: DateTimeWithTimeZone,
) -> payment_plans::ActiveModel {
    // Every plan mutation funnels through here, so this is where the
    // activity log gets its field-level before/after diff.
    if let Ok(before) = plan_from_model(&model) {
        let changed = aidra_core::plan::changes::diff(&before, plan);
        if !changed.is_empty() {
            tracing::info!(plan = %plan.code, changes = ?changed, "payment plan updated");
        }
    }

    let mut active: payment_plans::ActiveModel = model.into();
    active.status = Set(plan.status.as_str().to_string());
    active.status_date = Set(plan.status_date.into());
    active.background_action = Set(plan.background_action.map(|a| a.as_str().to_string()));
    active.build_status = Set(plan.build_status.map(|b| b.as_str().to_string()));
    active.currency = Set(plan.currency.clone());
    active.dispersion_start_date = Set(plan.dispersion_start_date);
    active.dispersion_end_date = Set(plan.dispersion_end_date);
    active.exchange_rate = Set(plan.exchange_rate);
    active.total_entitled_quantity = Set(plan.total_entitled_quantity);
    active.total_entitled_quantity_usd = Set(plan.total_entitled_quantity_usd);
    active.total_delivered_quantity = Set(plan.total_delivered_quantity);
    active.total_delivered_quantity_usd = Set(plan.total_delivered_quantity_usd);
    active.total_undelivered_quantity = Set(plan.total_undelivered_quantity);
    active.total_undelivered_quantity_usd = Set(plan.total_undelivered_quantity_usd);
    active.male_children_count = Set(plan.male_children_count);
    active.female_children_count = Set(plan.female_children_count);
    active.male_adults_count = Set(plan.male_adults_count);
    active.female_adults_count = Set(plan.female_adults_count);
    active.total_households_count = Set(plan.total_households_count);
    active.total_individuals_count = Set(plan.total_individuals_count);
    active.fsp_id = Set(plan.fsp_id);
    active.delivery_mechanism = Set(plan.delivery_mechanism.clone());
    active.vulnerability_score_min = Set(plan.vulnerability_score_min);
    active.vulnerability_score_max = Set(plan.vulnerability_score_max);
    active.excluded_household_ids = Set(plan.excluded_household_ids.clone());
    active.exclusion_reason = Set(plan.exclusion_reason.clone());
    active.export_file_name = Set(plan.export_file_name.clone());
    active.version = Set(plan.version);
    active.updated_at = Set(now);
    active
}

pub(crate) fn plan_to_insert(
    plan: &PaymentPlan,
    now: DateTimeWithTimeZone,
) -> payment_plans::ActiveModel {
    payment_plans::ActiveModel {
        id: Set(plan.id),
        code: Set(plan.code.clone()),
        status: Set(plan.status.as_str().to_string()),
        status_date: Set(plan.status_date.into()),
        background_action: Set(plan.background_action.map(|a| a.as_str().to_string())),
        build_status: Set(plan.build_status.map(|b| b.as_str().to_string())),
        currency: Set(plan.currency.clone()),
        dispersion_start_date: Set(plan.dispersion_start_date),
        dispersion_end_date: Set(plan.dispersion_end_date),
        exchange_rate: Set(plan.exchange_rate),
        total_entitled_quantity: Set(plan.total_entitled_quantity),
        total_entitled_quantity_usd: Set(plan.total_entitled_quantity_usd),
        total_delivered_quantity: Set(plan.total_delivered_quantity),
        total_delivered_quantity_usd: Set(plan.total_delivered_quantity_usd),
        total_undelivered_quantity: Set(plan.total_undelivered_quantity),
        total_undelivered_quantity_usd: Set(plan.total_undelivered_quantity_usd),
        male_children_count: Set(plan.male_children_count),
        female_children_count: Set(plan.female_children_count),
        male_adults_count: Set(plan.male_adults_count),
        female_adults_count: Set(plan.female_adults_count),
        total_households_count: Set(plan.total_households_count),
        total_individuals_count: Set(plan.total_individuals_count),
        is_follow_up: Set(plan.is_follow_up),
        source_plan_id: Set(plan.source_plan_id),
        program_cycle_id: Set(plan.program_cycle_id),
        targeting_criteria_id: Set(plan.targeting_criteria_id),
        fsp_id: Set(plan.fsp_id),
        delivery_mechanism: Set(plan.delivery_mechanism.clone()),
        vulnerability_score_min: Set(plan.vulnerability_score_min),
        vulnerability_score_max: Set(plan.vulnerability_score_max),
        excluded_household_ids: Set(plan.excluded_household_ids.clone()),
        exclusion_reason: Set(plan.exclusion_reason.clone()),
        export_file_name: Set(plan.export_file_name.clone()),
        version: Set(plan.version),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

// ============================================================================
// Payments
// ============================================================================

pub(crate) fn state_columns(state: &PaymentState) -> (String, Option<String>) {
    let reason = match state {
        PaymentState::Excluded { reason } => reason.clone(),
        PaymentState::Removed { reason } => Some(
            match reason {
                RemovalReason::VulnerabilityScore => "VULNERABILITY_SCORE",
            }
            .to_string(),
        ),
        PaymentState::Active | PaymentState::Conflicted => None,
    };
    (state.as_str().to_string(), reason)
}

pub(crate) fn state_from_columns(
    state: &str,
    reason: Option<&str>,
) -> AppResult<PaymentState> {
    match state {
        "ACTIVE" => Ok(PaymentState::Active),
        "EXCLUDED" => Ok(PaymentState::Excluded {
            reason: reason.map(ToString::to_string),
        }),
        "CONFLICTED" => Ok(PaymentState::Conflicted),
        "REMOVED" => Ok(PaymentState::Removed {
            reason: RemovalReason::VulnerabilityScore,
        }),
        other => Err(integrity("payment state", other)),
    }
}

pub(crate) fn payment_from_model(model: &payments::Model) -> AppResult<Payment> {
    let status = PaymentStatus::parse(&model.status)
        .ok_or_else(|| integrity("payment status", &model.status))?;
    let state = state_from_columns(&model.state, model.state_reason.as_deref())?;
    let snapshot: Option<HouseholdSnapshot> = model
        .snapshot
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| AppError::DataIntegrity(format!("unreadable payment snapshot: {e}")))?;

    Ok(Payment {
        id: model.id,
        code: model.code.clone(),
        plan_id: model.plan_id,
        household_id: model.household_id,
        head_of_household_id: model.head_of_household_id,
        collector_id: model.collector_id,
        status,
        state,
        currency: model.currency.clone(),
        entitlement_quantity: model.entitlement_quantity,
        entitlement_quantity_usd: model.entitlement_quantity_usd,
        delivered_quantity: model.delivered_quantity,
        delivered_quantity_usd: model.delivered_quantity_usd,
        delivery_date: model.delivery_date.map(|d| d.with_timezone(&Utc)),
        fsp_id: model.fsp_id,
        delivery_mechanism: model.delivery_mechanism.clone(),
        has_valid_wallet: model.has_valid_wallet,
        signature: model.signature.clone(),
        snapshot,
        source_payment_id: model.source_payment_id,
        split_id: model.split_id,
        fsp_auth_code: model.fsp_auth_code.clone(),
    })
}

pub(crate) fn payment_to_insert(
    payment: &Payment,
    now: DateTimeWithTimeZone,
) -> AppResult<payments::ActiveModel> {
    let (state, state_reason) = state_columns(&payment.state);
    let snapshot = payment
        .snapshot
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::Internal(format!("unserializable payment snapshot: {e}")))?;

    Ok(payments::ActiveModel {
        id: Set(payment.id),
        code: Set(payment.code.clone()),
        plan_id: Set(payment.plan_id),
        household_id: Set(payment.household_id),
        head_of_household_id: Set(payment.head_of_household_id),
        collector_id: Set(payment.collector_id),
        status: Set(payment.status.as_str().to_string()),
        state: Set(state),
        state_reason: Set(state_reason),
        currency: Set(payment.currency.clone()),
        entitlement_quantity: Set(payment.entitlement_quantity),
        entitlement_quantity_usd: Set(payment.entitlement_quantity_usd),
        delivered_quantity: Set(payment.delivered_quantity),
        delivered_quantity_usd: Set(payment.delivered_quantity_usd),
        delivery_date: Set(payment.delivery_date.map(Into::into)),
        fsp_id: Set(payment.fsp_id),
        delivery_mechanism: Set(payment.delivery_mechanism.clone()),
        has_valid_wallet: Set(payment.has_valid_wallet),
        signature: Set(payment.signature.clone()),
        snapshot: Set(snapshot),
        source_payment_id: Set(payment.source_payment_id),
        split_id: Set(payment.split_id),
        fsp_auth_code: Set(payment.fsp_auth_code.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    })
}

pub(crate) fn apply_payment(
    model: payments::Model,
    payment: &Payment,
    now: DateTimeWithTimeZone,
) -> payments::ActiveModel {
    let (state, state_reason) = state_columns(&payment.state);
    let mut active: payments::ActiveModel = model.into();
    active.status = Set(payment.status.as_str().to_string());
    active.state = Set(state);
    active.state_reason = Set(state_reason);
    active.currency = Set(payment.currency.clone());
    active.entitlement_quantity = Set(payment.entitlement_quantity);
    active.entitlement_quantity_usd = Set(payment.entitlement_quantity_usd);
    active.delivered_quantity = Set(payment.delivered_quantity);
    active.delivered_quantity_usd = Set(payment.delivered_quantity_usd);
    active.delivery_date = Set(payment.delivery_date.map(Into::into));
    active.fsp_id = Set(payment.fsp_id);
    active.delivery_mechanism = Set(payment.delivery_mechanism.clone());
    active.has_valid_wallet = Set(payment.has_valid_wallet);
    active.signature = Set(payment.signature.clone());
    active.split_id = Set(payment.split_id);
    active.fsp_auth_code = Set(payment.fsp_auth_code.clone());
    active.updated_at = Set(now);
    active
}

// ============================================================================
// Approval processes
// ============================================================================

pub(crate) fn process_from_models(
    process: &approval_processes::Model,
    approval_rows: &[approvals::Model],
) -> AppResult<ApprovalProcess> {
    let mut parsed = Vec::with_capacity(approval_rows.len());
    for row in approval_rows {
        let approval_type = ApprovalType::parse(&row.approval_type)
            .ok_or_else(|| integrity("approval type", &row.approval_type))?;
        parsed.push(Approval {
            id: row.id,
            approval_type,
            created_by: row.created_by,
            comment: row.comment.clone(),
            created_at: row.created_at.with_timezone(&Utc),
        });
    }

    Ok(ApprovalProcess {
        id: process.id,
        payment_plan_id: process.payment_plan_id,
        approval_number_required: count_from(
            process.approval_number_required,
            "approval requirement",
        )?,
        authorization_number_required: count_from(
            process.authorization_number_required,
            "authorization requirement",
        )?,
        finance_release_number_required: count_from(
            process.finance_release_number_required,
            "finance release requirement",
        )?,
        sent_for_approval_by: process.sent_for_approval_by,
        sent_for_approval_date: process.sent_for_approval_date.with_timezone(&Utc),
        sent_for_authorization_date: process
            .sent_for_authorization_date
            .map(|d| d.with_timezone(&Utc)),
        sent_for_finance_release_date: process
            .sent_for_finance_release_date
            .map(|d| d.with_timezone(&Utc)),
        approvals: parsed,
    })
}

pub(crate) fn process_to_insert(
    process: &ApprovalProcess,
    now: DateTimeWithTimeZone,
) -> approval_processes::ActiveModel {
    approval_processes::ActiveModel {
        id: Set(process.id),
        payment_plan_id: Set(process.payment_plan_id),
        approval_number_required: Set(i32::try_from(process.approval_number_required)
            .unwrap_or(i32::MAX)),
        authorization_number_required: Set(i32::try_from(process.authorization_number_required)
            .unwrap_or(i32::MAX)),
        finance_release_number_required: Set(i32::try_from(
            process.finance_release_number_required,
        )
        .unwrap_or(i32::MAX)),
        sent_for_approval_by: Set(process.sent_for_approval_by),
        sent_for_approval_date: Set(process.sent_for_approval_date.into()),
        sent_for_authorization_date: Set(process.sent_for_authorization_date.map(Into::into)),
        sent_for_finance_release_date: Set(process.sent_for_finance_release_date.map(Into::into)),
        created_at: Set(now),
    }
}

pub(crate) fn approval_to_insert(
    process_id: Uuid,
    approval: &Approval,
) -> approvals::ActiveModel {
    approvals::ActiveModel {
        id: Set(approval.id),
        approval_process_id: Set(process_id),
        approval_type: Set(approval.approval_type.as_str().to_string()),
        created_by: Set(approval.created_by),
        comment: Set(approval.comment.clone()),
        created_at: Set(approval.created_at.into()),
    }
}

pub(crate) fn threshold_from_model(model: &acceptance_thresholds::Model) -> AppResult<AcceptanceThreshold> {
    Ok(AcceptanceThreshold {
        min_usd: model.min_usd,
        max_usd: model.max_usd,
        approval_count: count_from(model.approval_count, "approval threshold")?,
        authorization_count: count_from(model.authorization_count, "authorization threshold")?,
        finance_release_count: count_from(model.finance_release_count, "finance release threshold")?,
    })
}

// ============================================================================
// Households and individuals
// ============================================================================

pub(crate) fn household_from_model(model: &households::Model) -> Household {
    Household {
        id: model.id,
        code: model.code.clone(),
        size: model.size,
        admin_area_1: model.admin_area_1.clone(),
        admin_area_2: model.admin_area_2.clone(),
        admin_area_3: model.admin_area_3.clone(),
        is_withdrawn: model.is_withdrawn,
        vulnerability_score: model.vulnerability_score,
    }
}

pub(crate) fn individual_from_model(model: &individuals::Model) -> AppResult<Individual> {
    let sex = Sex::parse(&model.sex).ok_or_else(|| integrity("sex", &model.sex))?;
    let account_data = serde_json::from_value(model.account_data.clone())
        .map_err(|e| AppError::DataIntegrity(format!("unreadable account data: {e}")))?;

    Ok(Individual {
        id: model.id,
        code: model.code.clone(),
        household_id: model.household_id,
        full_name: model.full_name.clone(),
        birth_date: model.birth_date,
        sex,
        account_data,
    })
}

// ============================================================================
// Verifications
// ============================================================================

pub(crate) fn verification_from_model(
    model: &payment_verifications::Model,
) -> AppResult<PaymentVerification> {
    let status = VerificationStatus::parse(&model.status)
        .ok_or_else(|| integrity("verification status", &model.status))?;
    Ok(PaymentVerification {
        id: model.id,
        payment_id: model.payment_id,
        status,
        received_amount: model.received_amount,
    })
}

pub(crate) fn apply_verification(
    model: payment_verifications::Model,
    verification: &PaymentVerification,
    now: DateTimeWithTimeZone,
) -> payment_verifications::ActiveModel {
    let mut active: payment_verifications::ActiveModel = model.into();
    active.status = Set(verification.status.as_str().to_string());
    active.received_amount = Set(verification.received_amount);
    active.updated_at = Set(now);
    active
}
