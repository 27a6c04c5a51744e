//! Follow-up plan creation.
//!
//! A follow-up re-targets the households whose payments failed, so it skips
//! the targeting phase entirely and starts in `OPEN`. The builder lists every
//! carried-over field explicitly; identity and lifecycle fields are always
//! fresh, never cloned from the source.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::tasks::{Outbox, ScheduledTask};

use super::error::PlanError;
use super::types::{PaymentPlan, PlanStatus};

/// Inputs for creating a follow-up plan.
#[derive(Debug, Clone)]
pub struct FollowUpInput {
    /// Identity of the new plan.
    pub id: Uuid,
    /// Sequential code of the new plan.
    pub code: String,
    /// Deep copy of the source plan's targeting criteria, made by the caller.
    pub targeting_criteria_id: Uuid,
    /// First day of the follow-up dispersion window.
    pub dispersion_start_date: NaiveDate,
    /// Last day of the follow-up dispersion window.
    pub dispersion_end_date: NaiveDate,
}

/// Creates a follow-up plan from a source plan with unsuccessful payments.
///
/// Legal only on a non-follow-up source with at least one unsuccessful
/// payment. The follow-up starts in `OPEN`; its payments are materialized by
/// the scheduled background task.
pub fn create_follow_up(
    source: &PaymentPlan,
    unsuccessful_count: usize,
    input: FollowUpInput,
    now: DateTime<Utc>,
) -> Result<(PaymentPlan, Outbox), PlanError> {
    if source.is_follow_up {
        return Err(PlanError::FollowUpOfFollowUp);
    }
    if unsuccessful_count == 0 {
        return Err(PlanError::NoUnsuccessfulPayments);
    }

    let mut follow_up = PaymentPlan::new_targeting(
        input.id,
        input.code,
        source.program_cycle_id,
        input.targeting_criteria_id,
        now,
    );

    // Carried over from the source, field by field.
    follow_up.currency = source.currency.clone();
    follow_up.exchange_rate = source.exchange_rate;
    follow_up.fsp_id = source.fsp_id;
    follow_up.delivery_mechanism = source.delivery_mechanism.clone();

    follow_up.is_follow_up = true;
    follow_up.source_plan_id = Some(source.id);
    follow_up.dispersion_start_date = Some(input.dispersion_start_date);
    follow_up.dispersion_end_date = Some(input.dispersion_end_date);
    follow_up.build_status = None;
    follow_up.set_status(PlanStatus::Open, now);

    let mut outbox = Outbox::new();
    outbox.push(ScheduledTask::PrepareFollowUpPayments {
        plan_id: follow_up.id,
    });

    Ok((follow_up, outbox))
}
