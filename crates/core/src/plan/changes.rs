//! Before/after snapshot diffs for the activity log.
//!
//! The activity-log collaborator receives a field-name keyed mapping of
//! (old value, new value) for every mutation; this is the single place that
//! knows how to render plan fields for it.

use std::collections::BTreeMap;
use std::fmt::Display;

use super::types::PaymentPlan;

fn fmt_opt<T: Display>(value: Option<&T>) -> String {
    value.map_or_else(String::new, ToString::to_string)
}

/// Computes the changed fields between two plan snapshots.
#[must_use]
pub fn diff(before: &PaymentPlan, after: &PaymentPlan) -> BTreeMap<String, (String, String)> {
    let mut changes = BTreeMap::new();
    let mut record = |field: &str, old: String, new: String| {
        if old != new {
            changes.insert(field.to_string(), (old, new));
        }
    };

    record(
        "status",
        before.status.as_str().to_string(),
        after.status.as_str().to_string(),
    );
    record(
        "background_action",
        fmt_opt(before.background_action.as_ref()),
        fmt_opt(after.background_action.as_ref()),
    );
    record(
        "build_status",
        fmt_opt(before.build_status.map(|b| b.as_str()).as_ref()),
        fmt_opt(after.build_status.map(|b| b.as_str()).as_ref()),
    );
    record("currency", before.currency.clone(), after.currency.clone());
    record(
        "exchange_rate",
        fmt_opt(before.exchange_rate.as_ref()),
        fmt_opt(after.exchange_rate.as_ref()),
    );
    record(
        "dispersion_start_date",
        fmt_opt(before.dispersion_start_date.as_ref()),
        fmt_opt(after.dispersion_start_date.as_ref()),
    );
    record(
        "dispersion_end_date",
        fmt_opt(before.dispersion_end_date.as_ref()),
        fmt_opt(after.dispersion_end_date.as_ref()),
    );
    record(
        "total_entitled_quantity",
        before.total_entitled_quantity.to_string(),
        after.total_entitled_quantity.to_string(),
    );
    record(
        "total_entitled_quantity_usd",
        before.total_entitled_quantity_usd.to_string(),
        after.total_entitled_quantity_usd.to_string(),
    );
    record(
        "total_delivered_quantity",
        before.total_delivered_quantity.to_string(),
        after.total_delivered_quantity.to_string(),
    );
    record(
        "total_delivered_quantity_usd",
        before.total_delivered_quantity_usd.to_string(),
        after.total_delivered_quantity_usd.to_string(),
    );
    record(
        "total_undelivered_quantity",
        before.total_undelivered_quantity.to_string(),
        after.total_undelivered_quantity.to_string(),
    );
    record(
        "total_undelivered_quantity_usd",
        before.total_undelivered_quantity_usd.to_string(),
        after.total_undelivered_quantity_usd.to_string(),
    );
    record(
        "total_households_count",
        before.total_households_count.to_string(),
        after.total_households_count.to_string(),
    );
    record(
        "total_individuals_count",
        before.total_individuals_count.to_string(),
        after.total_individuals_count.to_string(),
    );
    record(
        "fsp_id",
        fmt_opt(before.fsp_id.as_ref()),
        fmt_opt(after.fsp_id.as_ref()),
    );
    record(
        "delivery_mechanism",
        fmt_opt(before.delivery_mechanism.as_ref()),
        fmt_opt(after.delivery_mechanism.as_ref()),
    );
    record(
        "excluded_household_ids",
        fmt_opt(before.excluded_household_ids.as_ref()),
        fmt_opt(after.excluded_household_ids.as_ref()),
    );
    record(
        "exclusion_reason",
        fmt_opt(before.exclusion_reason.as_ref()),
        fmt_opt(after.exclusion_reason.as_ref()),
    );
    record(
        "export_file_name",
        fmt_opt(before.export_file_name.as_ref()),
        fmt_opt(after.export_file_name.as_ref()),
    );

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn plan() -> PaymentPlan {
        PaymentPlan::new_targeting(
            Uuid::new_v4(),
            "PP-2026-000001".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now(),
        )
    }

    #[test]
    fn test_no_changes_yields_empty_diff() {
        let plan = plan();
        assert!(diff(&plan, &plan).is_empty());
    }

    #[test]
    fn test_diff_reports_old_and_new() {
        let before = plan();
        let mut after = before.clone();
        after.set_status(PlanStatus::TpLocked, Utc::now());
        after.currency = "PLN".to_string();

        let changes = diff(&before, &after);
        assert_eq!(
            changes.get("status"),
            Some(&("TP_OPEN".to_string(), "TP_LOCKED".to_string()))
        );
        assert_eq!(
            changes.get("currency"),
            Some(&(String::new(), "PLN".to_string()))
        );
        assert!(!changes.contains_key("exchange_rate"));
    }
}
