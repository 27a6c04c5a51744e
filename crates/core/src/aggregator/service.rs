//! Aggregate recomputation functions.

use std::collections::HashMap;

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use aidra_shared::types::sum_or_zero;

use crate::household::Sex;
use crate::payment::Payment;
use crate::plan::PaymentPlan;

use super::types::{MemberDemographics, MoneyTotals, PopulationCounts};

/// Sums entitled/delivered amounts over the eligible payments.
///
/// Missing quantities count as zero; the undelivered amounts are derived from
/// the sums afterwards.
#[must_use]
pub fn money_totals(payments: &[Payment]) -> MoneyTotals {
    let eligible: Vec<&Payment> = payments.iter().filter(|p| p.is_eligible()).collect();

    let entitled = sum_or_zero(eligible.iter().map(|p| p.entitlement_quantity));
    let entitled_usd = sum_or_zero(eligible.iter().map(|p| p.entitlement_quantity_usd));
    let delivered = sum_or_zero(eligible.iter().map(|p| p.delivered_quantity));
    let delivered_usd = sum_or_zero(eligible.iter().map(|p| p.delivered_quantity_usd));

    MoneyTotals {
        entitled,
        entitled_usd,
        delivered,
        delivered_usd,
        undelivered: entitled - delivered,
        undelivered_usd: entitled_usd - delivered_usd,
    }
}

/// Recomputes the plan's money fields from its payments.
///
/// A no-op while the plan is in a pre-payment-plan status: entitlements do
/// not exist yet, so recomputing would only zero out nothing.
pub fn update_money_fields(plan: &mut PaymentPlan, payments: &[Payment]) {
    if plan.status.is_pre_payment_plan() {
        return;
    }

    let totals = money_totals(payments);
    plan.total_entitled_quantity = totals.entitled;
    plan.total_entitled_quantity_usd = totals.entitled_usd;
    plan.total_delivered_quantity = totals.delivered;
    plan.total_delivered_quantity_usd = totals.delivered_usd;
    plan.total_undelivered_quantity = totals.undelivered;
    plan.total_undelivered_quantity_usd = totals.undelivered_usd;
}

/// Computes the six demographic counts for a set of household members.
///
/// A member counts as a child when born after the 18-years-ago cutoff
/// relative to `as_of`.
#[must_use]
pub fn population_counts(
    households: i64,
    members: impl IntoIterator<Item = MemberDemographics>,
    as_of: NaiveDate,
) -> PopulationCounts {
    let cutoff = as_of
        .checked_sub_months(Months::new(12 * 18))
        .unwrap_or(NaiveDate::MIN);

    let mut counts = PopulationCounts {
        households,
        ..PopulationCounts::default()
    };

    for member in members {
        counts.individuals += 1;
        let is_child = member.birth_date > cutoff;
        match (member.sex, is_child) {
            (Sex::Male, true) => counts.male_children += 1,
            (Sex::Male, false) => counts.male_adults += 1,
            (Sex::Female, true) => counts.female_children += 1,
            (Sex::Female, false) => counts.female_adults += 1,
        }
    }

    counts
}

/// Recomputes the plan's six population fields from the eligible payments'
/// households. Persists only those fields; idempotent.
pub fn update_population_counts(
    plan: &mut PaymentPlan,
    payments: &[Payment],
    members_by_household: &HashMap<Uuid, Vec<MemberDemographics>>,
    as_of: NaiveDate,
) {
    let eligible_households: Vec<Uuid> = payments
        .iter()
        .filter(|p| p.is_eligible())
        .map(|p| p.household_id)
        .collect();

    let members = eligible_households.iter().flat_map(|household_id| {
        members_by_household
            .get(household_id)
            .into_iter()
            .flatten()
            .copied()
    });

    let counts = population_counts(eligible_households.len() as i64, members, as_of);
    plan.male_children_count = counts.male_children;
    plan.female_children_count = counts.female_children;
    plan.male_adults_count = counts.male_adults;
    plan.female_adults_count = counts.female_adults;
    plan.total_households_count = counts.households;
    plan.total_individuals_count = counts.individuals;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{PaymentState, PaymentStatus};
    use crate::plan::PlanStatus;
    use chrono::Utc;
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

    fn payment(
        plan: &PaymentPlan,
        entitlement: Option<Decimal>,
        delivered: Option<Decimal>,
    ) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            code: format!("RCPT-{}", Uuid::new_v4()),
            plan_id: plan.id,
            household_id: Uuid::new_v4(),
            head_of_household_id: None,
            collector_id: Uuid::new_v4(),
            status: PaymentStatus::Pending,
            state: PaymentState::Active,
            currency: "PLN".to_string(),
            entitlement_quantity: entitlement,
            entitlement_quantity_usd: entitlement.map(|e| e / dec!(4)),
            delivered_quantity: delivered,
            delivered_quantity_usd: delivered.map(|d| d / dec!(4)),
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

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn test_money_totals_null_coalescing_and_undelivered() {
        let plan = plan_in(PlanStatus::Accepted);
        let payments = vec![
            payment(&plan, Some(dec!(500.00)), Some(dec!(300.00))),
            payment(&plan, Some(dec!(250.00)), None),
            payment(&plan, None, None),
        ];

        let totals = money_totals(&payments);
        assert_eq!(totals.entitled, dec!(750.00));
        assert_eq!(totals.delivered, dec!(300.00));
        assert_eq!(totals.undelivered, dec!(450.00));
        assert_eq!(totals.entitled_usd, dec!(187.50));
        assert_eq!(totals.undelivered_usd, totals.entitled_usd - totals.delivered_usd);
    }

    #[test]
    fn test_money_totals_skip_non_eligible_payments() {
        let plan = plan_in(PlanStatus::Accepted);
        let mut payments = vec![
            payment(&plan, Some(dec!(500.00)), None),
            payment(&plan, Some(dec!(111.00)), None),
            payment(&plan, Some(dec!(222.00)), None),
        ];
        payments[1].state = PaymentState::Excluded { reason: None };
        payments[2].state = PaymentState::Conflicted;

        let totals = money_totals(&payments);
        assert_eq!(totals.entitled, dec!(500.00));
    }

    #[test]
    fn test_update_money_fields_is_noop_for_pre_payment_statuses() {
        for status in crate::plan::ALL_STATUSES {
            if !status.is_pre_payment_plan() {
                continue;
            }
            let mut plan = plan_in(status);
            plan.total_entitled_quantity = dec!(999);
            let payments = vec![payment(&plan, Some(dec!(500.00)), None)];

            update_money_fields(&mut plan, &payments);
            assert_eq!(plan.total_entitled_quantity, dec!(999), "{status} mutated money");
        }
    }

    #[test]
    fn test_update_money_fields_invariant_undelivered() {
        let mut plan = plan_in(PlanStatus::Accepted);
        let payments = vec![
            payment(&plan, Some(dec!(500.00)), Some(dec!(500.00))),
            payment(&plan, Some(dec!(400.00)), Some(dec!(150.00))),
        ];

        update_money_fields(&mut plan, &payments);
        assert_eq!(
            plan.total_undelivered_quantity,
            plan.total_entitled_quantity - plan.total_delivered_quantity
        );
        assert_eq!(
            plan.total_undelivered_quantity_usd,
            plan.total_entitled_quantity_usd - plan.total_delivered_quantity_usd
        );
    }

    #[test]
    fn test_population_counts_cutoff_is_18_years() {
        let cutoff_day = NaiveDate::from_ymd_opt(2008, 3, 1).unwrap();
        let members = [
            // Born exactly 18 years ago: adult.
            MemberDemographics {
                birth_date: cutoff_day,
                sex: Sex::Male,
            },
            // Born one day later: child.
            MemberDemographics {
                birth_date: cutoff_day.succ_opt().unwrap(),
                sex: Sex::Male,
            },
            MemberDemographics {
                birth_date: NaiveDate::from_ymd_opt(2020, 6, 15).unwrap(),
                sex: Sex::Female,
            },
            MemberDemographics {
                birth_date: NaiveDate::from_ymd_opt(1975, 1, 1).unwrap(),
                sex: Sex::Female,
            },
        ];

        let counts = population_counts(2, members, as_of());
        assert_eq!(counts.male_adults, 1);
        assert_eq!(counts.male_children, 1);
        assert_eq!(counts.female_children, 1);
        assert_eq!(counts.female_adults, 1);
        assert_eq!(counts.households, 2);
        assert_eq!(counts.individuals, 4);
    }

    #[test]
    fn test_update_population_counts_is_idempotent() {
        let mut plan = plan_in(PlanStatus::Locked);
        let payments = vec![payment(&plan, Some(dec!(100)), None)];
        let members = HashMap::from([(
            payments[0].household_id,
            vec![
                MemberDemographics {
                    birth_date: NaiveDate::from_ymd_opt(2015, 5, 5).unwrap(),
                    sex: Sex::Female,
                },
                MemberDemographics {
                    birth_date: NaiveDate::from_ymd_opt(1980, 5, 5).unwrap(),
                    sex: Sex::Male,
                },
            ],
        )]);

        update_population_counts(&mut plan, &payments, &members, as_of());
        let first = (
            plan.male_children_count,
            plan.female_children_count,
            plan.male_adults_count,
            plan.female_adults_count,
            plan.total_households_count,
            plan.total_individuals_count,
        );

        update_population_counts(&mut plan, &payments, &members, as_of());
        let second = (
            plan.male_children_count,
            plan.female_children_count,
            plan.male_adults_count,
            plan.female_adults_count,
            plan.total_households_count,
            plan.total_individuals_count,
        );
        assert_eq!(first, second);
        assert_eq!(first, (0, 1, 1, 0, 1, 2));
    }

    #[test]
    fn test_update_population_counts_only_eligible_households() {
        let mut plan = plan_in(PlanStatus::Locked);
        let mut payments = vec![
            payment(&plan, Some(dec!(100)), None),
            payment(&plan, Some(dec!(100)), None),
        ];
        payments[1].state = PaymentState::Excluded { reason: None };

        let members = HashMap::from([
            (
                payments[0].household_id,
                vec![MemberDemographics {
                    birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                    sex: Sex::Male,
                }],
            ),
            (
                payments[1].household_id,
                vec![MemberDemographics {
                    birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                    sex: Sex::Female,
                }],
            ),
        ]);

        update_population_counts(&mut plan, &payments, &members, as_of());
        assert_eq!(plan.total_households_count, 1);
        assert_eq!(plan.total_individuals_count, 1);
        assert_eq!(plan.female_adults_count, 0);
    }
}
