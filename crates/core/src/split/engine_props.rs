//! Property tests for the split partition guarantees.
//!
//! The central guarantee: a by-records split of P eligible payments into n
//! chunks yields exactly n non-empty chunks whose sizes sum to P and whose
//! union contains every eligible payment exactly once.

use std::collections::HashSet;

use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

use aidra_shared::config::SplitConfig;

use crate::payment::{Payment, PaymentState, PaymentStatus};
use crate::plan::{PaymentPlan, PlanStatus};

use super::engine::{SplitEngine, SplitType};

fn plan() -> PaymentPlan {
    let mut plan = PaymentPlan::new_targeting(
        Uuid::new_v4(),
        "PP-2026-000001".to_string(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        Utc::now(),
    );
    plan.status = PlanStatus::Accepted;
    plan
}

fn payment(plan: &PaymentPlan, sequence: usize) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        code: format!("RCPT-2026-000001-{sequence:07}"),
        plan_id: plan.id,
        household_id: Uuid::new_v4(),
        head_of_household_id: None,
        collector_id: Uuid::new_v4(),
        status: PaymentStatus::Pending,
        state: PaymentState::Active,
        currency: "PLN".to_string(),
        entitlement_quantity: None,
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

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_by_records_partitions_exactly(
        total in 2usize..120,
        chunks in 2usize..20,
        excluded in 0usize..10,
    ) {
        prop_assume!(chunks <= total);

        let mut plan = plan();
        let mut payments: Vec<Payment> = (1..=total + excluded)
            .map(|i| payment(&plan, i))
            .collect();
        // Ineligible rows interleaved at the front must not participate.
        for p in payments.iter_mut().take(excluded) {
            p.state = PaymentState::Conflicted;
        }
        let eligible_ids: HashSet<Uuid> = payments
            .iter()
            .filter(|p| p.is_eligible())
            .map(|p| p.id)
            .collect();

        let config = SplitConfig { max_chunks: 200, min_chunk_count: 2 };
        let splits = SplitEngine::split(
            &mut plan,
            &mut payments,
            SplitType::ByRecords,
            Some(chunks),
            &config,
        )
        .unwrap();

        prop_assert_eq!(splits.len(), chunks);

        let mut seen = HashSet::new();
        for split in &splits {
            prop_assert!(!split.payment_ids.is_empty());
            for id in &split.payment_ids {
                prop_assert!(seen.insert(*id), "payment assigned to two chunks");
            }
        }
        prop_assert_eq!(seen.len(), total);
        prop_assert_eq!(seen, eligible_ids);

        // Near-equal: sizes differ by at most one.
        let sizes: Vec<usize> = splits.iter().map(|s| s.payment_ids.len()).collect();
        let min = sizes.iter().min().copied().unwrap_or(0);
        let max = sizes.iter().max().copied().unwrap_or(0);
        prop_assert!(max - min <= 1);
    }

    #[test]
    fn prop_grouped_splits_cover_eligible_set(total in 1usize..60, areas in 1usize..8) {
        let mut plan = plan();
        let mut payments: Vec<Payment> = (1..=total).map(|i| payment(&plan, i)).collect();
        for (i, p) in payments.iter_mut().enumerate() {
            p.snapshot = Some(crate::payment::HouseholdSnapshot {
                household_code: format!("HH-{i}"),
                size: 1,
                admin_area_1: Some(format!("AREA-{}", i % areas)),
                admin_area_2: None,
                admin_area_3: None,
                collector: crate::payment::CollectorSnapshot {
                    code: format!("IND-{i}"),
                    full_name: String::new(),
                    account_data: std::collections::BTreeMap::new(),
                },
            });
        }

        let config = SplitConfig { max_chunks: 200, min_chunk_count: 2 };
        let splits = SplitEngine::split(
            &mut plan,
            &mut payments,
            SplitType::ByAdminArea1,
            None,
            &config,
        )
        .unwrap();

        prop_assert_eq!(splits.len(), areas.min(total));
        let covered: usize = splits.iter().map(|s| s.payment_ids.len()).sum();
        prop_assert_eq!(covered, total);
    }
}
