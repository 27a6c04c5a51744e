//! Household state snapshots.
//!
//! A snapshot freezes the household/collector data a payment was generated
//! against, so later household edits cannot silently change what was
//! approved and disbursed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::household::{Household, Individual};

/// Collector data captured at payment generation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorSnapshot {
    /// Collector external identifier.
    pub code: String,
    /// Collector full name.
    pub full_name: String,
    /// Delivery account data as it stood at generation time.
    pub account_data: BTreeMap<String, String>,
}

/// Household state captured at payment generation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdSnapshot {
    /// Household external identifier.
    pub household_code: String,
    /// Household size at generation time.
    pub size: i32,
    /// Admin area code at level 1.
    pub admin_area_1: Option<String>,
    /// Admin area code at level 2.
    pub admin_area_2: Option<String>,
    /// Admin area code at level 3.
    pub admin_area_3: Option<String>,
    /// Primary collector data.
    pub collector: CollectorSnapshot,
}

impl HouseholdSnapshot {
    /// Captures the current household and collector state.
    #[must_use]
    pub fn capture(household: &Household, collector: &Individual) -> Self {
        Self {
            household_code: household.code.clone(),
            size: household.size,
            admin_area_1: household.admin_area_1.clone(),
            admin_area_2: household.admin_area_2.clone(),
            admin_area_3: household.admin_area_3.clone(),
            collector: CollectorSnapshot {
                code: collector.code.clone(),
                full_name: collector.full_name.clone(),
                account_data: collector.account_data.clone(),
            },
        }
    }
}
