//! Household and individual input types.
//!
//! These are the materialized results of the targeting collaborator's
//! queries. The core never evaluates targeting criteria itself; repositories
//! hand it fully-resolved households, members, and collectors.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Biological sex as recorded on an individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sex {
    /// Male.
    Male,
    /// Female.
    Female,
}

impl Sex {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FEMALE",
        }
    }

    /// Parses a sex value from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MALE" => Some(Self::Male),
            "FEMALE" => Some(Self::Female),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A household as seen by the payment engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Household {
    /// Unique identifier.
    pub id: Uuid,
    /// External human-readable identifier (e.g. `HH-2026-000042`).
    pub code: String,
    /// Number of members.
    pub size: i32,
    /// Admin area code at level 1, if known.
    pub admin_area_1: Option<String>,
    /// Admin area code at level 2, if known.
    pub admin_area_2: Option<String>,
    /// Admin area code at level 3, if known.
    pub admin_area_3: Option<String>,
    /// Household has been withdrawn from the program.
    pub is_withdrawn: bool,
    /// Vulnerability score assigned by the rule engine, if computed.
    pub vulnerability_score: Option<Decimal>,
}

/// An individual household member.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    /// Unique identifier.
    pub id: Uuid,
    /// External human-readable identifier (e.g. `IND-2026-000107`).
    pub code: String,
    /// Owning household.
    pub household_id: Uuid,
    /// Full name.
    pub full_name: String,
    /// Date of birth.
    pub birth_date: NaiveDate,
    /// Sex.
    pub sex: Sex,
    /// Delivery account data (field name -> value), e.g. wallet or bank fields.
    pub account_data: BTreeMap<String, String>,
}

/// A delivery mechanism definition (cash, mobile money, bank transfer, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryMechanism {
    /// Stable mechanism code (e.g. `CASH`, `MOBILE_MONEY`).
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Account-data fields a collector must carry for this mechanism.
    pub required_fields: Vec<String>,
}

/// A financial service provider.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialServiceProvider {
    /// Unique identifier.
    pub id: Uuid,
    /// Provider name (e.g. `Santander`).
    pub name: String,
}
