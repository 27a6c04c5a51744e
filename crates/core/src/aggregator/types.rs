//! Aggregate value types.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::household::{Individual, Sex};

/// The four money sums over a plan's eligible payments, plus the derived
/// undelivered amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoneyTotals {
    /// Entitled, local currency.
    pub entitled: Decimal,
    /// Entitled, USD.
    pub entitled_usd: Decimal,
    /// Delivered, local currency.
    pub delivered: Decimal,
    /// Delivered, USD.
    pub delivered_usd: Decimal,
    /// Entitled minus delivered, local currency.
    pub undelivered: Decimal,
    /// Entitled minus delivered, USD.
    pub undelivered_usd: Decimal,
}

/// The six demographic counts over a plan's eligible households.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PopulationCounts {
    /// Male members under 18.
    pub male_children: i64,
    /// Female members under 18.
    pub female_children: i64,
    /// Male members 18 or over.
    pub male_adults: i64,
    /// Female members 18 or over.
    pub female_adults: i64,
    /// Households.
    pub households: i64,
    /// All members.
    pub individuals: i64,
}

/// The demographic facts the aggregator needs about one household member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberDemographics {
    /// Date of birth.
    pub birth_date: NaiveDate,
    /// Sex.
    pub sex: Sex,
}

impl From<&Individual> for MemberDemographics {
    fn from(individual: &Individual) -> Self {
        Self {
            birth_date: individual.birth_date,
            sex: individual.sex,
        }
    }
}
