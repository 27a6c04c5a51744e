//! Money and population aggregate recomputation.
//!
//! Pure computation over a plan's payments and their households. Idempotent
//! and safe to call repeatedly; the only outputs are the plan's aggregate
//! fields.

mod service;
mod types;

pub use service::{
    money_totals, population_counts, update_money_fields, update_population_counts,
};
pub use types::{MemberDemographics, MoneyTotals, PopulationCounts};
