//! Payments: one planned disbursement to one household/collector pair.
//!
//! A payment is created in bulk when a plan materializes its targeted
//! population, mutated by entitlement-formula runs, FSP assignment, and the
//! reconciliation importer, and never hard-deleted once created (the
//! [`PaymentState`] tag soft-removes it instead).

pub mod error;
pub mod generator;
pub mod signature;
pub mod snapshot;
mod types;

pub use error::GeneratorError;
pub use generator::{HouseholdWithCollector, PaymentGenerator};
pub use snapshot::{CollectorSnapshot, HouseholdSnapshot};
pub use types::{Payment, PaymentState, PaymentStatus, RemovalReason};
