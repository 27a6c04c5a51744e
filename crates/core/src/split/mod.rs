//! Partitioning of a plan's eligible payments into ordered chunks.
//!
//! Splits drive parallel downstream processing (workbook export, gateway
//! sends). A split is always computed over the eligible payments only and
//! replaces any previous split set wholesale.

pub mod engine;
pub mod error;

#[cfg(test)]
mod engine_props;

pub use engine::{PaymentPlanSplit, SplitEngine, SplitType};
pub use error::SplitError;
