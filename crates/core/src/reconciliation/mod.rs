//! Delivered-amount import from per-FSP workbooks.
//!
//! The serialization collaborator turns a workbook into positional cell rows;
//! the per-FSP-per-mechanism column template maps them to named fields. Every
//! row is validated in memory before anything is applied, so a single bad row
//! fails the whole import without partial commits.

pub mod error;
pub mod importer;
mod types;

#[cfg(test)]
mod classify_props;

pub use error::ReconciliationError;
pub use importer::{classify_delivery, ImportOutcome, ReconciliationImporter};
pub use types::{
    FspTemplate, ReconciliationRow, COLUMN_AUTH_CODE, COLUMN_DELIVERED_QUANTITY,
    COLUMN_DELIVERY_DATE, COLUMN_PAYMENT_ID,
};
