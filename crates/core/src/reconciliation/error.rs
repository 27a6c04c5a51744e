//! Reconciliation import error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::plan::PlanStatus;

/// Errors that fail a reconciliation import as a whole.
///
/// Malformed rows are not represented here: the template parser collects
/// those into a per-row error list instead of raising.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// The plan is not in a status that accepts reconciliation data.
    #[error("Reconciliation requires an accepted Payment Plan, not {status}")]
    PlanNotReconcilable {
        /// The plan's current status.
        status: PlanStatus,
    },

    /// A row references a payment the plan does not hold.
    #[error("Payment {payment_code} does not belong to the plan")]
    UnknownPayment {
        /// The unmatched payment code.
        payment_code: String,
    },

    /// A referenced payment has no entitlement to reconcile against.
    #[error("Payment {payment_code} has no entitlement quantity set")]
    MissingEntitlement {
        /// External ID of the payment.
        payment_code: String,
    },

    /// More was delivered than the payment's entitlement.
    #[error(
        "Delivered quantity {delivered:.2} is bigger than Entitlement quantity {entitlement:.2} \
         for Payment {payment_code}"
    )]
    DeliveredExceedsEntitlement {
        /// External ID of the payment.
        payment_code: String,
        /// The reported delivered quantity.
        delivered: Decimal,
        /// The payment's entitlement quantity.
        entitlement: Decimal,
    },
}

impl ReconciliationError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::PlanNotReconcilable { .. } | Self::DeliveredExceedsEntitlement { .. } => 400,
            Self::UnknownPayment { .. } => 404,
            Self::MissingEntitlement { .. } => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PlanNotReconcilable { .. } => "PLAN_NOT_RECONCILABLE",
            Self::UnknownPayment { .. } => "UNKNOWN_PAYMENT",
            Self::MissingEntitlement { .. } => "MISSING_ENTITLEMENT",
            Self::DeliveredExceedsEntitlement { .. } => "DELIVERED_EXCEEDS_ENTITLEMENT",
        }
    }

    /// True for errors that indicate a broken invariant rather than bad input.
    #[must_use]
    pub const fn is_data_integrity(&self) -> bool {
        matches!(self, Self::MissingEntitlement { .. })
    }
}
