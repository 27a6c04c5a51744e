//! Payment verification bookkeeping.
//!
//! A verification tracks whether a household confirms having received its
//! payment. The reconciliation importer keeps verifications in lockstep with
//! delivered amounts; the manual update enumerates every combination of the
//! received flag and amount explicitly.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use aidra_shared::types::round_money;

use crate::payment::PaymentStatus;

/// Status of one payment verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// Not yet verified.
    Pending,
    /// Household confirmed receiving the full amount.
    Received,
    /// Household reported receiving nothing.
    NotReceived,
    /// Household received an amount different from the entitlement.
    ReceivedWithIssues,
}

impl VerificationStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Received => "RECEIVED",
            Self::NotReceived => "NOT_RECEIVED",
            Self::ReceivedWithIssues => "RECEIVED_WITH_ISSUES",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "RECEIVED" => Some(Self::Received),
            "NOT_RECEIVED" => Some(Self::NotReceived),
            "RECEIVED_WITH_ISSUES" => Some(Self::ReceivedWithIssues),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One payment's verification record.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentVerification {
    /// Unique identifier.
    pub id: Uuid,
    /// The payment this verification belongs to.
    pub payment_id: Uuid,
    /// Verification status.
    pub status: VerificationStatus,
    /// Amount the household reports having received.
    pub received_amount: Option<Decimal>,
}

impl PaymentVerification {
    /// Creates a pending verification for a payment.
    #[must_use]
    pub fn new_pending(payment_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            status: VerificationStatus::Pending,
            received_amount: None,
        }
    }
}

/// Errors raised by the manual received-amount update.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The received flag was not supplied.
    #[error("You have to state whether the payment was received or not")]
    ReceivedFlagMissing,

    /// Received was confirmed without stating the amount.
    #[error("Received payments require a received amount")]
    AmountMissing,

    /// A received amount cannot be negative.
    #[error("Received amount {amount} cannot be negative")]
    NegativeAmount {
        /// The rejected amount.
        amount: Decimal,
    },

    /// A zero amount contradicts a received confirmation.
    #[error("A received amount of 0 means the payment was not received")]
    ZeroAmountReceived,

    /// A non-zero amount contradicts a not-received report.
    #[error("Received amount {amount} contradicts the payment not being received")]
    AmountForNotReceived {
        /// The contradicting amount.
        amount: Decimal,
    },
}

impl VerificationError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        400
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ReceivedFlagMissing => "RECEIVED_FLAG_MISSING",
            Self::AmountMissing => "RECEIVED_AMOUNT_MISSING",
            Self::NegativeAmount { .. } => "RECEIVED_AMOUNT_NEGATIVE",
            Self::ZeroAmountReceived => "RECEIVED_AMOUNT_ZERO",
            Self::AmountForNotReceived { .. } => "RECEIVED_AMOUNT_CONTRADICTS",
        }
    }
}

/// Applies a manual received/received-amount update.
///
/// Every combination of the received flag (`None`/`Some(false)`/`Some(true)`)
/// and the amount (`None`/zero/positive) has an explicit arm, so no edge
/// combination falls through unchecked.
pub fn update_received(
    verification: &mut PaymentVerification,
    entitlement: Decimal,
    received: Option<bool>,
    received_amount: Option<Decimal>,
) -> Result<(), VerificationError> {
    if let Some(amount) = received_amount {
        if amount < Decimal::ZERO {
            return Err(VerificationError::NegativeAmount { amount });
        }
    }

    match (received, received_amount) {
        (None, _) => Err(VerificationError::ReceivedFlagMissing),

        (Some(true), None) => Err(VerificationError::AmountMissing),
        (Some(true), Some(amount)) if amount.is_zero() => {
            Err(VerificationError::ZeroAmountReceived)
        }
        (Some(true), Some(amount)) => {
            let amount = round_money(amount);
            verification.status = if amount == entitlement {
                VerificationStatus::Received
            } else {
                VerificationStatus::ReceivedWithIssues
            };
            verification.received_amount = Some(amount);
            Ok(())
        }

        (Some(false), Some(amount)) if !amount.is_zero() => {
            Err(VerificationError::AmountForNotReceived { amount })
        }
        (Some(false), _) => {
            verification.status = VerificationStatus::NotReceived;
            verification.received_amount = Some(Decimal::ZERO);
            Ok(())
        }
    }
}

/// Brings a verification in line with a payment's reconciled delivery state.
///
/// Called by the reconciliation importer for every updated payment: a full
/// delivery is received, a partial one received-with-issues, a zero delivery
/// not received, and an erroneous one clears the verification back to pending.
pub fn sync_with_delivery(
    verification: &mut PaymentVerification,
    payment_status: PaymentStatus,
    delivered: Option<Decimal>,
) {
    match payment_status {
        PaymentStatus::DistributionSuccessful => {
            verification.status = VerificationStatus::Received;
            verification.received_amount = delivered;
        }
        PaymentStatus::DistributionPartial => {
            verification.status = VerificationStatus::ReceivedWithIssues;
            verification.received_amount = delivered;
        }
        PaymentStatus::NotDistributed => {
            verification.status = VerificationStatus::NotReceived;
            verification.received_amount = Some(Decimal::ZERO);
        }
        PaymentStatus::TransactionErroneous
        | PaymentStatus::ForceFailed
        | PaymentStatus::Pending => {
            verification.status = VerificationStatus::Pending;
            verification.received_amount = None;
        }
    }
}

/// One per plan, created when the plan reaches `Accepted`.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationSummary {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning plan.
    pub plan_id: Uuid,
    /// Aggregate status over the plan's verifications.
    pub status: VerificationStatus,
}

impl VerificationSummary {
    /// Creates a pending summary for a plan.
    #[must_use]
    pub fn new_pending(plan_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_id,
            status: VerificationStatus::Pending,
        }
    }
}
