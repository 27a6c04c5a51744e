//! Payment domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::snapshot::HouseholdSnapshot;

/// Delivery status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Not yet reconciled against FSP data.
    Pending,
    /// Delivered in full.
    DistributionSuccessful,
    /// Delivered, but less than the entitlement.
    DistributionPartial,
    /// FSP reported nothing was distributed.
    NotDistributed,
    /// FSP reported a transaction error.
    TransactionErroneous,
    /// Manually forced into a failed state.
    ForceFailed,
}

impl PaymentStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::DistributionSuccessful => "DISTRIBUTION_SUCCESSFUL",
            Self::DistributionPartial => "DISTRIBUTION_PARTIAL",
            Self::NotDistributed => "NOT_DISTRIBUTED",
            Self::TransactionErroneous => "TRANSACTION_ERRONEOUS",
            Self::ForceFailed => "FORCE_FAILED",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "DISTRIBUTION_SUCCESSFUL" => Some(Self::DistributionSuccessful),
            "DISTRIBUTION_PARTIAL" => Some(Self::DistributionPartial),
            "NOT_DISTRIBUTED" => Some(Self::NotDistributed),
            "TRANSACTION_ERRONEOUS" => Some(Self::TransactionErroneous),
            "FORCE_FAILED" => Some(Self::ForceFailed),
            _ => None,
        }
    }

    /// Statuses that qualify a payment for a follow-up plan.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::NotDistributed | Self::TransactionErroneous | Self::ForceFailed
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a payment was soft-removed from its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalReason {
    /// Filtered out by the plan's vulnerability-score bounds.
    VulnerabilityScore,
}

/// Eligibility tag for a payment.
///
/// "Eligible payments" everywhere in the engine means exactly
/// `PaymentState::Active`; the other variants record why a row still exists
/// but no longer participates in totals, splits, exports, or reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentState {
    /// Participates in the plan.
    Active,
    /// Manually excluded from the plan without deletion.
    Excluded {
        /// Free-text reason recorded at exclusion time.
        reason: Option<String>,
    },
    /// Hard conflict with another plan in the same program cycle.
    Conflicted,
    /// Soft-removed by an automatic filter.
    Removed {
        /// The filter that removed it.
        reason: RemovalReason,
    },
}

impl PaymentState {
    /// Returns the string representation used in storage and diffs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Excluded { .. } => "EXCLUDED",
            Self::Conflicted => "CONFLICTED",
            Self::Removed { .. } => "REMOVED",
        }
    }
}

/// One planned disbursement to one household/collector pair within a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    /// Unique identifier.
    pub id: Uuid,
    /// External human-readable identifier (e.g. `RCPT-2026-000001-0000001`).
    pub code: String,
    /// Owning payment plan.
    pub plan_id: Uuid,
    /// Target household.
    pub household_id: Uuid,
    /// Head of the target household, if known.
    pub head_of_household_id: Option<Uuid>,
    /// The individual collecting on behalf of the household.
    pub collector_id: Uuid,
    /// Delivery status.
    pub status: PaymentStatus,
    /// Eligibility tag.
    pub state: PaymentState,
    /// Currency of the quantities (back-filled from the plan at `open`).
    pub currency: String,
    /// Planned amount in local currency.
    pub entitlement_quantity: Option<Decimal>,
    /// Planned amount in USD.
    pub entitlement_quantity_usd: Option<Decimal>,
    /// Reconciled delivered amount in local currency.
    pub delivered_quantity: Option<Decimal>,
    /// Reconciled delivered amount in USD.
    pub delivered_quantity_usd: Option<Decimal>,
    /// When the delivery took place.
    pub delivery_date: Option<DateTime<Utc>>,
    /// Assigned financial service provider.
    pub fsp_id: Option<Uuid>,
    /// Assigned delivery mechanism code.
    pub delivery_mechanism: Option<String>,
    /// Collector account data satisfies the mechanism's required fields.
    pub has_valid_wallet: bool,
    /// Tamper-evidence hash over the snapshot and entitlement data.
    pub signature: Option<String>,
    /// Household state captured at generation time.
    pub snapshot: Option<HouseholdSnapshot>,
    /// Original payment, when this row belongs to a follow-up plan.
    pub source_payment_id: Option<Uuid>,
    /// Split chunk this payment belongs to, if the plan was split.
    pub split_id: Option<Uuid>,
    /// Authorization code reported by the FSP during reconciliation.
    pub fsp_auth_code: Option<String>,
}

impl Payment {
    /// True when the payment participates in totals, splits, and exports.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        matches!(self.state, PaymentState::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::DistributionSuccessful,
            PaymentStatus::DistributionPartial,
            PaymentStatus::NotDistributed,
            PaymentStatus::TransactionErroneous,
            PaymentStatus::ForceFailed,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::parse("bogus"), None);
    }

    #[test]
    fn test_failed_statuses() {
        assert!(PaymentStatus::NotDistributed.is_failed());
        assert!(PaymentStatus::TransactionErroneous.is_failed());
        assert!(PaymentStatus::ForceFailed.is_failed());
        assert!(!PaymentStatus::Pending.is_failed());
        assert!(!PaymentStatus::DistributionSuccessful.is_failed());
        assert!(!PaymentStatus::DistributionPartial.is_failed());
    }

    #[test]
    fn test_state_as_str() {
        assert_eq!(PaymentState::Active.as_str(), "ACTIVE");
        assert_eq!(PaymentState::Excluded { reason: None }.as_str(), "EXCLUDED");
        assert_eq!(PaymentState::Conflicted.as_str(), "CONFLICTED");
        assert_eq!(
            PaymentState::Removed {
                reason: RemovalReason::VulnerabilityScore
            }
            .as_str(),
            "REMOVED"
        );
    }
}
