//! Acceptance process domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::plan::PlanStatus;

/// An acceptance-stage action a user can take on a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceAction {
    /// First-stage sign-off.
    Approve,
    /// Second-stage sign-off.
    Authorize,
    /// Finance-release review.
    Review,
    /// Bounce the plan back to FSP assignment.
    Reject,
}

impl AcceptanceAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Authorize => "AUTHORIZE",
            Self::Review => "REVIEW",
            Self::Reject => "REJECT",
        }
    }

    /// Plan statuses from which this action may be taken.
    #[must_use]
    pub const fn allowed_statuses(&self) -> &'static [PlanStatus] {
        match self {
            Self::Approve => &[PlanStatus::InApproval],
            Self::Authorize => &[PlanStatus::InAuthorization],
            Self::Review => &[PlanStatus::InReview],
            Self::Reject => &[
                PlanStatus::InApproval,
                PlanStatus::InAuthorization,
                PlanStatus::InReview,
            ],
        }
    }

    /// The approval type a sign-off of this action records.
    #[must_use]
    pub const fn approval_type(&self) -> ApprovalType {
        match self {
            Self::Approve => ApprovalType::Approval,
            Self::Authorize => ApprovalType::Authorization,
            Self::Review => ApprovalType::FinanceRelease,
            Self::Reject => ApprovalType::Reject,
        }
    }
}

impl fmt::Display for AcceptanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The type recorded on an individual sign-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalType {
    /// First-stage approval.
    Approval,
    /// Second-stage authorization.
    Authorization,
    /// Finance release.
    FinanceRelease,
    /// Rejection.
    Reject,
}

impl ApprovalType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approval => "APPROVAL",
            Self::Authorization => "AUTHORIZATION",
            Self::FinanceRelease => "FINANCE_RELEASE",
            Self::Reject => "REJECT",
        }
    }

    /// Parses a type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "APPROVAL" => Some(Self::Approval),
            "AUTHORIZATION" => Some(Self::Authorization),
            "FINANCE_RELEASE" => Some(Self::FinanceRelease),
            "REJECT" => Some(Self::Reject),
            _ => None,
        }
    }

    /// The positive type a plan status is currently collecting.
    ///
    /// Used by the duplicate-signer guard when rejecting: the guard looks at
    /// the stage the plan sits in, not at the REJECT row itself.
    #[must_use]
    pub const fn implied_by_status(status: PlanStatus) -> Option<Self> {
        match status {
            PlanStatus::InApproval => Some(Self::Approval),
            PlanStatus::InAuthorization => Some(Self::Authorization),
            PlanStatus::InReview => Some(Self::FinanceRelease),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One individual sign-off within an acceptance process.
#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    /// Unique identifier.
    pub id: Uuid,
    /// The recorded type.
    pub approval_type: ApprovalType,
    /// The signing user.
    pub created_by: Uuid,
    /// Optional comment.
    pub comment: Option<String>,
    /// When the sign-off was created.
    pub created_at: DateTime<Utc>,
}

/// Required sign-off counts per approval type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredCounts {
    /// Approvals required.
    pub approval: u32,
    /// Authorizations required.
    pub authorization: u32,
    /// Finance releases required.
    pub finance_release: u32,
}

/// One row of the business-area threshold table.
///
/// Matched by the plan's total USD entitlement falling within
/// `[min_usd, max_usd]` (either bound may be open).
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceThreshold {
    /// Inclusive lower bound, if any.
    pub min_usd: Option<Decimal>,
    /// Inclusive upper bound, if any.
    pub max_usd: Option<Decimal>,
    /// Approvals required.
    pub approval_count: u32,
    /// Authorizations required.
    pub authorization_count: u32,
    /// Finance releases required.
    pub finance_release_count: u32,
}

/// Looks up the required counts for a plan's total USD entitlement.
///
/// Falls back to 1 for every type when no threshold row matches.
#[must_use]
pub fn required_counts(thresholds: &[AcceptanceThreshold], total_usd: Decimal) -> RequiredCounts {
    thresholds
        .iter()
        .find(|t| {
            let above_min = t.min_usd.is_none_or(|min| total_usd >= min);
            let below_max = t.max_usd.is_none_or(|max| total_usd <= max);
            above_min && below_max
        })
        .map_or(
            RequiredCounts {
                approval: 1,
                authorization: 1,
                finance_release: 1,
            },
            |t| RequiredCounts {
                approval: t.approval_count,
                authorization: t.authorization_count,
                finance_release: t.finance_release_count,
            },
        )
}

/// The acceptance sub-workflow of one plan.
///
/// Created when the plan is first sent for approval; the required counts are
/// snapshotted from the threshold table at that moment.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalProcess {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning plan.
    pub payment_plan_id: Uuid,
    /// Approvals required.
    pub approval_number_required: u32,
    /// Authorizations required.
    pub authorization_number_required: u32,
    /// Finance releases required.
    pub finance_release_number_required: u32,
    /// Who sent the plan for approval.
    pub sent_for_approval_by: Uuid,
    /// When the plan was sent for approval.
    pub sent_for_approval_date: DateTime<Utc>,
    /// When the approval stage completed.
    pub sent_for_authorization_date: Option<DateTime<Utc>>,
    /// When the authorization stage completed.
    pub sent_for_finance_release_date: Option<DateTime<Utc>>,
    /// Individual sign-offs, in creation order.
    pub approvals: Vec<Approval>,
}

impl ApprovalProcess {
    /// Creates the process with required-count snapshots.
    #[must_use]
    pub fn new(
        payment_plan_id: Uuid,
        counts: RequiredCounts,
        sent_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_plan_id,
            approval_number_required: counts.approval,
            authorization_number_required: counts.authorization,
            finance_release_number_required: counts.finance_release,
            sent_for_approval_by: sent_by,
            sent_for_approval_date: now,
            sent_for_authorization_date: None,
            sent_for_finance_release_date: None,
            approvals: Vec::new(),
        }
    }

    /// Counts existing sign-offs of a type.
    #[must_use]
    pub fn count_of(&self, approval_type: ApprovalType) -> u32 {
        u32::try_from(
            self.approvals
                .iter()
                .filter(|a| a.approval_type == approval_type)
                .count(),
        )
        .unwrap_or(u32::MAX)
    }

    /// Required count for a positive approval type.
    #[must_use]
    pub const fn required_for(&self, approval_type: ApprovalType) -> u32 {
        match approval_type {
            ApprovalType::Approval => self.approval_number_required,
            ApprovalType::Authorization => self.authorization_number_required,
            ApprovalType::FinanceRelease => self.finance_release_number_required,
            // Rejection never collects towards a threshold.
            ApprovalType::Reject => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn threshold(
        min: Option<Decimal>,
        max: Option<Decimal>,
        counts: (u32, u32, u32),
    ) -> AcceptanceThreshold {
        AcceptanceThreshold {
            min_usd: min,
            max_usd: max,
            approval_count: counts.0,
            authorization_count: counts.1,
            finance_release_count: counts.2,
        }
    }

    #[test]
    fn test_required_counts_matches_range() {
        let thresholds = vec![
            threshold(None, Some(dec!(10000)), (1, 1, 1)),
            threshold(Some(dec!(10000.01)), None, (2, 2, 3)),
        ];

        let small = required_counts(&thresholds, dec!(500));
        assert_eq!(small.approval, 1);

        let large = required_counts(&thresholds, dec!(50000));
        assert_eq!(large.approval, 2);
        assert_eq!(large.finance_release, 3);
    }

    #[test]
    fn test_required_counts_defaults_to_one_without_match() {
        let thresholds = vec![threshold(Some(dec!(100000)), None, (5, 5, 5))];
        let counts = required_counts(&thresholds, dec!(50));
        assert_eq!(counts.approval, 1);
        assert_eq!(counts.authorization, 1);
        assert_eq!(counts.finance_release, 1);
    }

    #[test]
    fn test_action_to_type_mapping() {
        assert_eq!(AcceptanceAction::Approve.approval_type(), ApprovalType::Approval);
        assert_eq!(
            AcceptanceAction::Authorize.approval_type(),
            ApprovalType::Authorization
        );
        assert_eq!(
            AcceptanceAction::Review.approval_type(),
            ApprovalType::FinanceRelease
        );
        assert_eq!(AcceptanceAction::Reject.approval_type(), ApprovalType::Reject);
    }

    #[test]
    fn test_implied_type_by_status() {
        assert_eq!(
            ApprovalType::implied_by_status(PlanStatus::InApproval),
            Some(ApprovalType::Approval)
        );
        assert_eq!(
            ApprovalType::implied_by_status(PlanStatus::InReview),
            Some(ApprovalType::FinanceRelease)
        );
        assert_eq!(ApprovalType::implied_by_status(PlanStatus::Open), None);
    }

    #[test]
    fn test_process_counts() {
        let mut process = ApprovalProcess::new(
            Uuid::new_v4(),
            RequiredCounts {
                approval: 2,
                authorization: 1,
                finance_release: 1,
            },
            Uuid::new_v4(),
            Utc::now(),
        );
        assert_eq!(process.count_of(ApprovalType::Approval), 0);

        process.approvals.push(Approval {
            id: Uuid::new_v4(),
            approval_type: ApprovalType::Approval,
            created_by: Uuid::new_v4(),
            comment: None,
            created_at: Utc::now(),
        });
        assert_eq!(process.count_of(ApprovalType::Approval), 1);
        assert_eq!(process.required_for(ApprovalType::Approval), 2);
    }
}
