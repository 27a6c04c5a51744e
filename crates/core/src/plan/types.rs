//! Payment plan domain types.
//!
//! The plan's primary status, its background-action status, and its build
//! status are three independent state machines; only the primary status gates
//! which lifecycle actions are legal.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Payment plan lifecycle status.
///
/// The first eight statuses (`TP_*` and `DRAFT`) are the pre-payment-plan
/// targeting phase: the population is being assembled and entitlement/FSP
/// concerns do not exist yet. The remaining eight are the payment-plan phase
/// proper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    /// Targeting population open for edits.
    TpOpen,
    /// Targeting population locked.
    TpLocked,
    /// Population rebuild in progress.
    TpProcessing,
    /// Queued for the external entitlement-formula engine.
    TpRuleEngineWait,
    /// Entitlement-formula engine running.
    TpRuleEngineRun,
    /// Entitlement-formula run completed.
    TpRuleEngineCompleted,
    /// Entitlement-formula run failed.
    TpRuleEngineError,
    /// Promoted to a draft payment plan.
    Draft,
    /// Open payment plan: currency and exchange rate frozen.
    Open,
    /// Locked: population fixed, entitlements being finalized.
    Locked,
    /// Locked with FSP and delivery mechanism bound.
    LockedFsp,
    /// Waiting for approvals.
    InApproval,
    /// Waiting for authorizations.
    InAuthorization,
    /// Waiting for finance release.
    InReview,
    /// Fully signed off; ready for disbursement.
    Accepted,
    /// Reconciled and closed.
    Finished,
}

/// All statuses, in lifecycle order. Used by table-driven tests.
pub const ALL_STATUSES: [PlanStatus; 16] = [
    PlanStatus::TpOpen,
    PlanStatus::TpLocked,
    PlanStatus::TpProcessing,
    PlanStatus::TpRuleEngineWait,
    PlanStatus::TpRuleEngineRun,
    PlanStatus::TpRuleEngineCompleted,
    PlanStatus::TpRuleEngineError,
    PlanStatus::Draft,
    PlanStatus::Open,
    PlanStatus::Locked,
    PlanStatus::LockedFsp,
    PlanStatus::InApproval,
    PlanStatus::InAuthorization,
    PlanStatus::InReview,
    PlanStatus::Accepted,
    PlanStatus::Finished,
];

impl PlanStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TpOpen => "TP_OPEN",
            Self::TpLocked => "TP_LOCKED",
            Self::TpProcessing => "TP_PROCESSING",
            Self::TpRuleEngineWait => "TP_RULE_ENGINE_WAIT",
            Self::TpRuleEngineRun => "TP_RULE_ENGINE_RUN",
            Self::TpRuleEngineCompleted => "TP_RULE_ENGINE_COMPLETED",
            Self::TpRuleEngineError => "TP_RULE_ENGINE_ERROR",
            Self::Draft => "DRAFT",
            Self::Open => "OPEN",
            Self::Locked => "LOCKED",
            Self::LockedFsp => "LOCKED_FSP",
            Self::InApproval => "IN_APPROVAL",
            Self::InAuthorization => "IN_AUTHORIZATION",
            Self::InReview => "IN_REVIEW",
            Self::Accepted => "ACCEPTED",
            Self::Finished => "FINISHED",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        ALL_STATUSES
            .iter()
            .copied()
            .find(|status| status.as_str() == s.to_uppercase())
    }

    /// True for the targeting-phase statuses, where entitlements do not exist
    /// yet and money totals must never be recomputed.
    #[must_use]
    pub const fn is_pre_payment_plan(&self) -> bool {
        matches!(
            self,
            Self::TpOpen
                | Self::TpLocked
                | Self::TpProcessing
                | Self::TpRuleEngineWait
                | Self::TpRuleEngineRun
                | Self::TpRuleEngineCompleted
                | Self::TpRuleEngineError
                | Self::Draft
        )
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of the plan's single outstanding background job, if any.
///
/// A parallel, independent state machine: a long-running async job's failure
/// lands in a `*Error` value here without corrupting the primary status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundAction {
    /// Entitlement-formula engine run in progress.
    RuleEngineRun,
    /// Entitlement-formula engine run failed.
    RuleEngineError,
    /// Disbursement workbook export in progress.
    XlsxExporting,
    /// Disbursement workbook export failed.
    XlsxExportError,
    /// Entitlement workbook import in progress.
    XlsxImportingEntitlements,
    /// Reconciliation workbook import in progress.
    XlsxImportingReconciliation,
    /// Workbook import failed.
    XlsxImportError,
    /// Beneficiary exclusion in progress.
    ExcludingBeneficiaries,
    /// Beneficiary exclusion failed.
    ExcludeBeneficiariesError,
    /// Hand-off to the payment gateway in progress.
    SendingToPaymentGateway,
    /// Hand-off to the payment gateway failed.
    SendToPaymentGatewayError,
}

impl BackgroundAction {
    /// Returns the string representation of the value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RuleEngineRun => "RULE_ENGINE_RUN",
            Self::RuleEngineError => "RULE_ENGINE_ERROR",
            Self::XlsxExporting => "XLSX_EXPORTING",
            Self::XlsxExportError => "XLSX_EXPORT_ERROR",
            Self::XlsxImportingEntitlements => "XLSX_IMPORTING_ENTITLEMENTS",
            Self::XlsxImportingReconciliation => "XLSX_IMPORTING_RECONCILIATION",
            Self::XlsxImportError => "XLSX_IMPORT_ERROR",
            Self::ExcludingBeneficiaries => "EXCLUDING_BENEFICIARIES",
            Self::ExcludeBeneficiariesError => "EXCLUDE_BENEFICIARIES_ERROR",
            Self::SendingToPaymentGateway => "SENDING_TO_PAYMENT_GATEWAY",
            Self::SendToPaymentGatewayError => "SEND_TO_PAYMENT_GATEWAY_ERROR",
        }
    }

    /// Parses a value from a string.
    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::RuleEngineRun,
            Self::RuleEngineError,
            Self::XlsxExporting,
            Self::XlsxExportError,
            Self::XlsxImportingEntitlements,
            Self::XlsxImportingReconciliation,
            Self::XlsxImportError,
            Self::ExcludingBeneficiaries,
            Self::ExcludeBeneficiariesError,
            Self::SendingToPaymentGateway,
            Self::SendToPaymentGatewayError,
        ]
        .into_iter()
        .find(|action| action.as_str() == s.to_uppercase())
    }

    /// True for terminal failure values, from which a retry may start.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(
            self,
            Self::RuleEngineError
                | Self::XlsxExportError
                | Self::XlsxImportError
                | Self::ExcludeBeneficiariesError
                | Self::SendToPaymentGatewayError
        )
    }

    /// The failure value this in-progress action falls into.
    #[must_use]
    pub const fn error_state(&self) -> Self {
        match self {
            Self::RuleEngineRun | Self::RuleEngineError => Self::RuleEngineError,
            Self::XlsxExporting | Self::XlsxExportError => Self::XlsxExportError,
            Self::XlsxImportingEntitlements
            | Self::XlsxImportingReconciliation
            | Self::XlsxImportError => Self::XlsxImportError,
            Self::ExcludingBeneficiaries | Self::ExcludeBeneficiariesError => {
                Self::ExcludeBeneficiariesError
            }
            Self::SendingToPaymentGateway | Self::SendToPaymentGatewayError => {
                Self::SendToPaymentGatewayError
            }
        }
    }
}

impl fmt::Display for BackgroundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of the asynchronous population build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    /// Rebuild requested, not yet started.
    Pending,
    /// Rebuild running.
    Building,
    /// Rebuild failed.
    Failed,
    /// Population is up to date.
    Ok,
}

impl BuildStatus {
    /// Returns the string representation of the value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Building => "BUILDING",
            Self::Failed => "FAILED",
            Self::Ok => "OK",
        }
    }

    /// Parses a value from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "BUILDING" => Some(Self::Building),
            "FAILED" => Some(Self::Failed),
            "OK" => Some(Self::Ok),
            _ => None,
        }
    }
}

/// One ordered delivery-mechanism choice for a plan, eventually bound to
/// exactly one FSP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMechanismAssignment {
    /// Delivery mechanism code.
    pub mechanism: String,
    /// The FSP bound to this mechanism, once chosen.
    pub fsp_id: Option<Uuid>,
    /// Priority order, starting at 1.
    pub order: i32,
}

/// The aggregate root: one payment plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPlan {
    /// Immutable unique identifier.
    pub id: Uuid,
    /// Human-readable sequential code (e.g. `PP-2026-000001`).
    pub code: String,
    /// Lifecycle status.
    pub status: PlanStatus,
    /// When the status last changed.
    pub status_date: DateTime<Utc>,
    /// Outstanding background job, if any.
    pub background_action: Option<BackgroundAction>,
    /// Population build status, if a build was ever requested.
    pub build_status: Option<BuildStatus>,
    /// Plan currency; immutable once set by the `open` transition.
    pub currency: String,
    /// First day of the dispersion window.
    pub dispersion_start_date: Option<NaiveDate>,
    /// Last day of the dispersion window.
    pub dispersion_end_date: Option<NaiveDate>,
    /// Local units per USD, frozen when dispersion begins.
    pub exchange_rate: Option<Decimal>,
    /// Sum of eligible payments' entitlements, local currency.
    pub total_entitled_quantity: Decimal,
    /// Sum of eligible payments' entitlements, USD.
    pub total_entitled_quantity_usd: Decimal,
    /// Sum of eligible payments' delivered amounts, local currency.
    pub total_delivered_quantity: Decimal,
    /// Sum of eligible payments' delivered amounts, USD.
    pub total_delivered_quantity_usd: Decimal,
    /// Entitled minus delivered, local currency.
    pub total_undelivered_quantity: Decimal,
    /// Entitled minus delivered, USD.
    pub total_undelivered_quantity_usd: Decimal,
    /// Male members under 18 across eligible households.
    pub male_children_count: i64,
    /// Female members under 18 across eligible households.
    pub female_children_count: i64,
    /// Male members 18 or over across eligible households.
    pub male_adults_count: i64,
    /// Female members 18 or over across eligible households.
    pub female_adults_count: i64,
    /// Eligible households.
    pub total_households_count: i64,
    /// Members across eligible households.
    pub total_individuals_count: i64,
    /// True for plans created by `create_follow_up`.
    pub is_follow_up: bool,
    /// The plan this follow-up was created from.
    pub source_plan_id: Option<Uuid>,
    /// Owning program cycle.
    pub program_cycle_id: Uuid,
    /// Targeting rule set (deep-copied for follow-ups).
    pub targeting_criteria_id: Uuid,
    /// Assigned financial service provider.
    pub fsp_id: Option<Uuid>,
    /// Assigned delivery mechanism code.
    pub delivery_mechanism: Option<String>,
    /// Lower vulnerability-score bound of the soft-delete filter.
    pub vulnerability_score_min: Option<Decimal>,
    /// Upper vulnerability-score bound of the soft-delete filter.
    pub vulnerability_score_max: Option<Decimal>,
    /// Raw household ID text of the manual exclusion list.
    pub excluded_household_ids: Option<String>,
    /// Free-text reason for the manual exclusion list.
    pub exclusion_reason: Option<String>,
    /// Name of the per-FSP export file, once generated.
    pub export_file_name: Option<String>,
    /// Optimistic-concurrency token; a stale version fails the mutation.
    pub version: i64,
}

impl PaymentPlan {
    /// Creates a plan in the targeting-open state from a targeting criteria.
    ///
    /// The population build runs asynchronously afterwards, so the build
    /// status starts at `Pending`.
    #[must_use]
    pub fn new_targeting(
        id: Uuid,
        code: String,
        program_cycle_id: Uuid,
        targeting_criteria_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            code,
            status: PlanStatus::TpOpen,
            status_date: now,
            background_action: None,
            build_status: Some(BuildStatus::Pending),
            currency: String::new(),
            dispersion_start_date: None,
            dispersion_end_date: None,
            exchange_rate: None,
            total_entitled_quantity: Decimal::ZERO,
            total_entitled_quantity_usd: Decimal::ZERO,
            total_delivered_quantity: Decimal::ZERO,
            total_delivered_quantity_usd: Decimal::ZERO,
            total_undelivered_quantity: Decimal::ZERO,
            total_undelivered_quantity_usd: Decimal::ZERO,
            male_children_count: 0,
            female_children_count: 0,
            male_adults_count: 0,
            female_adults_count: 0,
            total_households_count: 0,
            total_individuals_count: 0,
            is_follow_up: false,
            source_plan_id: None,
            program_cycle_id,
            targeting_criteria_id,
            fsp_id: None,
            delivery_mechanism: None,
            vulnerability_score_min: None,
            vulnerability_score_max: None,
            excluded_household_ids: None,
            exclusion_reason: None,
            export_file_name: None,
            version: 1,
        }
    }

    /// Applies a status change, stamping the status date and bumping the
    /// optimistic-concurrency token.
    pub(crate) fn set_status(&mut self, status: PlanStatus, now: DateTime<Utc>) {
        self.status = status;
        self.status_date = now;
        self.version += 1;
    }

    /// Bumps the optimistic-concurrency token for a non-status mutation.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_status_roundtrip() {
        for status in ALL_STATUSES {
            assert_eq!(PlanStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PlanStatus::parse("bogus"), None);
    }

    #[test]
    fn test_status_display_screaming_snake() {
        assert_eq!(PlanStatus::InApproval.to_string(), "IN_APPROVAL");
        assert_eq!(PlanStatus::LockedFsp.to_string(), "LOCKED_FSP");
        assert_eq!(PlanStatus::TpRuleEngineWait.to_string(), "TP_RULE_ENGINE_WAIT");
    }

    #[test]
    fn test_pre_payment_statuses() {
        let pre: Vec<_> = ALL_STATUSES
            .iter()
            .filter(|s| s.is_pre_payment_plan())
            .collect();
        assert_eq!(pre.len(), 8);
        assert!(PlanStatus::Draft.is_pre_payment_plan());
        assert!(!PlanStatus::Open.is_pre_payment_plan());
        assert!(!PlanStatus::Finished.is_pre_payment_plan());
    }

    #[test]
    fn test_background_action_roundtrip() {
        for value in [
            BackgroundAction::RuleEngineRun,
            BackgroundAction::XlsxExporting,
            BackgroundAction::XlsxImportingReconciliation,
            BackgroundAction::SendToPaymentGatewayError,
        ] {
            assert_eq!(BackgroundAction::parse(value.as_str()), Some(value));
        }
    }

    #[test]
    fn test_background_error_states() {
        assert!(!BackgroundAction::RuleEngineRun.is_error());
        assert!(BackgroundAction::RuleEngineError.is_error());
        assert_eq!(
            BackgroundAction::XlsxImportingReconciliation.error_state(),
            BackgroundAction::XlsxImportError
        );
        assert_eq!(
            BackgroundAction::SendingToPaymentGateway.error_state(),
            BackgroundAction::SendToPaymentGatewayError
        );
    }

    #[test]
    fn test_new_targeting_plan_defaults() {
        let now = Utc::now();
        let plan = PaymentPlan::new_targeting(
            Uuid::new_v4(),
            "PP-2026-000001".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            now,
        );
        assert_eq!(plan.status, PlanStatus::TpOpen);
        assert_eq!(plan.build_status, Some(BuildStatus::Pending));
        assert_eq!(plan.version, 1);
        assert!(plan.currency.is_empty());
        assert_eq!(plan.total_entitled_quantity, Decimal::ZERO);
    }
}
