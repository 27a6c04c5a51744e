//! Payment plan error types.

use chrono::NaiveDate;
use thiserror::Error;

use super::transitions::PlanAction;
use super::types::{BackgroundAction, PlanStatus};

/// Errors that can occur during plan lifecycle operations.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Attempted an action not valid from the current status.
    #[error("Action {action} is not allowed for Payment Plan in status {status}")]
    IllegalTransition {
        /// The attempted action.
        action: PlanAction,
        /// The current status.
        status: PlanStatus,
    },

    /// A background job is already outstanding.
    #[error("Background action {current} is already in progress")]
    BackgroundActionInProgress {
        /// The outstanding background action.
        current: BackgroundAction,
    },

    /// The background action class is not legal in the current status.
    #[error("Background action {action} is not allowed for Payment Plan in status {status}")]
    BackgroundActionNotAllowed {
        /// The attempted background action.
        action: BackgroundAction,
        /// The current status.
        status: PlanStatus,
    },

    /// The dispersion end date is not strictly in the future.
    #[error("Dispersion end date {end_date} must be in the future")]
    DispersionEndDateNotInFuture {
        /// The rejected date.
        end_date: NaiveDate,
    },

    /// The plan currency was already frozen to a different value.
    #[error("Currency is immutable: plan uses {current}, requested {requested}")]
    CurrencyImmutable {
        /// The frozen currency.
        current: String,
        /// The requested currency.
        requested: String,
    },

    /// No exchange rate is available for the plan currency.
    #[error("No exchange rate found for currency {currency}")]
    MissingExchangeRate {
        /// The currency without a rate.
        currency: String,
    },

    /// The action requires an FSP and delivery mechanism on the plan.
    #[error("Payment Plan has no financial service provider and delivery mechanism assigned")]
    FspNotAssigned,

    /// A delivery-mechanism assignment is incomplete or inconsistent.
    #[error("Invalid delivery mechanism assignment: {reason}")]
    InvalidMechanismAssignment {
        /// What is wrong with the assignment.
        reason: String,
    },

    /// Locking requires at least one eligible payment.
    #[error("Cannot lock Payment Plan without eligible payments")]
    NoEligiblePayments,

    /// An eligible payment is missing its entitlement quantity.
    #[error("Payment {payment_code} has no entitlement quantity set")]
    MissingEntitlement {
        /// External ID of the payment.
        payment_code: String,
    },

    /// Follow-ups can only be created from a non-follow-up plan.
    #[error("Cannot create a follow-up of a follow-up Payment Plan")]
    FollowUpOfFollowUp,

    /// Follow-ups require at least one unsuccessful payment.
    #[error("Cannot create a follow-up for a Payment Plan without unsuccessful payments")]
    NoUnsuccessfulPayments,

    /// An exclusion list entry does not match any payment of the plan.
    #[error("Household {household_code} has no payment in this Payment Plan")]
    UnknownHousehold {
        /// External ID of the household.
        household_code: String,
    },
}

impl PlanError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::IllegalTransition { .. }
            | Self::DispersionEndDateNotInFuture { .. }
            | Self::CurrencyImmutable { .. }
            | Self::InvalidMechanismAssignment { .. }
            | Self::UnknownHousehold { .. } => 400,

            Self::BackgroundActionInProgress { .. }
            | Self::BackgroundActionNotAllowed { .. } => 409,

            Self::MissingExchangeRate { .. } => 502,

            Self::FspNotAssigned
            | Self::NoEligiblePayments
            | Self::MissingEntitlement { .. }
            | Self::FollowUpOfFollowUp
            | Self::NoUnsuccessfulPayments => 422,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::BackgroundActionInProgress { .. } => "BACKGROUND_ACTION_IN_PROGRESS",
            Self::BackgroundActionNotAllowed { .. } => "BACKGROUND_ACTION_NOT_ALLOWED",
            Self::DispersionEndDateNotInFuture { .. } => "DISPERSION_END_DATE_NOT_IN_FUTURE",
            Self::CurrencyImmutable { .. } => "CURRENCY_IMMUTABLE",
            Self::MissingExchangeRate { .. } => "MISSING_EXCHANGE_RATE",
            Self::FspNotAssigned => "FSP_NOT_ASSIGNED",
            Self::InvalidMechanismAssignment { .. } => "INVALID_MECHANISM_ASSIGNMENT",
            Self::NoEligiblePayments => "NO_ELIGIBLE_PAYMENTS",
            Self::MissingEntitlement { .. } => "MISSING_ENTITLEMENT",
            Self::FollowUpOfFollowUp => "FOLLOW_UP_OF_FOLLOW_UP",
            Self::NoUnsuccessfulPayments => "NO_UNSUCCESSFUL_PAYMENTS",
        }
    }
}
