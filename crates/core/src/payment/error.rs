//! Payment generation error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while materializing payments for a plan.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// A targeted household has no individual with the primary collector role.
    ///
    /// A household inside the targeting result must always carry a primary
    /// collector; its absence means an invariant was broken upstream.
    #[error("No primary collector found for household {household_code}")]
    MissingPrimaryCollector {
        /// External ID of the offending household.
        household_code: String,
    },

    /// The targeting list contains the same household more than once.
    #[error("Duplicate households in targeting list: {household_code}")]
    DuplicateHousehold {
        /// External ID of the duplicated household.
        household_code: String,
    },

    /// An entitlement value was supplied for a payment the plan does not hold.
    #[error("Payment {payment_id} does not belong to the plan")]
    UnknownPayment {
        /// The unknown payment ID.
        payment_id: Uuid,
    },
}

impl GeneratorError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingPrimaryCollector { .. } | Self::DuplicateHousehold { .. } => 500,
            Self::UnknownPayment { .. } => 404,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingPrimaryCollector { .. } => "MISSING_PRIMARY_COLLECTOR",
            Self::DuplicateHousehold { .. } => "DUPLICATE_HOUSEHOLD",
            Self::UnknownPayment { .. } => "UNKNOWN_PAYMENT",
        }
    }

    /// True for errors that indicate a broken invariant rather than user misuse.
    #[must_use]
    pub const fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            Self::MissingPrimaryCollector { .. } | Self::DuplicateHousehold { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_collector_names_household() {
        let err = GeneratorError::MissingPrimaryCollector {
            household_code: "HH-2026-000009".to_string(),
        };
        assert!(err.to_string().contains("HH-2026-000009"));
        assert_eq!(err.error_code(), "MISSING_PRIMARY_COLLECTOR");
        assert!(err.is_data_integrity());
    }

    #[test]
    fn test_duplicate_household_is_data_integrity() {
        let err = GeneratorError::DuplicateHousehold {
            household_code: "HH-2026-000001".to_string(),
        };
        assert_eq!(err.status_code(), 500);
        assert!(err.is_data_integrity());
    }

    #[test]
    fn test_unknown_payment_is_not_data_integrity() {
        let err = GeneratorError::UnknownPayment {
            payment_id: Uuid::nil(),
        };
        assert_eq!(err.status_code(), 404);
        assert!(!err.is_data_integrity());
    }
}
