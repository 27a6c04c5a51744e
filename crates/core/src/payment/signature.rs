//! Payment tamper-evidence signatures.
//!
//! The signature is a SHA-256 digest over the household snapshot plus the
//! entitlement data, base64url-encoded. Any later edit to either is
//! detectable by recomputing and comparing.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use super::snapshot::HouseholdSnapshot;

// Field separator that cannot occur inside the hashed values.
const SEP: &[u8] = b"\x1f";

fn feed(hasher: &mut Sha256, value: &str) {
    hasher.update(value.as_bytes());
    hasher.update(SEP);
}

fn feed_opt(hasher: &mut Sha256, value: Option<&str>) {
    feed(hasher, value.unwrap_or(""));
}

/// Computes the tamper-evidence signature for a payment.
///
/// The digest input is a fixed field order; the collector account data is an
/// ordered map, so the result is deterministic for equal inputs.
#[must_use]
pub fn payment_signature(
    snapshot: &HouseholdSnapshot,
    entitlement_quantity: Option<Decimal>,
    currency: &str,
) -> String {
    let mut hasher = Sha256::new();

    feed(&mut hasher, &snapshot.household_code);
    feed(&mut hasher, &snapshot.size.to_string());
    feed_opt(&mut hasher, snapshot.admin_area_1.as_deref());
    feed_opt(&mut hasher, snapshot.admin_area_2.as_deref());
    feed_opt(&mut hasher, snapshot.admin_area_3.as_deref());
    feed(&mut hasher, &snapshot.collector.code);
    feed(&mut hasher, &snapshot.collector.full_name);
    for (key, value) in &snapshot.collector.account_data {
        feed(&mut hasher, key);
        feed(&mut hasher, value);
    }
    feed_opt(
        &mut hasher,
        entitlement_quantity.map(|q| q.to_string()).as_deref(),
    );
    feed(&mut hasher, currency);

    base64_url::encode(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::CollectorSnapshot;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn snapshot() -> HouseholdSnapshot {
        HouseholdSnapshot {
            household_code: "HH-2026-000001".to_string(),
            size: 4,
            admin_area_1: None,
            admin_area_2: None,
            admin_area_3: None,
            collector: CollectorSnapshot {
                code: "IND-2026-000001".to_string(),
                full_name: "Jan Kowalski".to_string(),
                account_data: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = payment_signature(&snapshot(), Some(dec!(500.00)), "PLN");
        let b = payment_signature(&snapshot(), Some(dec!(500.00)), "PLN");
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_changes_with_entitlement() {
        let a = payment_signature(&snapshot(), Some(dec!(500.00)), "PLN");
        let b = payment_signature(&snapshot(), Some(dec!(500.01)), "PLN");
        let c = payment_signature(&snapshot(), None, "PLN");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_signature_changes_with_snapshot() {
        let mut edited = snapshot();
        edited.size = 5;
        let a = payment_signature(&snapshot(), None, "PLN");
        let b = payment_signature(&edited, None, "PLN");
        assert_ne!(a, b);
    }

    #[test]
    fn test_signature_changes_with_account_data() {
        let mut edited = snapshot();
        edited
            .collector
            .account_data
            .insert("card_number".to_string(), "4111".to_string());
        let a = payment_signature(&snapshot(), None, "PLN");
        let b = payment_signature(&edited, None, "PLN");
        assert_ne!(a, b);
    }
}
