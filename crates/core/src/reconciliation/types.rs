//! Workbook row parsing against a per-FSP column template.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Column carrying the payment's external ID.
pub const COLUMN_PAYMENT_ID: &str = "payment_id";
/// Column carrying the delivered quantity.
pub const COLUMN_DELIVERED_QUANTITY: &str = "delivered_quantity";
/// Column carrying the delivery date.
pub const COLUMN_DELIVERY_DATE: &str = "delivery_date";
/// Column carrying the FSP's authorization code.
pub const COLUMN_AUTH_CODE: &str = "auth_code";

/// The ordered column layout of one FSP/mechanism workbook.
///
/// Configuration data, not a core-owned schema: each FSP/mechanism pair may
/// define its own order and extra columns, which the parser ignores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FspTemplate {
    /// Column names in workbook order.
    pub columns: Vec<String>,
}

impl FspTemplate {
    /// The default layout used when an FSP has no template configured.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            columns: vec![
                COLUMN_PAYMENT_ID.to_string(),
                COLUMN_DELIVERED_QUANTITY.to_string(),
                COLUMN_DELIVERY_DATE.to_string(),
                COLUMN_AUTH_CODE.to_string(),
            ],
        }
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Parses positional cell rows into reconciliation rows.
    ///
    /// Row-level problems are collected into the error list instead of
    /// raising; the parsed rows are returned only when the list is empty,
    /// which is the caller's signal to proceed to the commit step.
    #[must_use]
    pub fn parse_rows(
        &self,
        rows: &[Vec<String>],
    ) -> (Option<Vec<ReconciliationRow>>, Vec<String>) {
        let mut errors = Vec::new();

        let Some(payment_id_index) = self.index_of(COLUMN_PAYMENT_ID) else {
            errors.push(format!("template has no '{COLUMN_PAYMENT_ID}' column"));
            return (None, errors);
        };
        let Some(delivered_index) = self.index_of(COLUMN_DELIVERED_QUANTITY) else {
            errors.push(format!("template has no '{COLUMN_DELIVERED_QUANTITY}' column"));
            return (None, errors);
        };
        let delivery_date_index = self.index_of(COLUMN_DELIVERY_DATE);
        let auth_code_index = self.index_of(COLUMN_AUTH_CODE);

        let mut parsed = Vec::with_capacity(rows.len());
        for (number, cells) in rows.iter().enumerate().map(|(i, r)| (i + 1, r)) {
            let payment_code = match cells.get(payment_id_index).map(String::as_str) {
                Some(code) if !code.trim().is_empty() => code.trim().to_string(),
                _ => {
                    errors.push(format!("row {number}: missing payment id"));
                    continue;
                }
            };

            let delivered_quantity = match cells.get(delivered_index).map(String::as_str) {
                Some(cell) => match Decimal::from_str(cell.trim()) {
                    Ok(value) => value,
                    Err(_) => {
                        errors.push(format!(
                            "row {number}: unparseable delivered quantity '{}'",
                            cell.trim()
                        ));
                        continue;
                    }
                },
                None => {
                    errors.push(format!("row {number}: missing delivered quantity"));
                    continue;
                }
            };

            let delivery_date = match delivery_date_index
                .and_then(|i| cells.get(i))
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
            {
                Some(cell) => match parse_delivery_date(cell) {
                    Some(date) => Some(date),
                    None => {
                        errors.push(format!("row {number}: unparseable delivery date '{cell}'"));
                        continue;
                    }
                },
                None => None,
            };

            let fsp_auth_code = auth_code_index
                .and_then(|i| cells.get(i))
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty());

            parsed.push(ReconciliationRow {
                payment_code,
                delivered_quantity,
                delivery_date,
                fsp_auth_code,
            });
        }

        if errors.is_empty() {
            (Some(parsed), errors)
        } else {
            (None, errors)
        }
    }
}

fn parse_delivery_date(cell: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(cell) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// One parsed workbook row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationRow {
    /// External ID of the payment this row reconciles.
    pub payment_code: String,
    /// Delivered quantity reported by the FSP.
    pub delivered_quantity: Decimal,
    /// When the delivery took place, if reported.
    pub delivery_date: Option<DateTime<Utc>>,
    /// FSP authorization code, if reported.
    pub fsp_auth_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_standard_layout() {
        let template = FspTemplate::standard();
        let rows = vec![
            row(&["RCPT-1", "500.00", "2026-04-01", "AUTH-77"]),
            row(&["RCPT-2", "0", "", ""]),
        ];

        let (parsed, errors) = template.parse_rows(&rows);
        assert!(errors.is_empty());
        let parsed = parsed.unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].payment_code, "RCPT-1");
        assert_eq!(parsed[0].delivered_quantity, dec!(500.00));
        assert!(parsed[0].delivery_date.is_some());
        assert_eq!(parsed[0].fsp_auth_code.as_deref(), Some("AUTH-77"));
        assert_eq!(parsed[1].delivered_quantity, Decimal::ZERO);
        assert_eq!(parsed[1].delivery_date, None);
        assert_eq!(parsed[1].fsp_auth_code, None);
    }

    #[test]
    fn test_parse_reordered_template() {
        let template = FspTemplate {
            columns: vec![
                "beneficiary_name".to_string(),
                COLUMN_DELIVERED_QUANTITY.to_string(),
                COLUMN_PAYMENT_ID.to_string(),
            ],
        };
        let rows = vec![row(&["Ana Diaz", "120.50", "RCPT-9"])];

        let (parsed, errors) = template.parse_rows(&rows);
        assert!(errors.is_empty());
        let parsed = parsed.unwrap();
        assert_eq!(parsed[0].payment_code, "RCPT-9");
        assert_eq!(parsed[0].delivered_quantity, dec!(120.50));
    }

    #[test]
    fn test_bad_rows_collect_errors_and_return_none() {
        let template = FspTemplate::standard();
        let rows = vec![
            row(&["RCPT-1", "not-a-number", "", ""]),
            row(&["", "10.00", "", ""]),
            row(&["RCPT-3", "10.00", "04/01/2026", ""]),
        ];

        let (parsed, errors) = template.parse_rows(&rows);
        assert!(parsed.is_none());
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("row 1"));
        assert!(errors[1].contains("row 2"));
        assert!(errors[2].contains("row 3"));
    }

    #[test]
    fn test_template_without_required_column_fails() {
        let template = FspTemplate {
            columns: vec![COLUMN_PAYMENT_ID.to_string()],
        };
        let (parsed, errors) = template.parse_rows(&[row(&["RCPT-1"])]);
        assert!(parsed.is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(COLUMN_DELIVERED_QUANTITY));
    }

    #[test]
    fn test_negative_quantities_parse_for_later_classification() {
        // A negative quantity is a valid cell; classification decides what it
        // means for the payment.
        let template = FspTemplate::standard();
        let (parsed, errors) = template.parse_rows(&[row(&["RCPT-1", "-5.00", "", ""])]);
        assert!(errors.is_empty());
        assert_eq!(parsed.unwrap()[0].delivered_quantity, dec!(-5.00));
    }
}
