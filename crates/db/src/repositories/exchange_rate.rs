//! Exchange rate repository.
//!
//! Rates are stored per currency per effective date; a lookup returns the
//! most recent rate on or before the requested date. The core consumes rates
//! through the synchronous [`aidra_core::fx::ExchangeRateProvider`] trait, so
//! repositories prefetch the rate they need and hand the core a
//! [`PrefetchedRate`].

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use aidra_core::fx::ExchangeRateProvider;
use aidra_shared::{AppError, AppResult};

use crate::entities::exchange_rates;

use super::db_err;

/// A single rate fetched ahead of a core call.
#[derive(Debug, Clone, Copy)]
pub struct PrefetchedRate {
    rate: Option<Decimal>,
}

impl PrefetchedRate {
    /// Wraps an already-fetched rate.
    #[must_use]
    pub const fn new(rate: Option<Decimal>) -> Self {
        Self { rate }
    }
}

impl ExchangeRateProvider for PrefetchedRate {
    fn rate(&self, _currency: &str, _as_of: NaiveDate) -> Option<Decimal> {
        self.rate
    }
}

/// Exchange rate repository.
#[derive(Debug, Clone)]
pub struct ExchangeRateRepository {
    db: DatabaseConnection,
}

impl ExchangeRateRepository {
    /// Creates a new exchange rate repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds the most recent rate for a currency on or before a date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_rate(
        &self,
        currency: &str,
        as_of: NaiveDate,
    ) -> AppResult<Option<Decimal>> {
        let row = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::CurrencyCode.eq(currency))
            .filter(exchange_rates::Column::EffectiveDate.lte(as_of))
            .order_by_desc(exchange_rates::Column::EffectiveDate)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(|r| r.rate))
    }

    /// Records a rate for a currency and effective date.
    ///
    /// # Errors
    ///
    /// Returns an error when the rate is not positive or the database
    /// operation fails.
    pub async fn record_rate(
        &self,
        currency: &str,
        effective_date: NaiveDate,
        rate: Decimal,
    ) -> AppResult<exchange_rates::Model> {
        if rate <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Exchange rate must be positive".to_string(),
            ));
        }

        let existing = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::CurrencyCode.eq(currency))
            .filter(exchange_rates::Column::EffectiveDate.eq(effective_date))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        if let Some(model) = existing {
            let mut active: exchange_rates::ActiveModel = model.into();
            active.rate = Set(rate);
            active.update(&self.db).await.map_err(db_err)
        } else {
            exchange_rates::ActiveModel {
                id: Set(Uuid::new_v4()),
                currency_code: Set(currency.to_string()),
                effective_date: Set(effective_date),
                rate: Set(rate),
                created_at: Set(Utc::now().into()),
            }
            .insert(&self.db)
            .await
            .map_err(db_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_prefetched_rate_answers_regardless_of_inputs() {
        let provider = PrefetchedRate::new(Some(dec!(36.57)));
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(provider.rate("UAH", day), Some(dec!(36.57)));
        assert_eq!(PrefetchedRate::new(None).rate("UAH", day), None);
    }
}
