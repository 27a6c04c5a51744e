//! Database layer with `SeaORM` entities and repositories.
//!
//! Repositories wrap each core action in one database transaction: fetch and
//! decode the aggregate, run the pure core logic, write the result back, and
//! only after the commit dispatch the action's outbox to the task queue.

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{
    AcceptanceRepository, ExchangeRateRepository, PaymentPlanRepository, PaymentRepository,
    ReconciliationRepository, SplitRepository,
};

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}
