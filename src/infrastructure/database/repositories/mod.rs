//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod battery_repository;
pub mod city_repository;
pub mod client_repository;
pub mod finance_repository;
pub mod payment_repository;
pub mod rental_repository;
pub mod repair_repository;
pub mod repository_provider;
pub mod user_repository;

mod scope;

pub use repository_provider::SeaOrmRepositoryProvider;

use crate::domain::DomainError;

pub(crate) fn db_err(e: sea_orm::DbErr) -> DomainError {
    tracing::debug!(error = %e, "Database call failed");
    DomainError::from(e)
}

/// Stored value that does not parse into its domain enum.
pub(crate) fn bad_value(column: &str, value: &str) -> DomainError {
    DomainError::InvariantViolation(format!("unexpected {} value '{}'", column, value))
}
