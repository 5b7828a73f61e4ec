//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider`: unified access to all per-aggregate repositories
//! - `DomainResult`: standard result type for domain operations

use super::battery::{BatteryRepository, StatusLogRepository};
use super::city::CityRepository;
use super::client::ClientRepository;
use super::finance::FinanceRepository;
use super::payment::PaymentRepository;
use super::rental::{AssignmentRepository, RentalRepository};
use super::repair::RepairRepository;
use super::user::UserRepository;

pub use crate::shared::errors::DomainResult;

// ── RepositoryProvider ──────────────────────────────────────────

/// Provides access to all domain repositories (the entity store).
///
/// Consumers request only the repository they need:
///
/// ```ignore
/// async fn balance(repos: &dyn RepositoryProvider, root: i32) {
///     let groups = repos.rentals().groups_by_root_ids(&[root]).await?;
///     let paid = repos.payments().grouped_by_root(&[root], None, None).await?;
/// }
/// ```
///
/// Every scoped query must return exactly the rows inside the supplied
/// [`CityScope`](crate::domain::access::CityScope).
pub trait RepositoryProvider: Send + Sync {
    fn cities(&self) -> &dyn CityRepository;
    fn clients(&self) -> &dyn ClientRepository;
    fn batteries(&self) -> &dyn BatteryRepository;
    fn status_log(&self) -> &dyn StatusLogRepository;
    fn rentals(&self) -> &dyn RentalRepository;
    fn assignments(&self) -> &dyn AssignmentRepository;
    fn payments(&self) -> &dyn PaymentRepository;
    fn repairs(&self) -> &dyn RepairRepository;
    fn finance(&self) -> &dyn FinanceRepository;
    fn users(&self) -> &dyn UserRepository;
}
