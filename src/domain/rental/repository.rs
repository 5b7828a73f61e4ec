//! Rental & assignment repository interfaces

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Assignment, NewAssignment, NewRental, NewVersion, Rental, RentalGroup};
use crate::domain::access::CityScope;
use crate::domain::DomainResult;

/// An assignment together with the version it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedAssignment {
    pub assignment: Assignment,
    pub rental: Rental,
}

#[async_trait]
pub trait RentalRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Rental>>;

    /// Versions grouped by root, each with its assignments preloaded.
    /// Roots with no stored version are omitted.
    async fn groups_by_root_ids(&self, root_ids: &[i32]) -> DomainResult<Vec<RentalGroup>>;

    /// Versions with status `active` inside `scope`.
    async fn active(&self, scope: &CityScope) -> DomainResult<Vec<Rental>>;

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Rental>>;

    /// Insert the first version of a contract: `root = self`, `version = 1`.
    async fn create(&self, rental: NewRental) -> DomainResult<Rental>;

    /// Supersede `previous_id` (marked `modified`, ended at the new start)
    /// with the next version of its group, in one transaction.
    async fn create_successor(&self, previous_id: i32, version: NewVersion) -> DomainResult<Rental>;

    /// Mark a version `closed` and set its end.
    async fn close(&self, id: i32, end_at: DateTime<Utc>) -> DomainResult<Rental>;

    /// Set `root = id` on every root-less row. Returns rows fixed.
    async fn backfill_roots(&self) -> DomainResult<u64>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Assignment>>;

    /// Assignments covering `now` (`start ≤ now < end`), with their versions.
    async fn active_at(&self, now: DateTime<Utc>, scope: &CityScope) -> DomainResult<Vec<ScopedAssignment>>;

    /// Assignments whose interval intersects `[from, to)`, with versions.
    async fn intersecting(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        scope: &CityScope,
    ) -> DomainResult<Vec<ScopedAssignment>>;

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Assignment>>;

    /// Assignments of any of `battery_ids` intersecting `[start, end)` under
    /// an active version, across all cities.
    async fn clashes(
        &self,
        battery_ids: &[i32],
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<ScopedAssignment>>;

    /// Insert an assignment, rejecting overlap with another assignment of
    /// the same battery under an active version.
    async fn open(&self, assignment: NewAssignment) -> DomainResult<Assignment>;

    async fn close(
        &self,
        id: i32,
        end_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> DomainResult<Assignment>;

    async fn delete(&self, id: i32) -> DomainResult<Assignment>;
}
