//! Rental service
//!
//! Contract versions and battery assignments. Every assignment write is
//! mirrored into the battery status log in the same call path.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::application::context::RequestContext;
use crate::domain::access::EntityKind;
use crate::domain::battery::{Battery, LogSource};
use crate::domain::rental::{Assignment, NewAssignment, NewRental, NewVersion, Rental};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

/// Reason stored on assignments closed by a version upgrade.
pub const END_REASON_UPGRADE: &str = "upgrade";
/// Reason stored on assignments closed with their rental.
pub const END_REASON_RETURNED: &str = "returned";

/// Service for rental contract operations
pub struct RentalService {
    repos: Arc<dyn RepositoryProvider>,
}

impl RentalService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Open the first version of a contract and assign `battery_ids` to it
    /// for the whole rental window.
    pub async fn open_rental(
        &self,
        ctx: &RequestContext,
        mut rental: NewRental,
        battery_ids: &[i32],
    ) -> DomainResult<(Rental, Vec<Assignment>)> {
        ctx.ensure_detail(EntityKind::Rental)?;
        let client = self
            .repos
            .clients()
            .find_by_id(rental.client_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Client", rental.client_id))?;
        ctx.ensure_visible("Client", client.id, client.city_id)?;
        if rental.city_id.is_none() {
            rental.city_id = client.city_id;
        }
        ctx.ensure_visible("City", rental.city_id.unwrap_or_default(), rental.city_id)?;
        let batteries = self.visible_batteries(ctx, battery_ids).await?;
        self.ensure_free(battery_ids, rental.start_at, rental.end_at, None)
            .await?;

        let created = self.repos.rentals().create(rental).await?;
        let mut assignments = Vec::with_capacity(batteries.len());
        for battery in &batteries {
            assignments.push(
                self.open_assignment(&created, battery.id, created.start_at, created.end_at)
                    .await?,
            );
        }
        info!(
            rental_id = created.id,
            contract_code = %created.contract_code,
            batteries = assignments.len(),
            "Rental opened"
        );
        Ok((created, assignments))
    }

    /// Supersede the active version holding `rental_id` with new terms.
    ///
    /// Open assignments of the old version end at the new start; the new
    /// version gets `battery_ids` from its start on.
    pub async fn upgrade(
        &self,
        ctx: &RequestContext,
        rental_id: i32,
        terms: NewVersion,
        battery_ids: &[i32],
    ) -> DomainResult<(Rental, Vec<Assignment>)> {
        let previous = self.visible_rental(ctx, rental_id).await?;
        if !previous.is_active() {
            return Err(DomainError::Validation(format!(
                "rental {} is {} and cannot be upgraded",
                previous.id, previous.status
            )));
        }
        terms.validate()?;
        if terms.start_at <= previous.start_at {
            return Err(DomainError::Validation(
                "successor must start after the version it supersedes".to_string(),
            ));
        }
        let batteries = self.visible_batteries(ctx, battery_ids).await?;
        self.ensure_free(battery_ids, terms.start_at, terms.end_at, Some(previous.root()))
            .await?;

        let open: Vec<Assignment> = self
            .repos
            .rentals()
            .groups_by_root_ids(&[previous.root()])
            .await?
            .into_iter()
            .flat_map(|g| g.versions)
            .filter(|v| v.rental.id == previous.id)
            .flat_map(|v| v.assignments)
            .filter(|a| a.is_open() && a.start_at < terms.start_at)
            .collect();
        for assignment in &open {
            self.close_assignment(assignment, terms.start_at, END_REASON_UPGRADE)
                .await?;
        }

        let successor = self
            .repos
            .rentals()
            .create_successor(previous.id, terms)
            .await?;
        let mut assignments = Vec::with_capacity(batteries.len());
        for battery in &batteries {
            assignments.push(
                self.open_assignment(&successor, battery.id, successor.start_at, successor.end_at)
                    .await?,
            );
        }
        info!(
            root_id = successor.root(),
            version = successor.version,
            closed_assignments = open.len(),
            "Rental upgraded"
        );
        Ok((successor, assignments))
    }

    /// Close a version and every assignment still open under it.
    pub async fn close_rental(
        &self,
        ctx: &RequestContext,
        rental_id: i32,
        end_at: DateTime<Utc>,
    ) -> DomainResult<Rental> {
        let rental = self.visible_rental(ctx, rental_id).await?;
        let open: Vec<Assignment> = self
            .repos
            .rentals()
            .groups_by_root_ids(&[rental.root()])
            .await?
            .into_iter()
            .flat_map(|g| g.versions)
            .filter(|v| v.rental.id == rental.id)
            .flat_map(|v| v.assignments)
            .filter(|a| a.is_open())
            .collect();
        for assignment in &open {
            if assignment.start_at < end_at {
                self.close_assignment(assignment, end_at, END_REASON_RETURNED)
                    .await?;
            }
        }
        let closed = self.repos.rentals().close(rental.id, end_at).await?;
        info!(rental_id = closed.id, "Rental closed");
        Ok(closed)
    }

    /// Put one more battery on an active version from `start_at` on.
    pub async fn assign_battery(
        &self,
        ctx: &RequestContext,
        rental_id: i32,
        battery_id: i32,
        start_at: DateTime<Utc>,
    ) -> DomainResult<Assignment> {
        let rental = self.visible_rental(ctx, rental_id).await?;
        if !rental.is_active() {
            return Err(DomainError::Validation(format!(
                "rental {} is {}; batteries go on the active version",
                rental.id, rental.status
            )));
        }
        self.visible_batteries(ctx, &[battery_id]).await?;
        self.open_assignment(&rental, battery_id, start_at, rental.end_at)
            .await
    }

    /// End an assignment at `end_at`.
    pub async fn release_battery(
        &self,
        ctx: &RequestContext,
        assignment_id: i32,
        end_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> DomainResult<Assignment> {
        let assignment = self.visible_assignment(ctx, assignment_id).await?;
        let closed = self
            .repos
            .assignments()
            .close(assignment.id, end_at, reason)
            .await?;
        self.repos
            .status_log()
            .close(
                closed.battery_id,
                LogSource::Rental(closed.rental_id),
                closed.start_at,
                end_at,
            )
            .await?;
        debug!(assignment_id, battery_id = closed.battery_id, "Battery released");
        Ok(closed)
    }

    /// Remove an assignment recorded by mistake, with its status log row.
    pub async fn delete_assignment(
        &self,
        ctx: &RequestContext,
        assignment_id: i32,
    ) -> DomainResult<Assignment> {
        self.visible_assignment(ctx, assignment_id).await?;
        let deleted = self.repos.assignments().delete(assignment_id).await?;
        self.repos
            .status_log()
            .remove(
                deleted.battery_id,
                LogSource::Rental(deleted.rental_id),
                deleted.start_at,
            )
            .await?;
        info!(assignment_id, battery_id = deleted.battery_id, "Assignment deleted");
        Ok(deleted)
    }

    /// Fail before any write when a requested battery is listed twice or
    /// already taken for `[start, end)`. Assignments of `superseded_root`
    /// end with the upgrade and do not count.
    async fn ensure_free(
        &self,
        battery_ids: &[i32],
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        superseded_root: Option<i32>,
    ) -> DomainResult<()> {
        let mut seen = HashSet::new();
        if let Some(id) = battery_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(DomainError::Validation(format!(
                "battery {} is listed more than once",
                id
            )));
        }
        if battery_ids.is_empty() {
            return Ok(());
        }
        let clash = self
            .repos
            .assignments()
            .clashes(battery_ids, start, end)
            .await?
            .into_iter()
            .find(|s| Some(s.rental.root()) != superseded_root);
        match clash {
            Some(s) => Err(DomainError::Validation(format!(
                "battery {} is already assigned by assignment {}",
                s.assignment.battery_id, s.assignment.id
            ))),
            None => Ok(()),
        }
    }

    async fn open_assignment(
        &self,
        rental: &Rental,
        battery_id: i32,
        start_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) -> DomainResult<Assignment> {
        let assignment = self
            .repos
            .assignments()
            .open(NewAssignment {
                rental_id: rental.id,
                battery_id,
                start_at,
                end_at,
            })
            .await?;
        self.repos
            .status_log()
            .upsert(battery_id, LogSource::Rental(rental.id), start_at, end_at)
            .await?;
        Ok(assignment)
    }

    async fn close_assignment(
        &self,
        assignment: &Assignment,
        end_at: DateTime<Utc>,
        reason: &str,
    ) -> DomainResult<Assignment> {
        let closed = self
            .repos
            .assignments()
            .close(assignment.id, end_at, Some(reason.to_string()))
            .await?;
        self.repos
            .status_log()
            .close(
                assignment.battery_id,
                LogSource::Rental(assignment.rental_id),
                assignment.start_at,
                end_at,
            )
            .await?;
        Ok(closed)
    }

    async fn visible_rental(&self, ctx: &RequestContext, rental_id: i32) -> DomainResult<Rental> {
        ctx.ensure_detail(EntityKind::Rental)?;
        let rental = self
            .repos
            .rentals()
            .find_by_id(rental_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Rental", rental_id))?;
        ctx.ensure_visible("Rental", rental.id, rental.city_id)?;
        Ok(rental)
    }

    async fn visible_assignment(
        &self,
        ctx: &RequestContext,
        assignment_id: i32,
    ) -> DomainResult<Assignment> {
        let assignment = self
            .repos
            .assignments()
            .find_by_id(assignment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Assignment", assignment_id))?;
        let rental = self.visible_rental(ctx, assignment.rental_id).await?;
        ctx.ensure_visible("Assignment", assignment.id, rental.city_id)?;
        Ok(assignment)
    }

    async fn visible_batteries(
        &self,
        ctx: &RequestContext,
        battery_ids: &[i32],
    ) -> DomainResult<Vec<Battery>> {
        let mut batteries = Vec::with_capacity(battery_ids.len());
        for &id in battery_ids {
            let battery = self
                .repos
                .batteries()
                .find_by_id(id)
                .await?
                .ok_or_else(|| DomainError::not_found("Battery", id))?;
            ctx.ensure_visible("Battery", id, battery.city_id)?;
            batteries.push(battery);
        }
        Ok(batteries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::application::fixtures::Fixture;
    use crate::domain::access::{CityScope, Principal};
    use crate::domain::battery::StatusLogRepository;
    use crate::domain::rental::{AssignmentRepository, RentalRepository, RentalStatus};

    fn system(fx: &Fixture) -> RequestContext {
        RequestContext::system(fx.at(6, 1, 0, 0))
    }

    fn terms(client_id: i32, start: DateTime<Utc>, weekly: Decimal) -> NewRental {
        NewRental {
            client_id,
            start_at: start,
            end_at: None,
            weekly_rate: weekly,
            deposit_amount: Decimal::ZERO,
            contract_code: None,
            city_id: None,
        }
    }

    #[tokio::test]
    async fn open_rental_writes_status_log() {
        let fx = Fixture::new();
        let client = fx.client("Ada", None).await;
        let battery = fx.battery("B1", None).await;
        let service = RentalService::new(fx.repos());
        let new = terms(client.id, fx.at(1, 1, 0, 0), dec!(700));

        let (rental, assignments) = service
            .open_rental(&system(&fx), new, &[battery.id])
            .await
            .unwrap();
        assert_eq!(rental.root_id, Some(rental.id));
        assert_eq!(rental.version, 1);
        assert_eq!(assignments.len(), 1);

        let log = StatusLogRepository::list(&*fx.store, Some(battery.id), &CityScope::Unrestricted)
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].rental_id, Some(rental.id));
        assert_eq!(log[0].end_at, None);
    }

    #[tokio::test]
    async fn upgrade_moves_batteries_to_successor() {
        let fx = Fixture::new();
        let client = fx.client("Bo", None).await;
        let b1 = fx.battery("B1", None).await;
        let b2 = fx.battery("B2", None).await;
        let service = RentalService::new(fx.repos());
        let ctx = system(&fx);
        let new = terms(client.id, fx.at(1, 1, 0, 0), dec!(700));
        let (v1, _) = service.open_rental(&ctx, new, &[b1.id]).await.unwrap();

        let jan8 = fx.at(1, 8, 0, 0);
        let (v2, assignments) = service
            .upgrade(
                &ctx,
                v1.id,
                NewVersion {
                    start_at: jan8,
                    end_at: None,
                    weekly_rate: dec!(1400),
                    deposit_amount: Decimal::ZERO,
                },
                &[b1.id, b2.id],
            )
            .await
            .unwrap();
        assert_eq!(v2.root_id, Some(v1.id));
        assert_eq!(v2.version, 2);
        assert_eq!(v2.contract_code, v1.contract_code);
        assert_eq!(assignments.len(), 2);

        let old = RentalRepository::find_by_id(&*fx.store, v1.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old.status, RentalStatus::Modified);
        assert_eq!(old.end_at, Some(jan8));

        let log = StatusLogRepository::list(&*fx.store, Some(b1.id), &CityScope::Unrestricted)
            .await
            .unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].end_at, Some(jan8));
        assert_eq!(log[1].rental_id, Some(v2.id));
    }

    #[tokio::test]
    async fn overlapping_assignment_rejected() {
        let fx = Fixture::new();
        let a = fx.client("A", None).await;
        let b = fx.client("B", None).await;
        let battery = fx.battery("B1", None).await;
        let service = RentalService::new(fx.repos());
        let ctx = system(&fx);
        let first = terms(a.id, fx.at(1, 1, 0, 0), dec!(70));
        service.open_rental(&ctx, first, &[battery.id]).await.unwrap();
        let second = terms(b.id, fx.at(1, 3, 0, 0), dec!(70));
        let (rental, _) = service.open_rental(&ctx, second, &[]).await.unwrap();

        let err = service
            .assign_battery(&ctx, rental.id, battery.id, fx.at(1, 4, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn rejected_open_leaves_no_rental_behind() {
        let fx = Fixture::new();
        let a = fx.client("A", None).await;
        let b = fx.client("B", None).await;
        let taken = fx.battery("B1", None).await;
        let free = fx.battery("B2", None).await;
        let service = RentalService::new(fx.repos());
        let ctx = system(&fx);
        let first = terms(a.id, fx.at(1, 1, 0, 0), dec!(70));
        service.open_rental(&ctx, first, &[taken.id]).await.unwrap();

        let second = terms(b.id, fx.at(1, 3, 0, 0), dec!(70));
        let err = service
            .open_rental(&ctx, second, &[free.id, taken.id])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let rentals = RentalRepository::list(&*fx.store, &CityScope::Unrestricted)
            .await
            .unwrap();
        assert_eq!(rentals.len(), 1);
        let log = StatusLogRepository::list(&*fx.store, Some(free.id), &CityScope::Unrestricted)
            .await
            .unwrap();
        assert!(log.is_empty());
        let assignments = AssignmentRepository::list(&*fx.store, &CityScope::Unrestricted)
            .await
            .unwrap();
        assert_eq!(assignments.len(), 1);
    }

    #[tokio::test]
    async fn rejected_upgrade_keeps_previous_version() {
        let fx = Fixture::new();
        let a = fx.client("A", None).await;
        let b = fx.client("B", None).await;
        let b1 = fx.battery("B1", None).await;
        let b2 = fx.battery("B2", None).await;
        let service = RentalService::new(fx.repos());
        let ctx = system(&fx);
        let (v1, held) = service
            .open_rental(&ctx, terms(a.id, fx.at(1, 1, 0, 0), dec!(700)), &[b1.id])
            .await
            .unwrap();
        service
            .open_rental(&ctx, terms(b.id, fx.at(1, 1, 0, 0), dec!(700)), &[b2.id])
            .await
            .unwrap();

        let err = service
            .upgrade(
                &ctx,
                v1.id,
                NewVersion {
                    start_at: fx.at(1, 8, 0, 0),
                    end_at: None,
                    weekly_rate: dec!(1400),
                    deposit_amount: Decimal::ZERO,
                },
                &[b1.id, b2.id],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let old = RentalRepository::find_by_id(&*fx.store, v1.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old.status, RentalStatus::Active);
        assert_eq!(old.end_at, None);
        let kept = AssignmentRepository::find_by_id(&*fx.store, held[0].id)
            .await
            .unwrap()
            .unwrap();
        assert!(kept.is_open());
        assert_eq!(kept.end_reason, None);
        let log = StatusLogRepository::list(&*fx.store, Some(b1.id), &CityScope::Unrestricted)
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].end_at, None);
        let rentals = RentalRepository::list(&*fx.store, &CityScope::Unrestricted)
            .await
            .unwrap();
        assert_eq!(rentals.len(), 2);
    }

    #[tokio::test]
    async fn delete_assignment_removes_log_row() {
        let fx = Fixture::new();
        let client = fx.client("Cy", None).await;
        let battery = fx.battery("B1", None).await;
        let service = RentalService::new(fx.repos());
        let ctx = system(&fx);
        let new = terms(client.id, fx.at(2, 1, 0, 0), dec!(70));
        let (_, assignments) = service.open_rental(&ctx, new, &[battery.id]).await.unwrap();

        service.delete_assignment(&ctx, assignments[0].id).await.unwrap();
        let log = StatusLogRepository::list(&*fx.store, Some(battery.id), &CityScope::Unrestricted)
            .await
            .unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn close_rental_returns_batteries() {
        let fx = Fixture::new();
        let client = fx.client("Di", None).await;
        let battery = fx.battery("B1", None).await;
        let service = RentalService::new(fx.repos());
        let ctx = system(&fx);
        let new = terms(client.id, fx.at(2, 1, 0, 0), dec!(70));
        let (rental, assignments) = service.open_rental(&ctx, new, &[battery.id]).await.unwrap();

        let end = fx.at(2, 10, 14, 0);
        let closed = service.close_rental(&ctx, rental.id, end).await.unwrap();
        assert_eq!(closed.status, RentalStatus::Closed);
        let assignment = AssignmentRepository::find_by_id(&*fx.store, assignments[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.end_at, Some(end));
        assert_eq!(assignment.end_reason.as_deref(), Some(END_REASON_RETURNED));
    }

    #[tokio::test]
    async fn moderator_cannot_rent_out_of_city() {
        let fx = Fixture::new();
        let poz = fx.city("Poznań", "POZ").await;
        let waw = fx.city("Warszawa", "WAW").await;
        let client = fx.client("Ed", Some(waw.id)).await;
        let ctx = RequestContext::new(
            Principal::new(5, "mod", false),
            fx.at(2, 1, 0, 0),
            CityScope::Single(poz.id),
            true,
            EntityKind::moderator_default(),
        );
        let new = terms(client.id, fx.at(2, 1, 0, 0), dec!(70));
        let err = RentalService::new(fx.repos())
            .open_rental(&ctx, new, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
