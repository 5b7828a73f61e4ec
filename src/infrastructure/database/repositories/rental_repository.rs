//! SeaORM implementations of RentalRepository and AssignmentRepository

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Query, SelectStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, warn};

use super::db_err;
use super::scope::{own_city, via_rental};
use crate::domain::access::CityScope;
use crate::domain::rental::{
    default_contract_code, validate_interval, Assignment, AssignmentRepository, NewAssignment,
    NewRental, NewVersion, Rental, RentalGroup, RentalRepository, RentalStatus, RentalVersion,
    ScopedAssignment,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{rental, rental_battery_assignment as assignment};

pub struct SeaOrmRentalRepository {
    db: DatabaseConnection,
}

impl SeaOrmRentalRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub struct SeaOrmAssignmentRepository {
    db: DatabaseConnection,
}

impl SeaOrmAssignmentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn status_to_entity(status: RentalStatus) -> rental::RentalStatus {
    match status {
        RentalStatus::Active => rental::RentalStatus::Active,
        RentalStatus::Closed => rental::RentalStatus::Closed,
        RentalStatus::Modified => rental::RentalStatus::Modified,
    }
}

fn entity_to_status(status: rental::RentalStatus) -> RentalStatus {
    match status {
        rental::RentalStatus::Active => RentalStatus::Active,
        rental::RentalStatus::Closed => RentalStatus::Closed,
        rental::RentalStatus::Modified => RentalStatus::Modified,
    }
}

fn rental_to_domain(m: rental::Model) -> Rental {
    Rental {
        id: m.id,
        client_id: m.client_id,
        start_at: m.start_at,
        end_at: m.end_at,
        weekly_rate: m.weekly_rate,
        deposit_amount: m.deposit_amount,
        status: entity_to_status(m.status),
        parent_id: m.parent_id,
        root_id: m.root_id,
        version: m.version,
        contract_code: m.contract_code,
        city_id: m.city_id,
        created_at: m.created_at,
    }
}

fn assignment_to_domain(m: assignment::Model) -> Assignment {
    Assignment {
        id: m.id,
        rental_id: m.rental_id,
        battery_id: m.battery_id,
        start_at: m.start_at,
        end_at: m.end_at,
        end_reason: m.end_reason,
    }
}

/// `start_at < to AND (end_at IS NULL OR end_at > from)`
fn intersects(from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Condition {
    let mut cond = Condition::all().add(
        Condition::any()
            .add(assignment::Column::EndAt.is_null())
            .add(assignment::Column::EndAt.gt(from)),
    );
    if let Some(to) = to {
        cond = cond.add(assignment::Column::StartAt.lt(to));
    }
    cond
}

/// Ids of versions with status `active`.
fn active_rental_ids() -> SelectStatement {
    Query::select()
        .column(rental::Column::Id)
        .from(rental::Entity)
        .and_where(rental::Column::Status.eq(rental::RentalStatus::Active))
        .to_owned()
}

/// Attach each assignment's version with one extra query.
async fn with_rentals<C: ConnectionTrait>(
    conn: &C,
    models: Vec<assignment::Model>,
) -> DomainResult<Vec<ScopedAssignment>> {
    let rental_ids: Vec<i32> = models.iter().map(|m| m.rental_id).collect();
    let rentals: HashMap<i32, Rental> = rental::Entity::find()
        .filter(rental::Column::Id.is_in(rental_ids))
        .all(conn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|m| (m.id, rental_to_domain(m)))
        .collect();
    Ok(models
        .into_iter()
        .filter_map(|m| {
            let rental = rentals.get(&m.rental_id)?.clone();
            Some(ScopedAssignment {
                assignment: assignment_to_domain(m),
                rental,
            })
        })
        .collect())
}

// ── RentalRepository impl ───────────────────────────────────────

#[async_trait]
impl RentalRepository for SeaOrmRentalRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Rental>> {
        let model = rental::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(rental_to_domain))
    }

    async fn groups_by_root_ids(&self, root_ids: &[i32]) -> DomainResult<Vec<RentalGroup>> {
        if root_ids.is_empty() {
            return Ok(Vec::new());
        }
        // Legacy rows without root act as their own root
        let versions = rental::Entity::find()
            .filter(
                Condition::any()
                    .add(rental::Column::RootId.is_in(root_ids.to_vec()))
                    .add(
                        Condition::all()
                            .add(rental::Column::RootId.is_null())
                            .add(rental::Column::Id.is_in(root_ids.to_vec())),
                    ),
            )
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let version_ids: Vec<i32> = versions.iter().map(|v| v.id).collect();
        let mut assignments: HashMap<i32, Vec<Assignment>> = HashMap::new();
        for a in assignment::Entity::find()
            .filter(assignment::Column::RentalId.is_in(version_ids))
            .order_by_asc(assignment::Column::StartAt)
            .order_by_asc(assignment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
        {
            assignments
                .entry(a.rental_id)
                .or_default()
                .push(assignment_to_domain(a));
        }

        let mut by_root: BTreeMap<i32, Vec<RentalVersion>> = BTreeMap::new();
        for v in versions {
            let rental = rental_to_domain(v);
            if rental.root_id.is_none() {
                warn!(rental_id = rental.id, "Rental without root, treating as its own root");
            }
            by_root.entry(rental.root()).or_default().push(RentalVersion {
                assignments: assignments.remove(&rental.id).unwrap_or_default(),
                rental,
            });
        }
        by_root
            .into_iter()
            .map(|(root, versions)| RentalGroup::new(root, versions))
            .collect()
    }

    async fn active(&self, scope: &CityScope) -> DomainResult<Vec<Rental>> {
        let models = rental::Entity::find()
            .filter(rental::Column::Status.eq(rental::RentalStatus::Active))
            .filter(own_city(rental::Column::CityId, scope))
            .order_by_asc(rental::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(rental_to_domain).collect())
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Rental>> {
        let models = rental::Entity::find()
            .filter(own_city(rental::Column::CityId, scope))
            .order_by_asc(rental::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(rental_to_domain).collect())
    }

    async fn create(&self, r: NewRental) -> DomainResult<Rental> {
        r.validate()?;
        let txn = self.db.begin().await.map_err(db_err)?;

        let model = rental::ActiveModel {
            client_id: Set(r.client_id),
            start_at: Set(r.start_at),
            end_at: Set(r.end_at),
            weekly_rate: Set(r.weekly_rate),
            deposit_amount: Set(r.deposit_amount),
            status: Set(rental::RentalStatus::Active),
            parent_id: Set(None),
            root_id: Set(None),
            version: Set(1),
            contract_code: Set(r.contract_code.clone().unwrap_or_default()),
            city_id: Set(r.city_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        let id = model.id;
        let mut active = model.into_active_model();
        active.root_id = Set(Some(id));
        if r.contract_code.is_none() {
            active.contract_code = Set(default_contract_code(id));
        }
        let model = active.update(&txn).await.map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        debug!(rental_id = id, "Rental created");
        Ok(rental_to_domain(model))
    }

    async fn create_successor(&self, previous_id: i32, v: NewVersion) -> DomainResult<Rental> {
        v.validate()?;
        let txn = self.db.begin().await.map_err(db_err)?;

        let previous = rental::Entity::find_by_id(previous_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .map(rental_to_domain)
            .ok_or_else(|| DomainError::not_found("Rental", previous_id))?;
        if previous.status == RentalStatus::Closed {
            return Err(DomainError::Validation(format!(
                "rental {} is closed and cannot be superseded",
                previous_id
            )));
        }
        if v.start_at <= previous.start_at {
            return Err(DomainError::Validation(
                "successor must start after the version it supersedes".to_string(),
            ));
        }
        let root = previous.root();
        let in_group = Condition::any()
            .add(rental::Column::RootId.eq(root))
            .add(rental::Column::Id.eq(root));

        let latest_version = rental::Entity::find()
            .filter(in_group.clone())
            .order_by_desc(rental::Column::Version)
            .one(&txn)
            .await
            .map_err(db_err)?
            .map_or(0, |m| m.version);

        let active_in_group = Condition::all()
            .add(in_group.clone())
            .add(rental::Column::Status.eq(rental::RentalStatus::Active));
        rental::Entity::update_many()
            .col_expr(rental::Column::EndAt, Expr::value(v.start_at))
            .filter(active_in_group.clone())
            .filter(
                Condition::any()
                    .add(rental::Column::EndAt.is_null())
                    .add(rental::Column::EndAt.gt(v.start_at)),
            )
            .exec(&txn)
            .await
            .map_err(db_err)?;
        rental::Entity::update_many()
            .col_expr(
                rental::Column::Status,
                Expr::value(RentalStatus::Modified.as_str()),
            )
            .filter(active_in_group)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        let model = rental::ActiveModel {
            client_id: Set(previous.client_id),
            start_at: Set(v.start_at),
            end_at: Set(v.end_at),
            weekly_rate: Set(v.weekly_rate),
            deposit_amount: Set(v.deposit_amount),
            status: Set(rental::RentalStatus::Active),
            parent_id: Set(Some(previous.id)),
            root_id: Set(Some(root)),
            version: Set(latest_version + 1),
            contract_code: Set(previous.contract_code.clone()),
            city_id: Set(previous.city_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        debug!(
            rental_id = model.id,
            root_id = root,
            version = model.version,
            "Rental superseded"
        );
        Ok(rental_to_domain(model))
    }

    async fn close(&self, id: i32, end_at: DateTime<Utc>) -> DomainResult<Rental> {
        let existing = rental::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Rental", id))?;
        validate_interval(existing.start_at, Some(end_at))?;
        let mut active = existing.into_active_model();
        active.status = Set(status_to_entity(RentalStatus::Closed));
        active.end_at = Set(Some(end_at));
        let model = active.update(&self.db).await.map_err(db_err)?;
        Ok(rental_to_domain(model))
    }

    async fn backfill_roots(&self) -> DomainResult<u64> {
        let result = rental::Entity::update_many()
            .col_expr(rental::Column::RootId, Expr::col(rental::Column::Id).into())
            .filter(rental::Column::RootId.is_null())
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }
}

// ── AssignmentRepository impl ───────────────────────────────────

#[async_trait]
impl AssignmentRepository for SeaOrmAssignmentRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Assignment>> {
        let model = assignment::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(assignment_to_domain))
    }

    async fn active_at(&self, now: DateTime<Utc>, scope: &CityScope) -> DomainResult<Vec<ScopedAssignment>> {
        let models = assignment::Entity::find()
            .filter(assignment::Column::StartAt.lte(now))
            .filter(
                Condition::any()
                    .add(assignment::Column::EndAt.is_null())
                    .add(assignment::Column::EndAt.gt(now)),
            )
            .filter(via_rental(assignment::Column::RentalId, scope))
            .order_by_asc(assignment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        with_rentals(&self.db, models).await
    }

    async fn intersecting(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        scope: &CityScope,
    ) -> DomainResult<Vec<ScopedAssignment>> {
        let models = assignment::Entity::find()
            .filter(intersects(from, Some(to)))
            .filter(via_rental(assignment::Column::RentalId, scope))
            .order_by_asc(assignment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        let scoped = with_rentals(&self.db, models).await?;
        Ok(scoped
            .into_iter()
            .filter(|s| s.rental.start_at < to && s.rental.end_at.map_or(true, |e| e > from))
            .collect())
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Assignment>> {
        let models = assignment::Entity::find()
            .filter(via_rental(assignment::Column::RentalId, scope))
            .order_by_asc(assignment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(assignment_to_domain).collect())
    }

    async fn clashes(
        &self,
        battery_ids: &[i32],
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<ScopedAssignment>> {
        if battery_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = assignment::Entity::find()
            .filter(assignment::Column::BatteryId.is_in(battery_ids.to_vec()))
            .filter(intersects(start, end))
            .filter(assignment::Column::RentalId.in_subquery(active_rental_ids()))
            .order_by_asc(assignment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        with_rentals(&self.db, models).await
    }

    async fn open(&self, a: NewAssignment) -> DomainResult<Assignment> {
        a.validate()?;
        let txn = self.db.begin().await.map_err(db_err)?;

        if rental::Entity::find_by_id(a.rental_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .is_none()
        {
            return Err(DomainError::not_found("Rental", a.rental_id));
        }

        let clash = assignment::Entity::find()
            .filter(assignment::Column::BatteryId.eq(a.battery_id))
            .filter(intersects(a.start_at, a.end_at))
            .filter(assignment::Column::RentalId.in_subquery(active_rental_ids()))
            .one(&txn)
            .await
            .map_err(db_err)?;
        if let Some(clash) = clash {
            return Err(DomainError::Validation(format!(
                "battery {} is already assigned by assignment {}",
                a.battery_id, clash.id
            )));
        }

        let model = assignment::ActiveModel {
            rental_id: Set(a.rental_id),
            battery_id: Set(a.battery_id),
            start_at: Set(a.start_at),
            end_at: Set(a.end_at),
            end_reason: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(assignment_to_domain(model))
    }

    async fn close(
        &self,
        id: i32,
        end_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> DomainResult<Assignment> {
        let existing = assignment::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Assignment", id))?;
        validate_interval(existing.start_at, Some(end_at))?;
        let mut active = existing.into_active_model();
        active.end_at = Set(Some(end_at));
        active.end_reason = Set(reason);
        let model = active.update(&self.db).await.map_err(db_err)?;
        Ok(assignment_to_domain(model))
    }

    async fn delete(&self, id: i32) -> DomainResult<Assignment> {
        let existing = assignment::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Assignment", id))?;
        let deleted = assignment_to_domain(existing.clone());
        existing.delete(&self.db).await.map_err(db_err)?;
        Ok(deleted)
    }
}
