//! SeaORM implementations of BatteryRepository and StatusLogRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use super::db_err;
use super::scope::{own_city, via_battery};
use crate::domain::access::CityScope;
use crate::domain::battery::{
    Battery, BatteryFilter, BatteryRepository, BatteryStatus, LogSource, NewBattery,
    StatusLogEntry, StatusLogRepository,
};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::{battery, battery_status_log};

pub struct SeaOrmBatteryRepository {
    db: DatabaseConnection,
}

impl SeaOrmBatteryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub struct SeaOrmStatusLogRepository {
    db: DatabaseConnection,
}

impl SeaOrmStatusLogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

pub(crate) fn status_to_entity(status: BatteryStatus) -> battery::BatteryStatus {
    match status {
        BatteryStatus::Available => battery::BatteryStatus::Available,
        BatteryStatus::Rented => battery::BatteryStatus::Rented,
        BatteryStatus::Service => battery::BatteryStatus::Service,
        BatteryStatus::Sold => battery::BatteryStatus::Sold,
    }
}

fn entity_to_status(status: battery::BatteryStatus) -> BatteryStatus {
    match status {
        battery::BatteryStatus::Available => BatteryStatus::Available,
        battery::BatteryStatus::Rented => BatteryStatus::Rented,
        battery::BatteryStatus::Service => BatteryStatus::Service,
        battery::BatteryStatus::Sold => BatteryStatus::Sold,
    }
}

fn battery_to_domain(m: battery::Model) -> Battery {
    Battery {
        id: m.id,
        short_code: m.short_code,
        serial_number: m.serial_number,
        cost_price: m.cost_price,
        status: entity_to_status(m.status),
        city_id: m.city_id,
    }
}

fn log_to_domain(m: battery_status_log::Model) -> StatusLogEntry {
    StatusLogEntry {
        id: m.id,
        battery_id: m.battery_id,
        kind: entity_to_status(m.kind),
        start_at: m.start_at,
        end_at: m.end_at,
        rental_id: m.rental_id,
        repair_id: m.repair_id,
    }
}

/// Row key of a status log entry: battery, kind, source and start.
fn log_key(battery_id: i32, source: LogSource, start_at: DateTime<Utc>) -> Condition {
    let source_cond = match source {
        LogSource::Rental(id) => battery_status_log::Column::RentalId.eq(id),
        LogSource::Repair(id) => battery_status_log::Column::RepairId.eq(id),
    };
    Condition::all()
        .add(battery_status_log::Column::BatteryId.eq(battery_id))
        .add(battery_status_log::Column::Kind.eq(status_to_entity(source.kind())))
        .add(battery_status_log::Column::StartAt.eq(start_at))
        .add(source_cond)
}

// ── BatteryRepository impl ──────────────────────────────────────

#[async_trait]
impl BatteryRepository for SeaOrmBatteryRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Battery>> {
        let model = battery::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(battery_to_domain))
    }

    async fn find_by_short_code(&self, short_code: &str) -> DomainResult<Option<Battery>> {
        let model = battery::Entity::find()
            .filter(battery::Column::ShortCode.eq(short_code))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(battery_to_domain))
    }

    async fn list(&self, filter: &BatteryFilter) -> DomainResult<Vec<Battery>> {
        let mut cond = own_city(battery::Column::CityId, &filter.scope);
        if let Some(ids) = &filter.ids {
            cond = cond.add(battery::Column::Id.is_in(ids.clone()));
        }
        if let Some(statuses) = &filter.statuses {
            cond = cond.add(
                battery::Column::Status.is_in(statuses.iter().map(|s| status_to_entity(*s))),
            );
        }
        let models = battery::Entity::find()
            .filter(cond)
            .order_by_asc(battery::Column::ShortCode)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(battery_to_domain).collect())
    }

    async fn insert(&self, b: NewBattery) -> DomainResult<Battery> {
        let model = battery::ActiveModel {
            short_code: Set(b.short_code),
            serial_number: Set(b.serial_number),
            cost_price: Set(b.cost_price),
            status: Set(status_to_entity(b.status)),
            city_id: Set(b.city_id),
            ..Default::default()
        };
        let model = model.insert(&self.db).await.map_err(db_err)?;
        Ok(battery_to_domain(model))
    }

    async fn set_status(&self, ids: &[i32], status: BatteryStatus) -> DomainResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = battery::Entity::update_many()
            .col_expr(battery::Column::Status, Expr::value(status.as_str()))
            .filter(battery::Column::Id.is_in(ids.to_vec()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }
}

// ── StatusLogRepository impl ────────────────────────────────────

#[async_trait]
impl StatusLogRepository for SeaOrmStatusLogRepository {
    async fn upsert(
        &self,
        battery_id: i32,
        source: LogSource,
        start_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) -> DomainResult<StatusLogEntry> {
        let existing = battery_status_log::Entity::find()
            .filter(log_key(battery_id, source, start_at))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if let Some(existing) = existing {
            return Ok(log_to_domain(existing));
        }
        let model = battery_status_log::ActiveModel {
            battery_id: Set(battery_id),
            kind: Set(status_to_entity(source.kind())),
            start_at: Set(start_at),
            end_at: Set(end_at),
            rental_id: Set(source.rental_id()),
            repair_id: Set(source.repair_id()),
            ..Default::default()
        };
        let model = model.insert(&self.db).await.map_err(db_err)?;
        Ok(log_to_domain(model))
    }

    async fn close(
        &self,
        battery_id: i32,
        source: LogSource,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = battery_status_log::Entity::update_many()
            .col_expr(battery_status_log::Column::EndAt, Expr::value(end_at))
            .filter(log_key(battery_id, source, start_at))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }

    async fn remove(
        &self,
        battery_id: i32,
        source: LogSource,
        start_at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = battery_status_log::Entity::delete_many()
            .filter(log_key(battery_id, source, start_at))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }

    async fn list(&self, battery_id: Option<i32>, scope: &CityScope) -> DomainResult<Vec<StatusLogEntry>> {
        let mut cond = via_battery(battery_status_log::Column::BatteryId, scope);
        if let Some(id) = battery_id {
            cond = cond.add(battery_status_log::Column::BatteryId.eq(id));
        }
        let models = battery_status_log::Entity::find()
            .filter(cond)
            .order_by_asc(battery_status_log::Column::StartAt)
            .order_by_asc(battery_status_log::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(log_to_domain).collect())
    }
}
