//! SeaORM implementation of RepairRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};

use super::db_err;
use super::scope::via_battery;
use crate::domain::access::CityScope;
use crate::domain::rental::validate_interval;
use crate::domain::repair::{NewRepair, Repair, RepairRepository};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{battery, repair};

pub struct SeaOrmRepairRepository {
    db: DatabaseConnection,
}

impl SeaOrmRepairRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: repair::Model) -> Repair {
    Repair {
        id: m.id,
        battery_id: m.battery_id,
        start_at: m.start_at,
        end_at: m.end_at,
        description: m.description,
        cost: m.cost,
    }
}

#[async_trait]
impl RepairRepository for SeaOrmRepairRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Repair>> {
        let model = repair::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn open_repairs(&self, scope: &CityScope) -> DomainResult<Vec<Repair>> {
        let models = repair::Entity::find()
            .filter(repair::Column::EndAt.is_null())
            .filter(via_battery(repair::Column::BatteryId, scope))
            .order_by_asc(repair::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Repair>> {
        let models = repair::Entity::find()
            .filter(via_battery(repair::Column::BatteryId, scope))
            .order_by_asc(repair::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn insert(&self, r: NewRepair) -> DomainResult<Repair> {
        r.validate()?;
        if battery::Entity::find_by_id(r.battery_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_none()
        {
            return Err(DomainError::not_found("Battery", r.battery_id));
        }
        let model = repair::ActiveModel {
            battery_id: Set(r.battery_id),
            start_at: Set(r.start_at),
            end_at: Set(r.end_at),
            description: Set(r.description),
            cost: Set(r.cost),
            ..Default::default()
        };
        let model = model.insert(&self.db).await.map_err(db_err)?;
        Ok(model_to_domain(model))
    }

    async fn close(&self, id: i32, end_at: DateTime<Utc>) -> DomainResult<Repair> {
        let existing = repair::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Repair", id))?;
        validate_interval(existing.start_at, Some(end_at))?;
        let mut active = existing.into_active_model();
        active.end_at = Set(Some(end_at));
        let model = active.update(&self.db).await.map_err(db_err)?;
        Ok(model_to_domain(model))
    }
}
