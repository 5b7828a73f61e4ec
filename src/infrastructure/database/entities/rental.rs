//! Rental entity
//!
//! Each row is one version of a contract. `root_id` groups versions and
//! `parent_id` points at the version this one superseded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum RentalStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "modified")]
    Modified,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rentals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub client_id: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub weekly_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub deposit_amount: Decimal,
    pub status: RentalStatus,
    pub parent_id: Option<i32>,
    /// Null only on legacy rows awaiting backfill
    pub root_id: Option<i32>,
    pub version: i32,
    pub contract_code: String,
    pub city_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rental_battery_assignment::Entity")]
    Assignments,
}

impl Related<super::rental_battery_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
