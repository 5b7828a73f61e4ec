//! Battery status log entity
//!
//! One row per `(battery, kind, source, start_at)` span.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::battery::BatteryStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "battery_status_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub battery_id: i32,
    pub kind: BatteryStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub rental_id: Option<i32>,
    pub repair_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
