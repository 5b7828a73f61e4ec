//! Battery entity

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stored battery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum BatteryStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "rented")]
    Rented,
    #[sea_orm(string_value = "service")]
    Service,
    #[sea_orm(string_value = "sold")]
    Sold,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batteries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub short_code: String,
    pub serial_number: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub cost_price: Decimal,
    pub status: BatteryStatus,
    pub city_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
