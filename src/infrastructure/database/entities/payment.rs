//! Payment entity
//!
//! `rental_id` always references the root version of a rental group.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub rental_id: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub date: NaiveDate,
    /// rent, deposit, return_deposit, adjustment, sold
    pub payment_type: String,
    /// cash, blik, revolut, other
    pub method: String,
    pub note: String,
    pub created_by: Option<i32>,
    pub city_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
