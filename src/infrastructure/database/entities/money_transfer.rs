//! Money transfer entity

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "money_transfers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub from_partner_id: i32,
    pub to_partner_id: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub date: NaiveDate,
    pub purpose: String,
    /// Funded from collected cash
    pub use_collected: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
