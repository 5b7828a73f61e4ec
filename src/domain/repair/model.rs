//! Repair domain entity

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::rental::validate_interval;
use crate::shared::DomainResult;

/// Service interval of a battery. An open repair keeps the battery in
/// `service`.
#[derive(Debug, Clone, PartialEq)]
pub struct Repair {
    pub id: i32,
    pub battery_id: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub description: String,
    pub cost: Decimal,
}

impl Repair {
    pub fn is_open(&self) -> bool {
        self.end_at.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewRepair {
    pub battery_id: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub description: String,
    pub cost: Decimal,
}

impl NewRepair {
    pub fn validate(&self) -> DomainResult<()> {
        validate_interval(self.start_at, self.end_at)
    }
}
