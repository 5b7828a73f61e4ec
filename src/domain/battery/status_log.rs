//! Battery status log entry
//!
//! Append-only history of what a battery was doing. Rows are created and
//! removed by assignment and repair write paths; the only in-place change
//! is setting `end_at`.

use chrono::{DateTime, Utc};

use super::model::BatteryStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusLogEntry {
    pub id: i32,
    pub battery_id: i32,
    pub kind: BatteryStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub rental_id: Option<i32>,
    pub repair_id: Option<i32>,
}

/// What caused a log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Rental(i32),
    Repair(i32),
}

impl LogSource {
    pub fn kind(&self) -> BatteryStatus {
        match self {
            LogSource::Rental(_) => BatteryStatus::Rented,
            LogSource::Repair(_) => BatteryStatus::Service,
        }
    }

    pub fn rental_id(&self) -> Option<i32> {
        match self {
            LogSource::Rental(id) => Some(*id),
            LogSource::Repair(_) => None,
        }
    }

    pub fn repair_id(&self) -> Option<i32> {
        match self {
            LogSource::Repair(id) => Some(*id),
            LogSource::Rental(_) => None,
        }
    }
}

impl StatusLogEntry {
    pub fn matches(&self, battery_id: i32, source: LogSource, start_at: DateTime<Utc>) -> bool {
        self.battery_id == battery_id
            && self.kind == source.kind()
            && self.rental_id == source.rental_id()
            && self.repair_id == source.repair_id()
            && self.start_at == start_at
    }
}
