//! Battery and status log repository interfaces

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Battery, BatteryFilter, BatteryStatus, NewBattery};
use super::status_log::{LogSource, StatusLogEntry};
use crate::domain::access::CityScope;
use crate::domain::DomainResult;

#[async_trait]
pub trait BatteryRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Battery>>;
    async fn find_by_short_code(&self, short_code: &str) -> DomainResult<Option<Battery>>;
    async fn list(&self, filter: &BatteryFilter) -> DomainResult<Vec<Battery>>;
    async fn insert(&self, battery: NewBattery) -> DomainResult<Battery>;
    /// `UPDATE batteries SET status = ? WHERE id IN (…)`. Returns rows affected.
    async fn set_status(&self, ids: &[i32], status: BatteryStatus) -> DomainResult<u64>;
}

#[async_trait]
pub trait StatusLogRepository: Send + Sync {
    /// Insert the row for `(battery, source, start_at)` unless it exists.
    async fn upsert(
        &self,
        battery_id: i32,
        source: LogSource,
        start_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) -> DomainResult<StatusLogEntry>;
    /// Set `end_at` on the matching row. Returns rows affected.
    async fn close(
        &self,
        battery_id: i32,
        source: LogSource,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> DomainResult<u64>;
    async fn remove(
        &self,
        battery_id: i32,
        source: LogSource,
        start_at: DateTime<Utc>,
    ) -> DomainResult<u64>;
    async fn list(&self, battery_id: Option<i32>, scope: &CityScope) -> DomainResult<Vec<StatusLogEntry>>;
}
