//! Repair repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{NewRepair, Repair};
use crate::domain::access::CityScope;
use crate::domain::DomainResult;

#[async_trait]
pub trait RepairRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Repair>>;
    /// Repairs without `end_at`, scoped through the battery's city.
    async fn open_repairs(&self, scope: &CityScope) -> DomainResult<Vec<Repair>>;
    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Repair>>;
    async fn insert(&self, repair: NewRepair) -> DomainResult<Repair>;
    async fn close(&self, id: i32, end_at: DateTime<Utc>) -> DomainResult<Repair>;
}
