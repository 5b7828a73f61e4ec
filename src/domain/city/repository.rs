//! City repository interface

use async_trait::async_trait;

use super::model::{City, NewCity};
use crate::domain::access::CityScope;
use crate::domain::DomainResult;

#[async_trait]
pub trait CityRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<City>>;
    async fn find_by_code(&self, code: &str) -> DomainResult<Option<City>>;
    /// Cities inside `scope`, ordered by name.
    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<City>>;
    async fn insert(&self, city: NewCity) -> DomainResult<City>;
}
