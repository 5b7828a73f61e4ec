//! Client repository interface

use async_trait::async_trait;

use super::model::{Client, NewClient};
use crate::domain::access::CityScope;
use crate::domain::DomainResult;

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Client>>;
    async fn find_by_ids(&self, ids: &[i32]) -> DomainResult<Vec<Client>>;
    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Client>>;
    async fn insert(&self, client: NewClient) -> DomainResult<Client>;
}
