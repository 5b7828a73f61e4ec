use async_trait::async_trait;

use super::model::{NewUser, User};
use crate::domain::DomainResult;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>>;
    async fn find_by_ids(&self, ids: &[i32]) -> DomainResult<Vec<User>>;
    async fn insert(&self, user: NewUser) -> DomainResult<User>;
}
