//! SeaORM implementation of ClientRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::db_err;
use super::scope::own_city;
use crate::domain::access::CityScope;
use crate::domain::client::{Client, ClientRepository, NewClient};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::client;

pub struct SeaOrmClientRepository {
    db: DatabaseConnection,
}

impl SeaOrmClientRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: client::Model) -> Client {
    Client {
        id: m.id,
        name: m.name,
        phone: m.phone,
        note: m.note,
        city_id: m.city_id,
        created_at: m.created_at,
    }
}

#[async_trait]
impl ClientRepository for SeaOrmClientRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Client>> {
        let model = client::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_by_ids(&self, ids: &[i32]) -> DomainResult<Vec<Client>> {
        let models = client::Entity::find()
            .filter(client::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(client::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<Client>> {
        let models = client::Entity::find()
            .filter(own_city(client::Column::CityId, scope))
            .order_by_asc(client::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn insert(&self, c: NewClient) -> DomainResult<Client> {
        let model = client::ActiveModel {
            name: Set(c.name),
            phone: Set(c.phone),
            note: Set(c.note),
            city_id: Set(c.city_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = model.insert(&self.db).await.map_err(db_err)?;
        Ok(model_to_domain(model))
    }
}
