//! SeaORM implementation of CityRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::db_err;
use super::scope::own_city;
use crate::domain::access::CityScope;
use crate::domain::city::{City, CityRepository, NewCity};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::city;

pub struct SeaOrmCityRepository {
    db: DatabaseConnection,
}

impl SeaOrmCityRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: city::Model) -> City {
    City {
        id: m.id,
        name: m.name,
        code: m.code,
        active: m.active,
    }
}

#[async_trait]
impl CityRepository for SeaOrmCityRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<City>> {
        let model = city::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_by_code(&self, code: &str) -> DomainResult<Option<City>> {
        let model = city::Entity::find()
            .filter(city::Column::Code.eq(code))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn list(&self, scope: &CityScope) -> DomainResult<Vec<City>> {
        let models = city::Entity::find()
            .filter(own_city(city::Column::Id, scope))
            .order_by_asc(city::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn insert(&self, c: NewCity) -> DomainResult<City> {
        let model = city::ActiveModel {
            name: Set(c.name),
            code: Set(c.code),
            active: Set(true),
            ..Default::default()
        };
        let model = model.insert(&self.db).await.map_err(db_err)?;
        Ok(model_to_domain(model))
    }
}
