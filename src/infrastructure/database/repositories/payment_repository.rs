//! SeaORM implementation of PaymentRepository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use super::scope::own_city;
use super::{bad_value, db_err};
use crate::domain::payment::{
    NewPayment, Payment, PaymentFilter, PaymentMethod, PaymentRepository, PaymentType,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{payment, rental};

pub struct SeaOrmPaymentRepository {
    db: DatabaseConnection,
}

impl SeaOrmPaymentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: payment::Model) -> DomainResult<Payment> {
    Ok(Payment {
        id: m.id,
        rental_id: m.rental_id,
        amount: m.amount,
        date: m.date,
        payment_type: PaymentType::from_str(&m.payment_type)
            .ok_or_else(|| bad_value("payment_type", &m.payment_type))?,
        method: PaymentMethod::from_str(&m.method).ok_or_else(|| bad_value("method", &m.method))?,
        note: m.note,
        created_by: m.created_by,
        city_id: m.city_id,
    })
}

fn type_names(types: &[PaymentType]) -> Vec<&'static str> {
    types.iter().map(|t| t.as_str()).collect()
}

/// Root of the group holding `rental_id`.
fn root_of(m: &rental::Model) -> i32 {
    m.root_id.unwrap_or(m.id)
}

#[async_trait]
impl PaymentRepository for SeaOrmPaymentRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Payment>> {
        payment::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn create(&self, p: NewPayment) -> DomainResult<Payment> {
        p.validate()?;
        let txn = self.db.begin().await.map_err(db_err)?;

        let version = rental::Entity::find_by_id(p.rental_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Rental", p.rental_id))?;
        let root = root_of(&version);

        let model = payment::ActiveModel {
            rental_id: Set(root),
            amount: Set(p.amount),
            date: Set(p.date),
            payment_type: Set(p.payment_type.as_str().to_string()),
            method: Set(p.method.as_str().to_string()),
            note: Set(p.note),
            created_by: Set(p.created_by),
            city_id: Set(p.city_id.or(version.city_id)),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        if root != p.rental_id {
            debug!(
                payment_id = model.id,
                rental_id = p.rental_id,
                root_id = root,
                "Payment attached to group root"
            );
        }
        model_to_domain(model)
    }

    async fn reassign(&self, payment_id: i32, rental_id: i32) -> DomainResult<Payment> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let version = rental::Entity::find_by_id(rental_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Rental", rental_id))?;
        let existing = payment::Entity::find_by_id(payment_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Payment", payment_id))?;

        let mut active = existing.into_active_model();
        active.rental_id = Set(root_of(&version));
        active.city_id = Set(version.city_id);
        let model = active.update(&txn).await.map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        model_to_domain(model)
    }

    async fn grouped_by_root(
        &self,
        root_ids: &[i32],
        types: Option<&[PaymentType]>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> DomainResult<HashMap<i32, Vec<Payment>>> {
        if root_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut query = payment::Entity::find()
            .filter(payment::Column::RentalId.is_in(root_ids.to_vec()));
        if let Some(types) = types {
            query = query.filter(payment::Column::PaymentType.is_in(type_names(types)));
        }
        if let Some((from, to)) = range {
            query = query
                .filter(payment::Column::Date.gte(from))
                .filter(payment::Column::Date.lte(to));
        }
        let models = query
            .order_by_asc(payment::Column::Date)
            .order_by_asc(payment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut grouped: HashMap<i32, Vec<Payment>> = HashMap::new();
        for m in models {
            let p = model_to_domain(m)?;
            grouped.entry(p.rental_id).or_default().push(p);
        }
        Ok(grouped)
    }

    async fn list(&self, filter: &PaymentFilter) -> DomainResult<Vec<Payment>> {
        let mut query = payment::Entity::find().filter(own_city(payment::Column::CityId, &filter.scope));
        if let Some(types) = &filter.types {
            query = query.filter(payment::Column::PaymentType.is_in(type_names(types)));
        }
        if let Some(from) = filter.from {
            query = query.filter(payment::Column::Date.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(payment::Column::Date.lte(to));
        }
        if let Some(users) = &filter.created_by {
            query = query.filter(payment::Column::CreatedBy.is_in(users.clone()));
        }
        if let Some(roots) = &filter.root_ids {
            query = query.filter(payment::Column::RentalId.is_in(roots.clone()));
        }
        query
            .order_by_asc(payment::Column::Date)
            .order_by_asc(payment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }
}
