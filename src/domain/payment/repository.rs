//! Payment repository interface

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::{NewPayment, Payment, PaymentFilter, PaymentType};
use crate::domain::DomainResult;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Payment>>;

    /// Persist a payment attached to the root of its rental's group, in one
    /// transaction with the root lookup.
    async fn create(&self, payment: NewPayment) -> DomainResult<Payment>;

    /// Move a payment to another rental version; it lands on that
    /// version's root and takes the version's city.
    async fn reassign(&self, payment_id: i32, rental_id: i32) -> DomainResult<Payment>;

    /// Payments of the given roots, keyed by root.
    async fn grouped_by_root(
        &self,
        root_ids: &[i32],
        types: Option<&[PaymentType]>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> DomainResult<HashMap<i32, Vec<Payment>>>;

    async fn list(&self, filter: &PaymentFilter) -> DomainResult<Vec<Payment>>;
}
