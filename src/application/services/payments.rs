//! Payment service

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::application::context::RequestContext;
use crate::domain::access::EntityKind;
use crate::domain::payment::{NewPayment, Payment, PaymentMethod, PaymentType};
use crate::domain::rental::Rental;
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

/// Payment as entered by an operator.
#[derive(Debug, Clone)]
pub struct PaymentInput {
    /// Any version of the contract; the store re-parents to the root.
    pub rental_id: i32,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub note: String,
}

pub struct PaymentService {
    repos: Arc<dyn RepositoryProvider>,
}

impl PaymentService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Record a payment on behalf of the principal.
    ///
    /// The rental must be inside the caller's scope; payments for other
    /// cities are refused as not found.
    pub async fn record(&self, ctx: &RequestContext, input: PaymentInput) -> DomainResult<Payment> {
        ctx.ensure_detail(EntityKind::Payment)?;
        let rental = self.visible_rental(ctx, input.rental_id).await?;
        let payment = self
            .repos
            .payments()
            .create(NewPayment {
                rental_id: rental.id,
                amount: input.amount,
                date: input.date,
                payment_type: input.payment_type,
                method: input.method,
                note: input.note,
                created_by: Some(ctx.principal().user_id),
                city_id: rental.city_id,
            })
            .await?;
        info!(
            payment_id = payment.id,
            root_id = payment.rental_id,
            amount = %payment.amount,
            payment_type = %payment.payment_type,
            user_id = ctx.principal().user_id,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Move a payment to the group holding `rental_id`.
    pub async fn reassign(
        &self,
        ctx: &RequestContext,
        payment_id: i32,
        rental_id: i32,
    ) -> DomainResult<Payment> {
        ctx.ensure_detail(EntityKind::Payment)?;
        let payment = self
            .repos
            .payments()
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", payment_id))?;
        ctx.ensure_visible("Payment", payment.id, payment.city_id)?;
        let target = self.visible_rental(ctx, rental_id).await?;

        let moved = self.repos.payments().reassign(payment.id, target.id).await?;
        info!(
            payment_id,
            from_root = payment.rental_id,
            to_root = moved.rental_id,
            "Payment reassigned"
        );
        Ok(moved)
    }

    async fn visible_rental(&self, ctx: &RequestContext, rental_id: i32) -> DomainResult<Rental> {
        let rental = self
            .repos
            .rentals()
            .find_by_id(rental_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Rental", rental_id))?;
        ctx.ensure_visible("Rental", rental.id, rental.city_id)?;
        Ok(rental)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;

    use crate::application::fixtures::{date, Fixture};
    use crate::domain::access::{CityScope, Principal};
    use crate::domain::payment::{PaymentFilter, PaymentRepository};
    use crate::domain::rental::{NewVersion, RentalRepository};

    fn moderator(user_id: i32, city: i32, now: DateTime<Utc>) -> RequestContext {
        RequestContext::new(
            Principal::new(user_id, "mod", false),
            now,
            CityScope::Single(city),
            true,
            EntityKind::moderator_default(),
        )
    }

    fn rent(rental_id: i32, amount: Decimal) -> PaymentInput {
        PaymentInput {
            rental_id,
            amount,
            date: date(3, 1),
            payment_type: PaymentType::Rent,
            method: PaymentMethod::Blik,
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn records_on_root_with_creator() {
        let fx = Fixture::new();
        let city = fx.city("Poznań", "POZ").await;
        let user = fx.user("marta", false).await;
        let client = fx.client("Ada", Some(city.id)).await;
        let v1 = fx.rental(&client, fx.at(2, 1, 0, 0), None, dec!(70)).await;
        let v2 = fx
            .store
            .create_successor(
                v1.id,
                NewVersion {
                    start_at: fx.at(2, 10, 0, 0),
                    end_at: None,
                    weekly_rate: dec!(140),
                    deposit_amount: Decimal::ZERO,
                },
            )
            .await
            .unwrap();

        let ctx = moderator(user.id, city.id, fx.at(3, 1, 0, 0));
        let payment = PaymentService::new(fx.repos())
            .record(&ctx, rent(v2.id, dec!(100)))
            .await
            .unwrap();
        assert_eq!(payment.rental_id, v1.id);
        assert_eq!(payment.created_by, Some(user.id));
        assert_eq!(payment.city_id, Some(city.id));
    }

    #[tokio::test]
    async fn cross_city_payment_refused() {
        let fx = Fixture::new();
        let poz = fx.city("Poznań", "POZ").await;
        let waw = fx.city("Warszawa", "WAW").await;
        let client = fx.client("Bo", Some(waw.id)).await;
        let rental = fx.rental(&client, fx.at(2, 1, 0, 0), None, dec!(70)).await;

        let ctx = moderator(77, poz.id, fx.at(3, 1, 0, 0));
        let err = PaymentService::new(fx.repos())
            .record(&ctx, rent(rental.id, dec!(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn negative_rent_rejected() {
        let fx = Fixture::new();
        let client = fx.client("Cy", None).await;
        let rental = fx.rental(&client, fx.at(2, 1, 0, 0), None, dec!(70)).await;
        let err = PaymentService::new(fx.repos())
            .record(&RequestContext::system(fx.at(3, 1, 0, 0)), rent(rental.id, dec!(-5)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn reassign_moves_between_groups() {
        let fx = Fixture::new();
        let a = fx.client("A", None).await;
        let b = fx.client("B", None).await;
        let first = fx.rental(&a, fx.at(2, 1, 0, 0), None, dec!(70)).await;
        let second = fx.rental(&b, fx.at(2, 1, 0, 0), None, dec!(70)).await;
        let ctx = RequestContext::system(fx.at(3, 1, 0, 0));
        let service = PaymentService::new(fx.repos());
        let payment = service.record(&ctx, rent(first.id, dec!(10))).await.unwrap();

        let moved = service.reassign(&ctx, payment.id, second.id).await.unwrap();
        assert_eq!(moved.rental_id, second.id);
    }

    #[tokio::test]
    async fn reassign_takes_target_city() {
        let fx = Fixture::new();
        let poz = fx.city("Poznań", "POZ").await;
        let waw = fx.city("Warszawa", "WAW").await;
        let a = fx.client("A", Some(poz.id)).await;
        let b = fx.client("B", Some(waw.id)).await;
        let first = fx.rental(&a, fx.at(2, 1, 0, 0), None, dec!(70)).await;
        let second = fx.rental(&b, fx.at(2, 1, 0, 0), None, dec!(70)).await;
        let ctx = RequestContext::system(fx.at(3, 1, 0, 0));
        let service = PaymentService::new(fx.repos());
        let payment = service.record(&ctx, rent(first.id, dec!(10))).await.unwrap();
        assert_eq!(payment.city_id, Some(poz.id));

        let moved = service.reassign(&ctx, payment.id, second.id).await.unwrap();
        assert_eq!(moved.city_id, Some(waw.id));
        let waw_payments = PaymentRepository::list(
            &*fx.store,
            &PaymentFilter::scoped(CityScope::Single(waw.id)),
        )
        .await
        .unwrap();
        assert_eq!(waw_payments.len(), 1);
    }
}
