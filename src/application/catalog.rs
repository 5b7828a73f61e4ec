//! Scoped catalog reads
//!
//! List and detail reads for every entity kind. Listings of a kind outside
//! the caller's reach come back empty; detail reads of such kinds fail with
//! `ScopeDenied`, and entities outside the caller's cities are reported as
//! not found.

use std::sync::Arc;

use crate::application::context::RequestContext;
use crate::domain::access::{CityPath, CityScope, EntityKind};
use crate::domain::battery::{Battery, BatteryFilter, StatusLogEntry};
use crate::domain::city::City;
use crate::domain::client::Client;
use crate::domain::finance::{
    Expense, ExpenseFilter, FinancePartner, MoneyTransfer, PartnerFilter, TransferFilter,
};
use crate::domain::payment::{Payment, PaymentFilter};
use crate::domain::rental::{Assignment, Rental};
use crate::domain::repair::Repair;
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

pub struct Catalog {
    repos: Arc<dyn RepositoryProvider>,
}

impl Catalog {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    // ── Cities ──

    pub async fn cities(&self, ctx: &RequestContext) -> DomainResult<Vec<City>> {
        match ctx.list_scope(EntityKind::City) {
            Some(scope) => self.repos.cities().list(scope).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn city(&self, ctx: &RequestContext, id: i32) -> DomainResult<City> {
        ctx.ensure_detail(EntityKind::City)?;
        let city = self
            .repos
            .cities()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("City", id))?;
        ctx.ensure_visible("City", id, Some(city.id))?;
        Ok(city)
    }

    // ── Clients ──

    pub async fn clients(&self, ctx: &RequestContext) -> DomainResult<Vec<Client>> {
        match ctx.list_scope(EntityKind::Client) {
            Some(scope) => self.repos.clients().list(scope).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn client(&self, ctx: &RequestContext, id: i32) -> DomainResult<Client> {
        ctx.ensure_detail(EntityKind::Client)?;
        let client = self
            .repos
            .clients()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Client", id))?;
        ctx.ensure_visible("Client", id, client.city_id)?;
        Ok(client)
    }

    // ── Batteries ──

    pub async fn batteries(&self, ctx: &RequestContext) -> DomainResult<Vec<Battery>> {
        match ctx.list_scope(EntityKind::Battery) {
            Some(scope) => {
                self.repos
                    .batteries()
                    .list(&BatteryFilter::scoped(scope.clone()))
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn battery(&self, ctx: &RequestContext, id: i32) -> DomainResult<Battery> {
        ctx.ensure_detail(EntityKind::Battery)?;
        self.visible_battery(ctx, "Battery", id).await
    }

    /// Status history, optionally of one battery.
    pub async fn status_log(
        &self,
        ctx: &RequestContext,
        battery_id: Option<i32>,
    ) -> DomainResult<Vec<StatusLogEntry>> {
        match ctx.list_scope(EntityKind::StatusLog) {
            Some(scope) => self.repos.status_log().list(battery_id, scope).await,
            None => Ok(Vec::new()),
        }
    }

    // ── Rentals ──

    pub async fn rentals(&self, ctx: &RequestContext) -> DomainResult<Vec<Rental>> {
        match ctx.list_scope(EntityKind::Rental) {
            Some(scope) => self.repos.rentals().list(scope).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn rental(&self, ctx: &RequestContext, id: i32) -> DomainResult<Rental> {
        ctx.ensure_detail(EntityKind::Rental)?;
        self.visible_rental(ctx, "Rental", id).await
    }

    pub async fn assignments(&self, ctx: &RequestContext) -> DomainResult<Vec<Assignment>> {
        match ctx.list_scope(EntityKind::Assignment) {
            Some(scope) => self.repos.assignments().list(scope).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn assignment(&self, ctx: &RequestContext, id: i32) -> DomainResult<Assignment> {
        ctx.ensure_detail(EntityKind::Assignment)?;
        let assignment = self
            .repos
            .assignments()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Assignment", id))?;
        let city = self
            .linked_city(EntityKind::Assignment, assignment.rental_id)
            .await?;
        ctx.ensure_visible("Assignment", id, city)?;
        Ok(assignment)
    }

    // ── Payments ──

    pub async fn payments(&self, ctx: &RequestContext) -> DomainResult<Vec<Payment>> {
        match ctx.list_scope(EntityKind::Payment) {
            Some(scope) => {
                self.repos
                    .payments()
                    .list(&PaymentFilter::scoped(scope.clone()))
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn payment(&self, ctx: &RequestContext, id: i32) -> DomainResult<Payment> {
        ctx.ensure_detail(EntityKind::Payment)?;
        let payment = self
            .repos
            .payments()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", id))?;
        ctx.ensure_visible("Payment", id, payment.city_id)?;
        Ok(payment)
    }

    // ── Repairs ──

    pub async fn repairs(&self, ctx: &RequestContext) -> DomainResult<Vec<Repair>> {
        match ctx.list_scope(EntityKind::Repair) {
            Some(scope) => self.repos.repairs().list(scope).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn repair(&self, ctx: &RequestContext, id: i32) -> DomainResult<Repair> {
        ctx.ensure_detail(EntityKind::Repair)?;
        let repair = self
            .repos
            .repairs()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Repair", id))?;
        let city = self.linked_city(EntityKind::Repair, repair.battery_id).await?;
        ctx.ensure_visible("Repair", id, city)?;
        Ok(repair)
    }

    // ── Finance ──

    pub async fn partners(&self, ctx: &RequestContext) -> DomainResult<Vec<FinancePartner>> {
        match ctx.list_scope(EntityKind::FinancePartner) {
            Some(scope) => self.partners_in(scope).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn partner(&self, ctx: &RequestContext, id: i32) -> DomainResult<FinancePartner> {
        ctx.ensure_detail(EntityKind::FinancePartner)?;
        self.repos
            .finance()
            .partner_by_id(id)
            .await?
            .filter(|p| p.in_scope(ctx.scope()))
            .ok_or_else(|| DomainError::not_found("FinancePartner", id))
    }

    /// Transfers sent by partners inside the scope.
    pub async fn transfers(&self, ctx: &RequestContext) -> DomainResult<Vec<MoneyTransfer>> {
        let Some(scope) = ctx.list_scope(EntityKind::MoneyTransfer) else {
            return Ok(Vec::new());
        };
        let filter = TransferFilter {
            from_partner_ids: self.partner_ids(scope).await?,
            ..TransferFilter::default()
        };
        self.repos.finance().transfers(&filter).await
    }

    pub async fn transfer(&self, ctx: &RequestContext, id: i32) -> DomainResult<MoneyTransfer> {
        ctx.ensure_detail(EntityKind::MoneyTransfer)?;
        let filter = TransferFilter {
            from_partner_ids: self.partner_ids(ctx.scope()).await?,
            ..TransferFilter::default()
        };
        self.repos
            .finance()
            .transfers(&filter)
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| DomainError::not_found("MoneyTransfer", id))
    }

    /// Expenses paid by partners inside the scope.
    pub async fn expenses(&self, ctx: &RequestContext) -> DomainResult<Vec<Expense>> {
        let Some(scope) = ctx.list_scope(EntityKind::Expense) else {
            return Ok(Vec::new());
        };
        let filter = ExpenseFilter {
            paid_by_partner_ids: self.partner_ids(scope).await?,
            ..ExpenseFilter::default()
        };
        self.repos.finance().expenses(&filter).await
    }

    pub async fn expense(&self, ctx: &RequestContext, id: i32) -> DomainResult<Expense> {
        ctx.ensure_detail(EntityKind::Expense)?;
        let filter = ExpenseFilter {
            paid_by_partner_ids: self.partner_ids(ctx.scope()).await?,
            ..ExpenseFilter::default()
        };
        self.repos
            .finance()
            .expenses(&filter)
            .await?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| DomainError::not_found("Expense", id))
    }

    // ── Helpers ──

    async fn partners_in(&self, scope: &CityScope) -> DomainResult<Vec<FinancePartner>> {
        self.repos
            .finance()
            .partners(&PartnerFilter {
                scope: scope.clone(),
                role: None,
                active_only: false,
            })
            .await
    }

    /// `None` for an unrestricted scope, else the ids of partners in it.
    async fn partner_ids(&self, scope: &CityScope) -> DomainResult<Option<Vec<i32>>> {
        if scope.is_unrestricted() {
            return Ok(None);
        }
        let partners = self.partners_in(scope).await?;
        Ok(Some(partners.into_iter().map(|p| p.id).collect()))
    }

    /// City of an entity that reaches it through one foreign key.
    async fn linked_city(&self, kind: EntityKind, fk: i32) -> DomainResult<Option<i32>> {
        match kind.city_path() {
            CityPath::Via(EntityKind::Rental) => Ok(self
                .repos
                .rentals()
                .find_by_id(fk)
                .await?
                .and_then(|r| r.city_id)),
            CityPath::Via(EntityKind::Battery) => Ok(self
                .repos
                .batteries()
                .find_by_id(fk)
                .await?
                .and_then(|b| b.city_id)),
            path => Err(DomainError::InvariantViolation(format!(
                "{} has no single-city path ({})",
                kind,
                path.field_path()
            ))),
        }
    }

    async fn visible_battery(
        &self,
        ctx: &RequestContext,
        entity: &'static str,
        id: i32,
    ) -> DomainResult<Battery> {
        let battery = self
            .repos
            .batteries()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(entity, id))?;
        ctx.ensure_visible(entity, id, battery.city_id)?;
        Ok(battery)
    }

    async fn visible_rental(
        &self,
        ctx: &RequestContext,
        entity: &'static str,
        id: i32,
    ) -> DomainResult<Rental> {
        let rental = self
            .repos
            .rentals()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(entity, id))?;
        ctx.ensure_visible(entity, id, rental.city_id)?;
        Ok(rental)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use crate::application::fixtures::{date, Fixture};
    use crate::domain::access::Principal;
    use crate::domain::battery::{LogSource, StatusLogRepository};
    use crate::domain::finance::{
        ExpensePaymentType, FinanceRepository, NewMoneyTransfer, TransferPurpose,
    };
    use crate::domain::payment::PaymentType;

    fn moderator_ctx(city: i32) -> RequestContext {
        RequestContext::new(
            Principal::new(50, "mod", false),
            Utc::now(),
            CityScope::Single(city),
            true,
            EntityKind::moderator_default(),
        )
    }

    fn owner_ctx(cities: &[i32]) -> RequestContext {
        RequestContext::new(
            Principal::new(60, "owner", false),
            Utc::now(),
            CityScope::multi(cities.iter().copied()),
            false,
            EntityKind::moderator_default(),
        )
    }

    #[tokio::test]
    async fn moderator_whitelist_applies_to_lists_and_details() {
        let fx = Fixture::new();
        let krk = fx.city("Kraków", "KRK").await;
        let battery = fx.battery("B1", Some(krk.id)).await;
        let client = fx.client("Jan", Some(krk.id)).await;
        let catalog = Catalog::new(fx.repos());
        let ctx = moderator_ctx(krk.id);

        assert!(catalog.batteries(&ctx).await.unwrap().is_empty());
        assert!(matches!(
            catalog.battery(&ctx, battery.id).await,
            Err(DomainError::ScopeDenied(_))
        ));
        assert_eq!(catalog.clients(&ctx).await.unwrap(), vec![client.clone()]);
        assert_eq!(catalog.client(&ctx, client.id).await.unwrap(), client);
    }

    #[tokio::test]
    async fn other_city_reads_as_not_found() {
        let fx = Fixture::new();
        let krk = fx.city("Kraków", "KRK").await;
        let gdn = fx.city("Gdańsk", "GDN").await;
        let client = fx.client("Jan", Some(gdn.id)).await;
        let rental = fx
            .rental(&client, fx.at(3, 1, 0, 0), None, dec!(700))
            .await;
        let payment = fx
            .pay(rental.id, dec!(100), date(3, 1), PaymentType::Rent, None)
            .await;
        let catalog = Catalog::new(fx.repos());
        let ctx = moderator_ctx(krk.id);

        assert!(catalog.rentals(&ctx).await.unwrap().is_empty());
        assert!(matches!(
            catalog.rental(&ctx, rental.id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            catalog.payment(&ctx, payment.id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert_eq!(catalog.rentals(&moderator_ctx(gdn.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_scope_lists_nothing_and_denies_details() {
        let fx = Fixture::new();
        let city = fx.city("Kraków", "KRK").await;
        let client = fx.client("Jan", Some(city.id)).await;
        let ctx = RequestContext::new(
            Principal::new(70, "nobody", false),
            Utc::now(),
            CityScope::Empty,
            false,
            EntityKind::moderator_default(),
        );
        let catalog = Catalog::new(fx.repos());

        assert!(catalog.clients(&ctx).await.unwrap().is_empty());
        assert!(catalog.cities(&ctx).await.unwrap().is_empty());
        assert!(matches!(
            catalog.client(&ctx, client.id).await,
            Err(DomainError::ScopeDenied(_))
        ));
    }

    #[tokio::test]
    async fn finance_reads_follow_partner_cities() {
        let fx = Fixture::new();
        let krk = fx.city("Kraków", "KRK").await;
        let gdn = fx.city("Gdańsk", "GDN").await;
        let krk_mod = fx.moderator(&fx.user("anna", false).await, krk.id).await;
        let gdn_mod = fx.moderator(&fx.user("ewa", false).await, gdn.id).await;
        let owner = fx.owner(&fx.user("olga", false).await, &[krk.id, gdn.id]).await;
        for from in [krk_mod.id, gdn_mod.id] {
            fx.store
                .insert_transfer(NewMoneyTransfer {
                    from_partner_id: from,
                    to_partner_id: owner.id,
                    amount: dec!(100),
                    date: date(3, 3),
                    purpose: TransferPurpose::ModeratorToOwner,
                    use_collected: true,
                })
                .await
                .unwrap();
        }
        let expense = fx.store.insert_expense(Expense {
            id: 0,
            amount: dec!(40),
            date: date(3, 4),
            category_id: None,
            payment_type: ExpensePaymentType::Purchase,
            paid_by_partner_id: Some(gdn_mod.id),
            note: "tape".into(),
        });
        let catalog = Catalog::new(fx.repos());

        let krakow = owner_ctx(&[krk.id]);
        let partners = catalog.partners(&krakow).await.unwrap();
        assert!(partners.iter().any(|p| p.id == krk_mod.id));
        assert!(partners.iter().all(|p| p.id != gdn_mod.id));
        let transfers = catalog.transfers(&krakow).await.unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].from_partner_id, krk_mod.id);
        assert!(catalog.expenses(&krakow).await.unwrap().is_empty());
        assert!(catalog.expense(&krakow, expense.id).await.is_err());

        let both = owner_ctx(&[krk.id, gdn.id]);
        assert_eq!(catalog.transfers(&both).await.unwrap().len(), 2);
        assert_eq!(catalog.expense(&both, expense.id).await.unwrap(), expense);
        assert!(catalog.partner(&krakow, gdn_mod.id).await.is_err());
    }

    #[tokio::test]
    async fn status_log_uses_battery_scope() {
        let fx = Fixture::new();
        let krk = fx.city("Kraków", "KRK").await;
        let gdn = fx.city("Gdańsk", "GDN").await;
        let client = fx.client("Jan", Some(krk.id)).await;
        let rental = fx
            .rental(&client, fx.at(3, 1, 0, 0), None, dec!(700))
            .await;
        let here = fx.battery("B1", Some(krk.id)).await;
        let there = fx.battery("B2", Some(gdn.id)).await;
        for battery in [&here, &there] {
            StatusLogRepository::upsert(
                &*fx.store,
                battery.id,
                LogSource::Rental(rental.id),
                fx.at(3, 1, 0, 0),
                None,
            )
            .await
            .unwrap();
        }
        let catalog = Catalog::new(fx.repos());

        let log = catalog.status_log(&owner_ctx(&[krk.id]), None).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].battery_id, here.id);
        assert!(catalog
            .status_log(&moderator_ctx(krk.id), None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn linked_details_follow_parent_city() {
        let fx = Fixture::new();
        let krk = fx.city("Kraków", "KRK").await;
        let gdn = fx.city("Gdańsk", "GDN").await;
        let client = fx.client("Jan", Some(gdn.id)).await;
        let rental = fx
            .rental(&client, fx.at(3, 1, 0, 0), None, dec!(700))
            .await;
        let battery = fx.battery("B1", Some(gdn.id)).await;
        let assignment = fx
            .assign(rental.id, battery.id, fx.at(3, 1, 0, 0), None)
            .await;
        let catalog = Catalog::new(fx.repos());

        assert!(matches!(
            catalog.assignment(&owner_ctx(&[krk.id]), assignment.id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert_eq!(
            catalog
                .assignment(&owner_ctx(&[gdn.id]), assignment.id)
                .await
                .unwrap(),
            assignment
        );
    }
}
