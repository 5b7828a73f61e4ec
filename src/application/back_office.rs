//! Back-office facade
//!
//! The programmatic surface used by the CLI and any outer adapter: resolves
//! request contexts and runs the read engines with slow-call logging.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::billing::{BalanceEngine, GroupStatement};
use super::catalog::Catalog;
use super::context::{RequestContext, ScopeResolver};
use super::dashboard::{CityAnalyticsEngine, CityAnalyticsPayload, DashboardAggregator, DashboardPayload};
use super::reconcile::{ReconcileReport, StatusReconciler};
use super::services::{PartnerService, PaymentService, RentalService, RepairService};
use super::settlement::{SettlementEngine, SettlementRow};
use crate::config::AppConfig;
use crate::domain::access::{CityScope, EntityKind, Principal};
use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::errors::InfraError;
use crate::shared::Calendar;

/// Record call latency and flag calls slower than the configured limit.
fn record_call(op: &'static str, elapsed: Duration, slow_after: Duration) {
    metrics::histogram!("back_office_call_seconds", "op" => op).record(elapsed.as_secs_f64());
    if elapsed > slow_after {
        metrics::counter!("back_office_slow_calls_total", "op" => op).increment(1);
        warn!(op, elapsed_ms = elapsed.as_millis() as u64, "Slow back-office call");
    } else {
        debug!(op, elapsed_ms = elapsed.as_millis() as u64, "Back-office call");
    }
}

pub struct BackOffice {
    repos: Arc<dyn RepositoryProvider>,
    moderator_allowed: BTreeSet<EntityKind>,
    settlement_cutoff: Option<NaiveDate>,
    slow_after: Duration,
    balances: BalanceEngine,
    dashboard: DashboardAggregator,
    city_analytics: CityAnalyticsEngine,
    reconciler: StatusReconciler,
    settlement: SettlementEngine,
    catalog: Catalog,
    rentals: RentalService,
    payments: PaymentService,
    repairs: RepairService,
    partners: PartnerService,
}

impl BackOffice {
    pub fn new(repos: Arc<dyn RepositoryProvider>, config: &AppConfig) -> Result<Self, InfraError> {
        let calendar = config.calendar()?;
        Ok(Self::with_calendar(repos, calendar, config))
    }

    pub fn with_calendar(
        repos: Arc<dyn RepositoryProvider>,
        calendar: Calendar,
        config: &AppConfig,
    ) -> Self {
        Self {
            moderator_allowed: config.access.moderator_allowed_entities.clone(),
            settlement_cutoff: config.settlement.cutoff_date,
            slow_after: Duration::from_millis(config.logging.slow_request_ms),
            balances: BalanceEngine::new(repos.clone(), calendar),
            dashboard: DashboardAggregator::new(repos.clone(), calendar),
            city_analytics: CityAnalyticsEngine::new(repos.clone(), calendar),
            reconciler: StatusReconciler::new(repos.clone()),
            settlement: SettlementEngine::new(repos.clone(), calendar),
            catalog: Catalog::new(repos.clone()),
            rentals: RentalService::new(repos.clone()),
            payments: PaymentService::new(repos.clone()),
            repairs: RepairService::new(repos.clone()),
            partners: PartnerService::new(repos.clone()),
            repos,
        }
    }

    /// Resolve the principal's scope with `now` pinned to the current time.
    pub async fn context(&self, principal: Principal) -> DomainResult<RequestContext> {
        self.context_at(principal, Utc::now()).await
    }

    pub async fn context_at(
        &self,
        principal: Principal,
        now: DateTime<Utc>,
    ) -> DomainResult<RequestContext> {
        ScopeResolver::new(self.repos.as_ref(), &self.moderator_allowed)
            .resolve(principal, now)
            .await
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn rentals(&self) -> &RentalService {
        &self.rentals
    }

    pub fn payments(&self) -> &PaymentService {
        &self.payments
    }

    pub fn repairs(&self) -> &RepairService {
        &self.repairs
    }

    pub fn partners(&self) -> &PartnerService {
        &self.partners
    }

    pub async fn dashboard(&self, ctx: &RequestContext) -> DomainResult<DashboardPayload> {
        self.timed("dashboard", self.dashboard.build(ctx)).await
    }

    pub async fn city_analytics(&self, ctx: &RequestContext) -> DomainResult<CityAnalyticsPayload> {
        self.timed("city_analytics", self.city_analytics.build(ctx)).await
    }

    pub async fn group_balance(
        &self,
        ctx: &RequestContext,
        rental_id: i32,
        until: Option<DateTime<Utc>>,
    ) -> DomainResult<Decimal> {
        self.timed("group_balance", self.balances.group_balance(ctx, rental_id, until))
            .await
    }

    pub async fn statement(
        &self,
        ctx: &RequestContext,
        rental_id: i32,
        until: Option<DateTime<Utc>>,
    ) -> DomainResult<GroupStatement> {
        self.timed("statement", self.balances.statement(ctx, rental_id, until))
            .await
    }

    /// Reconcile stored battery statuses; `None` covers every city.
    pub async fn reconcile_battery_status(
        &self,
        scope: Option<&CityScope>,
        dry_run: bool,
    ) -> DomainResult<ReconcileReport> {
        let scope = scope.unwrap_or(&CityScope::Unrestricted);
        self.timed("reconcile", self.reconciler.run(scope, Utc::now(), dry_run))
            .await
    }

    /// Moderator settlement. Without an explicit cutoff the configured one
    /// applies.
    pub async fn settlement(
        &self,
        ctx: &RequestContext,
        cutoff: Option<NaiveDate>,
    ) -> DomainResult<Vec<SettlementRow>> {
        let cutoff = cutoff.or(self.settlement_cutoff);
        self.timed("settlement", self.settlement.settle(ctx, cutoff))
            .await
    }

    async fn timed<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = DomainResult<T>>,
    ) -> DomainResult<T> {
        let start = Instant::now();
        let result = call.await;
        record_call(op, start.elapsed(), self.slow_after);
        if let Err(e) = &result {
            metrics::counter!("back_office_errors_total", "op" => op).increment(1);
            debug!(op, error = %e, "Back-office call failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::application::fixtures::{date, Fixture};
    use crate::domain::battery::{BatteryRepository, BatteryStatus};
    use crate::domain::payment::PaymentType;

    fn office(fx: &Fixture, config: &AppConfig) -> BackOffice {
        BackOffice::with_calendar(fx.repos(), fx.calendar, config)
    }

    #[tokio::test]
    async fn group_balance_through_resolved_context() {
        let fx = Fixture::new();
        let city = fx.city("Kraków", "KRK").await;
        let client = fx.client("Jan", Some(city.id)).await;
        let battery = fx.battery("K1", Some(city.id)).await;
        let (start, end) = (fx.at(3, 1, 0, 0), fx.at(3, 8, 0, 0));
        let rental = fx.rental(&client, start, Some(end), dec!(700)).await;
        fx.assign(rental.id, battery.id, start, Some(end)).await;
        fx.pay(rental.id, dec!(500), date(3, 1), PaymentType::Rent, None).await;
        let root = fx.user("root", true).await;
        let office = office(&fx, &AppConfig::default());

        let ctx = office.context(root.principal()).await.unwrap();
        let balance = office.group_balance(&ctx, rental.id, None).await.unwrap();
        assert_eq!(balance, dec!(200));
    }

    #[tokio::test]
    async fn moderator_whitelist_comes_from_config() {
        let fx = Fixture::new();
        let city = fx.city("Kraków", "KRK").await;
        let user = fx.user("anna", false).await;
        fx.moderator(&user, city.id).await;
        let mut config = AppConfig::default();
        config.access.moderator_allowed_entities = [EntityKind::Rental].into_iter().collect();
        let office = office(&fx, &config);

        let ctx = office.context(user.principal()).await.unwrap();
        assert!(ctx.can_list(EntityKind::Rental));
        assert!(!ctx.can_list(EntityKind::Dashboard));
        let payload = office.dashboard(&ctx).await.unwrap();
        assert_eq!(payload.totals.active_rentals, 0);
    }

    #[tokio::test]
    async fn reconcile_defaults_to_every_city() {
        let fx = Fixture::new();
        let city = fx.city("Kraków", "KRK").await;
        let battery = fx.battery("B1", Some(city.id)).await;
        fx.store.force_battery_status(battery.id, BatteryStatus::Rented);
        let office = office(&fx, &AppConfig::default());

        let report = office.reconcile_battery_status(None, false).await.unwrap();
        assert_eq!(report.fixed_to_available, vec!["B1".to_string()]);
        let stored = BatteryRepository::find_by_id(&*fx.store, battery.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, BatteryStatus::Available);
    }

    #[tokio::test]
    async fn settlement_uses_configured_cutoff() {
        let fx = Fixture::new();
        let city = fx.city("Kraków", "KRK").await;
        let user = fx.user("anna", false).await;
        fx.moderator(&user, city.id).await;
        let client = fx.client("Jan", Some(city.id)).await;
        let rental = fx.rental(&client, fx.at(1, 1, 0, 0), None, dec!(700)).await;
        fx.pay(rental.id, dec!(300), date(1, 5), PaymentType::Rent, Some(user.id)).await;
        fx.pay(rental.id, dec!(200), date(2, 5), PaymentType::Rent, Some(user.id)).await;
        let mut config = AppConfig::default();
        config.settlement.cutoff_date = Some(date(2, 1));
        let office = office(&fx, &config);
        let ctx = RequestContext::system(fx.at(3, 1, 12, 0));

        let rows = office.settlement(&ctx, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].collected, dec!(200));
        let all = office.settlement(&ctx, Some(date(1, 1))).await.unwrap();
        assert_eq!(all[0].collected, dec!(500));
    }
}
