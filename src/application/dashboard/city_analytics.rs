//! Per-city income and utilization

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use super::dto::{CityAnalytics, CityAnalyticsPayload, SERIES_DAYS};
use crate::application::context::RequestContext;
use crate::application::reconcile::derive_statuses;
use crate::domain::access::EntityKind;
use crate::domain::battery::{BatteryFilter, BatteryStatus};
use crate::domain::payment::{PaymentFilter, PaymentType};
use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::{month_start, previous_month_start, Calendar};

pub struct CityAnalyticsEngine {
    repos: Arc<dyn RepositoryProvider>,
    calendar: Calendar,
}

impl CityAnalyticsEngine {
    pub fn new(repos: Arc<dyn RepositoryProvider>, calendar: Calendar) -> Self {
        Self { repos, calendar }
    }

    /// Analytics for every city in scope, highest 30-day income first.
    pub async fn build(&self, ctx: &RequestContext) -> DomainResult<CityAnalyticsPayload> {
        let now = ctx.now();
        let Some(scope) = ctx.list_scope(EntityKind::Dashboard) else {
            return Ok(CityAnalyticsPayload {
                generated_at: now,
                cities: Vec::new(),
            });
        };
        let repos = &*self.repos;

        let today = self.calendar.local_date(now);
        let window_start = today - Duration::days(SERIES_DAYS as i64 - 1);
        let this_month = month_start(today);
        let last_month = previous_month_start(today);

        let cities = repos.cities().list(scope).await?;
        let income = repos
            .payments()
            .list(
                &PaymentFilter::scoped(scope.clone())
                    .with_types(&PaymentType::COLLECTED)
                    .between(Some(window_start.min(last_month)), None),
            )
            .await?;
        let batteries = repos
            .batteries()
            .list(&BatteryFilter::scoped(scope.clone()))
            .await?;
        let active_now = repos.assignments().active_at(now, scope).await?;
        let repairs = repos.repairs().open_repairs(scope).await?;
        let active = repos.rentals().active(scope).await?;
        let derived = derive_statuses(&batteries, &active_now, &repairs, now);

        let mut rows: Vec<CityAnalytics> = cities
            .iter()
            .map(|city| {
                let here = Some(city.id);
                let payments: Vec<_> = income.iter().filter(|p| p.city_id == here).collect();

                let recent: Vec<Decimal> = payments
                    .iter()
                    .filter(|p| p.date >= window_start)
                    .map(|p| p.amount)
                    .collect();
                let income_30d: Decimal = recent.iter().copied().sum();
                let income_this_month: Decimal = payments
                    .iter()
                    .filter(|p| p.date >= this_month)
                    .map(|p| p.amount)
                    .sum();
                let income_last_month: Decimal = payments
                    .iter()
                    .filter(|p| p.date >= last_month && p.date < this_month)
                    .map(|p| p.amount)
                    .sum();

                let fleet: Vec<BatteryStatus> = batteries
                    .iter()
                    .filter(|b| b.city_id == here)
                    .filter_map(|b| derived.get(&b.id).copied())
                    .filter(|s| *s != BatteryStatus::Sold)
                    .collect();
                let rented = fleet.iter().filter(|s| **s == BatteryStatus::Rented).count();

                let active_clients: HashSet<i32> = active
                    .iter()
                    .filter(|r| r.city_id == here)
                    .map(|r| r.client_id)
                    .collect();

                CityAnalytics {
                    city_id: city.id,
                    name: city.name.clone(),
                    code: city.code.clone(),
                    income_30d,
                    income_this_month,
                    income_last_month,
                    growth_percent: growth_percent(income_this_month, income_last_month),
                    utilization_percent: percent(rented, fleet.len()),
                    active_clients: active_clients.len(),
                    avg_payment: average(income_30d, recent.len()),
                }
            })
            .collect();
        rows.sort_by(|a, b| b.income_30d.cmp(&a.income_30d).then(a.name.cmp(&b.name)));

        Ok(CityAnalyticsPayload {
            generated_at: now,
            cities: rows,
        })
    }
}

/// `(current − previous) / previous × 100`, one decimal place.
pub fn growth_percent(current: Decimal, previous: Decimal) -> Option<Decimal> {
    if previous.is_zero() {
        return None;
    }
    Some(((current - previous) / previous * Decimal::ONE_HUNDRED).round_dp(1))
}

fn percent(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) / Decimal::from(whole) * Decimal::ONE_HUNDRED).round_dp(1)
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (total / Decimal::from(count)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;

    use crate::application::fixtures::{date, Fixture};
    use crate::domain::access::{CityScope, Principal};

    fn ctx(scope: CityScope, now: DateTime<Utc>) -> RequestContext {
        RequestContext::new(
            Principal::new(1, "owner", false),
            now,
            scope,
            false,
            EntityKind::moderator_default(),
        )
    }

    #[test]
    fn growth_handles_empty_previous_month() {
        assert_eq!(growth_percent(dec!(150), dec!(100)), Some(dec!(50.0)));
        assert_eq!(growth_percent(dec!(50), dec!(100)), Some(dec!(-50.0)));
        assert_eq!(growth_percent(dec!(50), Decimal::ZERO), None);
    }

    #[tokio::test]
    async fn per_city_figures() {
        let fx = Fixture::new();
        let poz = fx.city("Poznań", "POZ").await;
        let waw = fx.city("Warszawa", "WAW").await;

        let ada = fx.client("Ada", Some(poz.id)).await;
        let b1 = fx.battery("P1", Some(poz.id)).await;
        fx.battery("P2", Some(poz.id)).await;
        let start = fx.at(2, 1, 0, 0);
        let rental = fx.rental(&ada, start, None, dec!(700)).await;
        fx.assign(rental.id, b1.id, start, None).await;
        fx.pay(rental.id, dec!(100), date(2, 20), PaymentType::Rent, None).await;
        fx.pay(rental.id, dec!(200), date(3, 5), PaymentType::Rent, None).await;
        fx.pay(rental.id, dec!(100), date(3, 6), PaymentType::Sold, None).await;
        fx.pay(rental.id, dec!(500), date(3, 6), PaymentType::Deposit, None).await;

        let bo = fx.client("Bo", Some(waw.id)).await;
        let other = fx.rental(&bo, start, None, dec!(70)).await;
        fx.pay(other.id, dec!(1000), date(3, 1), PaymentType::Rent, None).await;

        let now = fx.at(3, 12, 12, 0);
        let engine = CityAnalyticsEngine::new(fx.repos(), fx.calendar);

        let all = engine
            .build(&ctx(CityScope::multi([poz.id, waw.id]), now))
            .await
            .unwrap();
        assert_eq!(all.cities.len(), 2);
        assert_eq!(all.cities[0].code, "WAW");

        let only_poz = engine
            .build(&ctx(CityScope::Single(poz.id), now))
            .await
            .unwrap();
        assert_eq!(only_poz.cities.len(), 1);
        let row = &only_poz.cities[0];
        assert_eq!(row.income_30d, dec!(400));
        assert_eq!(row.income_this_month, dec!(300));
        assert_eq!(row.income_last_month, dec!(100));
        assert_eq!(row.growth_percent, Some(dec!(200.0)));
        assert_eq!(row.utilization_percent, dec!(50.0));
        assert_eq!(row.active_clients, 1);
        assert_eq!(row.avg_payment, dec!(133.33));
    }

    #[tokio::test]
    async fn empty_scope_has_no_cities() {
        let fx = Fixture::new();
        fx.city("Poznań", "POZ").await;
        let payload = CityAnalyticsEngine::new(fx.repos(), fx.calendar)
            .build(&ctx(CityScope::Empty, fx.at(3, 1, 0, 0)))
            .await
            .unwrap();
        assert!(payload.cities.is_empty());
    }
}
