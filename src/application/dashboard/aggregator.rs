//! Dashboard aggregator
//!
//! Every store read happens up front, once per request; the rest is pure
//! folding over preloaded rows. The number of store calls does not depend on
//! how many rentals, assignments or days are involved.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use super::dto::*;
use crate::application::billing::{balances_of, clip, GroupBalance, BALANCE_PAYMENT_TYPES};
use crate::application::context::RequestContext;
use crate::application::reconcile::derive_statuses;
use crate::domain::access::{CityScope, EntityKind};
use crate::domain::battery::{Battery, BatteryFilter, BatteryStatus};
use crate::domain::city::City;
use crate::domain::client::Client;
use crate::domain::payment::{Payment, PaymentFilter, PaymentType};
use crate::domain::rental::{Rental, ScopedAssignment};
use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::Calendar;

pub struct DashboardAggregator {
    repos: Arc<dyn RepositoryProvider>,
    calendar: Calendar,
}

impl DashboardAggregator {
    pub fn new(repos: Arc<dyn RepositoryProvider>, calendar: Calendar) -> Self {
        Self { repos, calendar }
    }

    pub async fn build(&self, ctx: &RequestContext) -> DomainResult<DashboardPayload> {
        let now = ctx.now();
        let today = self.calendar.local_date(now);
        let Some(scope) = ctx.list_scope(EntityKind::Dashboard) else {
            return Ok(DashboardPayload::empty(now, today));
        };
        let repos = &*self.repos;

        // Roster and balances
        let active = repos.rentals().active(scope).await?;
        let roster_rentals = latest_per_client(&active);
        let client_ids: Vec<i32> = roster_rentals.iter().map(|r| r.client_id).collect();
        let clients: HashMap<i32, Client> = repos
            .clients()
            .find_by_ids(&client_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let roots: Vec<i32> = roster_rentals.iter().map(|r| r.root()).collect();
        let groups = repos.rentals().groups_by_root_ids(&roots).await?;
        let balance_payments = repos
            .payments()
            .grouped_by_root(&roots, Some(&BALANCE_PAYMENT_TYPES[..]), None)
            .await?;
        let balances = balances_of(&groups, &balance_payments, &self.calendar, None, now);

        // Battery pool
        let batteries = repos
            .batteries()
            .list(&BatteryFilter::scoped(scope.clone()))
            .await?;
        // Batteries of this scope may sit under a rental or repair recorded
        // elsewhere; derived statuses cover only the scoped batteries.
        let active_now = repos
            .assignments()
            .active_at(now, &CityScope::Unrestricted)
            .await?;
        let repairs = repos
            .repairs()
            .open_repairs(&CityScope::Unrestricted)
            .await?;
        let derived = derive_statuses(&batteries, &active_now, &repairs, now);

        // Daily series
        let mut series = DailySeries::zeros(today);
        let window_start = self.calendar.midnight(series.first_day().unwrap_or(today));
        let window = repos
            .assignments()
            .intersecting(window_start, now, scope)
            .await?;
        fill_charged(&mut series, &window, &self.calendar, window_start, now);

        let income = repos
            .payments()
            .list(&PaymentFilter::scoped(scope.clone()).with_types(&PaymentType::COLLECTED))
            .await?;
        fill_paid(&mut series, &income);

        let user_ids: Vec<i32> = income
            .iter()
            .filter_map(|p| p.created_by)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let usernames: HashMap<i32, String> = repos
            .users()
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let cities = if ctx.is_superuser() {
            let cities = repos.cities().list(scope).await?;
            Some(city_breakdown(
                &cities,
                &active,
                &batteries,
                &derived,
                &income,
                series.first_day().unwrap_or(today),
            ))
        } else {
            None
        };

        let roster = build_roster(&roster_rentals, &clients, &balances, &active_now, &batteries);
        let top_debtors = top_debtors(&roster);
        let totals = DashboardTotals {
            active_rentals: active.len(),
            outstanding: roster
                .iter()
                .map(|e| e.balance)
                .filter(|b| *b > Decimal::ZERO)
                .sum(),
            deposits_held: roster.iter().map(|e| e.deposit).sum(),
            income_30d: series.total_paid(),
        };

        debug!(
            roster = roster.len(),
            batteries = batteries.len(),
            window_assignments = window.len(),
            "Dashboard built"
        );

        Ok(DashboardPayload {
            generated_at: now,
            totals,
            roster,
            battery_pool: battery_pool(&derived),
            series,
            monthly: monthly_rollup(&income, &usernames),
            top_debtors,
            cities,
        })
    }
}

/// One active rental per client: the most recently started.
pub fn latest_per_client(active: &[Rental]) -> Vec<Rental> {
    let mut latest: BTreeMap<i32, &Rental> = BTreeMap::new();
    for rental in active {
        latest
            .entry(rental.client_id)
            .and_modify(|current| {
                if (rental.start_at, rental.id) > (current.start_at, current.id) {
                    *current = rental;
                }
            })
            .or_insert(rental);
    }
    latest.into_values().cloned().collect()
}

fn build_roster(
    rentals: &[Rental],
    clients: &HashMap<i32, Client>,
    balances: &HashMap<i32, GroupBalance>,
    active_now: &[ScopedAssignment],
    batteries: &[Battery],
) -> Vec<RosterEntry> {
    let codes: HashMap<i32, &str> = batteries
        .iter()
        .map(|b| (b.id, b.short_code.as_str()))
        .collect();
    let mut by_rental: HashMap<i32, Vec<String>> = HashMap::new();
    for s in active_now.iter().filter(|s| s.rental.is_active()) {
        let code = codes
            .get(&s.assignment.battery_id)
            .map(|c| c.to_string())
            .unwrap_or_else(|| format!("#{}", s.assignment.battery_id));
        by_rental.entry(s.assignment.rental_id).or_default().push(code);
    }

    let mut roster: Vec<RosterEntry> = rentals
        .iter()
        .map(|rental| {
            let client = clients.get(&rental.client_id);
            let balance = balances.get(&rental.root());
            let mut assigned = by_rental.get(&rental.id).cloned().unwrap_or_default();
            assigned.sort();
            RosterEntry {
                client_id: rental.client_id,
                client_name: client.map(|c| c.name.clone()).unwrap_or_default(),
                phone: client.map(|c| c.phone.clone()).unwrap_or_default(),
                rental_id: rental.id,
                root_id: rental.root(),
                contract_code: rental.contract_code.clone(),
                city_id: rental.city_id,
                start_at: rental.start_at,
                weekly_rate: rental.weekly_rate,
                batteries: assigned,
                balance: balance.map_or(Decimal::ZERO, |b| b.balance),
                deposit: balance.map_or(Decimal::ZERO, |b| b.deposit),
            }
        })
        .collect();
    roster.sort_by(|a, b| {
        a.client_name
            .cmp(&b.client_name)
            .then(a.client_id.cmp(&b.client_id))
    });
    roster
}

fn top_debtors(roster: &[RosterEntry]) -> Vec<Debtor> {
    let mut debtors: Vec<&RosterEntry> = roster
        .iter()
        .filter(|e| e.balance > Decimal::ZERO)
        .collect();
    debtors.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.client_id.cmp(&b.client_id)));
    debtors
        .into_iter()
        .take(TOP_DEBTORS)
        .map(|e| Debtor {
            client_id: e.client_id,
            client_name: e.client_name.clone(),
            root_id: e.root_id,
            contract_code: e.contract_code.clone(),
            balance: e.balance,
        })
        .collect()
}

fn battery_pool(derived: &HashMap<i32, BatteryStatus>) -> BatteryPool {
    let mut pool = BatteryPool::default();
    for status in derived.values() {
        match status {
            BatteryStatus::Available => pool.available += 1,
            BatteryStatus::Rented => pool.rented += 1,
            BatteryStatus::Service => pool.service += 1,
            BatteryStatus::Sold => pool.sold += 1,
        }
    }
    pool
}

/// Add each clipped assignment's daily rate to every local day it started
/// inside the window.
fn fill_charged(
    series: &mut DailySeries,
    window: &[ScopedAssignment],
    calendar: &Calendar,
    from: DateTime<Utc>,
    now: DateTime<Utc>,
) {
    for s in window {
        let Some((start, end)) = clip(&s.rental, &s.assignment, None, now) else {
            continue;
        };
        let Some((first, days)) = calendar.halfopen_span(start.max(from), end.min(now)) else {
            continue;
        };
        let rate = s.rental.daily_rate();
        for offset in 0..days {
            if let Some(i) = series.index_of(first + Duration::days(offset)) {
                series.charged[i] += rate;
            }
        }
    }
}

fn fill_paid(series: &mut DailySeries, income: &[Payment]) {
    for p in income {
        if let Some(i) = series.index_of(p.date) {
            series.paid[i] += p.amount;
        }
    }
}

/// Income by (year, month), newest first, split by recording user.
pub fn monthly_rollup(income: &[Payment], usernames: &HashMap<i32, String>) -> Vec<MonthlyRollup> {
    type UserBucket = BTreeMap<Option<i32>, (Decimal, usize)>;
    let mut months: BTreeMap<(i32, u32), (Decimal, usize, UserBucket)> = BTreeMap::new();
    for p in income {
        let (total, count, users) = months.entry((p.date.year(), p.date.month())).or_default();
        *total += p.amount;
        *count += 1;
        let (amount, payments) = users.entry(p.created_by).or_default();
        *amount += p.amount;
        *payments += 1;
    }
    months
        .into_iter()
        .rev()
        .map(|((year, month), (income, payments, users))| MonthlyRollup {
            year,
            month,
            income,
            payments,
            by_user: users
                .into_iter()
                .map(|(user_id, (amount, payments))| UserTotal {
                    user_id,
                    username: user_id.and_then(|id| usernames.get(&id).cloned()),
                    amount,
                    payments,
                })
                .collect(),
        })
        .collect()
}

fn city_breakdown(
    cities: &[City],
    active: &[Rental],
    batteries: &[Battery],
    derived: &HashMap<i32, BatteryStatus>,
    income: &[Payment],
    since: NaiveDate,
) -> Vec<CityBreakdown> {
    let mut rows: Vec<CityBreakdown> = cities
        .iter()
        .map(|city| {
            let here = Some(city.id);
            let in_city: Vec<&Battery> = batteries.iter().filter(|b| b.city_id == here).collect();
            CityBreakdown {
                city_id: city.id,
                name: city.name.clone(),
                code: city.code.clone(),
                income_30d: income
                    .iter()
                    .filter(|p| p.city_id == here && p.date >= since)
                    .map(|p| p.amount)
                    .sum(),
                active_rentals: active.iter().filter(|r| r.city_id == here).count(),
                batteries: in_city.len(),
                rented_batteries: in_city
                    .iter()
                    .filter(|b| derived.get(&b.id) == Some(&BatteryStatus::Rented))
                    .count(),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.income_30d.cmp(&a.income_30d).then(a.name.cmp(&b.name)));
    rows
}
