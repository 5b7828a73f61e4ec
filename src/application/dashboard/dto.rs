//! Dashboard payloads

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Number of days in the daily series.
pub const SERIES_DAYS: usize = 30;

/// Number of clients listed as top debtors.
pub const TOP_DEBTORS: usize = 5;

// ── Dashboard ──────────────────────────────────────────────────

/// Everything the dashboard shows, computed against one pinned `now`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPayload {
    pub generated_at: DateTime<Utc>,
    pub totals: DashboardTotals,
    pub roster: Vec<RosterEntry>,
    pub battery_pool: BatteryPool,
    pub series: DailySeries,
    pub monthly: Vec<MonthlyRollup>,
    pub top_debtors: Vec<Debtor>,
    /// Superuser only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cities: Option<Vec<CityBreakdown>>,
}

impl DashboardPayload {
    /// Payload of a principal that may see nothing: zeros throughout.
    pub fn empty(now: DateTime<Utc>, today: NaiveDate) -> Self {
        Self {
            generated_at: now,
            totals: DashboardTotals::default(),
            roster: Vec::new(),
            battery_pool: BatteryPool::default(),
            series: DailySeries::zeros(today),
            monthly: Vec::new(),
            top_debtors: Vec::new(),
            cities: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardTotals {
    pub active_rentals: usize,
    /// Sum of positive roster balances.
    pub outstanding: Decimal,
    /// Deposits held across the roster.
    pub deposits_held: Decimal,
    pub income_30d: Decimal,
}

// ── Roster ─────────────────────────────────────────────────────

/// One client with their most recent active rental.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub client_id: i32,
    pub client_name: String,
    pub phone: String,
    pub rental_id: i32,
    pub root_id: i32,
    pub contract_code: String,
    pub city_id: Option<i32>,
    pub start_at: DateTime<Utc>,
    pub weekly_rate: Decimal,
    /// Short codes of batteries assigned right now.
    pub batteries: Vec<String>,
    /// Positive means the client owes money.
    pub balance: Decimal,
    pub deposit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Debtor {
    pub client_id: i32,
    pub client_name: String,
    pub root_id: i32,
    pub contract_code: String,
    pub balance: Decimal,
}

// ── Battery pool ───────────────────────────────────────────────

/// Battery counts by derived status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatteryPool {
    pub available: usize,
    pub rented: usize,
    pub service: usize,
    pub sold: usize,
}

impl BatteryPool {
    pub fn total(&self) -> usize {
        self.available + self.rented + self.service + self.sold
    }
}

// ── Series ─────────────────────────────────────────────────────

/// Parallel daily arrays, oldest day first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    pub days: Vec<NaiveDate>,
    /// Rent and sold payments dated that day.
    pub paid: Vec<Decimal>,
    /// Daily rates of assignments running that day.
    pub charged: Vec<Decimal>,
}

impl DailySeries {
    /// `SERIES_DAYS` zero days ending with `today`.
    pub fn zeros(today: NaiveDate) -> Self {
        let first = today - Duration::days(SERIES_DAYS as i64 - 1);
        Self {
            days: (0..SERIES_DAYS as i64).map(|i| first + Duration::days(i)).collect(),
            paid: vec![Decimal::ZERO; SERIES_DAYS],
            charged: vec![Decimal::ZERO; SERIES_DAYS],
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.days.first().copied()
    }

    /// Position of `day` in the series.
    pub fn index_of(&self, day: NaiveDate) -> Option<usize> {
        let first = self.first_day()?;
        let offset = (day - first).num_days();
        (0..self.days.len() as i64)
            .contains(&offset)
            .then_some(offset as usize)
    }

    pub fn total_paid(&self) -> Decimal {
        self.paid.iter().copied().sum()
    }

    pub fn total_charged(&self) -> Decimal {
        self.charged.iter().copied().sum()
    }
}

// ── Monthly rollup ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRollup {
    pub year: i32,
    pub month: u32,
    pub income: Decimal,
    pub payments: usize,
    /// Split by the user who recorded the payment.
    pub by_user: Vec<UserTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserTotal {
    pub user_id: Option<i32>,
    pub username: Option<String>,
    pub amount: Decimal,
    pub payments: usize,
}

// ── Cities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityBreakdown {
    pub city_id: i32,
    pub name: String,
    pub code: String,
    pub income_30d: Decimal,
    pub active_rentals: usize,
    pub batteries: usize,
    pub rented_batteries: usize,
}

/// Per-city analytics for every city in scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityAnalyticsPayload {
    pub generated_at: DateTime<Utc>,
    pub cities: Vec<CityAnalytics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityAnalytics {
    pub city_id: i32,
    pub name: String,
    pub code: String,
    pub income_30d: Decimal,
    pub income_this_month: Decimal,
    pub income_last_month: Decimal,
    /// Month over month; `None` when last month had no income.
    pub growth_percent: Option<Decimal>,
    /// Rented share of batteries not sold.
    pub utilization_percent: Decimal,
    pub active_clients: usize,
    /// Mean payment over the last 30 days.
    pub avg_payment: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_series_ends_today() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let series = DailySeries::zeros(today);
        assert_eq!(series.days.len(), SERIES_DAYS);
        assert_eq!(series.days.last(), Some(&today));
        assert_eq!(series.index_of(today), Some(SERIES_DAYS - 1));
        assert_eq!(series.index_of(today + Duration::days(1)), None);
        assert_eq!(series.index_of(series.days[0] - Duration::days(1)), None);
        assert_eq!(series.total_paid(), Decimal::ZERO);
    }

    #[test]
    fn empty_payload_serializes_without_city_breakdown() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let now = Utc::now();
        let json = serde_json::to_value(DashboardPayload::empty(now, today)).unwrap();
        assert!(json.get("cities").is_none());
        assert_eq!(json["totals"]["active_rentals"], 0);
        assert_eq!(json["series"]["days"].as_array().map(Vec::len), Some(SERIES_DAYS));
    }
}
