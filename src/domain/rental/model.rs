//! Rental contract versions and battery assignments
//!
//! A contract is a group of versions sharing a `root`. The first version is
//! its own root; every successor copies the root and the contract code and
//! bumps `version`. All billing questions are asked of the whole group.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::shared::{Calendar, DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RentalStatus {
    Active,
    Closed,
    /// Superseded by a successor version of the same group.
    Modified,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Modified => "modified",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            "modified" => Some(Self::Modified),
            _ => None,
        }
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One version of a rental contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Rental {
    pub id: i32,
    pub client_id: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub weekly_rate: Decimal,
    pub deposit_amount: Decimal,
    pub status: RentalStatus,
    pub parent_id: Option<i32>,
    /// `None` only for rows written before roots were backfilled.
    pub root_id: Option<i32>,
    pub version: i32,
    pub contract_code: String,
    pub city_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Rental {
    /// Group root. A root-less row is treated as its own root.
    pub fn root(&self) -> i32 {
        self.root_id.unwrap_or(self.id)
    }

    pub fn is_root(&self) -> bool {
        self.root() == self.id
    }

    pub fn is_active(&self) -> bool {
        self.status == RentalStatus::Active
    }

    pub fn daily_rate(&self) -> Decimal {
        daily_rate(self.weekly_rate)
    }
}

/// `weekly_rate / 7`, exact. Rounding is left to display.
pub fn daily_rate(weekly_rate: Decimal) -> Decimal {
    weekly_rate / Decimal::from(7)
}

/// Ties one battery to one rental version for an interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: i32,
    pub rental_id: i32,
    pub battery_id: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
}

impl Assignment {
    pub fn is_open(&self) -> bool {
        self.end_at.is_none()
    }

    /// `start_at ≤ at < end_at` (open end covers everything after start).
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.start_at <= at && self.end_at.map_or(true, |end| at < end)
    }

    /// Whether two assignments share any instant.
    pub fn overlaps(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        let ends_after_start = self.end_at.map_or(true, |e| e > start);
        let starts_before_end = end.map_or(true, |e| self.start_at < e);
        ends_after_start && starts_before_end
    }
}

/// A version with its assignments preloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RentalVersion {
    pub rental: Rental,
    pub assignments: Vec<Assignment>,
}

impl RentalVersion {
    /// Per-day audit of this version's charges.
    ///
    /// Walks every local day from the version start up to
    /// `min(end_at, until, now)` and adds `daily_rate × n`, where `n` is the
    /// number of assignments covering that day's 14:00 anchor.
    pub fn charges_until(
        &self,
        calendar: &Calendar,
        until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Decimal {
        let upper = [self.rental.end_at, until, Some(now)]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(now);
        if upper <= self.rental.start_at {
            return Decimal::ZERO;
        }

        let rate = self.rental.daily_rate();
        let first = calendar.local_date(self.rental.start_at);
        let last = calendar.local_date(upper);
        let mut total = Decimal::ZERO;
        let mut day = first;
        while day <= last {
            let covering = self
                .assignments
                .iter()
                .filter(|a| {
                    let start = a.start_at.max(self.rental.start_at);
                    let end = a.end_at.map_or(upper, |e| e.min(upper));
                    start < end && calendar.billable_day_by_anchor(day, start, Some(end))
                })
                .count();
            total += rate * Decimal::from(covering);
            day += Duration::days(1);
        }
        total
    }
}

/// All versions sharing one root, ordered by `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct RentalGroup {
    pub root_id: i32,
    pub versions: Vec<RentalVersion>,
}

impl RentalGroup {
    /// Build a group, ordering versions. A group without versions is a
    /// structural error.
    pub fn new(root_id: i32, mut versions: Vec<RentalVersion>) -> DomainResult<Self> {
        if versions.is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "rental group {} has no versions",
                root_id
            )));
        }
        versions.sort_by_key(|v| (v.rental.version, v.rental.id));
        Ok(Self { root_id, versions })
    }

    pub fn latest(&self) -> &RentalVersion {
        // `new` rejects empty groups
        &self.versions[self.versions.len() - 1]
    }

    pub fn active_version(&self) -> Option<&RentalVersion> {
        self.versions.iter().rev().find(|v| v.rental.is_active())
    }

    pub fn client_id(&self) -> i32 {
        self.latest().rental.client_id
    }

    pub fn contract_code(&self) -> &str {
        &self.versions[0].rental.contract_code
    }

    pub fn version_ids(&self) -> Vec<i32> {
        self.versions.iter().map(|v| v.rental.id).collect()
    }
}

/// First version of a new contract.
#[derive(Debug, Clone)]
pub struct NewRental {
    pub client_id: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub weekly_rate: Decimal,
    pub deposit_amount: Decimal,
    /// Generated from the root id when absent.
    pub contract_code: Option<String>,
    pub city_id: Option<i32>,
}

impl NewRental {
    pub fn validate(&self) -> DomainResult<()> {
        validate_terms(self.start_at, self.end_at, self.weekly_rate, self.deposit_amount)
    }
}

/// Terms of a successor version; the group, client and code are inherited.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub weekly_rate: Decimal,
    pub deposit_amount: Decimal,
}

impl NewVersion {
    pub fn validate(&self) -> DomainResult<()> {
        validate_terms(self.start_at, self.end_at, self.weekly_rate, self.deposit_amount)
    }
}

fn validate_terms(
    start_at: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
    weekly_rate: Decimal,
    deposit_amount: Decimal,
) -> DomainResult<()> {
    if weekly_rate.is_sign_negative() {
        return Err(DomainError::Validation(format!(
            "weekly_rate must not be negative (got {})",
            weekly_rate
        )));
    }
    if deposit_amount.is_sign_negative() {
        return Err(DomainError::Validation(format!(
            "deposit_amount must not be negative (got {})",
            deposit_amount
        )));
    }
    if let Some(end) = end_at {
        if end <= start_at {
            return Err(DomainError::Validation(
                "rental end_at must be after start_at".to_string(),
            ));
        }
    }
    Ok(())
}

/// Contract code assigned to a root that did not get one explicitly.
pub fn default_contract_code(root_id: i32) -> String {
    format!("R-{:06}", root_id)
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub rental_id: i32,
    pub battery_id: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
}

impl NewAssignment {
    pub fn validate(&self) -> DomainResult<()> {
        validate_interval(self.start_at, self.end_at)
    }
}

/// `start_at < end_at` when an end is present.
pub fn validate_interval(start_at: DateTime<Utc>, end_at: Option<DateTime<Utc>>) -> DomainResult<()> {
    match end_at {
        Some(end) if end <= start_at => Err(DomainError::Validation(format!(
            "interval end {} must be after start {}",
            end, start_at
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal_macros::dec;

    fn cal() -> Calendar {
        Calendar::from_name("Europe/Warsaw").unwrap()
    }

    fn at(c: &Calendar, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        c.at_local(
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            NaiveTime::from_hms_opt(h, min, 0).unwrap(),
        )
    }

    fn rental(start: DateTime<Utc>, end: Option<DateTime<Utc>>, weekly: Decimal) -> Rental {
        Rental {
            id: 1,
            client_id: 1,
            start_at: start,
            end_at: end,
            weekly_rate: weekly,
            deposit_amount: Decimal::ZERO,
            status: RentalStatus::Active,
            parent_id: None,
            root_id: Some(1),
            version: 1,
            contract_code: "R-000001".into(),
            city_id: None,
            created_at: start,
        }
    }

    fn assignment(id: i32, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Assignment {
        Assignment {
            id,
            rental_id: 1,
            battery_id: id,
            start_at: start,
            end_at: end,
            end_reason: None,
        }
    }

    #[test]
    fn daily_rate_is_exact() {
        assert_eq!(daily_rate(dec!(700)), dec!(100));
        assert_eq!(daily_rate(dec!(7)) * dec!(7), dec!(7));
    }

    #[test]
    fn week_long_single_battery_by_anchor() {
        let c = cal();
        let start = at(&c, 2025, 3, 10, 10, 0);
        let end = at(&c, 2025, 3, 17, 10, 0);
        let version = RentalVersion {
            rental: rental(start, Some(end), dec!(700)),
            assignments: vec![assignment(1, start, Some(end))],
        };
        let now = at(&c, 2025, 6, 1, 12, 0);
        assert_eq!(version.charges_until(&c, None, now), dec!(700));
    }

    #[test]
    fn assignment_starting_at_anchor_is_free() {
        let c = cal();
        let start = at(&c, 2025, 3, 10, 14, 0);
        let end = at(&c, 2025, 3, 10, 14, 1);
        let version = RentalVersion {
            rental: rental(start, None, dec!(700)),
            assignments: vec![assignment(1, start, Some(end))],
        };
        let now = at(&c, 2025, 3, 20, 9, 0);
        assert_eq!(version.charges_until(&c, None, now), Decimal::ZERO);
    }

    #[test]
    fn two_batteries_double_the_day() {
        let c = cal();
        let start = at(&c, 2025, 3, 10, 9, 0);
        let end = at(&c, 2025, 3, 11, 9, 0);
        let version = RentalVersion {
            rental: rental(start, Some(end), dec!(700)),
            assignments: vec![assignment(1, start, None), assignment(2, start, None)],
        };
        let now = at(&c, 2025, 4, 1, 9, 0);
        assert_eq!(version.charges_until(&c, None, now), dec!(200));
    }

    #[test]
    fn until_cuts_the_walk() {
        let c = cal();
        let start = at(&c, 2025, 3, 10, 9, 0);
        let version = RentalVersion {
            rental: rental(start, None, dec!(700)),
            assignments: vec![assignment(1, start, None)],
        };
        let until = at(&c, 2025, 3, 12, 15, 0);
        let now = at(&c, 2025, 4, 1, 9, 0);
        assert_eq!(version.charges_until(&c, Some(until), now), dec!(300));
    }

    #[test]
    fn group_requires_versions() {
        assert!(matches!(
            RentalGroup::new(5, Vec::new()),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn root_less_rental_is_own_root() {
        let c = cal();
        let mut r = rental(at(&c, 2025, 1, 1, 0, 0), None, dec!(70));
        r.id = 9;
        r.root_id = None;
        assert_eq!(r.root(), 9);
        assert!(r.is_root());
    }

    #[test]
    fn negative_rate_rejected() {
        let c = cal();
        let new = NewRental {
            client_id: 1,
            start_at: at(&c, 2025, 1, 1, 0, 0),
            end_at: None,
            weekly_rate: dec!(-1),
            deposit_amount: Decimal::ZERO,
            contract_code: None,
            city_id: None,
        };
        assert!(matches!(new.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn interval_must_be_ordered() {
        let c = cal();
        let t = at(&c, 2025, 1, 1, 0, 0);
        assert!(validate_interval(t, Some(t)).is_err());
        assert!(validate_interval(t, None).is_ok());
    }

    #[test]
    fn overlap_detection() {
        let c = cal();
        let a = assignment(1, at(&c, 2025, 1, 1, 0, 0), Some(at(&c, 2025, 1, 5, 0, 0)));
        assert!(a.overlaps(at(&c, 2025, 1, 4, 0, 0), None));
        assert!(!a.overlaps(at(&c, 2025, 1, 5, 0, 0), None));
        let open = assignment(2, at(&c, 2025, 1, 1, 0, 0), None);
        assert!(open.overlaps(at(&c, 2030, 1, 1, 0, 0), None));
    }
}
