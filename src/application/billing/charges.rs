//! Charge engine
//!
//! Group totals use the half-open day count over each clipped assignment.
//! The per-version anchor walk lives on [`RentalVersion::charges_until`](crate::domain::rental::RentalVersion::charges_until)
//! and is exposed here as an audit breakdown.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::assignments::clipped_assignments;
use crate::domain::rental::RentalGroup;
use crate::shared::Calendar;

/// `Σ daily_rate × billable_days_halfopen` over the group's clipped
/// assignments.
pub fn group_charges(
    group: &RentalGroup,
    calendar: &Calendar,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Decimal {
    clipped_assignments(group, until, now)
        .map(|c| {
            let days = calendar.billable_days_halfopen(c.start, c.end);
            c.version.rental.daily_rate() * Decimal::from(days)
        })
        .sum()
}

/// Charges of one version under both day-counting rules.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionCharges {
    pub rental_id: i32,
    pub version: i32,
    pub daily_rate: Decimal,
    /// Half-open rule, as summed by [`group_charges`].
    pub charged: Decimal,
    /// 14:00 anchor walk.
    pub charged_by_anchor: Decimal,
}

/// Per-version audit rows for `group`.
pub fn version_breakdown(
    group: &RentalGroup,
    calendar: &Calendar,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Vec<VersionCharges> {
    group
        .versions
        .iter()
        .map(|version| {
            let single = RentalGroup {
                root_id: group.root_id,
                versions: vec![version.clone()],
            };
            VersionCharges {
                rental_id: version.rental.id,
                version: version.rental.version,
                daily_rate: version.rental.daily_rate(),
                charged: group_charges(&single, calendar, until, now),
                charged_by_anchor: version.charges_until(calendar, until, now),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal_macros::dec;

    use crate::domain::rental::{Assignment, Rental, RentalStatus, RentalVersion};

    fn cal() -> Calendar {
        Calendar::from_name("Europe/Warsaw").unwrap()
    }

    fn at(c: &Calendar, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        c.at_local(
            NaiveDate::from_ymd_opt(2025, m, d).unwrap(),
            NaiveTime::from_hms_opt(h, min, 0).unwrap(),
        )
    }

    fn version(
        id: i32,
        v: i32,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        weekly: Decimal,
        batteries: &[i32],
    ) -> RentalVersion {
        RentalVersion {
            rental: Rental {
                id,
                client_id: 1,
                start_at: start,
                end_at: end,
                weekly_rate: weekly,
                deposit_amount: Decimal::ZERO,
                status: if end.is_some() {
                    RentalStatus::Modified
                } else {
                    RentalStatus::Active
                },
                parent_id: None,
                root_id: Some(1),
                version: v,
                contract_code: "R-000001".into(),
                city_id: None,
                created_at: start,
            },
            assignments: batteries
                .iter()
                .map(|b| Assignment {
                    id: id * 100 + b,
                    rental_id: id,
                    battery_id: *b,
                    start_at: start,
                    end_at: end,
                    end_reason: None,
                })
                .collect(),
        }
    }

    #[test]
    fn week_long_rental_charges_one_week() {
        let c = cal();
        // 2025-03-10 is a Monday.
        let v = version(1, 1, at(&c, 3, 10, 10, 0), Some(at(&c, 3, 17, 10, 0)), dec!(700), &[1]);
        let group = RentalGroup::new(1, vec![v]).unwrap();
        assert_eq!(group_charges(&group, &c, None, at(&c, 5, 1, 0, 0)), dec!(700));
    }

    #[test]
    fn upgrade_mid_contract() {
        let c = cal();
        let v1 = version(1, 1, at(&c, 1, 1, 0, 0), Some(at(&c, 1, 8, 0, 0)), dec!(700), &[1]);
        let v2 = version(2, 2, at(&c, 1, 8, 0, 0), Some(at(&c, 1, 15, 0, 0)), dec!(1400), &[1, 2]);
        let group = RentalGroup::new(1, vec![v2, v1]).unwrap();
        assert_eq!(group_charges(&group, &c, None, at(&c, 3, 1, 0, 0)), dec!(3500));

        let rows = version_breakdown(&group, &c, None, at(&c, 3, 1, 0, 0));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].charged, dec!(700));
        assert_eq!(rows[1].charged, dec!(2800));
    }

    #[test]
    fn until_truncates_open_rental() {
        let c = cal();
        let v = version(1, 1, at(&c, 3, 10, 0, 0), None, dec!(700), &[1]);
        let group = RentalGroup::new(1, vec![v]).unwrap();
        let until = at(&c, 3, 13, 0, 0);
        assert_eq!(group_charges(&group, &c, Some(until), at(&c, 4, 1, 0, 0)), dec!(300));
    }

    #[test]
    fn rules_agree_on_midnight_aligned_ends() {
        let c = cal();
        let v = version(1, 1, at(&c, 3, 10, 0, 0), Some(at(&c, 3, 12, 0, 0)), dec!(700), &[1]);
        let group = RentalGroup::new(1, vec![v]).unwrap();
        let row = &version_breakdown(&group, &c, None, at(&c, 4, 1, 0, 0))[0];
        assert_eq!(row.charged, dec!(200));
        assert_eq!(row.charged_by_anchor, dec!(200));
    }

    #[test]
    fn rules_diverge_on_afternoon_start() {
        let c = cal();
        let v = version(1, 1, at(&c, 3, 10, 10, 0), Some(at(&c, 3, 11, 18, 0)), dec!(700), &[1]);
        let group = RentalGroup::new(1, vec![v.clone()]).unwrap();
        let now = at(&c, 4, 1, 0, 0);
        assert_eq!(group_charges(&group, &c, None, now), dec!(200));
        assert_eq!(v.charges_until(&c, None, now), dec!(200));

        // Starts after the anchor: two days started, one anchor covered.
        let late = version(1, 1, at(&c, 3, 10, 15, 0), Some(at(&c, 3, 11, 16, 0)), dec!(700), &[1]);
        let group = RentalGroup::new(1, vec![late]).unwrap();
        let row = &version_breakdown(&group, &c, None, now)[0];
        assert_eq!(row.charged, dec!(200));
        assert_eq!(row.charged_by_anchor, dec!(100));
    }
}
