//! Assignment iterator
//!
//! Walks every assignment of a rental group and clips it to the window in
//! which both the version and the assignment were running.

use chrono::{DateTime, Utc};

use crate::domain::rental::{Assignment, Rental, RentalGroup, RentalVersion};

/// One assignment clipped to its version window.
#[derive(Debug, Clone, Copy)]
pub struct ClippedAssignment<'a> {
    pub version: &'a RentalVersion,
    pub assignment: &'a Assignment,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Clip `assignment` to `rental`.
///
/// Open ends fall back to `until`, then to `now`. An explicit `until` also
/// caps closed ends. Returns `None` when nothing of the interval is left.
pub fn clip(
    rental: &Rental,
    assignment: &Assignment,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let open_end = until.unwrap_or(now);
    let start = rental.start_at.max(assignment.start_at);
    let mut end = rental
        .end_at
        .unwrap_or(open_end)
        .min(assignment.end_at.unwrap_or(open_end));
    if let Some(until) = until {
        end = end.min(until);
    }
    (start < end).then_some((start, end))
}

/// All non-empty clipped assignments of `group`, in version order.
pub fn clipped_assignments<'a>(
    group: &'a RentalGroup,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> impl Iterator<Item = ClippedAssignment<'a>> + 'a {
    group.versions.iter().flat_map(move |version| {
        version.assignments.iter().filter_map(move |assignment| {
            clip(&version.rental, assignment, until, now).map(|(start, end)| ClippedAssignment {
                version,
                assignment,
                start,
                end,
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    use crate::domain::rental::RentalStatus;

    fn t(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
    }

    fn version(start: DateTime<Utc>, end: Option<DateTime<Utc>>, assignments: Vec<Assignment>) -> RentalVersion {
        RentalVersion {
            rental: Rental {
                id: 1,
                client_id: 1,
                start_at: start,
                end_at: end,
                weekly_rate: Decimal::from(700),
                deposit_amount: Decimal::ZERO,
                status: RentalStatus::Active,
                parent_id: None,
                root_id: Some(1),
                version: 1,
                contract_code: "R-000001".into(),
                city_id: None,
                created_at: start,
            },
            assignments,
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
    fn clips_to_version_window() {
        let v = version(t(2, 0), Some(t(5, 0)), vec![assignment(1, t(1, 0), None)]);
        let group = RentalGroup::new(1, vec![v]).unwrap();
        let clipped: Vec<_> = clipped_assignments(&group, None, t(20, 0)).collect();
        assert_eq!(clipped.len(), 1);
        assert_eq!((clipped[0].start, clipped[0].end), (t(2, 0), t(5, 0)));
    }

    #[test]
    fn open_ends_stop_at_now() {
        let v = version(t(2, 0), None, vec![assignment(1, t(2, 0), None)]);
        let group = RentalGroup::new(1, vec![v]).unwrap();
        let now = t(3, 12);
        let clipped: Vec<_> = clipped_assignments(&group, None, now).collect();
        assert_eq!(clipped[0].end, now);
    }

    #[test]
    fn until_bounds_closed_ends() {
        let v = version(t(2, 0), Some(t(9, 0)), vec![assignment(1, t(2, 0), Some(t(9, 0)))]);
        let group = RentalGroup::new(1, vec![v]).unwrap();
        let clipped: Vec<_> = clipped_assignments(&group, Some(t(4, 0)), t(20, 0)).collect();
        assert_eq!(clipped[0].end, t(4, 0));
    }

    #[test]
    fn empty_windows_are_skipped() {
        let v = version(
            t(2, 0),
            Some(t(5, 0)),
            vec![
                assignment(1, t(6, 0), None),
                assignment(2, t(2, 0), Some(t(2, 0) + Duration::hours(1))),
            ],
        );
        let group = RentalGroup::new(1, vec![v]).unwrap();
        let ids: Vec<i32> = clipped_assignments(&group, None, t(20, 0))
            .map(|c| c.assignment.id)
            .collect();
        assert_eq!(ids, vec![2]);
    }
}
