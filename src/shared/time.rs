//! Local-time calendar
//!
//! All billing questions are answered in one configured IANA timezone.
//! Two day-counting rules live here:
//!
//! - [`Calendar::billable_day_by_anchor`]: a calendar day counts when the
//!   interval covers that day's 14:00 local anchor. Used by the per-version
//!   audit view.
//! - [`Calendar::billable_days_halfopen`]: number of local days started in
//!   `[start, end)`. Used by group rollups and the dashboard series.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Local hour that decides whether a calendar day is billable.
pub const ANCHOR_HOUR: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    tz: Tz,
}

impl Calendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build a calendar from an IANA zone name such as `Europe/Warsaw`.
    pub fn from_name(name: &str) -> Result<Self, String> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|e| format!("unknown timezone '{}': {}", name, e))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.tz).naive_local()
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date()
    }

    /// Resolve a local wall-clock time to an instant.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earliest instant;
    /// times inside a DST gap resolve to the first valid instant after it.
    pub fn at_local(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let naive = date.and_time(time);
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => {
                let mut probe = naive;
                for _ in 0..4 {
                    probe += Duration::minutes(30);
                    if let Some(dt) = self.tz.from_local_datetime(&probe).earliest() {
                        return dt.with_timezone(&Utc);
                    }
                }
                Utc.from_utc_datetime(&naive)
            }
        }
    }

    pub fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        self.at_local(date, NaiveTime::MIN)
    }

    /// 14:00 local time on `date`.
    pub fn anchor(&self, date: NaiveDate) -> DateTime<Utc> {
        let anchor = NaiveTime::from_hms_opt(ANCHOR_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
        self.at_local(date, anchor)
    }

    /// Whether `day` is billable for an interval starting at `start` and
    /// ending at `end` (open when `None`).
    ///
    /// The start must be strictly before the anchor and the end strictly
    /// after it: `[13:59, 14:01)` counts, `[14:00, 14:01)` does not.
    pub fn billable_day_by_anchor(
        &self,
        day: NaiveDate,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> bool {
        let anchor = self.anchor(day);
        start < anchor && end.map_or(true, |end| end > anchor)
    }

    /// Number of local calendar days started in `[start, end)`.
    ///
    /// The day holding `end` is only counted when `end` is past the local
    /// time of day of `start`, so `(d 00:00, d+1 00:00)` is one day and
    /// `(d 00:00, d+1 00:00:01)` is two.
    pub fn billable_days_halfopen(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        self.halfopen_span(start, end).map_or(0, |(_, days)| days)
    }

    /// First local day and day count of `[start, end)` under the half-open
    /// rule, or `None` for an empty interval.
    pub fn halfopen_span(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<(NaiveDate, i64)> {
        if end <= start {
            return None;
        }
        let s = self.local(start);
        let e = self.local(end);
        let whole = (e.date() - s.date()).num_days();
        let days = if e.time() > s.time() { whole + 1 } else { whole };
        Some((s.date(), days.max(1)))
    }

    /// Monday and Sunday of the last fully completed week before `today`.
    pub fn last_completed_week(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let this_monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        (this_monday - Duration::days(7), this_monday - Duration::days(1))
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Warsaw)
    }
}

/// First day of the month holding `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month before the one holding `date`.
pub fn previous_month_start(date: NaiveDate) -> NaiveDate {
    let first = month_start(date);
    month_start(first - Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal() -> Calendar {
        Calendar::from_name("Europe/Warsaw").unwrap()
    }

    fn local(cal: &Calendar, y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        cal.at_local(
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            NaiveTime::from_hms_opt(h, min, s).unwrap(),
        )
    }

    #[test]
    fn unknown_timezone_rejected() {
        assert!(Calendar::from_name("Mars/Olympus").is_err());
    }

    #[test]
    fn anchor_counts_when_start_just_before() {
        let c = cal();
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let start = local(&c, 2025, 3, 10, 13, 59, 0);
        let end = local(&c, 2025, 3, 10, 14, 1, 0);
        assert!(c.billable_day_by_anchor(day, start, Some(end)));
    }

    #[test]
    fn anchor_excludes_start_at_anchor() {
        let c = cal();
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let start = local(&c, 2025, 3, 10, 14, 0, 0);
        let end = local(&c, 2025, 3, 10, 14, 1, 0);
        assert!(!c.billable_day_by_anchor(day, start, Some(end)));
    }

    #[test]
    fn anchor_open_end_counts() {
        let c = cal();
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let start = local(&c, 2025, 3, 9, 8, 0, 0);
        assert!(c.billable_day_by_anchor(day, start, None));
    }

    #[test]
    fn halfopen_full_day_is_one() {
        let c = cal();
        let start = local(&c, 2025, 3, 10, 0, 0, 0);
        let end = local(&c, 2025, 3, 11, 0, 0, 0);
        assert_eq!(c.billable_days_halfopen(start, end), 1);
    }

    #[test]
    fn halfopen_one_second_past_midnight_is_two() {
        let c = cal();
        let start = local(&c, 2025, 3, 10, 0, 0, 0);
        let end = local(&c, 2025, 3, 11, 0, 0, 1);
        assert_eq!(c.billable_days_halfopen(start, end), 2);
    }

    #[test]
    fn halfopen_week_at_same_hour_is_seven() {
        let c = cal();
        let start = local(&c, 2025, 3, 10, 10, 0, 0);
        let end = local(&c, 2025, 3, 17, 10, 0, 0);
        assert_eq!(c.billable_days_halfopen(start, end), 7);
    }

    #[test]
    fn halfopen_across_dst_change() {
        let c = cal();
        // Clocks move forward on 2025-03-30 in Warsaw.
        let start = local(&c, 2025, 3, 29, 0, 0, 0);
        let end = local(&c, 2025, 3, 31, 0, 0, 0);
        assert_eq!(c.billable_days_halfopen(start, end), 2);
    }

    #[test]
    fn halfopen_empty_interval() {
        let c = cal();
        let t = local(&c, 2025, 3, 10, 12, 0, 0);
        assert_eq!(c.billable_days_halfopen(t, t), 0);
        assert_eq!(c.halfopen_span(t, t - Duration::hours(1)), None);
    }

    #[test]
    fn last_completed_week_from_wednesday() {
        let c = cal();
        let wed = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let (mon, sun) = c.last_completed_week(wed);
        assert_eq!(mon, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(sun, NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
    }

    #[test]
    fn last_completed_week_from_monday() {
        let c = cal();
        let mon = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let (start, end) = c.last_completed_week(mon);
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
    }

    #[test]
    fn month_helpers() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        assert_eq!(month_start(d), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(previous_month_start(d), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
    }
}
