//! Deadline rules.
//!
//! Every rule is a pure function of a category and a reference instant. Day
//! and week boundaries are taken in the calendar's fixed UTC offset; weeks
//! run Monday through Sunday and end at Sunday 23:59:59.999 local time.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Offset, TimeZone, Utc};

use crate::models::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// `None` when the offset is a day or more away from UTC.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    fn last_instant_of(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_hms_milli_opt(23, 59, 59, 999)?;
        self.offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// 23:59:59.999 on the local date of `at`.
    pub fn end_of_day(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.last_instant_of(self.local_date(at))
    }

    /// Sunday 23:59:59.999 of the Monday-to-Sunday week containing `at`.
    pub fn end_of_week(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let date = self.local_date(at);
        let to_sunday = 6 - u64::from(date.weekday().num_days_from_monday());
        let sunday = date.checked_add_days(Days::new(to_sunday))?;
        self.last_instant_of(sunday)
    }

    /// Instant after which an incomplete task is overdue, measured from the
    /// moment it entered `category`.
    pub fn overdue_deadline(
        &self,
        category: Category,
        entered_at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match category {
            Category::Today => self.end_of_day(entered_at),
            Category::ThisWeek => self.end_of_week(entered_at),
            Category::NextWeek | Category::Others => None,
        }
    }

    /// Instant after which an incomplete task moves on to another category.
    pub fn transition_deadline(
        &self,
        category: Category,
        entered_at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match category {
            Category::NextWeek => self.end_of_week(entered_at),
            Category::Today | Category::ThisWeek | Category::Others => None,
        }
    }

    /// Instant after which a completed task is archived.
    pub fn archive_deadline(
        &self,
        category: Category,
        completed_at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match category {
            Category::Today => self.end_of_day(completed_at),
            Category::ThisWeek | Category::NextWeek => self.end_of_week(completed_at),
            Category::Others => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn end_of_day_is_last_millisecond() {
        let cal = Calendar::utc();
        let end = cal.end_of_day(utc(2024, 1, 1, 10, 0, 0)).unwrap();

        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!((end.hour(), end.minute(), end.second()), (23, 59, 59));
        assert_eq!(end.timestamp_subsec_millis(), 999);
    }

    #[test]
    fn week_ends_on_sunday_for_every_weekday() {
        let cal = Calendar::utc();
        let sunday_end = cal.end_of_day(utc(2024, 1, 7, 12, 0, 0)).unwrap();

        // 2024-01-01 is a Monday.
        for day in 1..=7 {
            assert_eq!(cal.end_of_week(utc(2024, 1, day, 8, 0, 0)), Some(sunday_end));
        }
        assert!(cal.end_of_week(utc(2024, 1, 8, 0, 0, 0)).unwrap() > sunday_end);
    }

    #[test]
    fn boundaries_follow_the_configured_offset() {
        // UTC+9: 2024-01-07 20:00 UTC is already Monday 05:00 local.
        let cal = Calendar::from_offset_minutes(9 * 60).unwrap();
        let at = utc(2024, 1, 7, 20, 0, 0);

        assert_eq!(cal.local_date(at), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        let ms = chrono::Duration::milliseconds(999);
        assert_eq!(cal.end_of_day(at), Some(utc(2024, 1, 8, 14, 59, 59) + ms));
        assert_eq!(cal.end_of_week(at), Some(utc(2024, 1, 14, 14, 59, 59) + ms));
    }

    #[test]
    fn rejects_offsets_of_a_day_or_more() {
        assert!(Calendar::from_offset_minutes(24 * 60).is_none());
        assert!(Calendar::from_offset_minutes(-24 * 60).is_none());
        assert!(Calendar::from_offset_minutes(-5 * 60).is_some());
    }

    #[test]
    fn only_expected_categories_carry_deadlines() {
        let cal = Calendar::utc();
        let at = utc(2024, 1, 3, 9, 0, 0);

        assert!(cal.overdue_deadline(Category::Today, at).is_some());
        assert!(cal.overdue_deadline(Category::ThisWeek, at).is_some());
        assert!(cal.overdue_deadline(Category::NextWeek, at).is_none());
        assert!(cal.overdue_deadline(Category::Others, at).is_none());

        assert!(cal.transition_deadline(Category::NextWeek, at).is_some());
        assert!(cal.transition_deadline(Category::ThisWeek, at).is_none());

        assert!(cal.archive_deadline(Category::Others, at).is_none());
        assert_eq!(
            cal.archive_deadline(Category::NextWeek, at),
            cal.end_of_week(at)
        );
    }
}
