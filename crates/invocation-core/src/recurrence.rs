//! Recurrence due-date calculation
//!
//! A [`Recurrence`] describes when a task falls due relative to the instant
//! its checklist is invoked: a whole number of calendar days later, at either
//! a fixed wall-clock time or at the invocation's own time plus a duration,
//! optionally snapped forward to a weekday.
//!
//! [`next_due_date`] is pure. All calendar arithmetic happens on the
//! invocation's own time zone, so callers choose the calendar by choosing
//! the zone of the instant they pass in.

use std::time::Duration;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest allowed day offset
pub const MAX_DAY_OFFSET: u16 = 365;

/// Time of day a recurring task falls due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueTime {
    /// A fixed wall-clock time
    Fixed(NaiveTime),
    /// The invocation's time of day plus a duration; may roll over into
    /// later days
    AfterInvocation(Duration),
}

/// A validated recurrence descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecurrenceFields")]
pub struct Recurrence {
    day_offset: u16,
    weekday: Option<Weekday>,
    time: DueTime,
}

#[derive(Deserialize)]
struct RecurrenceFields {
    day_offset: u16,
    #[serde(default)]
    weekday: Option<Weekday>,
    time: DueTime,
}

impl TryFrom<RecurrenceFields> for Recurrence {
    type Error = Error;

    fn try_from(fields: RecurrenceFields) -> Result<Self> {
        Recurrence::new(fields.day_offset, fields.weekday, fields.time)
    }
}

impl Recurrence {
    /// Create a recurrence descriptor
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecurrence`] if `day_offset` exceeds
    /// [`MAX_DAY_OFFSET`] or an `AfterInvocation` duration cannot be
    /// represented as a calendar offset.
    pub fn new(day_offset: u16, weekday: Option<Weekday>, time: DueTime) -> Result<Self> {
        if day_offset > MAX_DAY_OFFSET {
            return Err(Error::InvalidRecurrence {
                reason: format!("day offset {} exceeds {}", day_offset, MAX_DAY_OFFSET),
            });
        }
        if let DueTime::AfterInvocation(offset) = time
            && TimeDelta::from_std(offset).is_err()
        {
            return Err(Error::InvalidRecurrence {
                reason: format!("time offset of {}s is out of range", offset.as_secs()),
            });
        }
        Ok(Self {
            day_offset,
            weekday,
            time,
        })
    }

    pub fn day_offset(&self) -> u16 {
        self.day_offset
    }

    pub fn weekday(&self) -> Option<Weekday> {
        self.weekday
    }

    pub fn time(&self) -> DueTime {
        self.time
    }
}

/// Compute the next due instant of a recurring task
///
/// 1. The invocation's calendar date plus `day_offset` days.
/// 2. Combined with the fixed time, or with the invocation's time of day plus
///    the duration (which may roll into a later day).
/// 3. If that lies strictly before the invocation, one calendar day is added.
/// 4. If a weekday is set, the date moves forward to the first matching day.
///
/// # Example
///
/// ```
/// use chrono::{NaiveTime, TimeZone, Utc};
/// use invocation_core::{DueTime, Recurrence, next_due_date};
///
/// let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
/// let recurrence = Recurrence::new(0, None, DueTime::Fixed(nine)).unwrap();
///
/// let invoked = Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap();
/// let due = next_due_date(&recurrence, &invoked);
/// assert_eq!(due, Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap());
/// ```
pub fn next_due_date<Tz: TimeZone>(recurrence: &Recurrence, invocation: &DateTime<Tz>) -> DateTime<Tz> {
    let calendar = invocation.timezone();
    let local = invocation.naive_local();
    let date = add_days_to_date(local.date(), u64::from(recurrence.day_offset));

    let mut candidate = match recurrence.time {
        DueTime::Fixed(time) => date.and_time(time),
        DueTime::AfterInvocation(offset) => shift(date.and_time(local.time()), offset),
    };

    if resolve(&calendar, candidate) < *invocation {
        candidate = add_days(candidate, 1);
    }

    if let Some(target) = recurrence.weekday {
        candidate = add_days(candidate, days_until(candidate.weekday(), target));
    }

    resolve(&calendar, candidate)
}

/// Days from `from` forward to the next `target`, zero if they match
fn days_until(from: Weekday, target: Weekday) -> u64 {
    u64::from((7 + target.num_days_from_monday() - from.num_days_from_monday()) % 7)
}

fn add_days_to_date(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

fn add_days(datetime: NaiveDateTime, days: u64) -> NaiveDateTime {
    datetime
        .checked_add_days(Days::new(days))
        .unwrap_or(NaiveDateTime::MAX)
}

fn shift(datetime: NaiveDateTime, offset: Duration) -> NaiveDateTime {
    TimeDelta::from_std(offset)
        .ok()
        .and_then(|delta| datetime.checked_add_signed(delta))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Map a wall-clock time onto the calendar's time zone
///
/// Ambiguous times (clocks turned back) resolve to the earlier instant. Times
/// skipped by a forward transition resolve to the same wall-clock time one
/// hour later.
fn resolve<Tz: TimeZone>(calendar: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    if let Some(resolved) = calendar.from_local_datetime(&naive).earliest() {
        return resolved;
    }
    naive
        .checked_add_signed(TimeDelta::hours(1))
        .and_then(|later| calendar.from_local_datetime(&later).earliest())
        .unwrap_or_else(|| calendar.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use rstest::rstest;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn fixed(hour: u32, minute: u32) -> DueTime {
        DueTime::Fixed(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
    }

    fn hours(h: u64) -> DueTime {
        DueTime::AfterInvocation(Duration::from_secs(h * 3600))
    }

    #[rstest]
    // Time still ahead today
    #[case(0, None, fixed(9, 0), utc(2024, 1, 10, 8, 0), utc(2024, 1, 10, 9, 0))]
    // Time already passed today rolls to tomorrow
    #[case(0, None, fixed(9, 0), utc(2024, 1, 10, 10, 0), utc(2024, 1, 11, 9, 0))]
    // Exactly at the invocation instant is not in the past
    #[case(0, None, fixed(9, 0), utc(2024, 1, 10, 9, 0), utc(2024, 1, 10, 9, 0))]
    // Monday invocation snaps to Friday
    #[case(0, Some(Weekday::Fri), fixed(17, 0), utc(2024, 1, 8, 12, 0), utc(2024, 1, 12, 17, 0))]
    // Candidate already on the target weekday stays put
    #[case(2, Some(Weekday::Fri), fixed(9, 0), utc(2024, 1, 10, 8, 0), utc(2024, 1, 12, 9, 0))]
    // Past-check runs before the weekday snap
    #[case(0, Some(Weekday::Wed), fixed(9, 0), utc(2024, 1, 10, 10, 0), utc(2024, 1, 17, 9, 0))]
    // Relative time rolls over midnight without further correction
    #[case(0, None, hours(20), utc(2024, 1, 10, 18, 0), utc(2024, 1, 11, 14, 0))]
    // More than a day of relative time
    #[case(1, None, hours(50), utc(2024, 1, 10, 6, 0), utc(2024, 1, 13, 8, 0))]
    // Offsets cross month, year and leap-day boundaries
    #[case(5, None, fixed(9, 0), utc(2024, 12, 30, 8, 0), utc(2025, 1, 4, 9, 0))]
    #[case(1, None, fixed(9, 0), utc(2024, 2, 28, 8, 0), utc(2024, 2, 29, 9, 0))]
    #[case(365, None, fixed(0, 0), utc(2023, 3, 1, 0, 0), utc(2024, 2, 29, 0, 0))]
    fn next_due_date_cases(
        #[case] day_offset: u16,
        #[case] weekday: Option<Weekday>,
        #[case] time: DueTime,
        #[case] invoked: DateTime<Utc>,
        #[case] expected: DateTime<Utc>,
    ) {
        let recurrence = Recurrence::new(day_offset, weekday, time).unwrap();
        assert_eq!(next_due_date(&recurrence, &invoked), expected);
    }

    #[test]
    fn weekday_snap_never_lands_before_invocation() {
        let recurrence = Recurrence::new(0, Some(Weekday::Mon), fixed(0, 0)).unwrap();
        for day in 1..=14 {
            let invoked = utc(2024, 1, day, 13, 30);
            let due = next_due_date(&recurrence, &invoked);
            assert!(due >= invoked, "{} < {}", due, invoked);
            assert_eq!(due.weekday(), Weekday::Mon);
            assert!(due - invoked <= TimeDelta::days(7));
        }
    }

    #[test]
    fn calendar_date_comes_from_the_invocation_zone() {
        let plus_five = FixedOffset::east_opt(5 * 3600).unwrap();
        // 23:30 UTC on the 10th is already the 11th at +05:00
        let invoked = utc(2024, 1, 10, 23, 30).with_timezone(&plus_five);
        let recurrence = Recurrence::new(0, None, fixed(9, 0)).unwrap();

        let due = next_due_date(&recurrence, &invoked);
        assert_eq!(due, plus_five.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap());
    }

    #[test]
    fn day_offset_above_limit_is_rejected() {
        let result = Recurrence::new(366, None, fixed(9, 0));
        assert!(matches!(result, Err(Error::InvalidRecurrence { .. })));
    }

    #[test]
    fn deserialization_validates_day_offset() {
        let valid = r#"{"day_offset":3,"weekday":"Fri","time":{"fixed":"09:00:00"}}"#;
        let recurrence: Recurrence = serde_json::from_str(valid).unwrap();
        assert_eq!(recurrence.day_offset(), 3);
        assert_eq!(recurrence.weekday(), Some(Weekday::Fri));

        let invalid = r#"{"day_offset":400,"time":{"fixed":"09:00:00"}}"#;
        assert!(serde_json::from_str::<Recurrence>(invalid).is_err());
    }
}
