use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::task::HabitFrequency;

/// Calendar arithmetic in a single reference time zone.
///
/// Timestamps are stored in UTC; every day, week and month decision converts
/// them into `offset` first so that "today" means the same thing everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

/// A calendar period identified together with its year, so week 1 of next
/// year never compares equal to week 1 of this year.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    pub year: i32,
    pub index: u32,
}

impl Calendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Uses the machine's current local offset.
    pub fn local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    /// Builds a calendar from an offset in minutes east of UTC.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    pub fn is_same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.day_of(a) == self.day_of(b)
    }

    pub fn period_key(&self, at: DateTime<Utc>, frequency: HabitFrequency) -> PeriodKey {
        let day = self.day_of(at);
        match frequency {
            HabitFrequency::Daily => PeriodKey {
                year: day.year(),
                index: day.ordinal(),
            },
            HabitFrequency::Weekly => {
                let week = day.iso_week();
                PeriodKey {
                    year: week.year(),
                    index: week.week(),
                }
            }
            HabitFrequency::Monthly => PeriodKey {
                year: day.year(),
                index: day.month(),
            },
        }
    }

    pub fn same_period(&self, a: DateTime<Utc>, b: DateTime<Utc>, frequency: HabitFrequency) -> bool {
        self.period_key(a, frequency) == self.period_key(b, frequency)
    }

    /// Whole calendar periods from `from` to `to`; negative when `to` is earlier.
    pub fn periods_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        frequency: HabitFrequency,
    ) -> i64 {
        let start = self.day_of(from);
        let end = self.day_of(to);
        match frequency {
            HabitFrequency::Daily => end.signed_duration_since(start).num_days(),
            HabitFrequency::Weekly => {
                week_start(end).signed_duration_since(week_start(start)).num_days() / 7
            }
            HabitFrequency::Monthly => i64::from(months_between(start, end)),
        }
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::local()
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.year() - start.year()) * 12 + (end.month() as i32 - start.month() as i32)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
