//! Calendar helpers. Days are taken in the offset of the instant passed in,
//! so callers decide the user's local calendar by choosing `now`'s offset.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime, Time, UtcOffset};

/// Date-independent hour and minute at which something is due.
///
/// Stored as given; validation happens when it is projected onto a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: i32,
    pub minute: i32,
}

impl TimeOfDay {
    pub const fn new(hour: i32, minute: i32) -> Self {
        Self { hour, minute }
    }

    pub fn of(instant: OffsetDateTime) -> Self {
        Self {
            hour: i32::from(instant.hour()),
            minute: i32::from(instant.minute()),
        }
    }

    pub fn to_time(self) -> Option<Time> {
        let hour = u8::try_from(self.hour).ok()?;
        let minute = u8::try_from(self.minute).ok()?;
        Time::from_hms(hour, minute, 0).ok()
    }

    pub fn is_valid(self) -> bool {
        self.to_time().is_some()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

pub fn day_of(instant: OffsetDateTime) -> Date {
    instant.date()
}

pub fn start_of_day(instant: OffsetDateTime) -> OffsetDateTime {
    instant.replace_time(Time::MIDNIGHT)
}

/// `[start, end)` of the instant's calendar day.
pub fn day_range(instant: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let start = start_of_day(instant);
    (start, start + Duration::days(1))
}

/// Projects `time` onto `day` in the given offset. `None` when the hour or
/// minute is out of range; callers skip such entries.
pub fn combine(day: Date, time: TimeOfDay, offset: UtcOffset) -> Option<OffsetDateTime> {
    Some(day.with_time(time.to_time()?).assume_offset(offset))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodKind {
    /// Days subtracted from `now` to find the start of the window.
    pub fn lookback_days(self) -> i64 {
        match self {
            PeriodKind::Daily => 0,
            PeriodKind::Weekly => 6,
            PeriodKind::Monthly => 29,
        }
    }
}

impl FromStr for PeriodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(PeriodKind::Daily),
            "weekly" | "week" => Ok(PeriodKind::Weekly),
            "monthly" | "month" => Ok(PeriodKind::Monthly),
            other => Err(format!("unknown period `{other}`")),
        }
    }
}

/// Rolling window ending at `now`. Membership is decided per calendar day,
/// so the first day counts in full even though `start` carries `now`'s time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodWindow {
    pub kind: PeriodKind,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

impl PeriodWindow {
    pub fn first_day(&self) -> Date {
        day_of(self.start)
    }

    pub fn last_day(&self) -> Date {
        day_of(self.end)
    }

    pub fn contains_day(&self, day: Date) -> bool {
        self.first_day() <= day && day <= self.last_day()
    }

    /// Every calendar day of the window, oldest first.
    pub fn days(&self) -> Vec<Date> {
        let mut days = Vec::new();
        let mut day = self.first_day();
        let last = self.last_day();
        while day <= last {
            days.push(day);
            match day.next_day() {
                Some(next) => day = next,
                None => break,
            }
        }
        days
    }
}

/// Daily is today only, weekly is `[now - 6d, now]`, monthly is
/// `[now - 29d, now]`. These are rolling offsets, not calendar weeks/months.
pub fn period_window(kind: PeriodKind, now: OffsetDateTime) -> PeriodWindow {
    let start = match kind {
        PeriodKind::Daily => start_of_day(now),
        _ => now - Duration::days(kind.lookback_days()),
    };
    PeriodWindow {
        kind,
        start,
        end: now,
    }
}
