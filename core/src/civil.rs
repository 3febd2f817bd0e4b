//! Wall-clock ("civil") time math.
//!
//! Every conversion between a UTC instant and a user's local minutes-of-day
//! goes through this module. Days are never assumed to be 24 hours long:
//! the next occurrence of a local time is found by stepping the calendar
//! date and resolving it in the zone, so DST transitions produce 23- and
//! 25-hour gaps instead of drifting schedules.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MINUTES_PER_DAY: i32 = 1440;

/// Upper bound on a DST gap, in minutes. Real zones skip at most two hours.
const MAX_GAP_MINUTES: i64 = 180;

/// A local time of day with minute precision, always within 00:00..=23:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CivilTime(u16);

impl CivilTime {
    pub const MIDNIGHT: Self = Self(0);

    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            bail!("Invalid time {hour:02}:{minute:02}. Hours must be 0-23 and minutes 0-59");
        }
        Ok(Self((hour * 60 + minute) as u16))
    }

    /// Build from any minute count, wrapping into a single day.
    /// `-30` is 23:30, `1470` is 00:30.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn from_minutes(minutes: i32) -> Self {
        Self(minutes.rem_euclid(MINUTES_PER_DAY) as u16)
    }

    #[must_use]
    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    #[must_use]
    pub fn minutes(self) -> i32 {
        i32::from(self.0)
    }

    #[must_use]
    pub fn hour(self) -> u32 {
        u32::from(self.0 / 60)
    }

    #[must_use]
    pub fn minute(self) -> u32 {
        u32::from(self.0 % 60)
    }

    #[must_use]
    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for CivilTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for CivilTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || anyhow!("Invalid time '{s}'. Use HH:MM (00:00-23:59)");
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if m.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl Serialize for CivilTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CivilTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalize a wake/sleep pair to minutes since the wake day's midnight.
/// A sleep time at or before wake belongs to the next calendar day.
#[must_use]
pub fn unwrap_span(wake: CivilTime, sleep: CivilTime) -> (i32, i32) {
    let wake_min = wake.minutes();
    let mut sleep_min = sleep.minutes();
    if sleep_min <= wake_min {
        sleep_min += MINUTES_PER_DAY;
    }
    (wake_min, sleep_min)
}

#[must_use]
pub fn minutes_of_day(instant: DateTime<Utc>, tz: Tz) -> i32 {
    CivilTime::from_naive_time(instant.with_timezone(&tz).time()).minutes()
}

#[must_use]
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Resolve a local date and time in `tz` to an instant.
///
/// Ambiguous wall-clock times (the repeated hour when clocks fall back)
/// resolve to the earlier instant. Times inside a spring-forward gap move
/// forward to the first minute that exists.
#[must_use]
pub fn resolve_local(date: NaiveDate, time: CivilTime, tz: Tz) -> DateTime<Utc> {
    let mut naive = date.and_time(time.to_naive_time());
    for _ in 0..=MAX_GAP_MINUTES {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => return t.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => naive += Duration::minutes(1),
        }
    }
    Utc.from_utc_datetime(&naive)
}

/// The first instant strictly after `now` at which the local clock in `tz`
/// reads `time`.
#[must_use]
pub fn next_local_occurrence(now: DateTime<Utc>, time: CivilTime, tz: Tz) -> DateTime<Utc> {
    let today = local_date(now, tz);
    let candidate = resolve_local(today, time, tz);
    if candidate > now {
        return candidate;
    }
    resolve_local(today + Duration::days(1), time, tz)
}

/// Wall-clock duration until `target`, zero if it already passed.
#[must_use]
pub fn time_until(now: DateTime<Utc>, target: DateTime<Utc>) -> std::time::Duration {
    (target - now).to_std().unwrap_or_default()
}
