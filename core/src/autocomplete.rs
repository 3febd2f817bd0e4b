//! Decides whether an open day can be closed without the user confirming it.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::civil::{CivilTime, MINUTES_PER_DAY, minutes_of_day};
use crate::models::{AutodoneReason, DailyIntake, DailyStatus, DailyTarget};
use crate::store::Store;

pub const DEBOUNCE_MINUTES: i64 = 90;
pub const PROTEIN_RATIO_MIN: f64 = 0.85;
pub const KCAL_RATIO_MIN: f64 = 0.80;
pub const WATER_RATIO_MIN: f64 = 0.6;
pub const WATER_RATIO_MAX: f64 = 1.2;
pub const SLEEP_WINDOW_BEFORE_MIN: i32 = 30;
pub const SLEEP_WINDOW_AFTER_MIN: i32 = 60;

/// Everything the decision reads, gathered up front so [`decide`] stays pure.
#[derive(Debug, Clone)]
pub struct AutoCompleteSnapshot {
    pub now: DateTime<Utc>,
    pub tz: Tz,
    pub sleep_time: CivilTime,
    pub target: Option<DailyTarget>,
    pub intake: DailyIntake,
    pub already_completed: bool,
    pub last_log_at: Option<DateTime<Utc>>,
}

/// Evaluated in order; the first rule that yields wins:
///
/// 1. nothing to judge (no target, day already closed, nothing logged)
/// 2. a log in the last 90 minutes means the user is still active
/// 3. protein, calories and water all on track
/// 4. it is around bedtime
#[must_use]
pub fn decide(snapshot: &AutoCompleteSnapshot) -> Option<AutodoneReason> {
    let target = snapshot.target.as_ref()?;
    if snapshot.already_completed {
        return None;
    }
    let last_log_at = snapshot.last_log_at?;

    if snapshot.now - last_log_at < Duration::minutes(DEBOUNCE_MINUTES) {
        return None;
    }

    if macros_on_track(&snapshot.intake, target) {
        return Some(AutodoneReason::MacroOk);
    }

    let minute = minutes_of_day(snapshot.now, snapshot.tz);
    if in_sleep_window(minute, snapshot.sleep_time) {
        return Some(AutodoneReason::Sleep);
    }

    None
}

/// A target of zero counts as met for that nutrient.
#[must_use]
pub fn macros_on_track(intake: &DailyIntake, target: &DailyTarget) -> bool {
    let protein_ok =
        target.protein_g <= 0.0 || intake.protein_g / target.protein_g >= PROTEIN_RATIO_MIN;
    let kcal_ok = target.calories <= 0.0 || intake.kcal / target.calories >= KCAL_RATIO_MIN;
    let water_ok = target.water_ml <= 0.0
        || (target.water_ml * WATER_RATIO_MIN..=target.water_ml * WATER_RATIO_MAX)
            .contains(&intake.water_ml);
    protein_ok && kcal_ok && water_ok
}

/// `[sleep - 30, sleep + 60)` on the 24h clock, wrapping at midnight on
/// either side.
#[must_use]
pub fn in_sleep_window(minute: i32, sleep: CivilTime) -> bool {
    let start = sleep.minutes() - SLEEP_WINDOW_BEFORE_MIN;
    let offset = (minute - start).rem_euclid(MINUTES_PER_DAY);
    offset < SLEEP_WINDOW_BEFORE_MIN + SLEEP_WINDOW_AFTER_MIN
}

pub fn snapshot_for(
    store: &impl Store,
    user_id: i64,
    day: NaiveDate,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<AutoCompleteSnapshot> {
    Ok(AutoCompleteSnapshot {
        now,
        tz,
        sleep_time: store.schedule_config(user_id)?.sleep_time,
        target: store.daily_target(user_id, day)?,
        intake: store.daily_intake(user_id, day)?,
        already_completed: store
            .daily_status(user_id, day)?
            .is_some_and(|s| s.completed),
        last_log_at: store.last_log_time(user_id, day)?,
    })
}

/// Evaluate one user-day and close it when the decision says so. Returns the
/// reason only if this call actually closed the day.
pub fn auto_complete_day(
    store: &impl Store,
    user_id: i64,
    day: NaiveDate,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Option<AutodoneReason>> {
    let snapshot = snapshot_for(store, user_id, day, now, tz)?;
    let Some(reason) = decide(&snapshot) else {
        return Ok(None);
    };
    let written = store.complete_day_if_open(&DailyStatus {
        user_id,
        day,
        completed: true,
        completed_at: Some(now),
        auto_completed: true,
        autodone_reason: Some(reason),
    })?;
    if written {
        info!(user_id, %day, reason = %reason, "Day auto-completed");
        Ok(Some(reason))
    } else {
        Ok(None)
    }
}
