//! Reminder lifecycle.
//!
//! Every status change goes through [`transition`], which consults a single
//! table of `(from, action) -> to` edges. Terminal statuses have no outgoing
//! edges, so nothing can leave `completed`, `skipped` or `missed`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::debug;

use crate::civil::resolve_local;
use crate::error::{AdherenceError, Result};
use crate::models::{CompletionPayload, Reminder, ReminderStatus, ReminderType};
use crate::store::{LogWriter, Store};

pub const MIN_DELAY_MINUTES: i64 = 5;
pub const MAX_DELAY_MINUTES: i64 = 180;
/// A reminder is only missed once it is this far past due.
pub const MISSED_GRACE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    StartCountdown,
    Complete,
    Delay,
    Postpone,
    Skip,
    Miss,
}

impl ReminderAction {
    pub const ALL: [Self; 6] = [
        Self::StartCountdown,
        Self::Complete,
        Self::Delay,
        Self::Postpone,
        Self::Skip,
        Self::Miss,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartCountdown => "start a countdown on",
            Self::Complete => "complete",
            Self::Delay => "delay",
            Self::Postpone => "postpone",
            Self::Skip => "skip",
            Self::Miss => "miss",
        }
    }
}

use self::ReminderAction as A;
use crate::models::ReminderStatus as S;

const TRANSITIONS: &[(ReminderStatus, ReminderAction, ReminderStatus)] = &[
    (S::Pending, A::StartCountdown, S::Countdown),
    (S::Pending, A::Complete, S::Completed),
    (S::Pending, A::Delay, S::Delayed),
    (S::Pending, A::Postpone, S::Postponed),
    (S::Pending, A::Skip, S::Skipped),
    (S::Pending, A::Miss, S::Missed),
    (S::Countdown, A::Complete, S::Completed),
    (S::Countdown, A::Postpone, S::Postponed),
    (S::Countdown, A::Skip, S::Skipped),
    (S::Countdown, A::Miss, S::Missed),
    (S::Delayed, A::Complete, S::Completed),
    (S::Delayed, A::Skip, S::Skipped),
    (S::Delayed, A::Miss, S::Missed),
    (S::Postponed, A::Complete, S::Completed),
    (S::Postponed, A::Skip, S::Skipped),
    (S::Postponed, A::Miss, S::Missed),
];

#[must_use]
pub fn next_status(from: ReminderStatus, action: ReminderAction) -> Option<ReminderStatus> {
    TRANSITIONS
        .iter()
        .find(|(f, a, _)| *f == from && *a == action)
        .map(|&(_, _, to)| to)
}

pub fn transition(from: ReminderStatus, action: ReminderAction) -> Result<ReminderStatus> {
    next_status(from, action).ok_or(AdherenceError::InvalidTransition {
        from,
        action: action.as_str(),
    })
}

/// A requested status change, as accepted by the mutate-status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: ReminderStatus,
    /// Required for `delayed` and `postponed`.
    #[serde(default)]
    pub minutes: Option<i64>,
    #[serde(default, flatten)]
    pub payload: CompletionPayload,
}

fn load(store: &impl Store, id: i64) -> Result<Reminder> {
    store
        .get_reminder(id)?
        .ok_or_else(|| AdherenceError::NotFound(format!("Reminder {id}")))
}

fn validate_delay(minutes: i64) -> Result<Duration> {
    if (MIN_DELAY_MINUTES..=MAX_DELAY_MINUTES).contains(&minutes) {
        Ok(Duration::minutes(minutes))
    } else {
        Err(AdherenceError::invalid_payload(format!(
            "Delay must be between {MIN_DELAY_MINUTES} and {MAX_DELAY_MINUTES} minutes (got {minutes})"
        )))
    }
}

fn positive_amount(amount: Option<f64>, what: &str) -> Result<f64> {
    match amount {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(AdherenceError::invalid_payload(format!(
            "{what} must be greater than 0 (got {v})"
        ))),
        None => Err(AdherenceError::invalid_payload(format!("{what} is required"))),
    }
}

fn apply(
    store: &impl Store,
    mut reminder: Reminder,
    action: ReminderAction,
    edit: impl FnOnce(&mut Reminder),
) -> Result<Reminder> {
    let from = reminder.status;
    reminder.status = transition(from, action)?;
    edit(&mut reminder);
    store.update_reminder(&reminder)?;
    debug!(
        reminder_id = reminder.id,
        user_id = reminder.user_id,
        from = %from,
        to = %reminder.status,
        "Reminder transitioned"
    );
    Ok(reminder)
}

/// Mark a reminder done, writing the food or water log it stands for.
/// AI check-ins complete without a payload or a log.
pub fn complete(
    store: &impl Store,
    logs: &impl LogWriter,
    id: i64,
    payload: &CompletionPayload,
    now: DateTime<Utc>,
) -> Result<Reminder> {
    let reminder = load(store, id)?;
    transition(reminder.status, A::Complete)?;

    let log_id = match reminder.reminder_type {
        ReminderType::Meal | ReminderType::Snack => {
            let food_id = payload.food_id.ok_or_else(|| {
                AdherenceError::invalid_payload("food_id is required to complete a meal")
            })?;
            let amount_g = positive_amount(payload.amount, "amount (grams)")?;
            if !logs.has_food(food_id)? {
                return Err(AdherenceError::invalid_payload(format!(
                    "Unknown food_id {food_id}"
                )));
            }
            Some(logs.write_food_log(&reminder, food_id, amount_g, now)?)
        }
        ReminderType::Water => {
            let amount_ml = positive_amount(payload.amount, "amount (ml)")?;
            Some(logs.write_water_log(&reminder, amount_ml, now)?)
        }
        ReminderType::AiMorning | ReminderType::AiEvening => None,
    };

    apply(store, reminder, A::Complete, |r| {
        r.completed_at = Some(now);
        r.log_id = log_id;
    })
}

pub fn postpone(
    store: &impl Store,
    id: i64,
    minutes: i64,
    now: DateTime<Utc>,
) -> Result<Reminder> {
    let reminder = load(store, id)?;
    let delay = validate_delay(minutes)?;
    apply(store, reminder, A::Postpone, |r| {
        r.delayed_until = Some(now + delay);
    })
}

pub fn delay(store: &impl Store, id: i64, minutes: i64, now: DateTime<Utc>) -> Result<Reminder> {
    let reminder = load(store, id)?;
    let delay = validate_delay(minutes)?;
    apply(store, reminder, A::Delay, |r| {
        r.delayed_until = Some(now + delay);
    })
}

pub fn skip(store: &impl Store, id: i64, now: DateTime<Utc>) -> Result<Reminder> {
    let reminder = load(store, id)?;
    apply(store, reminder, A::Skip, |r| r.completed_at = Some(now))
}

pub fn start_countdown(store: &impl Store, id: i64) -> Result<Reminder> {
    let reminder = load(store, id)?;
    apply(store, reminder, A::StartCountdown, |_| {})
}

pub fn mark_missed(store: &impl Store, id: i64) -> Result<Reminder> {
    let reminder = load(store, id)?;
    apply(store, reminder, A::Miss, |_| {})
}

/// Route a requested target status to the matching lifecycle operation.
pub fn set_status(
    store: &impl Store,
    logs: &impl LogWriter,
    id: i64,
    change: &StatusChange,
    now: DateTime<Utc>,
) -> Result<Reminder> {
    let minutes = || {
        change.minutes.ok_or_else(|| {
            AdherenceError::invalid_payload(format!("minutes is required for '{}'", change.status))
        })
    };
    match change.status {
        S::Countdown => start_countdown(store, id),
        S::Completed => complete(store, logs, id, &change.payload, now),
        S::Delayed => delay(store, id, minutes()?, now),
        S::Postponed => postpone(store, id, minutes()?, now),
        S::Skipped => skip(store, id, now),
        S::Missed => mark_missed(store, id),
        S::Pending => Err(AdherenceError::invalid_payload(
            "A reminder cannot be moved back to pending",
        )),
    }
}

/// The instant a reminder is expected to be acted on: its snooze deadline if
/// it has one, otherwise its scheduled local time on its day.
#[must_use]
pub fn due_instant(reminder: &Reminder, tz: Tz) -> DateTime<Utc> {
    reminder.delayed_until.unwrap_or_else(|| {
        let date = if reminder.next_day {
            reminder.day + Duration::days(1)
        } else {
            reminder.day
        };
        resolve_local(date, reminder.scheduled_time, tz)
    })
}

/// Mark every open reminder of the user-day that is more than the grace
/// period past due as missed. Returns how many changed; running it again
/// with the same `now` changes nothing.
pub fn missed_sweep(
    store: &impl Store,
    user_id: i64,
    day: NaiveDate,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<usize> {
    let grace = Duration::minutes(MISSED_GRACE_MINUTES);
    let mut missed = 0;
    for reminder in store.reminders_for_day(user_id, day)? {
        if !matches!(reminder.status, S::Pending | S::Delayed | S::Postponed) {
            continue;
        }
        if due_instant(&reminder, tz) + grace < now {
            apply(store, reminder, A::Miss, |_| {})?;
            missed += 1;
        }
    }
    Ok(missed)
}
