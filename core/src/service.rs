use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::adherence::{calc_streak_from_records, calc_streak_from_statuses, evaluate_day};
use crate::db::Database;
use crate::error::{AdherenceError, Result};
use crate::models::{
    AutodoneReason, CalendarDay, CompletionPayload, DailyStatus, DayAdherence, DayDetail,
    Reminder, ScheduledReminder, StreakSummary,
};
use crate::reminder::{self, StatusChange};
use crate::schedule::{EatingWindowPlanner, SleepAwarePlanner, generate_schedule};
use crate::store::Store;

/// How far back a streak is followed.
pub const STREAK_LOOKBACK_DAYS: i64 = 366;

/// User-facing operations over one database handle. Every reminder and
/// day-status mutation goes through the lifecycle and evaluator modules.
pub struct SatedService<'a> {
    db: &'a Database,
    tz: Tz,
}

impl<'a> SatedService<'a> {
    #[must_use]
    pub fn new(db: &'a Database, tz: Tz) -> Self {
        Self { db, tz }
    }

    #[must_use]
    pub fn tz(&self) -> Tz {
        self.tz
    }

    #[must_use]
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        crate::civil::local_date(now, self.tz)
    }

    fn ensure_user(&self, user_id: i64) -> Result<()> {
        match self.db.get_user(user_id)? {
            Some(_) => Ok(()),
            None => Err(AdherenceError::NotFound(format!("User {user_id}"))),
        }
    }

    // --- Reminders ---

    pub fn reminders(&self, user_id: i64, day: NaiveDate) -> Result<Vec<Reminder>> {
        self.ensure_user(user_id)?;
        Ok(self.db.reminders_for_day(user_id, day)?)
    }

    /// The schedule the user's current profile would produce, without saving it.
    pub fn preview_schedule(&self, user_id: i64) -> Result<Vec<ScheduledReminder>> {
        self.ensure_user(user_id)?;
        let config = self.db.schedule_config(user_id)?;
        Ok(generate_schedule(&config, &SleepAwarePlanner))
    }

    /// Replace the user-day's reminders with a freshly generated schedule.
    pub fn regenerate_day(
        &self,
        user_id: i64,
        day: NaiveDate,
        planner: &dyn EatingWindowPlanner,
    ) -> Result<usize> {
        self.ensure_user(user_id)?;
        let config = self.db.schedule_config(user_id)?;
        let plan = generate_schedule(&config, planner);
        Ok(self.db.replace_reminders(user_id, day, &plan)?)
    }

    /// The log write and the status change commit together or not at all.
    pub fn complete_reminder(
        &self,
        id: i64,
        payload: &CompletionPayload,
        now: DateTime<Utc>,
    ) -> Result<Reminder> {
        self.db
            .atomically(|db| reminder::complete(db, db, id, payload, now))
    }

    pub fn postpone_reminder(&self, id: i64, minutes: i64, now: DateTime<Utc>) -> Result<Reminder> {
        reminder::postpone(self.db, id, minutes, now)
    }

    pub fn skip_reminder(&self, id: i64, now: DateTime<Utc>) -> Result<Reminder> {
        reminder::skip(self.db, id, now)
    }

    pub fn set_reminder_status(
        &self,
        id: i64,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Reminder> {
        self.db
            .atomically(|db| reminder::set_status(db, db, id, change, now))
    }

    // --- Days ---

    pub fn day_detail(&self, user_id: i64, day: NaiveDate) -> Result<DayDetail> {
        self.ensure_user(user_id)?;
        let intake = self.db.daily_intake(user_id, day)?;
        let target = self.db.daily_target(user_id, day)?;
        let config = self.db.adherence_config(user_id)?;
        Ok(DayDetail {
            user_id,
            day,
            status: self.db.daily_status(user_id, day)?,
            adherence: target.as_ref().map(|t| evaluate_day(&intake, t, &config)),
            intake,
            target,
            reminders: self.db.reminders_for_day(user_id, day)?,
        })
    }

    /// Flip the day between open and manually completed. A manual completion
    /// is never overwritten by the sweeps.
    pub fn toggle_day(
        &self,
        user_id: i64,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DailyStatus> {
        self.ensure_user(user_id)?;
        if day > self.today(now) {
            return Err(AdherenceError::invalid_payload(format!(
                "Cannot complete {day}: it is in the future"
            )));
        }
        let currently_done = self
            .db
            .daily_status(user_id, day)?
            .is_some_and(|s| s.completed);
        let status = if currently_done {
            DailyStatus {
                user_id,
                day,
                completed: false,
                completed_at: None,
                auto_completed: false,
                autodone_reason: None,
            }
        } else {
            DailyStatus {
                user_id,
                day,
                completed: true,
                completed_at: Some(now),
                auto_completed: false,
                autodone_reason: Some(AutodoneReason::Manual),
            }
        };
        self.db.upsert_daily_status(&status)?;
        tracing::info!(user_id, %day, completed = status.completed, "Day toggled");
        Ok(status)
    }

    /// Consecutive completed days ending today, or ending yesterday while
    /// today is still open. Strict mode also requires each day to meet its
    /// targets; a partial day ends the streak.
    pub fn streak(&self, user_id: i64, today: NaiveDate, strict: bool) -> Result<StreakSummary> {
        self.ensure_user(user_id)?;
        let from = today - Duration::days(STREAK_LOOKBACK_DAYS);
        let statuses: HashMap<NaiveDate, DailyStatus> = self
            .db
            .daily_statuses(user_id, from, today)?
            .into_iter()
            .map(|s| (s.day, s))
            .collect();
        let done = |day: NaiveDate| statuses.get(&day).is_some_and(|s| s.completed);

        let anchor = if done(today) {
            today
        } else {
            today - Duration::days(1)
        };
        let days: Vec<NaiveDate> = (0..STREAK_LOOKBACK_DAYS)
            .map(|back| anchor - Duration::days(back))
            .take_while(|day| *day >= from)
            .collect();

        let streak = if strict {
            let config = self.db.adherence_config(user_id)?;
            let mut classes = Vec::new();
            for day in days {
                if !done(day) {
                    classes.push(DayAdherence::Not);
                    break;
                }
                let class = match self.db.daily_target(user_id, day)? {
                    Some(target) => {
                        evaluate_day(&self.db.daily_intake(user_id, day)?, &target, &config)
                    }
                    None => DayAdherence::Completed,
                };
                classes.push(class);
                if class != DayAdherence::Completed {
                    break;
                }
            }
            calc_streak_from_statuses(&classes, true)
        } else {
            let records: Vec<bool> = days.into_iter().map(done).collect();
            calc_streak_from_records(&records)
        };

        Ok(StreakSummary {
            user_id,
            as_of: today,
            strict,
            streak,
        })
    }

    /// One entry per day of the month; days without a status row are open.
    pub fn calendar(&self, user_id: i64, year: i32, month: u32) -> Result<Vec<CalendarDay>> {
        self.ensure_user(user_id)?;
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            AdherenceError::invalid_payload(format!("Invalid month {year}-{month:02}"))
        })?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| AdherenceError::invalid_payload(format!("Invalid month {year}-{month:02}")))?;
        let last = next_first - Duration::days(1);

        let statuses: HashMap<NaiveDate, DailyStatus> = self
            .db
            .daily_statuses(user_id, first, last)?
            .into_iter()
            .map(|s| (s.day, s))
            .collect();

        Ok(first
            .iter_days()
            .take_while(|day| *day <= last)
            .map(|day| match statuses.get(&day) {
                Some(s) => CalendarDay {
                    day,
                    completed: s.completed,
                    auto_completed: s.auto_completed,
                    autodone_reason: s.autodone_reason,
                },
                None => CalendarDay {
                    day,
                    completed: false,
                    auto_completed: false,
                    autodone_reason: None,
                },
            })
            .collect())
    }

    /// Number of days in the month that ended completed.
    pub fn completed_in_month(&self, user_id: i64, year: i32, month: u32) -> Result<usize> {
        Ok(self
            .calendar(user_id, year, month)?
            .iter()
            .filter(|d| d.completed)
            .count())
    }

    #[must_use]
    pub fn weekday_index(day: NaiveDate) -> i64 {
        i64::from(day.weekday().num_days_from_monday())
    }
}
