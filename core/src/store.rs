//! Persistence seams consumed by the engine.
//!
//! The engine only talks to storage through these traits. [`crate::db::Database`]
//! implements both on top of SQLite.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    AdherenceConfig, DailyIntake, DailyStatus, DailyTarget, Reminder, ScheduleConfig,
    ScheduledReminder,
};

pub trait Store {
    /// Ids of users the maintenance jobs should visit.
    fn active_user_ids(&self) -> Result<Vec<i64>>;

    /// The user's schedule profile, or the defaults when none is stored.
    fn schedule_config(&self, user_id: i64) -> Result<ScheduleConfig>;

    fn adherence_config(&self, user_id: i64) -> Result<AdherenceConfig>;

    /// Reminders for one user-day, ordered as they fire.
    fn reminders_for_day(&self, user_id: i64, day: NaiveDate) -> Result<Vec<Reminder>>;

    fn get_reminder(&self, id: i64) -> Result<Option<Reminder>>;

    /// Persist the mutable lifecycle fields of an existing reminder.
    fn update_reminder(&self, reminder: &Reminder) -> Result<()>;

    /// Atomically drop every reminder for the user-day and insert `reminders`
    /// as fresh pending rows. Returns the number inserted.
    fn replace_reminders(
        &self,
        user_id: i64,
        day: NaiveDate,
        reminders: &[ScheduledReminder],
    ) -> Result<usize>;

    fn delete_reminders(&self, user_id: i64, day: NaiveDate) -> Result<usize>;

    fn daily_status(&self, user_id: i64, day: NaiveDate) -> Result<Option<DailyStatus>>;

    /// Insert or overwrite the row for `(status.user_id, status.day)`.
    fn upsert_daily_status(&self, status: &DailyStatus) -> Result<()>;

    /// Write `status` only if the day has no row yet or its row is still open.
    /// Returns whether anything changed.
    fn complete_day_if_open(&self, status: &DailyStatus) -> Result<bool>;

    /// Rows for `from..=to`, oldest first. Days without a row are absent.
    fn daily_statuses(&self, user_id: i64, from: NaiveDate, to: NaiveDate)
    -> Result<Vec<DailyStatus>>;

    fn daily_target(&self, user_id: i64, day: NaiveDate) -> Result<Option<DailyTarget>>;

    fn daily_intake(&self, user_id: i64, day: NaiveDate) -> Result<DailyIntake>;

    /// Most recent food or water log recorded against `day`.
    fn last_log_time(&self, user_id: i64, day: NaiveDate) -> Result<Option<DateTime<Utc>>>;
}

/// Writes the log entries a completed reminder produces.
pub trait LogWriter {
    fn has_food(&self, food_id: i64) -> Result<bool>;

    /// Record `amount_g` grams of a food against the reminder's day.
    /// Returns the new log id.
    fn write_food_log(
        &self,
        reminder: &Reminder,
        food_id: i64,
        amount_g: f64,
        at: DateTime<Utc>,
    ) -> Result<i64>;

    fn write_water_log(&self, reminder: &Reminder, amount_ml: f64, at: DateTime<Utc>)
    -> Result<i64>;
}
