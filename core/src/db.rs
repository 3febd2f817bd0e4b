use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::civil::CivilTime;
use crate::models::{
    AdherenceConfig, DailyIntake, DailyStatus, DailyTarget, Food, NewFood, Reminder,
    ScheduleConfig, ScheduledReminder, User,
};
use crate::store::{LogWriter, Store};

const REMINDER_COLUMNS: &str = "id, uuid, user_id, day, reminder_type, meal_kind, scheduled_minute, \
     next_day, status, delayed_until, completed_at, log_id, created_at, updated_at";

const STATUS_COLUMNS: &str =
    "user_id, day, completed, completed_at, auto_completed, autodone_reason";

pub struct Database {
    conn: Connection,
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn now_stamp() -> String {
    timestamp(Utc::now())
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: T::Err| conversion_error(idx, e))
}

fn parse_optional<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| r.parse().map_err(|e: T::Err| conversion_error(idx, e)))
        .transpose()
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS schedule_configs (
                    user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                    wake_minute INTEGER NOT NULL DEFAULT 420,
                    sleep_minute INTEGER NOT NULL DEFAULT 1380,
                    pre_sleep_cutoff_hours INTEGER NOT NULL DEFAULT 3,
                    min_gap_between_meals_min INTEGER NOT NULL DEFAULT 180,
                    snacks_count INTEGER NOT NULL DEFAULT 0,
                    water_reminders_per_day INTEGER NOT NULL DEFAULT 8,
                    quiet_period_enabled INTEGER NOT NULL DEFAULT 1,
                    kcal_window REAL NOT NULL DEFAULT 0.10,
                    water_must_meet INTEGER NOT NULL DEFAULT 0,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS targets (
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
                    calories REAL NOT NULL,
                    protein_g REAL NOT NULL,
                    water_ml REAL NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, day_of_week)
                );

                CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    calories_per_100g REAL NOT NULL,
                    protein_per_100g REAL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    day TEXT NOT NULL,
                    food_id INTEGER NOT NULL REFERENCES foods(id),
                    amount_g REAL NOT NULL,
                    reminder_id INTEGER,
                    logged_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS water_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    day TEXT NOT NULL,
                    amount_ml REAL NOT NULL,
                    reminder_id INTEGER,
                    logged_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS reminders (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    day TEXT NOT NULL,
                    reminder_type TEXT NOT NULL,
                    meal_kind TEXT,
                    scheduled_minute INTEGER NOT NULL CHECK (scheduled_minute BETWEEN 0 AND 1439),
                    next_day INTEGER NOT NULL DEFAULT 0,
                    status TEXT NOT NULL DEFAULT 'pending',
                    delayed_until TEXT,
                    completed_at TEXT,
                    log_id INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, day, reminder_type, scheduled_minute)
                );

                CREATE TABLE IF NOT EXISTS daily_status (
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    day TEXT NOT NULL,
                    completed INTEGER NOT NULL DEFAULT 0,
                    completed_at TEXT,
                    auto_completed INTEGER NOT NULL DEFAULT 0,
                    autodone_reason TEXT,
                    PRIMARY KEY (user_id, day)
                );

                CREATE INDEX IF NOT EXISTS idx_reminders_user_day ON reminders(user_id, day);
                CREATE INDEX IF NOT EXISTS idx_food_logs_user_day ON food_logs(user_id, day);
                CREATE INDEX IF NOT EXISTS idx_water_logs_user_day ON water_logs(user_id, day);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Run `f` inside one SQLite transaction. Any error rolls back every
    /// write `f` made through this database.
    pub fn atomically<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let out = f(self)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(out)
    }

    // --- Users ---

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            active: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    pub fn add_user(&self, name: &str) -> Result<User> {
        self.conn
            .execute(
                "INSERT INTO users (name, active, created_at) VALUES (?1, 1, ?2)",
                params![name, now_stamp()],
            )
            .with_context(|| format!("Failed to add user '{name}'"))?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.context("User not found")
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, name, active, created_at FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()
            .context("Failed to load user")
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, active, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn set_user_active(&self, id: i64, active: bool) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE users SET active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        Ok(rows > 0)
    }

    // --- Schedule and adherence config ---

    pub fn set_schedule_config(&self, user_id: i64, config: &ScheduleConfig) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO schedule_configs (user_id, wake_minute, sleep_minute, pre_sleep_cutoff_hours,
                     min_gap_between_meals_min, snacks_count, water_reminders_per_day,
                     quiet_period_enabled, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(user_id) DO UPDATE SET
                     wake_minute = excluded.wake_minute,
                     sleep_minute = excluded.sleep_minute,
                     pre_sleep_cutoff_hours = excluded.pre_sleep_cutoff_hours,
                     min_gap_between_meals_min = excluded.min_gap_between_meals_min,
                     snacks_count = excluded.snacks_count,
                     water_reminders_per_day = excluded.water_reminders_per_day,
                     quiet_period_enabled = excluded.quiet_period_enabled,
                     updated_at = excluded.updated_at",
                params![
                    user_id,
                    config.wake_time.minutes(),
                    config.sleep_time.minutes(),
                    config.pre_sleep_cutoff_hours,
                    config.min_gap_between_meals_min,
                    config.snacks_count,
                    config.water_reminders_per_day,
                    config.quiet_period_enabled,
                    now_stamp(),
                ],
            )
            .context("Failed to save schedule config")?;
        Ok(())
    }

    pub fn set_adherence_config(&self, user_id: i64, config: &AdherenceConfig) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO schedule_configs (user_id, kcal_window, water_must_meet, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     kcal_window = excluded.kcal_window,
                     water_must_meet = excluded.water_must_meet,
                     updated_at = excluded.updated_at",
                params![user_id, config.kcal_window, config.water_must_meet, now_stamp()],
            )
            .context("Failed to save adherence config")?;
        Ok(())
    }

    // --- Targets ---

    fn target_from_row(row: &rusqlite::Row) -> rusqlite::Result<DailyTarget> {
        Ok(DailyTarget {
            day_of_week: row.get(0)?,
            calories: row.get(1)?,
            protein_g: row.get(2)?,
            water_ml: row.get(3)?,
        })
    }

    pub fn set_target(&self, user_id: i64, target: &DailyTarget) -> Result<DailyTarget> {
        self.conn.execute(
            "INSERT OR REPLACE INTO targets (user_id, day_of_week, calories, protein_g, water_ml, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                target.day_of_week,
                target.calories,
                target.protein_g,
                target.water_ml,
                now_stamp(),
            ],
        )?;
        Ok(target.clone())
    }

    pub fn get_target(&self, user_id: i64, day_of_week: i64) -> Result<Option<DailyTarget>> {
        self.conn
            .query_row(
                "SELECT day_of_week, calories, protein_g, water_ml FROM targets
                 WHERE user_id = ?1 AND day_of_week = ?2",
                params![user_id, day_of_week],
                Self::target_from_row,
            )
            .optional()
            .context("Failed to load target")
    }

    pub fn get_all_targets(&self, user_id: i64) -> Result<Vec<DailyTarget>> {
        let mut stmt = self.conn.prepare(
            "SELECT day_of_week, calories, protein_g, water_ml FROM targets
             WHERE user_id = ?1 ORDER BY day_of_week",
        )?;
        let targets = stmt
            .query_map(params![user_id], Self::target_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    // --- Foods and logs ---

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<Food> {
        Ok(Food {
            id: row.get(0)?,
            name: row.get(1)?,
            calories_per_100g: row.get(2)?,
            protein_per_100g: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn insert_food(&self, food: &NewFood) -> Result<Food> {
        self.conn.execute(
            "INSERT INTO foods (name, calories_per_100g, protein_per_100g, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                food.name,
                food.calories_per_100g,
                food.protein_per_100g,
                now_stamp()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_food_by_id(id)
    }

    pub fn get_food_by_id(&self, id: i64) -> Result<Food> {
        self.conn
            .query_row(
                "SELECT id, name, calories_per_100g, protein_per_100g, created_at FROM foods WHERE id = ?1",
                params![id],
                Self::food_from_row,
            )
            .context("Food not found")
    }

    pub fn list_foods(&self) -> Result<Vec<Food>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, calories_per_100g, protein_per_100g, created_at FROM foods ORDER BY name",
        )?;
        let foods = stmt
            .query_map([], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// Log food outside of any reminder.
    pub fn log_food(
        &self,
        user_id: i64,
        day: NaiveDate,
        food_id: i64,
        amount_g: f64,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.insert_food_log(user_id, day, food_id, amount_g, None, at)
    }

    pub fn log_water(
        &self,
        user_id: i64,
        day: NaiveDate,
        amount_ml: f64,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.insert_water_log(user_id, day, amount_ml, None, at)
    }

    fn insert_food_log(
        &self,
        user_id: i64,
        day: NaiveDate,
        food_id: i64,
        amount_g: f64,
        reminder_id: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO food_logs (user_id, day, food_id, amount_g, reminder_id, logged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    day_key(day),
                    food_id,
                    amount_g,
                    reminder_id,
                    timestamp(at)
                ],
            )
            .context("Failed to write food log")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_water_log(
        &self,
        user_id: i64,
        day: NaiveDate,
        amount_ml: f64,
        reminder_id: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO water_logs (user_id, day, amount_ml, reminder_id, logged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, day_key(day), amount_ml, reminder_id, timestamp(at)],
            )
            .context("Failed to write water log")?;
        Ok(self.conn.last_insert_rowid())
    }

    // --- Reminders and day status rows ---

    // Expects REMINDER_COLUMNS order.
    fn reminder_from_row(row: &rusqlite::Row) -> rusqlite::Result<Reminder> {
        Ok(Reminder {
            id: row.get(0)?,
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            day: parse_column(row, 3)?,
            reminder_type: parse_column(row, 4)?,
            meal_kind: parse_optional(row, 5)?,
            scheduled_time: CivilTime::from_minutes(row.get(6)?),
            next_day: row.get(7)?,
            status: parse_column(row, 8)?,
            delayed_until: parse_optional(row, 9)?,
            completed_at: parse_optional(row, 10)?,
            log_id: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    // Expects STATUS_COLUMNS order.
    fn status_from_row(row: &rusqlite::Row) -> rusqlite::Result<DailyStatus> {
        Ok(DailyStatus {
            user_id: row.get(0)?,
            day: parse_column(row, 1)?,
            completed: row.get(2)?,
            completed_at: parse_optional(row, 3)?,
            auto_completed: row.get(4)?,
            autodone_reason: parse_optional(row, 5)?,
        })
    }
}

impl Store for Database {
    fn active_user_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM users WHERE active = 1 ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn schedule_config(&self, user_id: i64) -> Result<ScheduleConfig> {
        let config = self
            .conn
            .query_row(
                "SELECT wake_minute, sleep_minute, pre_sleep_cutoff_hours, min_gap_between_meals_min,
                        snacks_count, water_reminders_per_day, quiet_period_enabled
                 FROM schedule_configs WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(ScheduleConfig {
                        wake_time: CivilTime::from_minutes(row.get(0)?),
                        sleep_time: CivilTime::from_minutes(row.get(1)?),
                        pre_sleep_cutoff_hours: row.get(2)?,
                        min_gap_between_meals_min: row.get(3)?,
                        snacks_count: row.get(4)?,
                        water_reminders_per_day: row.get(5)?,
                        quiet_period_enabled: row.get(6)?,
                    })
                },
            )
            .optional()
            .context("Failed to load schedule config")?;
        Ok(config.unwrap_or_default())
    }

    fn adherence_config(&self, user_id: i64) -> Result<AdherenceConfig> {
        let config = self
            .conn
            .query_row(
                "SELECT kcal_window, water_must_meet FROM schedule_configs WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(AdherenceConfig {
                        kcal_window: row.get(0)?,
                        water_must_meet: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to load adherence config")?;
        Ok(config.unwrap_or_default())
    }

    fn reminders_for_day(&self, user_id: i64, day: NaiveDate) -> Result<Vec<Reminder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE user_id = ?1 AND day = ?2"
        ))?;
        let mut reminders = stmt
            .query_map(params![user_id, day_key(day)], Self::reminder_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load reminders")?;
        reminders.sort_by_key(|r| (r.next_day, r.scheduled_time, r.reminder_type));
        Ok(reminders)
    }

    fn get_reminder(&self, id: i64) -> Result<Option<Reminder>> {
        self.conn
            .query_row(
                &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                params![id],
                Self::reminder_from_row,
            )
            .optional()
            .context("Failed to load reminder")
    }

    fn update_reminder(&self, reminder: &Reminder) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE reminders
                 SET status = ?1, delayed_until = ?2, completed_at = ?3, log_id = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    reminder.status.as_str(),
                    reminder.delayed_until.map(timestamp),
                    reminder.completed_at.map(timestamp),
                    reminder.log_id,
                    now_stamp(),
                    reminder.id,
                ],
            )
            .context("Failed to update reminder")?;
        if rows == 0 {
            anyhow::bail!("Reminder {} vanished during update", reminder.id);
        }
        Ok(())
    }

    fn replace_reminders(
        &self,
        user_id: i64,
        day: NaiveDate,
        reminders: &[ScheduledReminder],
    ) -> Result<usize> {
        let key = day_key(day);
        let now = now_stamp();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin reminder replacement")?;
        tx.execute(
            "DELETE FROM reminders WHERE user_id = ?1 AND day = ?2",
            params![user_id, key],
        )?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO reminders (uuid, user_id, day, reminder_type, meal_kind,
                     scheduled_minute, next_day, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?8)",
            )?;
            for r in reminders {
                inserted += stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    user_id,
                    key,
                    r.reminder_type.as_str(),
                    r.meal_kind.map(|k| k.as_str()),
                    r.scheduled_time.minutes(),
                    r.next_day,
                    now,
                ])?;
            }
        }
        tx.commit().context("Failed to commit reminder replacement")?;
        Ok(inserted)
    }

    fn delete_reminders(&self, user_id: i64, day: NaiveDate) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM reminders WHERE user_id = ?1 AND day = ?2",
            params![user_id, day_key(day)],
        )?;
        Ok(rows)
    }

    fn daily_status(&self, user_id: i64, day: NaiveDate) -> Result<Option<DailyStatus>> {
        self.conn
            .query_row(
                &format!("SELECT {STATUS_COLUMNS} FROM daily_status WHERE user_id = ?1 AND day = ?2"),
                params![user_id, day_key(day)],
                Self::status_from_row,
            )
            .optional()
            .context("Failed to load day status")
    }

    fn upsert_daily_status(&self, status: &DailyStatus) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO daily_status (user_id, day, completed, completed_at, auto_completed, autodone_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, day) DO UPDATE SET
                     completed = excluded.completed,
                     completed_at = excluded.completed_at,
                     auto_completed = excluded.auto_completed,
                     autodone_reason = excluded.autodone_reason",
                params![
                    status.user_id,
                    day_key(status.day),
                    status.completed,
                    status.completed_at.map(timestamp),
                    status.auto_completed,
                    status.autodone_reason.map(|r| r.as_str()),
                ],
            )
            .context("Failed to save day status")?;
        Ok(())
    }

    fn complete_day_if_open(&self, status: &DailyStatus) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "INSERT INTO daily_status (user_id, day, completed, completed_at, auto_completed, autodone_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, day) DO UPDATE SET
                     completed = excluded.completed,
                     completed_at = excluded.completed_at,
                     auto_completed = excluded.auto_completed,
                     autodone_reason = excluded.autodone_reason
                 WHERE daily_status.completed = 0",
                params![
                    status.user_id,
                    day_key(status.day),
                    status.completed,
                    status.completed_at.map(timestamp),
                    status.auto_completed,
                    status.autodone_reason.map(|r| r.as_str()),
                ],
            )
            .context("Failed to complete day")?;
        Ok(rows > 0)
    }

    fn daily_statuses(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyStatus>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STATUS_COLUMNS} FROM daily_status
             WHERE user_id = ?1 AND day BETWEEN ?2 AND ?3 ORDER BY day"
        ))?;
        let statuses = stmt
            .query_map(
                params![user_id, day_key(from), day_key(to)],
                Self::status_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load day statuses")?;
        Ok(statuses)
    }

    fn daily_target(&self, user_id: i64, day: NaiveDate) -> Result<Option<DailyTarget>> {
        let day_of_week = i64::from(day.weekday().num_days_from_monday());
        self.get_target(user_id, day_of_week)
    }

    fn daily_intake(&self, user_id: i64, day: NaiveDate) -> Result<DailyIntake> {
        let key = day_key(day);
        let (kcal, protein_g): (f64, f64) = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(f.calories_per_100g * fl.amount_g / 100.0), 0.0),
                        COALESCE(SUM(COALESCE(f.protein_per_100g, 0.0) * fl.amount_g / 100.0), 0.0)
                 FROM food_logs fl
                 JOIN foods f ON f.id = fl.food_id
                 WHERE fl.user_id = ?1 AND fl.day = ?2",
                params![user_id, key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .context("Failed to sum food intake")?;
        let water_ml: f64 = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(amount_ml), 0.0) FROM water_logs WHERE user_id = ?1 AND day = ?2",
                params![user_id, key],
                |row| row.get(0),
            )
            .context("Failed to sum water intake")?;
        Ok(DailyIntake {
            kcal,
            protein_g,
            water_ml,
        })
    }

    fn last_log_time(&self, user_id: i64, day: NaiveDate) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<String> = self
            .conn
            .query_row(
                "SELECT MAX(logged_at) FROM (
                     SELECT logged_at FROM food_logs WHERE user_id = ?1 AND day = ?2
                     UNION ALL
                     SELECT logged_at FROM water_logs WHERE user_id = ?1 AND day = ?2
                 )",
                params![user_id, day_key(day)],
                |row| row.get(0),
            )
            .context("Failed to load last log time")?;
        latest
            .map(|s| {
                s.parse::<DateTime<Utc>>()
                    .with_context(|| format!("Bad log timestamp '{s}'"))
            })
            .transpose()
    }
}

impl LogWriter for Database {
    fn has_food(&self, food_id: i64) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM foods WHERE id = ?1",
                params![food_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn write_food_log(
        &self,
        reminder: &Reminder,
        food_id: i64,
        amount_g: f64,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.insert_food_log(
            reminder.user_id,
            reminder.day,
            food_id,
            amount_g,
            Some(reminder.id),
            at,
        )
    }

    fn write_water_log(
        &self,
        reminder: &Reminder,
        amount_ml: f64,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.insert_water_log(reminder.user_id, reminder.day, amount_ml, Some(reminder.id), at)
    }
}
