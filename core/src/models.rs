use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::civil::CivilTime;

/// Declaration order is the tie-break order when two reminders share a minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    Meal,
    Water,
    Snack,
    AiMorning,
    AiEvening,
}

impl ReminderType {
    pub const ALL: [Self; 5] = [
        Self::Meal,
        Self::Water,
        Self::Snack,
        Self::AiMorning,
        Self::AiEvening,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meal => "meal",
            Self::Water => "water",
            Self::Snack => "snack",
            Self::AiMorning => "ai_morning",
            Self::AiEvening => "ai_evening",
        }
    }

    #[must_use]
    pub fn is_ai(self) -> bool {
        matches!(self, Self::AiMorning | Self::AiEvening)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealKind {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealKind {
    pub const ALL: [Self; 4] = [Self::Breakfast, Self::Lunch, Self::Dinner, Self::Snack];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }

    /// Breakfast, lunch and dinner are `meal` reminders; snacks are `snack`.
    #[must_use]
    pub fn reminder_type(self) -> ReminderType {
        match self {
            Self::Snack => ReminderType::Snack,
            _ => ReminderType::Meal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Countdown,
    Completed,
    Delayed,
    Postponed,
    Skipped,
    Missed,
}

impl ReminderStatus {
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Countdown,
        Self::Completed,
        Self::Delayed,
        Self::Postponed,
        Self::Skipped,
        Self::Missed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Countdown => "countdown",
            Self::Completed => "completed",
            Self::Delayed => "delayed",
            Self::Postponed => "postponed",
            Self::Skipped => "skipped",
            Self::Missed => "missed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Missed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutodoneReason {
    Manual,
    Sleep,
    MacroOk,
    DayRollover,
}

impl AutodoneReason {
    pub const ALL: [Self; 4] = [Self::Manual, Self::Sleep, Self::MacroOk, Self::DayRollover];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Sleep => "sleep",
            Self::MacroOk => "macro_ok",
            Self::DayRollover => "day_rollover",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayAdherence {
    Completed,
    Partial,
    Not,
}

impl DayAdherence {
    pub const ALL: [Self; 3] = [Self::Completed, Self::Partial, Self::Not];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Not => "not",
        }
    }
}

macro_rules! str_enum_impls {
    ($($ty:ident => $what:literal),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = anyhow::Error;

                fn from_str(s: &str) -> Result<Self> {
                    let lower = s.trim().to_lowercase();
                    Self::ALL
                        .into_iter()
                        .find(|v| v.as_str() == lower)
                        .ok_or_else(|| {
                            let valid: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                            anyhow!(
                                "Invalid {} '{s}'. Must be one of: {}",
                                $what,
                                valid.join(", ")
                            )
                        })
                }
            }
        )*
    };
}

str_enum_impls!(
    ReminderType => "reminder type",
    MealKind => "meal kind",
    ReminderStatus => "reminder status",
    AutodoneReason => "autodone reason",
    DayAdherence => "adherence",
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFood {
    pub name: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub day: NaiveDate,
    pub reminder_type: ReminderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_kind: Option<MealKind>,
    pub scheduled_time: CivilTime,
    /// The reminder fires after local midnight following `day`.
    pub next_day: bool,
    pub status: ReminderStatus,
    pub delayed_until: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub log_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A generated reminder before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledReminder {
    pub reminder_type: ReminderType,
    pub scheduled_time: CivilTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_kind: Option<MealKind>,
    pub next_day: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatus {
    pub user_id: i64,
    pub day: NaiveDate,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub auto_completed: bool,
    pub autodone_reason: Option<AutodoneReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub wake_time: CivilTime,
    pub sleep_time: CivilTime,
    pub pre_sleep_cutoff_hours: i32,
    pub min_gap_between_meals_min: i32,
    pub snacks_count: i32,
    /// Zero means no cap.
    pub water_reminders_per_day: i32,
    pub quiet_period_enabled: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            wake_time: CivilTime::from_minutes(7 * 60),
            sleep_time: CivilTime::from_minutes(23 * 60),
            pre_sleep_cutoff_hours: 3,
            min_gap_between_meals_min: 180,
            snacks_count: 0,
            water_reminders_per_day: 8,
            quiet_period_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdherenceConfig {
    /// Allowed relative deviation from the calorie target.
    pub kcal_window: f64,
    pub water_must_meet: bool,
}

impl Default for AdherenceConfig {
    fn default() -> Self {
        Self {
            kcal_window: 0.10,
            water_must_meet: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTarget {
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: i64,
    pub calories: f64,
    pub protein_g: f64,
    pub water_ml: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyIntake {
    pub kcal: f64,
    pub protein_g: f64,
    pub water_ml: f64,
}

/// Body of a completion request. Meals and snacks need `food_id` and
/// `amount` in grams; water needs `amount` in millilitres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    pub food_id: Option<i64>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayDetail {
    pub user_id: i64,
    pub day: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DailyStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adherence: Option<DayAdherence>,
    pub intake: DailyIntake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<DailyTarget>,
    pub reminders: Vec<Reminder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay {
    pub day: NaiveDate,
    pub completed: bool,
    pub auto_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autodone_reason: Option<AutodoneReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreakSummary {
    pub user_id: i64,
    pub as_of: NaiveDate,
    pub strict: bool,
    pub streak: usize,
}

pub fn validate_user_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("User name must not be empty");
    }
    Ok(trimmed.to_string())
}

pub fn validate_food_data(food: &NewFood) -> Result<()> {
    if food.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    if food.calories_per_100g < 0.0 {
        bail!("calories_per_100g must not be negative");
    }
    if food.protein_per_100g.is_some_and(|v| v < 0.0) {
        bail!("protein_per_100g must not be negative");
    }
    Ok(())
}

pub fn validate_target(target: &DailyTarget) -> Result<()> {
    if !(0..=6).contains(&target.day_of_week) {
        bail!(
            "Invalid day_of_week {}. Must be 0 (Monday) to 6 (Sunday)",
            target.day_of_week
        );
    }
    if target.calories <= 0.0 {
        bail!("Calorie target must be greater than 0");
    }
    if target.protein_g < 0.0 {
        bail!("Protein target must not be negative");
    }
    if target.water_ml < 0.0 {
        bail!("Water target must not be negative");
    }
    Ok(())
}

pub fn validate_schedule_config(config: &ScheduleConfig) -> Result<()> {
    if !(0..=12).contains(&config.pre_sleep_cutoff_hours) {
        bail!("pre_sleep_cutoff_hours must be between 0 and 12");
    }
    if !(0..=720).contains(&config.min_gap_between_meals_min) {
        bail!("min_gap_between_meals_min must be between 0 and 720");
    }
    if !(0..=6).contains(&config.snacks_count) {
        bail!("snacks_count must be between 0 and 6");
    }
    if !(0..=48).contains(&config.water_reminders_per_day) {
        bail!("water_reminders_per_day must be between 0 and 48 (0 for no cap)");
    }
    Ok(())
}

pub fn validate_adherence_config(config: &AdherenceConfig) -> Result<()> {
    if !(config.kcal_window > 0.0 && config.kcal_window <= 1.0) {
        bail!("kcal_window must be greater than 0 and at most 1");
    }
    Ok(())
}
