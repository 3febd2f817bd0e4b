use anyhow::{Context, Result, bail};
use serde::Serialize;

use sated_core::civil::CivilTime;
use sated_core::db::Database;
use sated_core::models::{
    AdherenceConfig, ScheduleConfig, validate_adherence_config, validate_schedule_config,
};
use sated_core::store::Store;

use super::helpers::print_json;

#[derive(Serialize)]
struct Profile {
    user_id: i64,
    schedule: ScheduleConfig,
    adherence: AdherenceConfig,
}

/// Requested changes to a user's profile; `None` keeps the stored value.
#[derive(Default)]
pub(crate) struct ProfileUpdate {
    pub wake: Option<String>,
    pub sleep: Option<String>,
    pub cutoff_hours: Option<i32>,
    pub min_gap: Option<i32>,
    pub snacks: Option<i32>,
    pub water_reminders: Option<i32>,
    pub quiet_period: Option<bool>,
    pub kcal_window: Option<f64>,
    pub water_must_meet: Option<bool>,
}

fn parse_time(s: &str, what: &str) -> Result<CivilTime> {
    s.parse()
        .with_context(|| format!("Invalid {what} time '{s}'. Use HH:MM"))
}

fn ensure_user(db: &Database, user_id: i64) -> Result<()> {
    if db.get_user(user_id)?.is_none() {
        bail!("User {user_id} not found");
    }
    Ok(())
}

fn print_profile(profile: &Profile) {
    let s = &profile.schedule;
    let a = &profile.adherence;
    println!("User {}", profile.user_id);
    println!("  Wake / sleep:        {} / {}", s.wake_time, s.sleep_time);
    println!("  Pre-sleep cutoff:    {} h", s.pre_sleep_cutoff_hours);
    println!("  Min gap (meals):     {} min", s.min_gap_between_meals_min);
    println!("  Snacks:              {}", s.snacks_count);
    let cap = if s.water_reminders_per_day == 0 {
        "no cap".to_string()
    } else {
        s.water_reminders_per_day.to_string()
    };
    println!("  Water reminders:     {cap}");
    println!("  Quiet period:        {}", if s.quiet_period_enabled { "on" } else { "off" });
    println!("  Calorie window:      ±{:.0}%", a.kcal_window * 100.0);
    println!("  Water must be met:   {}", if a.water_must_meet { "yes" } else { "no" });
}

pub(crate) fn cmd_config_show(db: &Database, user_id: i64, json: bool) -> Result<()> {
    ensure_user(db, user_id)?;
    let profile = Profile {
        user_id,
        schedule: db.schedule_config(user_id)?,
        adherence: db.adherence_config(user_id)?,
    };
    if json {
        print_json(&profile)
    } else {
        print_profile(&profile);
        Ok(())
    }
}

/// Changes take effect at the next daily regeneration, or immediately with
/// `sated schedule apply`.
pub(crate) fn cmd_config_set(
    db: &Database,
    user_id: i64,
    update: ProfileUpdate,
    json: bool,
) -> Result<()> {
    ensure_user(db, user_id)?;
    let mut schedule = db.schedule_config(user_id)?;
    let mut adherence = db.adherence_config(user_id)?;

    if let Some(wake) = update.wake.as_deref() {
        schedule.wake_time = parse_time(wake, "wake")?;
    }
    if let Some(sleep) = update.sleep.as_deref() {
        schedule.sleep_time = parse_time(sleep, "sleep")?;
    }
    if let Some(v) = update.cutoff_hours {
        schedule.pre_sleep_cutoff_hours = v;
    }
    if let Some(v) = update.min_gap {
        schedule.min_gap_between_meals_min = v;
    }
    if let Some(v) = update.snacks {
        schedule.snacks_count = v;
    }
    if let Some(v) = update.water_reminders {
        schedule.water_reminders_per_day = v;
    }
    if let Some(v) = update.quiet_period {
        schedule.quiet_period_enabled = v;
    }
    if let Some(v) = update.kcal_window {
        adherence.kcal_window = v;
    }
    if let Some(v) = update.water_must_meet {
        adherence.water_must_meet = v;
    }

    validate_schedule_config(&schedule)?;
    validate_adherence_config(&adherence)?;
    db.set_schedule_config(user_id, &schedule)?;
    db.set_adherence_config(user_id, &adherence)?;

    let profile = Profile {
        user_id,
        schedule,
        adherence,
    };
    if json {
        print_json(&profile)
    } else {
        print_profile(&profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_set_persists_partial_update() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let update = ProfileUpdate {
            wake: Some("06:30".to_string()),
            snacks: Some(2),
            kcal_window: Some(0.2),
            ..ProfileUpdate::default()
        };
        cmd_config_set(&db, user.id, update, true).unwrap();

        let schedule = db.schedule_config(user.id).unwrap();
        assert_eq!(schedule.wake_time, CivilTime::new(6, 30).unwrap());
        assert_eq!(schedule.snacks_count, 2);
        assert_eq!(schedule.sleep_time, ScheduleConfig::default().sleep_time);
        assert!((db.adherence_config(user.id).unwrap().kcal_window - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_config_set_rejects_invalid_values() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let bad_time = ProfileUpdate {
            sleep: Some("25:00".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(cmd_config_set(&db, user.id, bad_time, true).is_err());

        let bad_window = ProfileUpdate {
            kcal_window: Some(0.0),
            ..ProfileUpdate::default()
        };
        assert!(cmd_config_set(&db, user.id, bad_window, true).is_err());
        assert_eq!(
            db.schedule_config(user.id).unwrap(),
            ScheduleConfig::default()
        );
    }

    #[test]
    fn test_config_unknown_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(cmd_config_show(&db, 7, true).is_err());
    }
}
