use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use tabled::{Table, Tabled, settings::Style};

use sated_core::civil::local_date;
use sated_core::db::Database;
use sated_core::models::ScheduledReminder;
use sated_core::schedule::SleepAwarePlanner;
use sated_core::service::SatedService;

use super::helpers::{parse_date, print_json};

fn print_schedule(plan: &[ScheduledReminder]) {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Type")]
        kind: String,
    }

    let rows: Vec<PlanRow> = plan
        .iter()
        .map(|r| PlanRow {
            time: if r.next_day {
                format!("{} (+1)", r.scheduled_time)
            } else {
                r.scheduled_time.to_string()
            },
            kind: r
                .meal_kind
                .map_or_else(|| r.reminder_type.to_string(), |k| k.to_string()),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
}

/// Show what today's schedule would look like with the current profile.
pub(crate) fn cmd_schedule_preview(db: &Database, tz: Tz, user_id: i64, json: bool) -> Result<()> {
    let plan = SatedService::new(db, tz).preview_schedule(user_id)?;
    if json {
        print_json(&plan)
    } else {
        print_schedule(&plan);
        Ok(())
    }
}

/// Replace a day's reminders with a fresh schedule. Any progress on that
/// day's reminders is discarded.
pub(crate) fn cmd_schedule_apply(
    db: &Database,
    tz: Tz,
    user_id: i64,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let day = parse_date(date, local_date(Utc::now(), tz))?;
    let inserted = SatedService::new(db, tz).regenerate_day(user_id, day, &SleepAwarePlanner)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "user_id": user_id, "day": day, "reminders": inserted })
        );
    } else {
        println!("Generated {inserted} reminders for {day}");
    }
    Ok(())
}
