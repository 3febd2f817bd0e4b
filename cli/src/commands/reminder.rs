use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;

use sated_core::civil::local_date;
use sated_core::db::Database;
use sated_core::models::{CompletionPayload, Reminder, ReminderStatus};
use sated_core::reminder::StatusChange;
use sated_core::service::SatedService;

use super::helpers::{parse_date, print_json, print_reminder_table};

fn print_result(reminder: &Reminder, json: bool) -> Result<()> {
    if json {
        return print_json(reminder);
    }
    print!(
        "Reminder {} ({} at {}) is now {}",
        reminder.id, reminder.reminder_type, reminder.scheduled_time, reminder.status
    );
    if let Some(until) = reminder.delayed_until {
        print!(" until {}", until.format("%H:%M UTC"));
    }
    println!();
    Ok(())
}

pub(crate) fn cmd_reminders(
    db: &Database,
    tz: Tz,
    user_id: i64,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let day = parse_date(date, local_date(Utc::now(), tz))?;
    let reminders = SatedService::new(db, tz).reminders(user_id, day)?;

    if json {
        print_json(&reminders)?;
    } else if reminders.is_empty() {
        eprintln!("No reminders for {day}. Use `sated schedule apply {user_id}` to generate them.");
    } else {
        println!("Reminders for {day}");
        print_reminder_table(&reminders);
    }
    Ok(())
}

pub(crate) fn cmd_complete(
    db: &Database,
    tz: Tz,
    id: i64,
    food_id: Option<i64>,
    amount: Option<f64>,
    json: bool,
) -> Result<()> {
    let payload = CompletionPayload { food_id, amount };
    let reminder = SatedService::new(db, tz).complete_reminder(id, &payload, Utc::now())?;
    print_result(&reminder, json)
}

pub(crate) fn cmd_postpone(db: &Database, tz: Tz, id: i64, minutes: i64, json: bool) -> Result<()> {
    let reminder = SatedService::new(db, tz).postpone_reminder(id, minutes, Utc::now())?;
    print_result(&reminder, json)
}

pub(crate) fn cmd_skip(db: &Database, tz: Tz, id: i64, json: bool) -> Result<()> {
    let reminder = SatedService::new(db, tz).skip_reminder(id, Utc::now())?;
    print_result(&reminder, json)
}

/// Generic status change, the CLI twin of the mutate-status endpoint.
pub(crate) fn cmd_set_status(
    db: &Database,
    tz: Tz,
    id: i64,
    status: &str,
    minutes: Option<i64>,
    payload: CompletionPayload,
    json: bool,
) -> Result<()> {
    let status: ReminderStatus = status
        .parse()
        .with_context(|| format!("Cannot set reminder {id}"))?;
    let change = StatusChange {
        status,
        minutes,
        payload,
    };
    let reminder = SatedService::new(db, tz).set_reminder_status(id, &change, Utc::now())?;
    print_result(&reminder, json)
}
