use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use tabled::{Table, Tabled, settings::Style};

use sated_core::civil::local_date;
use sated_core::db::Database;
use sated_core::models::{AutodoneReason, DailyStatus, DayDetail};
use sated_core::service::SatedService;

use super::helpers::{no_neg_zero, parse_date, parse_month, print_json, print_reminder_table};

fn describe_status(status: Option<&DailyStatus>) -> String {
    match status {
        Some(s) if s.completed => match s.autodone_reason {
            Some(AutodoneReason::Manual) | None => "completed".to_string(),
            Some(reason) => format!("completed ({reason})"),
        },
        _ => "open".to_string(),
    }
}

fn print_day(detail: &DayDetail) {
    let intake = &detail.intake;
    println!("{}: {}", detail.day, describe_status(detail.status.as_ref()));
    match &detail.target {
        Some(t) => {
            println!(
                "  Calories: {:.0} / {:.0} kcal",
                no_neg_zero(intake.kcal),
                t.calories
            );
            println!(
                "  Protein:  {:.0} / {:.0} g",
                no_neg_zero(intake.protein_g),
                t.protein_g
            );
            println!(
                "  Water:    {:.0} / {:.0} ml",
                no_neg_zero(intake.water_ml),
                t.water_ml
            );
        }
        None => {
            println!("  Calories: {:.0} kcal", no_neg_zero(intake.kcal));
            println!("  Protein:  {:.0} g", no_neg_zero(intake.protein_g));
            println!("  Water:    {:.0} ml", no_neg_zero(intake.water_ml));
        }
    }
    if let Some(adherence) = detail.adherence {
        println!("  Adherence: {adherence}");
    }
    if !detail.reminders.is_empty() {
        print_reminder_table(&detail.reminders);
    }
}

pub(crate) fn cmd_day_show(
    db: &Database,
    tz: Tz,
    user_id: i64,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let day = parse_date(date, local_date(Utc::now(), tz))?;
    let detail = SatedService::new(db, tz).day_detail(user_id, day)?;
    if json {
        print_json(&detail)
    } else {
        print_day(&detail);
        Ok(())
    }
}

pub(crate) fn cmd_day_toggle(
    db: &Database,
    tz: Tz,
    user_id: i64,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let now = Utc::now();
    let day = parse_date(date, local_date(now, tz))?;
    let status = SatedService::new(db, tz).toggle_day(user_id, day, now)?;
    if json {
        print_json(&status)
    } else {
        println!("{day}: {}", describe_status(Some(&status)));
        Ok(())
    }
}

pub(crate) fn cmd_streak(db: &Database, tz: Tz, user_id: i64, strict: bool, json: bool) -> Result<()> {
    let today = local_date(Utc::now(), tz);
    let summary = SatedService::new(db, tz).streak(user_id, today, strict)?;
    if json {
        print_json(&summary)
    } else {
        let days = if summary.streak == 1 { "day" } else { "days" };
        let mode = if strict { " (strict)" } else { "" };
        println!("Streak{mode}: {} {days}", summary.streak);
        Ok(())
    }
}

pub(crate) fn cmd_calendar(
    db: &Database,
    tz: Tz,
    user_id: i64,
    month: Option<&str>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct CalendarRow {
        #[tabled(rename = "Date")]
        day: String,
        #[tabled(rename = "Done")]
        done: String,
        #[tabled(rename = "How")]
        how: String,
    }

    let (year, month) = match month {
        Some(m) => parse_month(m)?,
        None => {
            let today = local_date(Utc::now(), tz);
            (chrono::Datelike::year(&today), chrono::Datelike::month(&today))
        }
    };
    let days = SatedService::new(db, tz).calendar(user_id, year, month)?;

    if json {
        return print_json(&days);
    }
    let rows: Vec<CalendarRow> = days
        .iter()
        .map(|d| CalendarRow {
            day: d.day.format("%a %d").to_string(),
            done: if d.completed { "✓" } else { "" }.to_string(),
            how: d
                .autodone_reason
                .filter(|_| d.completed)
                .map(|r| r.to_string())
                .unwrap_or_default(),
        })
        .collect();
    let completed = days.iter().filter(|d| d.completed).count();
    println!("{year}-{month:02}: {completed}/{} days completed", days.len());
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_describe_status() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let mut status = DailyStatus {
            user_id: 1,
            day,
            completed: true,
            completed_at: None,
            auto_completed: true,
            autodone_reason: Some(AutodoneReason::MacroOk),
        };
        assert_eq!(describe_status(Some(&status)), "completed (macro_ok)");
        status.autodone_reason = Some(AutodoneReason::Manual);
        assert_eq!(describe_status(Some(&status)), "completed");
        status.completed = false;
        assert_eq!(describe_status(Some(&status)), "open");
        assert_eq!(describe_status(None), "open");
    }
}
