use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use sated_core::models::{Food, Reminder};

/// Resolve a `--date` argument against the local `today`.
pub(crate) fn parse_date(date_str: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    match date_str {
        None | Some("today") => Ok(today),
        Some("yesterday") => Ok(today - chrono::Duration::days(1)),
        Some("tomorrow") => Ok(today + chrono::Duration::days(1)),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

/// Parse "YYYY-MM" into (year, month).
pub(crate) fn parse_month(s: &str) -> Result<(i32, u32)> {
    let Some((year, month)) = s.split_once('-') else {
        bail!("Invalid month '{s}'. Use YYYY-MM");
    };
    let year: i32 = year
        .parse()
        .with_context(|| format!("Invalid year in '{s}'"))?;
    let month: u32 = month
        .parse()
        .with_context(|| format!("Invalid month in '{s}'"))?;
    if !(1..=12).contains(&month) {
        bail!("Month must be between 1 and 12");
    }
    Ok((year, month))
}

pub(crate) fn parse_amount(s: &str, unit: &str) -> Result<f64> {
    let trimmed = s.trim().trim_end_matches(unit).trim();
    let value: f64 = trimmed
        .parse()
        .with_context(|| format!("Invalid amount: '{s}'. Use a number like '250'"))?;
    if value <= 0.0 {
        bail!("Amount must be greater than 0");
    }
    Ok(value)
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_food_table(foods: &[Food]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Cal/100g")]
        calories: String,
        #[tabled(rename = "P/100g")]
        protein: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id,
            name: truncate(&f.name, 35),
            calories: format!("{:.0}", f.calories_per_100g),
            protein: f.protein_per_100g.map_or("-".into(), |v| format!("{v:.1}")),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_reminder_table(reminders: &[Reminder]) {
    #[derive(Tabled)]
    struct ReminderRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Until")]
        until: String,
    }

    let rows: Vec<ReminderRow> = reminders
        .iter()
        .map(|r| ReminderRow {
            id: r.id,
            time: if r.next_day {
                format!("{} (+1)", r.scheduled_time)
            } else {
                r.scheduled_time.to_string()
            },
            kind: r
                .meal_kind
                .map_or_else(|| r.reminder_type.to_string(), |k| k.to_string()),
            status: r.status.to_string(),
            until: r
                .delayed_until
                .map(|t| t.format("%H:%M UTC").to_string())
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
