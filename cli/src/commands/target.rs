use anyhow::{Result, bail};

use sated_core::db::Database;
use sated_core::models::{DailyTarget, validate_target};

use super::helpers::print_json;

const DAY_NAMES: &[&str] = &[
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[allow(clippy::cast_sign_loss)]
fn day_name(day_of_week: i64) -> &'static str {
    DAY_NAMES[day_of_week as usize]
}

fn parse_days(day: &str) -> Result<Vec<i64>> {
    match day.to_lowercase().as_str() {
        "monday" | "mon" => Ok(vec![0]),
        "tuesday" | "tue" => Ok(vec![1]),
        "wednesday" | "wed" => Ok(vec![2]),
        "thursday" | "thu" => Ok(vec![3]),
        "friday" | "fri" => Ok(vec![4]),
        "saturday" | "sat" => Ok(vec![5]),
        "sunday" | "sun" => Ok(vec![6]),
        "weekdays" => Ok(vec![0, 1, 2, 3, 4]),
        "weekends" => Ok(vec![5, 6]),
        "all" => Ok(vec![0, 1, 2, 3, 4, 5, 6]),
        _ => bail!("Invalid day: {day}. Use monday-sunday, mon-sun, weekdays, weekends, or all"),
    }
}

fn print_target(target: &DailyTarget) {
    println!(
        "{}: {:.0} kcal  Protein: {:.0}g  Water: {:.0}ml",
        day_name(target.day_of_week),
        target.calories,
        target.protein_g,
        target.water_ml
    );
}

pub(crate) fn cmd_target_set(
    db: &Database,
    user_id: i64,
    calories: f64,
    protein_g: f64,
    water_ml: f64,
    day: &str,
    json: bool,
) -> Result<()> {
    if db.get_user(user_id)?.is_none() {
        bail!("User {user_id} not found");
    }
    let days = parse_days(day)?;
    let mut targets = Vec::new();

    for day_of_week in days {
        let target = DailyTarget {
            day_of_week,
            calories,
            protein_g,
            water_ml,
        };
        validate_target(&target)?;
        targets.push(db.set_target(user_id, &target)?);
    }

    if json {
        print_json(&targets)?;
    } else {
        targets.iter().for_each(print_target);
    }

    Ok(())
}

pub(crate) fn cmd_target_show(db: &Database, user_id: i64, json: bool) -> Result<()> {
    let targets = db.get_all_targets(user_id)?;

    if json {
        print_json(&targets)?;
    } else if targets.is_empty() {
        eprintln!("No targets set. Use `sated target set {user_id} <calories>` to set one.");
    } else {
        targets.iter().for_each(print_target);
    }

    Ok(())
}
