use anyhow::{Result, bail};
use chrono::Utc;
use chrono_tz::Tz;

use sated_core::civil::local_date;
use sated_core::db::Database;

use super::helpers::{parse_amount, parse_date};

/// Log food eaten outside of a reminder. It counts toward the day's intake
/// and resets the auto-complete debounce.
pub(crate) fn cmd_log_food(
    db: &Database,
    tz: Tz,
    user_id: i64,
    food_id: i64,
    amount: &str,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    if db.get_user(user_id)?.is_none() {
        bail!("User {user_id} not found");
    }
    let now = Utc::now();
    let day = parse_date(date, local_date(now, tz))?;
    let grams = parse_amount(amount, "g")?;
    let food = db.get_food_by_id(food_id)?;
    let id = db.log_food(user_id, day, food.id, grams, now)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "id": id, "day": day, "food_id": food.id, "amount_g": grams })
        );
    } else {
        let kcal = food.calories_per_100g * grams / 100.0;
        println!("Logged {grams:.0}g of {} ({kcal:.0} kcal) on {day}", food.name);
    }
    Ok(())
}

pub(crate) fn cmd_log_water(
    db: &Database,
    tz: Tz,
    user_id: i64,
    amount: &str,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    if db.get_user(user_id)?.is_none() {
        bail!("User {user_id} not found");
    }
    let now = Utc::now();
    let day = parse_date(date, local_date(now, tz))?;
    let ml = parse_amount(amount, "ml")?;
    let id = db.log_water(user_id, day, ml, now)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "id": id, "day": day, "amount_ml": ml })
        );
    } else {
        println!("Logged {ml:.0}ml of water on {day}");
    }
    Ok(())
}
