use anyhow::Result;

use sated_core::db::Database;
use sated_core::models::{NewFood, validate_food_data};

use super::helpers::{print_food_table, print_json};

pub(crate) fn cmd_food_add(
    db: &Database,
    name: &str,
    calories: f64,
    protein: Option<f64>,
    json: bool,
) -> Result<()> {
    let new_food = NewFood {
        name: name.trim().to_string(),
        calories_per_100g: calories,
        protein_per_100g: protein,
    };
    validate_food_data(&new_food)?;
    let food = db.insert_food(&new_food)?;

    if json {
        print_json(&food)?;
    } else {
        println!("Added food: {} (id: {})", food.name, food.id);
    }

    Ok(())
}

pub(crate) fn cmd_food_list(db: &Database, json: bool) -> Result<()> {
    let foods = db.list_foods()?;

    if json {
        print_json(&foods)?;
    } else if foods.is_empty() {
        eprintln!("No foods yet. Use `sated food add <name> --calories <kcal>` to add one.");
    } else {
        print_food_table(&foods);
    }

    Ok(())
}
