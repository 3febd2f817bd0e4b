use anyhow::{Result, bail};
use tabled::{Table, Tabled, settings::Style};

use sated_core::db::Database;
use sated_core::models::validate_user_name;

use super::helpers::print_json;

pub(crate) fn cmd_user_add(db: &Database, name: &str, json: bool) -> Result<()> {
    let name = validate_user_name(name)?;
    let user = db.add_user(&name)?;

    if json {
        print_json(&user)?;
    } else {
        println!("Added user: {} (id: {})", user.name, user.id);
    }
    Ok(())
}

pub(crate) fn cmd_user_list(db: &Database, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct UserRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Active")]
        active: String,
    }

    let users = db.list_users()?;
    if json {
        return print_json(&users);
    }
    if users.is_empty() {
        eprintln!("No users yet. Use `sated user add <name>` to create one.");
        return Ok(());
    }

    let rows: Vec<UserRow> = users
        .iter()
        .map(|u| UserRow {
            id: u.id,
            name: u.name.clone(),
            active: if u.active { "yes" } else { "no" }.to_string(),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

/// Inactive users keep their history but are skipped by every maintenance job.
pub(crate) fn cmd_user_set_active(db: &Database, id: i64, active: bool, json: bool) -> Result<()> {
    if !db.set_user_active(id, active)? {
        bail!("User {id} not found");
    }

    if json {
        println!("{}", serde_json::json!({ "id": id, "active": active }));
    } else if active {
        println!("User {id} activated");
    } else {
        println!("User {id} deactivated");
    }
    Ok(())
}
