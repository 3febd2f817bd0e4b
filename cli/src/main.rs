mod commands;
mod config;
mod driver;
mod server;

use std::process;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{
    ProfileUpdate, cmd_calendar, cmd_complete, cmd_config_set, cmd_config_show, cmd_day_show,
    cmd_day_toggle, cmd_food_add, cmd_food_list, cmd_log_food, cmd_log_water, cmd_maintain,
    cmd_postpone, cmd_reminders, cmd_schedule_apply, cmd_schedule_preview, cmd_set_status,
    cmd_skip, cmd_streak, cmd_target_set, cmd_target_show, cmd_user_add, cmd_user_list,
    cmd_user_set_active,
};
use crate::config::Config;
use crate::driver::MaintenanceDriver;
use sated_core::clock::{Clock, SystemClock};
use sated_core::db::Database;
use sated_core::maintenance::MaintenanceScheduler;
use sated_core::models::CompletionPayload;
use sated_core::schedule::SleepAwarePlanner;

#[derive(Parser)]
#[command(
    name = "sated",
    version,
    about = "Daily meal and water reminders with adherence streaks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Show or change a user's wake/sleep profile and adherence settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Manage daily calorie/protein/water targets
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },
    /// Manage the food catalogue
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Log intake outside of a reminder
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Preview or regenerate a day's reminder schedule
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
    /// List a user's reminders for a day
    Reminders {
        user_id: i64,
        /// Date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Complete a reminder, logging the food or water it asked for
    Complete {
        reminder_id: i64,
        /// Food to log (meal and snack reminders)
        #[arg(long)]
        food_id: Option<i64>,
        /// Grams of food or millilitres of water
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Postpone a reminder by 5-180 minutes
    Postpone {
        reminder_id: i64,
        minutes: i64,
        #[arg(long)]
        json: bool,
    },
    /// Skip a reminder
    Skip {
        reminder_id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Move a reminder to any status (countdown, delayed, completed, ...)
    Status {
        reminder_id: i64,
        status: String,
        /// Delay in minutes (delayed, postponed)
        #[arg(long)]
        minutes: Option<i64>,
        #[arg(long)]
        food_id: Option<i64>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Show or toggle a day's completion
    Day {
        #[command(subcommand)]
        command: DayCommands,
    },
    /// Show the current streak of completed days
    Streak {
        user_id: i64,
        /// Also require every day to meet its targets
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show a month of completed days
    Calendar {
        user_id: i64,
        /// Month (YYYY-MM, default: this month)
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Run maintenance jobs once, now
    Maintain {
        /// Job to run: daily_regeneration, missed_sweep, auto_complete_sweep, day_rollover (default: all)
        job: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server and the maintenance scheduler
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    Add {
        name: String,
        #[arg(long)]
        json: bool,
    },
    List {
        #[arg(long)]
        json: bool,
    },
    /// Stop generating reminders for a user
    Deactivate {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    Activate {
        id: i64,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    Show {
        user_id: i64,
        #[arg(long)]
        json: bool,
    },
    Set {
        user_id: i64,
        /// Wake time (HH:MM)
        #[arg(long)]
        wake: Option<String>,
        /// Sleep time (HH:MM)
        #[arg(long)]
        sleep: Option<String>,
        /// Hours before sleep with no meals
        #[arg(long)]
        cutoff_hours: Option<i32>,
        /// Minimum minutes between meals
        #[arg(long)]
        min_gap: Option<i32>,
        #[arg(long)]
        snacks: Option<i32>,
        /// Water reminders per day (0 for no cap)
        #[arg(long)]
        water_reminders: Option<i32>,
        /// Skip water reminders within 30 minutes of waking or sleeping
        #[arg(long)]
        quiet_period: Option<bool>,
        /// Allowed calorie deviation as a fraction (0.10 = ±10%)
        #[arg(long)]
        kcal_window: Option<f64>,
        /// Require the water target for a completed day
        #[arg(long)]
        water_must_meet: Option<bool>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TargetCommands {
    Set {
        user_id: i64,
        calories: f64,
        #[arg(long, default_value = "0")]
        protein: f64,
        #[arg(long, default_value = "0")]
        water: f64,
        /// monday-sunday, mon-sun, weekdays, weekends, or all
        #[arg(long, default_value = "all")]
        day: String,
        #[arg(long)]
        json: bool,
    },
    Show {
        user_id: i64,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    Add {
        name: String,
        #[arg(long)]
        calories: f64,
        #[arg(long)]
        protein: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    Food {
        user_id: i64,
        food_id: i64,
        /// Amount in grams (e.g. "200" or "200g")
        amount: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
    Water {
        user_id: i64,
        /// Amount in millilitres (e.g. "330" or "330ml")
        amount: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ScheduleCommands {
    Preview {
        user_id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Replace a day's reminders with a freshly generated schedule
    Apply {
        user_id: i64,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DayCommands {
    Show {
        user_id: i64,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Mark a day completed, or reopen it
    Toggle {
        user_id: i64,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;
    let tz = config.timezone;

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Add { name, json } => cmd_user_add(&db, &name, json),
            UserCommands::List { json } => cmd_user_list(&db, json),
            UserCommands::Deactivate { id, json } => cmd_user_set_active(&db, id, false, json),
            UserCommands::Activate { id, json } => cmd_user_set_active(&db, id, true, json),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { user_id, json } => cmd_config_show(&db, user_id, json),
            ConfigCommands::Set {
                user_id,
                wake,
                sleep,
                cutoff_hours,
                min_gap,
                snacks,
                water_reminders,
                quiet_period,
                kcal_window,
                water_must_meet,
                json,
            } => cmd_config_set(
                &db,
                user_id,
                ProfileUpdate {
                    wake,
                    sleep,
                    cutoff_hours,
                    min_gap,
                    snacks,
                    water_reminders,
                    quiet_period,
                    kcal_window,
                    water_must_meet,
                },
                json,
            ),
        },
        Commands::Target { command } => match command {
            TargetCommands::Set {
                user_id,
                calories,
                protein,
                water,
                day,
                json,
            } => cmd_target_set(&db, user_id, calories, protein, water, &day, json),
            TargetCommands::Show { user_id, json } => cmd_target_show(&db, user_id, json),
        },
        Commands::Food { command } => match command {
            FoodCommands::Add {
                name,
                calories,
                protein,
                json,
            } => cmd_food_add(&db, &name, calories, protein, json),
            FoodCommands::List { json } => cmd_food_list(&db, json),
        },
        Commands::Log { command } => match command {
            LogCommands::Food {
                user_id,
                food_id,
                amount,
                date,
                json,
            } => cmd_log_food(&db, tz, user_id, food_id, &amount, date.as_deref(), json),
            LogCommands::Water {
                user_id,
                amount,
                date,
                json,
            } => cmd_log_water(&db, tz, user_id, &amount, date.as_deref(), json),
        },
        Commands::Schedule { command } => match command {
            ScheduleCommands::Preview { user_id, json } => {
                cmd_schedule_preview(&db, tz, user_id, json)
            }
            ScheduleCommands::Apply {
                user_id,
                date,
                json,
            } => cmd_schedule_apply(&db, tz, user_id, date.as_deref(), json),
        },
        Commands::Reminders {
            user_id,
            date,
            json,
        } => cmd_reminders(&db, tz, user_id, date.as_deref(), json),
        Commands::Complete {
            reminder_id,
            food_id,
            amount,
            json,
        } => cmd_complete(&db, tz, reminder_id, food_id, amount, json),
        Commands::Postpone {
            reminder_id,
            minutes,
            json,
        } => cmd_postpone(&db, tz, reminder_id, minutes, json),
        Commands::Skip { reminder_id, json } => cmd_skip(&db, tz, reminder_id, json),
        Commands::Status {
            reminder_id,
            status,
            minutes,
            food_id,
            amount,
            json,
        } => cmd_set_status(
            &db,
            tz,
            reminder_id,
            &status,
            minutes,
            CompletionPayload { food_id, amount },
            json,
        ),
        Commands::Day { command } => match command {
            DayCommands::Show {
                user_id,
                date,
                json,
            } => cmd_day_show(&db, tz, user_id, date.as_deref(), json),
            DayCommands::Toggle {
                user_id,
                date,
                json,
            } => cmd_day_toggle(&db, tz, user_id, date.as_deref(), json),
        },
        Commands::Streak {
            user_id,
            strict,
            json,
        } => cmd_streak(&db, tz, user_id, strict, json),
        Commands::Calendar {
            user_id,
            month,
            json,
        } => cmd_calendar(&db, tz, user_id, month.as_deref(), json),
        Commands::Maintain { job, json } => cmd_maintain(&db, tz, job.as_deref(), json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let db = Arc::new(Mutex::new(db));
            let scheduler = MaintenanceScheduler::new(tz, SleepAwarePlanner, clock.now());
            let driver = MaintenanceDriver::new(Arc::clone(&db), scheduler, Arc::clone(&clock));
            let _maintenance = driver.run();
            server::start_server(db, tz, clock, port, &bind, api_key).await
        }
    }
}
