mod day;
mod food;
mod helpers;
mod log;
mod maintain;
mod profile;
mod reminder;
mod schedule;
mod target;
mod user;

pub(crate) use day::{cmd_calendar, cmd_day_show, cmd_day_toggle, cmd_streak};
pub(crate) use food::{cmd_food_add, cmd_food_list};
pub(crate) use log::{cmd_log_food, cmd_log_water};
pub(crate) use maintain::cmd_maintain;
pub(crate) use profile::{ProfileUpdate, cmd_config_set, cmd_config_show};
pub(crate) use reminder::{cmd_complete, cmd_postpone, cmd_reminders, cmd_set_status, cmd_skip};
pub(crate) use schedule::{cmd_schedule_apply, cmd_schedule_preview};
pub(crate) use target::{cmd_target_set, cmd_target_show};
pub(crate) use user::{cmd_user_add, cmd_user_list, cmd_user_set_active};
