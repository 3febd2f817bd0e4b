//! Daily reminder schedule generation.
//!
//! All arithmetic here runs on "unwrapped" minutes: minutes since midnight of
//! the wake day, so a bedtime of 01:30 after a 10:00 wake is minute 1530.
//! Times are folded back into a single day only at the very end, with
//! `next_day` recording which ones fall after midnight.

use std::collections::HashSet;

use crate::civil::{CivilTime, MINUTES_PER_DAY, unwrap_span};
use crate::models::{MealKind, ReminderType, ScheduleConfig, ScheduledReminder};

pub const WATER_FIRST_OFFSET_MIN: i32 = 15;
pub const WATER_STEP_MIN: i32 = 150;
/// Water candidates stop this long before bedtime.
pub const WATER_END_MARGIN_MIN: i32 = 30;
pub const QUIET_PERIOD_MIN: i32 = 30;
pub const AI_EVENING_LEAD_MIN: i32 = 120;
pub const BREAKFAST_OFFSET_MIN: i32 = 30;

/// A meal or snack slot chosen by a planner, in unwrapped minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMeal {
    pub kind: MealKind,
    pub minute: i32,
}

/// Decides where meals and snacks go inside the waking window.
pub trait EatingWindowPlanner: Send + Sync {
    fn generate_meal_schedule(&self, config: &ScheduleConfig, snack_count: i32)
    -> Vec<PlannedMeal>;
}

/// Breakfast shortly after waking, dinner at the pre-sleep cutoff, lunch and
/// snacks spread evenly between. Snacks are dropped until the spacing
/// respects `min_gap_between_meals_min`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepAwarePlanner;

impl EatingWindowPlanner for SleepAwarePlanner {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn generate_meal_schedule(
        &self,
        config: &ScheduleConfig,
        snack_count: i32,
    ) -> Vec<PlannedMeal> {
        let (wake, sleep) = unwrap_span(config.wake_time, config.sleep_time);
        let start = wake + BREAKFAST_OFFSET_MIN;
        let end = (sleep - config.pre_sleep_cutoff_hours * 60).max(start);

        let mut snacks = snack_count.max(0);
        let step = loop {
            let intervals = 2 + snacks;
            let step = (end - start) / intervals;
            if snacks == 0 || step >= config.min_gap_between_meals_min {
                break step;
            }
            snacks -= 1;
        };

        let before_lunch = (snacks + 1) / 2;
        let mut kinds = vec![MealKind::Breakfast];
        kinds.extend(std::iter::repeat_n(MealKind::Snack, before_lunch as usize));
        kinds.push(MealKind::Lunch);
        kinds.extend(std::iter::repeat_n(MealKind::Snack, (snacks - before_lunch) as usize));
        kinds.push(MealKind::Dinner);

        let last = kinds.len() - 1;
        kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| PlannedMeal {
                kind,
                minute: if i == last { end } else { start + step * i as i32 },
            })
            .collect()
    }
}

/// Water candidates from shortly after waking, every 150 minutes, until half
/// an hour before bed. The quiet period drops candidates within 30 minutes
/// of waking or sleeping. A cap of zero or less means no cap.
///
/// With the quiet period on, the wake+15 candidate is always inside the
/// window, so the first water reminder of a default day is wake+165. The
/// quiet rule wins over an earlier first sip; keep it that way.
#[must_use]
pub fn water_minutes(config: &ScheduleConfig) -> Vec<i32> {
    let (wake, sleep) = unwrap_span(config.wake_time, config.sleep_time);
    let cap = usize::try_from(config.water_reminders_per_day).unwrap_or(0);
    let mut accepted = Vec::new();
    let mut candidate = wake + WATER_FIRST_OFFSET_MIN;
    while candidate < sleep - WATER_END_MARGIN_MIN {
        if cap > 0 && accepted.len() >= cap {
            break;
        }
        let quiet = config.quiet_period_enabled
            && ((candidate - wake).abs() <= QUIET_PERIOD_MIN
                || (sleep - candidate).abs() <= QUIET_PERIOD_MIN);
        if !quiet {
            accepted.push(candidate);
        }
        candidate += WATER_STEP_MIN;
    }
    accepted
}

/// Build the ordered, de-duplicated reminder list for one day.
#[must_use]
pub fn generate_schedule(
    config: &ScheduleConfig,
    planner: &dyn EatingWindowPlanner,
) -> Vec<ScheduledReminder> {
    let (wake, sleep) = unwrap_span(config.wake_time, config.sleep_time);

    let mut slots: Vec<(i32, ReminderType, Option<MealKind>)> = planner
        .generate_meal_schedule(config, config.snacks_count)
        .into_iter()
        .map(|m| (m.minute, m.kind.reminder_type(), Some(m.kind)))
        .collect();
    slots.extend(
        water_minutes(config)
            .into_iter()
            .map(|m| (m, ReminderType::Water, None)),
    );
    slots.push((wake, ReminderType::AiMorning, None));
    slots.push((sleep - AI_EVENING_LEAD_MIN, ReminderType::AiEvening, None));

    slots.sort_by_key(|&(minute, ty, _)| (minute, ty));

    let mut seen = HashSet::new();
    slots
        .into_iter()
        .filter_map(|(minute, reminder_type, meal_kind)| {
            let scheduled_time = CivilTime::from_minutes(minute);
            seen.insert((reminder_type, scheduled_time))
                .then_some(ScheduledReminder {
                    reminder_type,
                    scheduled_time,
                    meal_kind,
                    next_day: minute >= MINUTES_PER_DAY,
                })
        })
        .collect()
}
