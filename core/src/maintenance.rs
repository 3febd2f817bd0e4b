//! Periodic per-user maintenance.
//!
//! Four jobs keep every active user's day consistent:
//!
//! - daily regeneration at local 00:05
//! - the missed sweep every 5 minutes
//! - the auto-complete sweep every 15 minutes
//! - day rollover at local 03:00
//!
//! [`MaintenanceScheduler`] only tracks when each job is next due; a driver
//! ticks it with the current instant. Daily jobs re-arm on the wall-clock
//! calendar of the reference zone, so DST days are 23 or 25 hours long.
//! Every job transitions rows out of one specific state only, so jobs can
//! run in any order and a repeated run is a no-op.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::autocomplete::auto_complete_day;
use crate::civil::{CivilTime, local_date, next_local_occurrence, resolve_local};
use crate::models::{AutodoneReason, DailyStatus};
use crate::reminder::missed_sweep;
use crate::schedule::{EatingWindowPlanner, generate_schedule};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    DailyRegeneration,
    MissedSweep,
    AutoCompleteSweep,
    DayRollover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    DailyAt(CivilTime),
    Every(Duration),
}

impl Job {
    pub const ALL: [Self; 4] = [
        Self::DailyRegeneration,
        Self::MissedSweep,
        Self::AutoCompleteSweep,
        Self::DayRollover,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DailyRegeneration => "daily_regeneration",
            Self::MissedSweep => "missed_sweep",
            Self::AutoCompleteSweep => "auto_complete_sweep",
            Self::DayRollover => "day_rollover",
        }
    }

    #[must_use]
    pub fn cadence(self) -> Cadence {
        match self {
            Self::DailyRegeneration => Cadence::DailyAt(CivilTime::from_minutes(5)),
            Self::MissedSweep => Cadence::Every(Duration::minutes(5)),
            Self::AutoCompleteSweep => Cadence::Every(Duration::minutes(15)),
            Self::DayRollover => Cadence::DailyAt(rollover_time()),
        }
    }
}

fn rollover_time() -> CivilTime {
    CivilTime::from_minutes(3 * 60)
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one job run across all active users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub job: Job,
    pub users: usize,
    /// Rows the job changed (reminders inserted, reminders missed, days closed).
    pub changed: usize,
    pub failures: usize,
}

pub struct MaintenanceScheduler {
    tz: Tz,
    planner: Box<dyn EatingWindowPlanner>,
    next_fire: BTreeMap<Job, DateTime<Utc>>,
}

impl MaintenanceScheduler {
    /// Daily jobs are armed for their next local occurrence after `now`;
    /// interval jobs are due immediately.
    pub fn new(tz: Tz, planner: impl EatingWindowPlanner + 'static, now: DateTime<Utc>) -> Self {
        let next_fire = Job::ALL
            .into_iter()
            .map(|job| {
                let at = match job.cadence() {
                    Cadence::DailyAt(time) => next_local_occurrence(now, time, tz),
                    Cadence::Every(_) => now,
                };
                (job, at)
            })
            .collect();
        Self {
            tz,
            planner: Box::new(planner),
            next_fire,
        }
    }

    #[must_use]
    pub fn tz(&self) -> Tz {
        self.tz
    }

    #[must_use]
    pub fn next_fire(&self, job: Job) -> Option<DateTime<Utc>> {
        self.next_fire.get(&job).copied()
    }

    #[must_use]
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.next_fire.values().min().copied()
    }

    #[must_use]
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<Job> {
        self.next_fire
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(job, _)| *job)
            .collect()
    }

    /// Interval jobs step from their planned time, skipping ticks already
    /// behind `now`. Daily jobs move to the next local occurrence.
    fn rearm(&mut self, job: Job, now: DateTime<Utc>) {
        let planned = self.next_fire.get(&job).copied().unwrap_or(now);
        let next = match job.cadence() {
            Cadence::DailyAt(time) => next_local_occurrence(now, time, self.tz),
            Cadence::Every(step) => {
                let mut next = planned + step;
                while next <= now {
                    next += step;
                }
                next
            }
        };
        self.next_fire.insert(job, next);
    }

    /// Run every job due at `now`, then re-arm it.
    pub fn run_due(&mut self, store: &impl Store, now: DateTime<Utc>) -> Vec<JobReport> {
        let due = self.due_jobs(now);
        let mut reports = Vec::with_capacity(due.len());
        for job in due {
            reports.push(self.run_job(job, store, now));
            self.rearm(job, now);
        }
        reports
    }

    /// Run one job over all active users. A failure for one user is logged
    /// and does not stop the others.
    pub fn run_job(&self, job: Job, store: &impl Store, now: DateTime<Utc>) -> JobReport {
        let today = local_date(now, self.tz);
        let mut report = JobReport {
            job,
            users: 0,
            changed: 0,
            failures: 0,
        };

        let user_ids = match store.active_user_ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(job = %job, "Failed to list active users: {e:#}");
                report.failures += 1;
                return report;
            }
        };

        for user_id in user_ids {
            report.users += 1;
            let outcome = match job {
                Job::DailyRegeneration => {
                    regenerate_user_day(store, self.planner.as_ref(), user_id, today)
                }
                Job::MissedSweep => {
                    missed_sweep(store, user_id, today, now, self.tz).map_err(anyhow::Error::from)
                }
                Job::AutoCompleteSweep => auto_complete_day(store, user_id, today, now, self.tz)
                    .map(|reason| usize::from(reason.is_some())),
                Job::DayRollover => roll_over_day(store, user_id, today - Duration::days(1), now)
                    .map(usize::from),
            };
            match outcome {
                Ok(changed) => report.changed += changed,
                Err(e) => {
                    report.failures += 1;
                    warn!(job = %job, user_id, "Maintenance job failed for user: {e:#}");
                }
            }
        }

        if report.failures > 0 || report.changed > 0 {
            info!(
                job = %job,
                users = report.users,
                changed = report.changed,
                failures = report.failures,
                "Maintenance job finished"
            );
        } else {
            debug!(job = %job, users = report.users, "Maintenance job finished");
        }
        report
    }

    /// Startup catch-up for a process that was down over a job boundary.
    ///
    /// Generates today's reminders for active users that have none yet, and
    /// closes past days whose 03:00 rollover already passed while nothing was
    /// running. Both steps are no-ops on rows that are already in place.
    pub fn bootstrap(&self, store: &impl Store, now: DateTime<Utc>) -> BootstrapReport {
        let today = local_date(now, self.tz);
        let mut report = BootstrapReport::default();
        let user_ids = match store.active_user_ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Bootstrap failed to list active users: {e:#}");
                return report;
            }
        };
        let rollover_cutoff = self.last_rolled_over_day(now);
        for user_id in user_ids {
            let result = store.reminders_for_day(user_id, today).and_then(|existing| {
                if existing.is_empty() {
                    regenerate_user_day(store, self.planner.as_ref(), user_id, today).map(Some)
                } else {
                    Ok(None)
                }
            });
            match result {
                Ok(Some(count)) => {
                    report.generated += 1;
                    info!(user_id, %today, reminders = count, "Bootstrapped today's reminders");
                }
                Ok(None) => {}
                Err(e) => warn!(user_id, "Bootstrap failed for user: {e:#}"),
            }

            match catch_up_rollover(store, user_id, rollover_cutoff, now) {
                Ok(closed) => report.closed_days += closed,
                Err(e) => warn!(user_id, "Rollover catch-up failed for user: {e:#}"),
            }
        }
        report
    }

    /// The latest day whose rollover should already have happened at `now`:
    /// yesterday once today's 03:00 has passed, the day before otherwise.
    fn last_rolled_over_day(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = local_date(now, self.tz);
        if resolve_local(today, rollover_time(), self.tz) <= now {
            today - Duration::days(1)
        } else {
            today - Duration::days(2)
        }
    }
}

/// What [`MaintenanceScheduler::bootstrap`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Users whose schedule for today was generated.
    pub generated: usize,
    /// Past days closed by the rollover catch-up.
    pub closed_days: usize,
}

/// Purge yesterday's reminders and replace today's with a fresh schedule.
/// Returns the number of reminders inserted.
///
/// The purge includes yesterday's `next_day` rows, so a reminder scheduled
/// after midnight (an evening check-in before a 02:30 bedtime, say) is gone
/// at 00:05. Any such row due after 00:05 never fires.
pub fn regenerate_user_day(
    store: &impl Store,
    planner: &dyn EatingWindowPlanner,
    user_id: i64,
    today: NaiveDate,
) -> Result<usize> {
    store.delete_reminders(user_id, today - Duration::days(1))?;
    let config = store.schedule_config(user_id)?;
    let plan = generate_schedule(&config, planner);
    let inserted = store.replace_reminders(user_id, today, &plan)?;
    debug!(user_id, %today, inserted, "Regenerated reminders");
    Ok(inserted)
}

/// How far back the startup catch-up looks for days left open.
pub const ROLLOVER_CATCH_UP_DAYS: i64 = 7;

/// Close every day after the user's latest recorded status up to `cutoff`,
/// plus `cutoff` itself when it is still open. Looks back at most
/// [`ROLLOVER_CATCH_UP_DAYS`]. Returns the number of days closed.
pub fn catch_up_rollover(
    store: &impl Store,
    user_id: i64,
    cutoff: NaiveDate,
    now: DateTime<Utc>,
) -> Result<usize> {
    let window_start = cutoff - Duration::days(ROLLOVER_CATCH_UP_DAYS - 1);
    let statuses = store.daily_statuses(user_id, window_start, cutoff)?;
    let first = statuses
        .iter()
        .map(|s| s.day)
        .max()
        .map_or(cutoff, |latest| (latest + Duration::days(1)).min(cutoff));

    let mut closed = 0;
    for day in first.iter_days().take_while(|day| *day <= cutoff) {
        if roll_over_day(store, user_id, day, now)? {
            closed += 1;
        }
    }
    Ok(closed)
}

/// Close `day` if it is still open. Every past day ends in a definite state.
pub fn roll_over_day(
    store: &impl Store,
    user_id: i64,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> Result<bool> {
    let closed = store.complete_day_if_open(&DailyStatus {
        user_id,
        day,
        completed: true,
        completed_at: Some(now),
        auto_completed: true,
        autodone_reason: Some(AutodoneReason::DayRollover),
    })?;
    if closed {
        info!(user_id, %day, "Day closed by rollover");
    }
    Ok(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::db::Database;
    use crate::models::{
        AdherenceConfig, DailyIntake, DailyTarget, Reminder, ReminderStatus, ScheduleConfig,
        ScheduledReminder,
    };
    use crate::schedule::SleepAwarePlanner;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_initial_arming() {
        // Noon EST on 2024-03-09.
        let now = utc(2024, 3, 9, 17, 0);
        let scheduler = MaintenanceScheduler::new(New_York, SleepAwarePlanner, now);
        assert_eq!(
            scheduler.next_fire(Job::DailyRegeneration),
            Some(utc(2024, 3, 10, 5, 5))
        );
        // Clocks skip 02:00-03:00 that night, so 03:00 is already EDT.
        assert_eq!(scheduler.next_fire(Job::DayRollover), Some(utc(2024, 3, 10, 7, 0)));
        assert_eq!(scheduler.next_fire(Job::MissedSweep), Some(now));
        assert_eq!(scheduler.next_wakeup(), Some(now));
        assert_eq!(
            scheduler.due_jobs(now),
            vec![Job::MissedSweep, Job::AutoCompleteSweep]
        );
    }

    #[test]
    fn test_regeneration_rearms_across_spring_forward() {
        let db = Database::open_in_memory().unwrap();
        let start = utc(2024, 3, 9, 17, 0);
        let mut scheduler = MaintenanceScheduler::new(New_York, SleepAwarePlanner, start);
        let fire = utc(2024, 3, 10, 5, 5);
        scheduler.run_due(&db, fire);
        let next = scheduler.next_fire(Job::DailyRegeneration).unwrap();
        assert_eq!(next, utc(2024, 3, 11, 4, 5));
        assert_eq!(next - fire, Duration::hours(23));
    }

    #[test]
    fn test_rollover_rearms_across_fall_back() {
        let db = Database::open_in_memory().unwrap();
        let start = utc(2024, 11, 2, 6, 0); // 02:00 EDT
        let mut scheduler = MaintenanceScheduler::new(New_York, SleepAwarePlanner, start);
        let fire = scheduler.next_fire(Job::DayRollover).unwrap();
        assert_eq!(fire, utc(2024, 11, 2, 7, 0));
        scheduler.run_due(&db, fire);
        let next = scheduler.next_fire(Job::DayRollover).unwrap();
        assert_eq!(next - fire, Duration::hours(25));
    }

    #[test]
    fn test_interval_rearm_skips_missed_ticks() {
        let db = Database::open_in_memory().unwrap();
        let start = utc(2024, 6, 1, 12, 0);
        let mut scheduler = MaintenanceScheduler::new(chrono_tz::UTC, SleepAwarePlanner, start);
        scheduler.run_due(&db, start + Duration::minutes(17));
        assert_eq!(
            scheduler.next_fire(Job::MissedSweep),
            Some(start + Duration::minutes(20))
        );
        assert_eq!(
            scheduler.next_fire(Job::AutoCompleteSweep),
            Some(start + Duration::minutes(30))
        );
    }

    #[test]
    fn test_each_job_fires_once_per_cadence() {
        let db = Database::open_in_memory().unwrap();
        let start = utc(2024, 6, 1, 0, 0);
        let clock = ManualClock::new(start);
        let mut scheduler = MaintenanceScheduler::new(chrono_tz::UTC, SleepAwarePlanner, start);
        let mut counts: BTreeMap<Job, usize> = BTreeMap::new();
        // Tick every 30 seconds for one day.
        for _ in 0..(24 * 120) {
            for report in scheduler.run_due(&db, clock.now()) {
                *counts.entry(report.job).or_default() += 1;
            }
            clock.advance(Duration::seconds(30));
        }
        assert_eq!(counts[&Job::DailyRegeneration], 1);
        assert_eq!(counts[&Job::DayRollover], 1);
        assert_eq!(counts[&Job::MissedSweep], 24 * 12);
        assert_eq!(counts[&Job::AutoCompleteSweep], 24 * 4);
    }

    #[test]
    fn test_regeneration_replaces_today_and_purges_yesterday() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let today = date(2024, 6, 2);
        let stale = [
            ScheduledReminder {
                reminder_type: crate::models::ReminderType::Water,
                scheduled_time: "10:00".parse().unwrap(),
                meal_kind: None,
                next_day: false,
            },
            ScheduledReminder {
                reminder_type: crate::models::ReminderType::AiEvening,
                scheduled_time: "00:30".parse().unwrap(),
                meal_kind: None,
                next_day: true,
            },
        ];
        db.replace_reminders(user.id, today - Duration::days(1), &stale).unwrap();

        let first = regenerate_user_day(&db, &SleepAwarePlanner, user.id, today).unwrap();
        let second = regenerate_user_day(&db, &SleepAwarePlanner, user.id, today).unwrap();
        assert_eq!(first, 11);
        assert_eq!(second, 11);
        assert_eq!(db.reminders_for_day(user.id, today).unwrap().len(), 11);
        assert!(db
            .reminders_for_day(user.id, today - Duration::days(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rollover_closes_open_day_next_morning() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let scheduler = MaintenanceScheduler::new(chrono_tz::UTC, SleepAwarePlanner, utc(2024, 6, 1, 12, 0));
        let report = scheduler.run_job(Job::DayRollover, &db, utc(2024, 6, 2, 3, 0));
        assert_eq!(report.changed, 1);

        let status = db.daily_status(user.id, date(2024, 6, 1)).unwrap().unwrap();
        assert!(status.completed && status.auto_completed);
        assert_eq!(status.autodone_reason, Some(AutodoneReason::DayRollover));

        let again = scheduler.run_job(Job::DayRollover, &db, utc(2024, 6, 2, 3, 0));
        assert_eq!(again.changed, 0);
    }

    #[test]
    fn test_rollover_keeps_manual_completion() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let manual = DailyStatus {
            user_id: user.id,
            day: date(2024, 6, 1),
            completed: true,
            completed_at: Some(utc(2024, 6, 1, 21, 0)),
            auto_completed: false,
            autodone_reason: Some(AutodoneReason::Manual),
        };
        db.upsert_daily_status(&manual).unwrap();
        assert!(!roll_over_day(&db, user.id, manual.day, utc(2024, 6, 2, 3, 0)).unwrap());
        assert_eq!(db.daily_status(user.id, manual.day).unwrap(), Some(manual));
    }

    #[test]
    fn test_inactive_users_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        let active = db.add_user("ana").unwrap();
        let inactive = db.add_user("ben").unwrap();
        db.set_user_active(inactive.id, false).unwrap();
        let scheduler = MaintenanceScheduler::new(chrono_tz::UTC, SleepAwarePlanner, utc(2024, 6, 1, 12, 0));
        let report = scheduler.run_job(Job::DailyRegeneration, &db, utc(2024, 6, 2, 0, 5));
        assert_eq!(report.users, 1);
        assert!(!db.reminders_for_day(active.id, date(2024, 6, 2)).unwrap().is_empty());
        assert!(db.reminders_for_day(inactive.id, date(2024, 6, 2)).unwrap().is_empty());
    }

    #[test]
    fn test_bootstrap_only_fills_missing_days() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let now = utc(2024, 6, 1, 9, 0);
        let scheduler = MaintenanceScheduler::new(chrono_tz::UTC, SleepAwarePlanner, now);
        assert_eq!(scheduler.bootstrap(&db, now).generated, 1);

        let today = date(2024, 6, 1);
        let first_ids: Vec<i64> = db
            .reminders_for_day(user.id, today)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(scheduler.bootstrap(&db, now).generated, 0);
        let second_ids: Vec<i64> = db
            .reminders_for_day(user.id, today)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_restart_after_rollover_closes_yesterday() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let start = utc(2024, 6, 2, 3, 1);
        let clock = ManualClock::new(start);
        let mut scheduler = MaintenanceScheduler::new(chrono_tz::UTC, SleepAwarePlanner, start);
        let report = scheduler.bootstrap(&db, start);
        assert_eq!(report.closed_days, 1);

        while clock.now() < utc(2024, 6, 2, 23, 59) {
            scheduler.run_due(&db, clock.now());
            clock.advance(Duration::seconds(30));
        }
        let status = db.daily_status(user.id, date(2024, 6, 1)).unwrap().unwrap();
        assert!(status.completed && status.auto_completed);
        assert_eq!(status.autodone_reason, Some(AutodoneReason::DayRollover));
        assert_eq!(status.completed_at, Some(start));
    }

    #[test]
    fn test_restart_before_rollover_leaves_yesterday_to_the_job() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let start = utc(2024, 6, 2, 2, 0);
        let mut scheduler = MaintenanceScheduler::new(chrono_tz::UTC, SleepAwarePlanner, start);
        assert_eq!(scheduler.bootstrap(&db, start).closed_days, 1);
        assert!(db.daily_status(user.id, date(2024, 5, 31)).unwrap().unwrap().completed);
        assert_eq!(db.daily_status(user.id, date(2024, 6, 1)).unwrap(), None);

        let reports = scheduler.run_due(&db, utc(2024, 6, 2, 3, 0));
        let rollover = reports.iter().find(|r| r.job == Job::DayRollover).unwrap();
        assert_eq!(rollover.changed, 1);
        assert!(db.daily_status(user.id, date(2024, 6, 1)).unwrap().unwrap().completed);
    }

    #[test]
    fn test_catch_up_closes_gap_after_last_status() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let manual = DailyStatus {
            user_id: user.id,
            day: date(2024, 5, 28),
            completed: true,
            completed_at: Some(utc(2024, 5, 28, 21, 0)),
            auto_completed: false,
            autodone_reason: Some(AutodoneReason::Manual),
        };
        db.upsert_daily_status(&manual).unwrap();

        let now = utc(2024, 6, 2, 9, 0);
        assert_eq!(catch_up_rollover(&db, user.id, date(2024, 6, 1), now).unwrap(), 4);
        let statuses = db
            .daily_statuses(user.id, date(2024, 5, 28), date(2024, 6, 1))
            .unwrap();
        assert_eq!(statuses.len(), 5);
        assert!(statuses.iter().all(|s| s.completed));
        assert_eq!(statuses[0], manual);
        assert!(statuses[1..]
            .iter()
            .all(|s| s.autodone_reason == Some(AutodoneReason::DayRollover)));

        assert_eq!(catch_up_rollover(&db, user.id, date(2024, 6, 1), now).unwrap(), 0);
    }

    #[test]
    fn test_day_of_ticks_marks_missed_reminders() {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        let start = utc(2024, 6, 1, 0, 0);
        let clock = ManualClock::new(start);
        let mut scheduler = MaintenanceScheduler::new(chrono_tz::UTC, SleepAwarePlanner, start);
        while clock.now() < utc(2024, 6, 1, 9, 50) {
            scheduler.run_due(&db, clock.now());
            clock.advance(Duration::seconds(30));
        }
        let reminders = db.reminders_for_day(user.id, date(2024, 6, 1)).unwrap();
        let status_at = |time: &str| {
            reminders
                .iter()
                .find(|r| r.scheduled_time.to_string() == time)
                .map(|r| r.status)
                .unwrap()
        };
        // 07:00 and 07:30 are long past; 09:45 is still inside its grace period.
        assert_eq!(status_at("07:00"), ReminderStatus::Missed);
        assert_eq!(status_at("07:30"), ReminderStatus::Missed);
        assert_eq!(status_at("09:45"), ReminderStatus::Pending);
    }

    /// Delegates to a real database but fails every read for one user.
    struct FlakyStore {
        inner: Database,
        broken_user: i64,
    }

    impl FlakyStore {
        fn check(&self, user_id: i64) -> Result<()> {
            if user_id == self.broken_user {
                anyhow::bail!("database is locked");
            }
            Ok(())
        }
    }

    impl Store for FlakyStore {
        fn active_user_ids(&self) -> Result<Vec<i64>> {
            self.inner.active_user_ids()
        }
        fn schedule_config(&self, user_id: i64) -> Result<ScheduleConfig> {
            self.check(user_id)?;
            self.inner.schedule_config(user_id)
        }
        fn adherence_config(&self, user_id: i64) -> Result<AdherenceConfig> {
            self.check(user_id)?;
            self.inner.adherence_config(user_id)
        }
        fn reminders_for_day(&self, user_id: i64, day: NaiveDate) -> Result<Vec<Reminder>> {
            self.check(user_id)?;
            self.inner.reminders_for_day(user_id, day)
        }
        fn get_reminder(&self, id: i64) -> Result<Option<Reminder>> {
            self.inner.get_reminder(id)
        }
        fn update_reminder(&self, reminder: &Reminder) -> Result<()> {
            self.inner.update_reminder(reminder)
        }
        fn replace_reminders(
            &self,
            user_id: i64,
            day: NaiveDate,
            reminders: &[ScheduledReminder],
        ) -> Result<usize> {
            self.check(user_id)?;
            self.inner.replace_reminders(user_id, day, reminders)
        }
        fn delete_reminders(&self, user_id: i64, day: NaiveDate) -> Result<usize> {
            self.check(user_id)?;
            self.inner.delete_reminders(user_id, day)
        }
        fn daily_status(&self, user_id: i64, day: NaiveDate) -> Result<Option<DailyStatus>> {
            self.check(user_id)?;
            self.inner.daily_status(user_id, day)
        }
        fn upsert_daily_status(&self, status: &DailyStatus) -> Result<()> {
            self.check(status.user_id)?;
            self.inner.upsert_daily_status(status)
        }
        fn complete_day_if_open(&self, status: &DailyStatus) -> Result<bool> {
            self.check(status.user_id)?;
            self.inner.complete_day_if_open(status)
        }
        fn daily_statuses(
            &self,
            user_id: i64,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<DailyStatus>> {
            self.check(user_id)?;
            self.inner.daily_statuses(user_id, from, to)
        }
        fn daily_target(&self, user_id: i64, day: NaiveDate) -> Result<Option<DailyTarget>> {
            self.check(user_id)?;
            self.inner.daily_target(user_id, day)
        }
        fn daily_intake(&self, user_id: i64, day: NaiveDate) -> Result<DailyIntake> {
            self.check(user_id)?;
            self.inner.daily_intake(user_id, day)
        }
        fn last_log_time(&self, user_id: i64, day: NaiveDate) -> Result<Option<DateTime<Utc>>> {
            self.check(user_id)?;
            self.inner.last_log_time(user_id, day)
        }
    }

    #[test]
    fn test_failure_for_one_user_does_not_stop_others() {
        let inner = Database::open_in_memory().unwrap();
        let ok_user = inner.add_user("ana").unwrap();
        let broken = inner.add_user("ben").unwrap();
        let store = FlakyStore {
            inner,
            broken_user: broken.id,
        };
        let start = utc(2024, 6, 1, 12, 0);
        let mut scheduler = MaintenanceScheduler::new(chrono_tz::UTC, SleepAwarePlanner, start);

        let report = scheduler.run_job(Job::DailyRegeneration, &store, start);
        assert_eq!(report.users, 2);
        assert_eq!(report.failures, 1);
        assert!(report.changed > 0);
        assert!(!store
            .inner
            .reminders_for_day(ok_user.id, date(2024, 6, 1))
            .unwrap()
            .is_empty());

        // The failing job is still re-armed; the next tick is the retry.
        let reports = scheduler.run_due(&store, start);
        assert!(reports.iter().any(|r| r.failures == 1));
        assert_eq!(
            scheduler.next_fire(Job::MissedSweep),
            Some(start + Duration::minutes(5))
        );
    }
}
