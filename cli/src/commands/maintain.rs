use anyhow::{Result, bail};
use chrono::Utc;
use chrono_tz::Tz;

use sated_core::db::Database;
use sated_core::maintenance::{Job, JobReport, MaintenanceScheduler};
use sated_core::schedule::SleepAwarePlanner;

use super::helpers::print_json;

fn parse_job(name: &str) -> Result<Job> {
    let lower = name.trim().to_lowercase().replace('-', "_");
    match Job::ALL.into_iter().find(|job| job.name() == lower) {
        Some(job) => Ok(job),
        None => {
            let valid: Vec<&str> = Job::ALL.iter().map(|j| j.name()).collect();
            bail!("Unknown job '{name}'. Must be one of: {}", valid.join(", "))
        }
    }
}

/// Run maintenance jobs once, right now, outside the server's schedule.
pub(crate) fn cmd_maintain(db: &Database, tz: Tz, job: Option<&str>, json: bool) -> Result<()> {
    let jobs = match job {
        Some(name) => vec![parse_job(name)?],
        None => Job::ALL.to_vec(),
    };
    let now = Utc::now();
    let scheduler = MaintenanceScheduler::new(tz, SleepAwarePlanner, now);
    let reports: Vec<JobReport> = jobs
        .into_iter()
        .map(|job| scheduler.run_job(job, db, now))
        .collect();

    if json {
        print_json(&reports)?;
    } else {
        for r in &reports {
            println!(
                "{}: {} users, {} changed, {} failed",
                r.job, r.users, r.changed, r.failures
            );
        }
    }
    if reports.iter().any(|r| r.failures > 0) {
        bail!("Some maintenance jobs failed; see the log for details");
    }
    Ok(())
}
