use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use sated_core::clock::Clock;
use sated_core::db::Database;
use sated_core::maintenance::{BootstrapReport, JobReport, MaintenanceScheduler};

/// How often the driver asks the scheduler for due jobs.
pub const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Runs maintenance jobs in the background of `serve`. All SQLite work
/// happens on the blocking pool so request handlers keep running.
pub struct MaintenanceDriver {
    db: Arc<Mutex<Database>>,
    scheduler: Arc<Mutex<MaintenanceScheduler>>,
    clock: Arc<dyn Clock>,
}

impl MaintenanceDriver {
    pub fn new(
        db: Arc<Mutex<Database>>,
        scheduler: MaintenanceScheduler,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            scheduler: Arc::new(Mutex::new(scheduler)),
            clock,
        }
    }

    /// Fill in today's schedule for users that have none yet and close days
    /// whose rollover passed while the process was down.
    pub async fn bootstrap(&self) -> anyhow::Result<BootstrapReport> {
        let now = self.clock.now();
        let db = Arc::clone(&self.db);
        let scheduler = Arc::clone(&self.scheduler);
        tokio::task::spawn_blocking(move || {
            let db = db.lock().unwrap_or_else(PoisonError::into_inner);
            let scheduler = scheduler.lock().unwrap_or_else(PoisonError::into_inner);
            scheduler.bootstrap(&*db, now)
        })
        .await
        .context("Bootstrap task panicked")
    }

    /// Run whatever is due at the clock's current instant.
    pub async fn tick(&self) -> anyhow::Result<Vec<JobReport>> {
        let now = self.clock.now();
        let db = Arc::clone(&self.db);
        let scheduler = Arc::clone(&self.scheduler);
        tokio::task::spawn_blocking(move || {
            let db = db.lock().unwrap_or_else(PoisonError::into_inner);
            let mut scheduler = scheduler.lock().unwrap_or_else(PoisonError::into_inner);
            scheduler.run_due(&*db, now)
        })
        .await
        .context("Maintenance tick panicked")
    }

    pub fn run(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            match self.bootstrap().await {
                Ok(report) if report == BootstrapReport::default() => {}
                Ok(report) => info!(
                    users = report.generated,
                    closed_days = report.closed_days,
                    "Caught up maintenance at startup"
                ),
                Err(e) => warn!("Startup bootstrap failed: {e:#}"),
            }

            info!(tick_secs = TICK_INTERVAL.as_secs(), "Maintenance driver started");
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = self.tick().await {
                    warn!("Maintenance tick failed: {e:#}");
                }
            }
        })
    }
}
