//! Scheduling service loop
//!
//! Polls the scheduler on a fixed interval: recompute the plan, then hand
//! records inside the ready window to the recording executor.
//! Uses tokio-cron-scheduler for efficient job scheduling.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::models::PendingRecord;
use crate::scheduler::Scheduler;

/// Poll interval in seconds
const POLL_INTERVAL_SECONDS: u64 = 60;

/// Receives ready pending records for execution
///
/// The execution subsystem (tuner control, capture pipeline) lives behind
/// this seam.
pub trait RecordingLauncher: Send + Sync {
    fn launch(&self, record: PendingRecord) -> Result<()>;
}

/// Drives the scheduler from a background polling task
pub struct DvrService {
    scheduler: Arc<Scheduler>,
    launcher: Arc<dyn RecordingLauncher>,
    job_scheduler: Option<JobScheduler>,
    is_running: bool,
}

impl DvrService {
    pub fn new(scheduler: Arc<Scheduler>, launcher: Arc<dyn RecordingLauncher>) -> Self {
        Self {
            scheduler,
            launcher,
            job_scheduler: None,
            is_running: false,
        }
    }

    /// Start the background polling task
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running {
            warn!("Scheduling service already running");
            return Ok(());
        }

        info!(
            "Starting scheduling service (polling every {} seconds)",
            POLL_INTERVAL_SECONDS
        );

        let sched = JobScheduler::new().await?;

        let scheduler = self.scheduler.clone();
        let launcher = self.launcher.clone();

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(POLL_INTERVAL_SECONDS),
            move |_uuid, _l| {
                let scheduler = scheduler.clone();
                let launcher = launcher.clone();
                Box::pin(async move {
                    if let Err(e) = poll_once(&scheduler, &launcher) {
                        error!("Error in scheduling poll: {}", e);
                    }
                })
            },
        )?;

        sched.add(job).await?;

        // Run initial poll immediately
        if let Err(e) = poll_once(&self.scheduler, &self.launcher) {
            error!("Error in initial poll: {}", e);
        }

        sched.start().await?;

        self.job_scheduler = Some(sched);
        self.is_running = true;

        info!("Scheduling service started successfully");
        Ok(())
    }

    /// Stop the background polling task
    pub async fn stop(&mut self) {
        if !self.is_running {
            return;
        }

        info!("Stopping scheduling service");

        if let Some(mut sched) = self.job_scheduler.take() {
            if let Err(e) = sched.shutdown().await {
                error!("Error shutting down service: {}", e);
            }
        }

        self.is_running = false;
        info!("Scheduling service stopped");
    }
}

/// One poll: recompute the plan, then hand off ready records
fn poll_once(scheduler: &Arc<Scheduler>, launcher: &Arc<dyn RecordingLauncher>) -> Result<()> {
    scheduler.request_rescheduling()?;

    let ready = scheduler.get_ready_pending_records()?;
    if ready.is_empty() {
        return Ok(());
    }

    info!("Found {} recording(s) ready to start", ready.len());

    for record in ready {
        let title = record.show.title.clone();
        if let Err(e) = launcher.launch(record) {
            error!("Failed to start recording '{}': {}", title, e);
        }
    }

    Ok(())
}
