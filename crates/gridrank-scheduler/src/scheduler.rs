//! The scan scheduler.

use crate::error::{Result, SchedulerError};
use chrono::Utc;
use gridrank_db::{scan_schedules, Database};
use gridrank_scanner::{FullScanRequest, ScanOrchestrator};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Cron-driven trigger of recurring full scans.
pub struct ScanScheduler {
    db: Database,
    orchestrator: ScanOrchestrator,
    runtime: Mutex<Option<JobScheduler>>,
    jobs: Mutex<HashMap<String, Uuid>>,
}

impl ScanScheduler {
    /// Create a scheduler over the given database and orchestrator.
    #[must_use]
    pub fn new(db: Database, orchestrator: ScanOrchestrator) -> Arc<Self> {
        Arc::new(Self {
            db,
            orchestrator,
            runtime: Mutex::new(None),
            jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Load all active schedules and start firing them.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let runtime = JobScheduler::new().await?;

        let schedules = scan_schedules::list_active(self.db.pool()).await?;
        for schedule in &schedules {
            self.register_job(&runtime, schedule).await;
        }

        runtime.start().await?;
        *self.runtime.lock().await = Some(runtime);

        tracing::info!(schedules = schedules.len(), "scan scheduler started");
        Ok(())
    }

    /// Stop the scheduler and deregister every job.
    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.runtime.lock().await;
        if let Some(mut runtime) = guard.take() {
            runtime.shutdown().await?;
        }
        self.jobs.lock().await.clear();

        tracing::info!("scan scheduler stopped");
        Ok(())
    }

    /// Re-register one schedule after it changed.
    ///
    /// Idempotent: any existing job for the id is stopped first, then the
    /// schedule is re-registered if it still exists and is active. This
    /// ordering is what prevents duplicate firings.
    pub async fn reload_schedule(self: &Arc<Self>, schedule_id: &str) -> Result<()> {
        let guard = self.runtime.lock().await;
        let runtime = guard.as_ref().ok_or(SchedulerError::NotStarted)?;

        if let Some(job_id) = self.jobs.lock().await.remove(schedule_id) {
            if let Err(e) = runtime.remove(&job_id).await {
                tracing::warn!(schedule_id = %schedule_id, error = %e, "failed to remove job");
            }
        }

        let schedule = scan_schedules::get_by_id(self.db.pool(), schedule_id).await?;
        match schedule {
            Some(s) if s.is_active => {
                self.register_job(runtime, &s).await;
            }
            _ => {
                let _ = scan_schedules::update_next_run(self.db.pool(), schedule_id, None).await;
            }
        }

        Ok(())
    }

    /// Drop every job and re-register all active schedules.
    pub async fn reload_all(self: &Arc<Self>) -> Result<()> {
        let guard = self.runtime.lock().await;
        let runtime = guard.as_ref().ok_or(SchedulerError::NotStarted)?;

        let existing: Vec<(String, Uuid)> = self.jobs.lock().await.drain().collect();
        for (schedule_id, job_id) in existing {
            if let Err(e) = runtime.remove(&job_id).await {
                tracing::warn!(schedule_id = %schedule_id, error = %e, "failed to remove job");
            }
        }

        let schedules = scan_schedules::list_active(self.db.pool()).await?;
        for schedule in &schedules {
            self.register_job(runtime, schedule).await;
        }

        tracing::info!(schedules = schedules.len(), "schedules reloaded");
        Ok(())
    }

    /// Number of currently registered jobs.
    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Register one schedule's cron job. An invalid expression logs a
    /// warning and registers nothing.
    async fn register_job(
        self: &Arc<Self>,
        runtime: &JobScheduler,
        schedule: &scan_schedules::ScanSchedule,
    ) {
        let expression = normalize_cron(&schedule.cron_expression);

        let fire_self = self.clone();
        let fire_id = schedule.id.clone();
        let job = match Job::new_async(expression.as_str(), move |_uuid, _lock| {
            let scheduler = fire_self.clone();
            let schedule_id = fire_id.clone();
            Box::pin(async move {
                scheduler.fire(&schedule_id).await;
            })
        }) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(
                    schedule_id = %schedule.id,
                    cron = %schedule.cron_expression,
                    error = %e,
                    "invalid cron expression, schedule skipped"
                );
                return;
            }
        };

        match runtime.add(job).await {
            Ok(job_id) => {
                self.jobs.lock().await.insert(schedule.id.clone(), job_id);

                // next_tick_for_job wants a mutable handle; the scheduler
                // is a bundle of Arcs, so a clone shares the same runtime
                let next = runtime
                    .clone()
                    .next_tick_for_job(job_id)
                    .await
                    .ok()
                    .flatten();
                if let Err(e) =
                    scan_schedules::update_next_run(self.db.pool(), &schedule.id, next).await
                {
                    tracing::warn!(schedule_id = %schedule.id, error = %e, "next-run stamp failed");
                }

                tracing::info!(
                    schedule_id = %schedule.id,
                    name = %schedule.name,
                    cron = %schedule.cron_expression,
                    "schedule registered"
                );
            }
            Err(e) => {
                tracing::warn!(schedule_id = %schedule.id, error = %e, "failed to add job");
            }
        }
    }

    /// One firing: re-read the schedule, kick off the full scan, stamp the
    /// run times. All failures are logged; a firing never takes the
    /// scheduler down.
    async fn fire(&self, schedule_id: &str) {
        let schedule = match scan_schedules::get_by_id(self.db.pool(), schedule_id).await {
            Ok(Some(s)) if s.is_active => s,
            Ok(_) => {
                tracing::debug!(schedule_id = %schedule_id, "schedule gone or inactive, skipping");
                return;
            }
            Err(e) => {
                tracing::warn!(schedule_id = %schedule_id, error = %e, "schedule read failed");
                return;
            }
        };

        let now = Utc::now();
        tracing::info!(schedule_id = %schedule_id, name = %schedule.name, "schedule fired");

        let request = FullScanRequest {
            service_area_ids: schedule.service_area_ids.clone(),
            category_ids: schedule.category_ids.clone(),
            engine_ids: schedule.engine_ids.clone(),
            grid_size: Some(schedule.grid_size),
            scheduled_at: Some(now),
        };

        match self.orchestrator.create_full_scan(request).await {
            Ok(scans) => {
                tracing::info!(schedule_id = %schedule_id, scans = scans.len(), "scheduled scans created");
            }
            Err(e) => {
                tracing::warn!(schedule_id = %schedule_id, error = %e, "scheduled full scan failed");
            }
        }

        if let Err(e) = scan_schedules::update_last_run(self.db.pool(), schedule_id, now).await {
            tracing::warn!(schedule_id = %schedule_id, error = %e, "last-run stamp failed");
        }

        let job_id = self.jobs.lock().await.get(schedule_id).copied();
        if let Some(job_id) = job_id {
            let next = {
                let guard = self.runtime.lock().await;
                match guard.as_ref() {
                    Some(runtime) => runtime
                        .clone()
                        .next_tick_for_job(job_id)
                        .await
                        .ok()
                        .flatten(),
                    None => None,
                }
            };
            if let Err(e) = scan_schedules::update_next_run(self.db.pool(), schedule_id, next).await
            {
                tracing::warn!(schedule_id = %schedule_id, error = %e, "next-run stamp failed");
            }
        }
    }
}

/// Accept the five-field cron shape schedules are written in; the cron
/// runtime wants a seconds field, so one is prepended.
fn normalize_cron(expression: &str) -> String {
    let fields = expression.split_whitespace().count();
    if fields == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}
