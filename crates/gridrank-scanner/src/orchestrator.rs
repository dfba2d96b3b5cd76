//! Scan orchestration: record creation, task handling, completion
//! monitoring and restart recovery.
//!
//! The orchestrator owns the queue and installs both callbacks into it at
//! construction: the task handler (search, resolve, persist, count) and
//! the Google-group daily-total accessor. Monitors are plain polling
//! tasks - one per created scan or batch - that batch terminal
//! transitions and enforce hard timeouts.

use crate::error::{Result, ScanError};
use crate::grid::{self, VALID_GRID_SIZES};
use crate::matcher::BusinessMatcher;
use crate::queue::{GroupTotalFn, ScanQueue, ScanTask, TaskHandler};
use chrono::{DateTime, Utc};
use gridrank_core::{EngineId, GeoPoint, ReviewSource};
use gridrank_db::scan_points::PointStatus;
use gridrank_db::scans::{NewScan, Scan, ScanStatus};
use gridrank_db::{
    categories, review_snapshots, scan_points, scan_rankings, scans, service_areas, Database,
};
use gridrank_engine::{EngineRegistry, SearchRequest};
use std::sync::Arc;
use std::time::Duration;

/// Poll cadence and hard deadlines for scan monitors.
#[derive(Debug, Clone, Copy)]
pub struct MonitorTiming {
    /// Poll interval for single-scan monitors
    pub single_poll: Duration,
    /// Hard deadline for a single scan
    pub single_timeout: Duration,
    /// Poll interval for batch monitors
    pub batch_poll: Duration,
    /// Hard deadline for a full-scan batch
    pub batch_timeout: Duration,
}

impl Default for MonitorTiming {
    fn default() -> Self {
        Self {
            single_poll: Duration::from_secs(5),
            single_timeout: Duration::from_secs(30 * 60),
            batch_poll: Duration::from_secs(15),
            batch_timeout: Duration::from_secs(6 * 3600),
        }
    }
}

/// Request for one (area, category, keyword, engine) scan.
#[derive(Debug, Clone)]
pub struct CreateScanRequest {
    /// Service area to scan
    pub service_area_id: String,
    /// Category the keyword belongs to
    pub category_id: String,
    /// Query keyword
    pub keyword: String,
    /// Engine to use
    pub engine_id: String,
    /// Grid side length, one of 3, 5, 7, 9
    pub grid_size: i64,
    /// Schedule request time, when scheduler-driven
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Request expanding into (areas × categories × keywords × engines).
///
/// Empty vectors default to all active areas, all active categories (and
/// their active keywords, falling back to the category name) and all
/// registered engines.
#[derive(Debug, Clone, Default)]
pub struct FullScanRequest {
    /// Service areas (empty = all active)
    pub service_area_ids: Vec<String>,
    /// Categories (empty = all active)
    pub category_ids: Vec<String>,
    /// Engines (empty = all registered)
    pub engine_ids: Vec<String>,
    /// Grid side length (None = orchestrator default)
    pub grid_size: Option<i64>,
    /// Schedule request time, when scheduler-driven
    pub scheduled_at: Option<DateTime<Utc>>,
}

struct TaskContext {
    db: Database,
    registry: EngineRegistry,
    matcher: BusinessMatcher,
}

/// The scan execution orchestrator.
#[derive(Clone)]
pub struct ScanOrchestrator {
    ctx: Arc<TaskContext>,
    queue: ScanQueue,
    timing: MonitorTiming,
    default_grid_size: i64,
}

impl ScanOrchestrator {
    /// Wire up an orchestrator: builds the matcher, installs the task
    /// handler and the Google-group accessor into a fresh queue.
    #[must_use]
    pub fn new(db: Database, registry: EngineRegistry) -> Self {
        let matcher = BusinessMatcher::new(db.clone());
        let ctx = Arc::new(TaskContext {
            db,
            registry: registry.clone(),
            matcher,
        });

        let handler_ctx = ctx.clone();
        let handler: TaskHandler = Arc::new(move |task| {
            let ctx = handler_ctx.clone();
            Box::pin(async move {
                handle_task(&ctx, task).await;
            })
        });

        let group_registry = registry.clone();
        let group_total: GroupTotalFn =
            Arc::new(move |group| group_registry.group_requests_today(group));

        Self {
            ctx,
            queue: ScanQueue::new(registry, group_total, handler),
            timing: MonitorTiming::default(),
            default_grid_size: 7,
        }
    }

    /// Override monitor timing (tests and tuning).
    #[must_use]
    pub fn with_timing(mut self, timing: MonitorTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Override the default grid size used by full scans.
    #[must_use]
    pub fn with_default_grid_size(mut self, grid_size: i64) -> Self {
        self.default_grid_size = grid_size;
        self
    }

    /// The queue this orchestrator feeds.
    #[must_use]
    pub fn queue(&self) -> &ScanQueue {
        &self.queue
    }

    /// Create and start a single scan.
    ///
    /// Validates the referenced entities, persists the scan and its grid,
    /// enqueues one task per point, flips the scan to running and spawns
    /// its monitor.
    pub async fn create_scan(&self, request: CreateScanRequest) -> Result<Scan> {
        validate_grid_size(request.grid_size)?;

        let pool = self.ctx.db.pool();

        let area = service_areas::get_by_id(pool, &request.service_area_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| {
                ScanError::Validation(format!(
                    "service area '{}' not found or inactive",
                    request.service_area_id
                ))
            })?;

        let category = categories::get_by_id(pool, &request.category_id)
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| {
                ScanError::Validation(format!(
                    "category '{}' not found or inactive",
                    request.category_id
                ))
            })?;

        let engine_id = EngineId::new(request.engine_id.as_str())?;
        if !self.ctx.registry.contains(&engine_id) {
            return Err(ScanError::Validation(format!(
                "engine '{engine_id}' is not registered"
            )));
        }

        let (scan, tasks) = self
            .create_scan_record(
                &area,
                &category,
                &request.keyword,
                &engine_id,
                request.grid_size,
                request.scheduled_at,
            )
            .await?;

        self.queue.enqueue_batch(tasks);
        scans::mark_running(pool, &scan.id).await?;

        self.spawn_monitor(
            vec![scan.id.clone()],
            self.timing.single_poll,
            self.timing.single_timeout,
        );

        tracing::info!(
            scan_id = %scan.id,
            engine_id = %engine_id,
            keyword = %scan.keyword,
            points = scan.points_total,
            "scan started"
        );

        scans::get_by_id(pool, &scan.id)
            .await?
            .ok_or_else(|| ScanError::Validation(format!("scan '{}' disappeared", scan.id)))
    }

    /// Expand a full-scan request into one scan per combination, under a
    /// single batch monitor.
    pub async fn create_full_scan(&self, request: FullScanRequest) -> Result<Vec<Scan>> {
        let grid_size = request.grid_size.unwrap_or(self.default_grid_size);
        validate_grid_size(grid_size)?;

        let pool = self.ctx.db.pool();

        let areas = if request.service_area_ids.is_empty() {
            service_areas::list_active(pool).await?
        } else {
            let mut resolved = Vec::with_capacity(request.service_area_ids.len());
            for id in &request.service_area_ids {
                let area = service_areas::get_by_id(pool, id)
                    .await?
                    .filter(|a| a.is_active)
                    .ok_or_else(|| {
                        ScanError::Validation(format!("service area '{id}' not found or inactive"))
                    })?;
                resolved.push(area);
            }
            resolved
        };

        let category_list = if request.category_ids.is_empty() {
            categories::list_active(pool).await?
        } else {
            let mut resolved = Vec::with_capacity(request.category_ids.len());
            for id in &request.category_ids {
                let category = categories::get_by_id(pool, id)
                    .await?
                    .filter(|c| c.is_active)
                    .ok_or_else(|| {
                        ScanError::Validation(format!("category '{id}' not found or inactive"))
                    })?;
                resolved.push(category);
            }
            resolved
        };

        let engine_ids = if request.engine_ids.is_empty() {
            self.ctx.registry.ids()
        } else {
            let mut resolved = Vec::with_capacity(request.engine_ids.len());
            for id in &request.engine_ids {
                let engine_id = EngineId::new(id.as_str())?;
                if !self.ctx.registry.contains(&engine_id) {
                    return Err(ScanError::Validation(format!(
                        "engine '{engine_id}' is not registered"
                    )));
                }
                resolved.push(engine_id);
            }
            resolved
        };

        let mut created = Vec::new();
        let mut all_tasks = Vec::new();

        for area in &areas {
            for category in &category_list {
                let keywords = categories::list_active_keywords(pool, &category.id).await?;
                let keyword_texts: Vec<String> = if keywords.is_empty() {
                    // A category without keywords scans under its own name
                    vec![category.name.clone()]
                } else {
                    keywords.into_iter().map(|k| k.text).collect()
                };

                for keyword in &keyword_texts {
                    for engine_id in &engine_ids {
                        let (scan, tasks) = self
                            .create_scan_record(
                                area,
                                category,
                                keyword,
                                engine_id,
                                grid_size,
                                request.scheduled_at,
                            )
                            .await?;
                        all_tasks.extend(tasks);
                        created.push(scan);
                    }
                }
            }
        }

        self.queue.enqueue_batch(all_tasks);
        for scan in &created {
            scans::mark_running(pool, &scan.id).await?;
        }

        let scan_ids: Vec<String> = created.iter().map(|s| s.id.clone()).collect();
        if !scan_ids.is_empty() {
            self.spawn_monitor(scan_ids, self.timing.batch_poll, self.timing.batch_timeout);
        }

        tracing::info!(scans = created.len(), "full scan started");

        Ok(created)
    }

    /// Administratively cancel a scan.
    ///
    /// A database state flip: the scan goes terminal, the monitor drops
    /// it on its next poll, and in-flight tasks finish and persist.
    pub async fn cancel_scan(&self, scan_id: &str) -> Result<bool> {
        Ok(scans::cancel(self.ctx.db.pool(), scan_id).await?)
    }

    /// Re-queue the unfinished points of scans left `queued` or `running`
    /// by a previous process. Scans with nothing left to do are finalized
    /// directly. Returns how many scans were re-queued.
    ///
    /// Per-scan errors are logged and skipped; recovery never prevents
    /// the server from taking new scans.
    pub async fn recover_orphaned_scans(&self) -> Result<usize> {
        let pool = self.ctx.db.pool();
        let orphans = scans::list_orphaned(pool).await?;
        if orphans.is_empty() {
            return Ok(0);
        }

        let mut all_tasks = Vec::new();
        let mut monitored = Vec::new();

        for scan in orphans {
            let pending = match scan_points::list_pending(pool, &scan.id).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(scan_id = %scan.id, error = %e, "recovery: failed to list points");
                    continue;
                }
            };

            if pending.is_empty() {
                let (status, message) = if scan.points_completed >= scan.points_total {
                    (ScanStatus::Completed, None)
                } else {
                    (
                        ScanStatus::Failed,
                        Some(format!(
                            "Engine queue empty before all points completed: only {}/{} points completed",
                            scan.points_completed, scan.points_total
                        )),
                    )
                };
                if let Err(e) =
                    scans::finalize(pool, &scan.id, status, message.as_deref()).await
                {
                    tracing::warn!(scan_id = %scan.id, error = %e, "recovery: finalize failed");
                }
                continue;
            }

            let area = match service_areas::get_by_id(pool, &scan.service_area_id).await {
                Ok(Some(a)) => a,
                Ok(None) => {
                    let _ = scans::finalize(
                        pool,
                        &scan.id,
                        ScanStatus::Failed,
                        Some("service area no longer exists"),
                    )
                    .await;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(scan_id = %scan.id, error = %e, "recovery: area lookup failed");
                    continue;
                }
            };

            let Ok(engine_id) = EngineId::new(scan.engine_id.as_str()) else {
                let _ = scans::finalize(
                    pool,
                    &scan.id,
                    ScanStatus::Failed,
                    Some("invalid engine id"),
                )
                .await;
                continue;
            };

            for point in pending {
                all_tasks.push(ScanTask {
                    scan_id: scan.id.clone(),
                    scan_point_id: point.id,
                    engine_id: engine_id.clone(),
                    keyword: scan.keyword.clone(),
                    point: GeoPoint::new(point.lat, point.lng),
                    city: Some(area.name.clone()),
                    state: Some(area.state.clone()),
                    category_id: Some(scan.category_id.clone()),
                    priority: 1,
                });
            }

            if let Err(e) = scans::mark_running(pool, &scan.id).await {
                tracing::warn!(scan_id = %scan.id, error = %e, "recovery: mark running failed");
            }
            monitored.push(scan.id.clone());
        }

        let recovered = monitored.len();
        self.queue.enqueue_batch(all_tasks);
        if !monitored.is_empty() {
            self.spawn_monitor(monitored, self.timing.batch_poll, self.timing.batch_timeout);
        }

        tracing::info!(recovered, "orphaned scan recovery finished");
        Ok(recovered)
    }

    async fn create_scan_record(
        &self,
        area: &service_areas::ServiceArea,
        category: &categories::Category,
        keyword: &str,
        engine_id: &EngineId,
        grid_size: i64,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<(Scan, Vec<ScanTask>)> {
        let pool = self.ctx.db.pool();

        let scan = scans::create_scan(
            pool,
            &NewScan {
                service_area_id: area.id.clone(),
                category_id: category.id.clone(),
                keyword: keyword.to_string(),
                engine_id: engine_id.as_str().to_string(),
                grid_size,
                radius_miles: area.radius_miles,
                scheduled_at,
            },
        )
        .await?;

        let grid_points = grid::generate(
            area.center_lat,
            area.center_lng,
            area.radius_miles,
            grid_size,
        );

        let mut tasks = Vec::with_capacity(grid_points.len());
        for gp in grid_points {
            let point =
                scan_points::create_point(pool, &scan.id, gp.row, gp.col, gp.lat, gp.lng).await?;
            tasks.push(ScanTask {
                scan_id: scan.id.clone(),
                scan_point_id: point.id,
                engine_id: engine_id.clone(),
                keyword: keyword.to_string(),
                point: GeoPoint::new(gp.lat, gp.lng),
                city: Some(area.name.clone()),
                state: Some(area.state.clone()),
                category_id: Some(category.id.clone()),
                priority: 1,
            });
        }

        Ok((scan, tasks))
    }

    fn spawn_monitor(&self, scan_ids: Vec<String>, poll: Duration, timeout: Duration) {
        let ctx = self.ctx.clone();
        let queue = self.queue.clone();
        tokio::spawn(async move {
            monitor_scans(&ctx, &queue, scan_ids, poll, timeout).await;
        });
    }
}

fn validate_grid_size(grid_size: i64) -> Result<()> {
    if VALID_GRID_SIZES.contains(&grid_size) {
        Ok(())
    } else {
        Err(ScanError::Validation(format!(
            "invalid grid size {grid_size}; must be one of 3, 5, 7, 9"
        )))
    }
}

/// Execute one task: search, resolve listings, persist rankings and
/// snapshots, and account the point.
///
/// Every failure path still advances the scan's counter so the scan can
/// reach a terminal state; errors never escape to the queue worker.
async fn handle_task(ctx: &Arc<TaskContext>, task: ScanTask) {
    let pool = ctx.db.pool();

    let Some(engine) = ctx.registry.get(&task.engine_id) else {
        tracing::warn!(engine_id = %task.engine_id, "task for unregistered engine");
        fail_point(ctx, &task).await;
        return;
    };

    let request = SearchRequest {
        query: task.keyword.clone(),
        point: task.point,
        city: task.city.clone(),
        state: task.state.clone(),
    };

    let result = match engine.search(&request).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(
                scan_id = %task.scan_id,
                engine_id = %task.engine_id,
                error = %e,
                "search failed, failing point"
            );
            fail_point(ctx, &task).await;
            return;
        }
    };

    for parsed in &result.businesses {
        let outcome = match ctx
            .matcher
            .resolve(parsed, &task.engine_id, task.category_id.as_deref())
            .await
        {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(name = %parsed.name, error = %e, "matcher failed for listing");
                continue;
            }
        };

        if let Err(e) = scan_rankings::insert_ranking(
            pool,
            &task.scan_point_id,
            &outcome.business_id,
            parsed.rank_position,
            parsed.result_type.as_str(),
            parsed.snippet.as_deref(),
        )
        .await
        {
            tracing::warn!(business_id = %outcome.business_id, error = %e, "ranking insert failed");
        }

        if let (Some(rating), Some(review_count)) = (parsed.rating, parsed.review_count) {
            let source = ReviewSource::for_engine(&task.engine_id);
            if let Err(e) = review_snapshots::insert_snapshot(
                pool,
                &outcome.business_id,
                source.as_str(),
                rating,
                review_count,
            )
            .await
            {
                tracing::warn!(business_id = %outcome.business_id, error = %e, "snapshot insert failed");
            }
        }
    }

    if let Err(e) = scan_points::set_status(pool, &task.scan_point_id, PointStatus::Completed).await
    {
        tracing::warn!(scan_point_id = %task.scan_point_id, error = %e, "point completion failed");
    }
    if let Err(e) = scans::increment_points_completed(pool, &task.scan_id).await {
        tracing::warn!(scan_id = %task.scan_id, error = %e, "counter increment failed");
    }
}

async fn fail_point(ctx: &Arc<TaskContext>, task: &ScanTask) {
    let pool = ctx.db.pool();
    if let Err(e) = scan_points::set_status(pool, &task.scan_point_id, PointStatus::Failed).await {
        tracing::warn!(scan_point_id = %task.scan_point_id, error = %e, "point failure write failed");
    }
    // Failed points still count toward completion
    if let Err(e) = scans::increment_points_completed(pool, &task.scan_id).await {
        tracing::warn!(scan_id = %task.scan_id, error = %e, "counter increment failed");
    }
}

/// Poll a set of scans until every one is terminal or the deadline hits.
///
/// A scan whose counter reached its total completes. A scan whose engine
/// has an empty queue, no running worker and no pending retry is frozen:
/// completed when the (re-read) counter matches, failed otherwise.
/// Survivors at the deadline fail with a timeout message.
async fn monitor_scans(
    ctx: &Arc<TaskContext>,
    queue: &ScanQueue,
    scan_ids: Vec<String>,
    poll: Duration,
    timeout: Duration,
) {
    let pool = ctx.db.pool();
    let started = tokio::time::Instant::now();

    loop {
        tokio::time::sleep(poll).await;

        let remaining = match scans::list_non_terminal(pool, &scan_ids).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "monitor query failed");
                continue;
            }
        };
        if remaining.is_empty() {
            return;
        }

        if started.elapsed() >= timeout {
            let ids: Vec<String> = remaining.iter().map(|s| s.id.clone()).collect();
            let message = format!("Scan timed out after {} minutes", timeout.as_secs() / 60);
            match scans::finalize_batch(pool, &ids, ScanStatus::Failed, Some(&message)).await {
                Ok(n) => tracing::warn!(scans = n, "monitor deadline hit, scans failed"),
                Err(e) => tracing::warn!(error = %e, "timeout finalize failed"),
            }
            return;
        }

        let mut completed_ids = Vec::new();
        for scan in &remaining {
            if scan.points_completed >= scan.points_total {
                completed_ids.push(scan.id.clone());
                continue;
            }

            let Ok(engine_id) = EngineId::new(scan.engine_id.as_str()) else {
                continue;
            };
            let frozen = queue.queue_depth(&engine_id) == 0
                && !queue.processing_engines().contains(&engine_id)
                && !queue.has_retry_timer(&engine_id);
            if !frozen {
                continue;
            }

            // Re-read after observing the frozen queue: the last handler
            // may have persisted its increment after our batch query
            match scans::get_by_id(pool, &scan.id).await {
                Ok(Some(fresh)) if fresh.points_completed >= fresh.points_total => {
                    completed_ids.push(fresh.id);
                }
                Ok(Some(fresh)) if !fresh.status.is_terminal() => {
                    let message = format!(
                        "Engine queue empty before all points completed: only {}/{} points completed",
                        fresh.points_completed, fresh.points_total
                    );
                    if let Err(e) =
                        scans::finalize(pool, &fresh.id, ScanStatus::Failed, Some(&message)).await
                    {
                        tracing::warn!(scan_id = %fresh.id, error = %e, "freeze finalize failed");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(scan_id = %scan.id, error = %e, "monitor re-read failed");
                }
            }
        }

        if !completed_ids.is_empty() {
            if let Err(e) =
                scans::finalize_batch(pool, &completed_ids, ScanStatus::Completed, None).await
            {
                tracing::warn!(error = %e, "completion finalize failed");
            }
        }
    }
}
