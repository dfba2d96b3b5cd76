//! Per-engine task queue with throttled workers.
//!
//! Each engine gets its own priority queue (higher priority first, FIFO
//! within a priority) and at most one worker task at a time. A worker
//! pauses when its engine cannot take requests - throttled, blocked, or
//! over the shared Google daily cap - and schedules a one-shot retry a
//! minute later. Handler errors never kill a worker; the handler records
//! failures on the task's scan point itself.

use gridrank_core::{EngineId, GeoPoint};
use gridrank_engine::EngineRegistry;
use gridrank_engine::GOOGLE_GROUP;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Combined daily request cap across the Google reputation group.
pub const GOOGLE_GROUP_DAILY_CAP: u32 = 200;

/// Delay before a paused engine's queue is retried.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// One unit of scan work: a single search at a single grid coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTask {
    /// Owning scan
    pub scan_id: String,
    /// Grid point to execute
    pub scan_point_id: String,
    /// Engine that runs the search
    pub engine_id: EngineId,
    /// Query keyword
    pub keyword: String,
    /// Grid coordinate
    pub point: GeoPoint,
    /// City for location encoding
    pub city: Option<String>,
    /// State for location encoding
    pub state: Option<String>,
    /// Category of the scan, for matcher attribution
    pub category_id: Option<String>,
    /// Queue priority; higher runs first
    pub priority: i64,
}

/// Future returned by a task handler.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The queue's task handler callback. Errors are the handler's own
/// responsibility; it records them on the scan point and returns.
pub type TaskHandler = Arc<dyn Fn(ScanTask) -> TaskFuture + Send + Sync>;

/// Accessor returning the combined `requests_today` of a reputation group.
pub type GroupTotalFn = Arc<dyn Fn(&str) -> u32 + Send + Sync>;

struct QueuedTask {
    priority: i64,
    seq: u64,
    task: ScanTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    // Max-heap: higher priority first, then lower sequence (FIFO)
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueInner {
    registry: EngineRegistry,
    handler: TaskHandler,
    group_daily_total: GroupTotalFn,
    queues: Mutex<HashMap<EngineId, BinaryHeap<QueuedTask>>>,
    workers: Mutex<HashMap<EngineId, JoinHandle<()>>>,
    retry_timers: Mutex<HashMap<EngineId, JoinHandle<()>>>,
    stopped: AtomicBool,
    seq: AtomicU64,
    retry_delay: Duration,
}

/// The per-engine scan task queue.
#[derive(Clone)]
pub struct ScanQueue {
    inner: Arc<QueueInner>,
}

impl ScanQueue {
    /// Create a queue over a registry, a group-total accessor and a task
    /// handler.
    #[must_use]
    pub fn new(registry: EngineRegistry, group_daily_total: GroupTotalFn, handler: TaskHandler) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                registry,
                handler,
                group_daily_total,
                queues: Mutex::new(HashMap::new()),
                workers: Mutex::new(HashMap::new()),
                retry_timers: Mutex::new(HashMap::new()),
                stopped: AtomicBool::new(false),
                seq: AtomicU64::new(0),
                retry_delay: DEFAULT_RETRY_DELAY,
            }),
        }
    }

    /// Override the pause-retry delay (tests and tuning).
    #[must_use]
    pub fn with_retry_delay(self, retry_delay: Duration) -> Self {
        let inner = Arc::try_unwrap(self.inner).map_or_else(
            |arc| QueueInner {
                registry: arc.registry.clone(),
                handler: arc.handler.clone(),
                group_daily_total: arc.group_daily_total.clone(),
                queues: Mutex::new(HashMap::new()),
                workers: Mutex::new(HashMap::new()),
                retry_timers: Mutex::new(HashMap::new()),
                stopped: AtomicBool::new(false),
                seq: AtomicU64::new(0),
                retry_delay,
            },
            |mut inner| {
                inner.retry_delay = retry_delay;
                inner
            },
        );
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Push a batch of tasks into their per-engine queues and make sure
    /// workers are running. Idempotent.
    pub fn enqueue_batch(&self, tasks: Vec<ScanTask>) {
        if tasks.is_empty() {
            return;
        }

        {
            let mut queues = self.inner.queues.lock().expect("acquire queue lock");
            for task in tasks {
                let seq = self.inner.seq.fetch_add(1, AtomicOrdering::SeqCst);
                queues
                    .entry(task.engine_id.clone())
                    .or_default()
                    .push(QueuedTask {
                        priority: task.priority,
                        seq,
                        task,
                    });
            }
        }

        self.ensure_processing();
    }

    /// Start a worker for every engine with queued work and no worker.
    pub fn ensure_processing(&self) {
        if self.inner.stopped.load(AtomicOrdering::SeqCst) {
            return;
        }

        let backlog: Vec<EngineId> = {
            let queues = self.inner.queues.lock().expect("acquire queue lock");
            queues
                .iter()
                .filter(|(_, q)| !q.is_empty())
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut workers = self.inner.workers.lock().expect("acquire worker lock");
        for engine_id in backlog {
            if workers.contains_key(&engine_id) {
                continue;
            }
            let inner = self.inner.clone();
            let id = engine_id.clone();
            let handle = tokio::spawn(async move {
                run_worker(inner, id).await;
            });
            workers.insert(engine_id, handle);
        }
    }

    /// Stop the queue: drain every queue, cancel retry timers, and wait
    /// for workers to exit. In-flight tasks run to completion.
    pub async fn stop(&self) {
        self.inner.stopped.store(true, AtomicOrdering::SeqCst);

        self.inner
            .queues
            .lock()
            .expect("acquire queue lock")
            .clear();

        let timers: Vec<JoinHandle<()>> = self
            .inner
            .retry_timers
            .lock()
            .expect("acquire retry timer lock")
            .drain()
            .map(|(_, h)| h)
            .collect();
        for timer in timers {
            timer.abort();
        }

        let workers: Vec<JoinHandle<()>> = self
            .inner
            .workers
            .lock()
            .expect("acquire worker lock")
            .drain()
            .map(|(_, h)| h)
            .collect();
        for worker in workers {
            let _ = worker.await;
        }

        tracing::info!("scan queue stopped");
    }

    /// Number of tasks queued for one engine.
    #[must_use]
    pub fn queue_depth(&self, engine_id: &EngineId) -> usize {
        self.inner
            .queues
            .lock()
            .expect("acquire queue lock")
            .get(engine_id)
            .map_or(0, BinaryHeap::len)
    }

    /// Number of tasks queued across all engines.
    #[must_use]
    pub fn total_depth(&self) -> usize {
        self.inner
            .queues
            .lock()
            .expect("acquire queue lock")
            .values()
            .map(BinaryHeap::len)
            .sum()
    }

    /// Engines with a worker currently running.
    #[must_use]
    pub fn processing_engines(&self) -> Vec<EngineId> {
        self.inner
            .workers
            .lock()
            .expect("acquire worker lock")
            .keys()
            .cloned()
            .collect()
    }

    /// Whether a paused engine has a pending retry timer.
    #[must_use]
    pub fn has_retry_timer(&self, engine_id: &EngineId) -> bool {
        self.inner
            .retry_timers
            .lock()
            .expect("acquire retry timer lock")
            .contains_key(engine_id)
    }
}

async fn run_worker(inner: Arc<QueueInner>, engine_id: EngineId) {
    let mut paused_reason: Option<String> = None;

    loop {
        if inner.stopped.load(AtomicOrdering::SeqCst) {
            break;
        }

        let Some(engine) = inner.registry.get(&engine_id) else {
            paused_reason = Some("unregistered".to_string());
            break;
        };

        if !engine.can_make_request() {
            paused_reason = Some(engine.status().to_string());
            break;
        }

        if engine.reputation_group() == Some(GOOGLE_GROUP)
            && (inner.group_daily_total)(GOOGLE_GROUP) >= GOOGLE_GROUP_DAILY_CAP
        {
            paused_reason = Some("daily_group_cap".to_string());
            break;
        }

        let task = {
            let mut queues = inner.queues.lock().expect("acquire queue lock");
            queues.get_mut(&engine_id).and_then(BinaryHeap::pop)
        };
        let Some(queued) = task else { break };

        // The handler traps its own errors; a panic-free handler keeps
        // the worker alive across every task
        (inner.handler)(queued.task).await;
    }

    inner
        .workers
        .lock()
        .expect("acquire worker lock")
        .remove(&engine_id);

    if inner.stopped.load(AtomicOrdering::SeqCst) {
        return;
    }

    let backlog = {
        let queues = inner.queues.lock().expect("acquire queue lock");
        queues.get(&engine_id).is_some_and(|q| !q.is_empty())
    };
    if !backlog {
        return;
    }

    match paused_reason {
        Some(reason) => {
            tracing::info!(
                engine_id = %engine_id,
                reason = %reason,
                "engine paused with backlog, scheduling retry"
            );
            schedule_retry(inner, engine_id);
        }
        // A task raced in between the final pop and worker removal;
        // restart immediately so it is not stranded
        None => ScanQueue { inner }.ensure_processing(),
    }
}

fn schedule_retry(inner: Arc<QueueInner>, engine_id: EngineId) {
    let mut timers = inner.retry_timers.lock().expect("acquire retry timer lock");
    if timers.contains_key(&engine_id) {
        return;
    }

    let timer_inner = inner.clone();
    let timer_id = engine_id.clone();
    let delay = inner.retry_delay;
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        timer_inner
            .retry_timers
            .lock()
            .expect("acquire retry timer lock")
            .remove(&timer_id);
        ScanQueue { inner: timer_inner }.ensure_processing();
    });
    timers.insert(engine_id, handle);
}
