//! GridRank Scanner - scan execution.
//!
//! This crate carries the scan pipeline: pure grid generation, business
//! entity resolution, the per-engine throttled task queue, and the
//! orchestrator that creates scans, hosts the task handler, monitors
//! completion and recovers orphaned work after a restart.
//!
//! # Flow
//!
//! A scan request expands into one task per grid coordinate. The
//! [`ScanQueue`] delivers tasks to each engine at engine-safe rates
//! (pausing on throttle, block, or the shared Google daily cap and
//! retrying a minute later); the orchestrator's task handler runs the
//! search, resolves every parsed listing through the [`BusinessMatcher`],
//! persists rankings and review snapshots, and advances the scan's point
//! counter with an atomic SQL increment. A polling monitor batches
//! terminal transitions.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod grid;
pub mod matcher;
pub mod orchestrator;
pub mod queue;

pub use error::{Result, ScanError};
pub use grid::{generate, GridPoint, VALID_GRID_SIZES};
pub use matcher::{BusinessMatcher, MatchOutcome, MatchType};
pub use orchestrator::{CreateScanRequest, FullScanRequest, MonitorTiming, ScanOrchestrator};
pub use queue::{GroupTotalFn, ScanQueue, ScanTask, TaskHandler};
