//! End-to-end scan pipeline tests against in-memory SQLite and stub
//! engines.

use async_trait::async_trait;
use gridrank_core::{EngineId, ResultType};
use gridrank_db::scans::ScanStatus;
use gridrank_db::{businesses, categories, review_snapshots, scan_points, scan_rankings, scans, service_areas, Database};
use gridrank_engine::{
    EngineRegistry, EngineStatus, ParsedBusiness, Result as EngineResult, SearchProvider,
    SearchRequest, SearchResult,
};
use gridrank_scanner::{CreateScanRequest, FullScanRequest, MonitorTiming, ScanOrchestrator};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct StubEngine {
    engine_id: EngineId,
    businesses: Vec<ParsedBusiness>,
    fail: AtomicBool,
    calls: AtomicU32,
    delay_ms: AtomicU32,
}

impl StubEngine {
    fn new(id: &str, businesses: Vec<ParsedBusiness>) -> Arc<Self> {
        Arc::new(Self {
            engine_id: EngineId::new(id).expect("valid engine id"),
            businesses,
            fail: AtomicBool::new(false),
            calls: AtomicU32::new(0),
            delay_ms: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl SearchProvider for StubEngine {
    fn engine_id(&self) -> &EngineId {
        &self.engine_id
    }

    fn reputation_group(&self) -> Option<&str> {
        None
    }

    fn status(&self) -> EngineStatus {
        EngineStatus::Healthy
    }

    fn can_make_request(&self) -> bool {
        true
    }

    fn requests_today(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn clear_block(&self) {}

    async fn search(&self, request: &SearchRequest) -> EngineResult<SearchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(u64::from(delay))).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(gridrank_engine::EngineError::Unavailable {
                engine_id: self.engine_id.clone(),
                status: "blocked".to_string(),
            });
        }

        let mut result = SearchResult::empty(
            self.engine_id.clone(),
            &request.query,
            request.point,
            false,
            1,
        );
        result.businesses = self.businesses.clone();
        Ok(result)
    }
}

fn listing(name: &str, phone: &str, rank: i64) -> ParsedBusiness {
    ParsedBusiness {
        name: name.to_string(),
        address: None,
        city: None,
        state: None,
        phone: Some(phone.to_string()),
        website: None,
        lat: None,
        lng: None,
        rating: None,
        review_count: None,
        google_place_id: None,
        source_id: None,
        result_type: ResultType::LocalPack,
        rank_position: rank,
        snippet: None,
    }
}

fn fast_timing() -> MonitorTiming {
    MonitorTiming {
        single_poll: Duration::from_millis(30),
        single_timeout: Duration::from_secs(20),
        batch_poll: Duration::from_millis(30),
        batch_timeout: Duration::from_secs(20),
    }
}

struct Fixture {
    db: Database,
    area_id: String,
    category_id: String,
}

async fn fixture() -> Fixture {
    let db = Database::new(":memory:").await.expect("create database");
    db.run_migrations().await.expect("run migrations");

    let area = service_areas::create_service_area(
        db.pool(),
        "Boca Raton",
        "FL",
        26.4615,
        -80.0728,
        1.0,
    )
    .await
    .expect("create area");
    let category = categories::create_category(db.pool(), "Pizza", "pizza", None)
        .await
        .expect("create category");

    Fixture {
        db,
        area_id: area.id,
        category_id: category.id,
    }
}

async fn wait_terminal(db: &Database, scan_id: &str) -> scans::Scan {
    for _ in 0..300 {
        let scan = scans::get_by_id(db.pool(), scan_id)
            .await
            .expect("get scan")
            .expect("scan exists");
        if scan.status.is_terminal() {
            return scan;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("scan {scan_id} never reached a terminal state");
}

#[tokio::test]
async fn single_scan_happy_path() {
    let fx = fixture().await;

    // Joe's carries a rating; Pete's does not
    let mut joes = listing("Joe's Pizza", "(561) 555-1234", 1);
    joes.rating = Some(4.7);
    joes.review_count = Some(120);
    let petes = listing("Pete's", "(561) 555-5678", 2);

    let registry = EngineRegistry::new();
    registry.register(StubEngine::new("bing_api", vec![joes, petes]));

    let orchestrator =
        ScanOrchestrator::new(fx.db.clone(), registry).with_timing(fast_timing());

    let scan = orchestrator
        .create_scan(CreateScanRequest {
            service_area_id: fx.area_id.clone(),
            category_id: fx.category_id.clone(),
            keyword: "pizza".to_string(),
            engine_id: "bing_api".to_string(),
            grid_size: 3,
            scheduled_at: None,
        })
        .await
        .expect("create scan");

    assert_eq!(scan.points_total, 9);

    let done = wait_terminal(&fx.db, &scan.id).await;
    assert_eq!(done.status, ScanStatus::Completed);
    assert_eq!(done.points_completed, 9);
    assert!(done.completed_at.is_some());

    // Two businesses, 18 rankings, snapshots only for the rated listing
    let rankings = scan_rankings::count_by_scan(fx.db.pool(), &scan.id)
        .await
        .expect("count rankings");
    assert_eq!(rankings, 18);

    let joes_row = businesses::find_by_phone(fx.db.pool(), "+15615551234")
        .await
        .expect("query joes")
        .into_iter()
        .next()
        .expect("joes exists");
    assert_eq!(joes_row.normalized_name, "joes pizza");
    assert_eq!(joes_row.bing_rating, Some(4.7));

    let petes_row = businesses::find_by_phone(fx.db.pool(), "+15615555678")
        .await
        .expect("query petes")
        .into_iter()
        .next()
        .expect("petes exists");
    assert_eq!(petes_row.normalized_name, "petes");

    let joes_snapshots = review_snapshots::count_by_business(fx.db.pool(), &joes_row.id)
        .await
        .expect("count joes snapshots");
    assert_eq!(joes_snapshots, 9);
    let petes_snapshots = review_snapshots::count_by_business(fx.db.pool(), &petes_row.id)
        .await
        .expect("count petes snapshots");
    assert_eq!(petes_snapshots, 0);

    let snapshots = review_snapshots::list_by_business(fx.db.pool(), &joes_row.id)
        .await
        .expect("list snapshots");
    assert!(snapshots.iter().all(|s| s.source == "bing"));
}

#[tokio::test]
async fn failed_searches_still_complete_the_scan() {
    let fx = fixture().await;

    let engine = StubEngine::new("bing_api", vec![]);
    engine.fail.store(true, Ordering::SeqCst);
    let registry = EngineRegistry::new();
    registry.register(engine);

    let orchestrator =
        ScanOrchestrator::new(fx.db.clone(), registry).with_timing(fast_timing());

    let scan = orchestrator
        .create_scan(CreateScanRequest {
            service_area_id: fx.area_id.clone(),
            category_id: fx.category_id.clone(),
            keyword: "pizza".to_string(),
            engine_id: "bing_api".to_string(),
            grid_size: 3,
            scheduled_at: None,
        })
        .await
        .expect("create scan");

    let done = wait_terminal(&fx.db, &scan.id).await;

    // Failed points count toward completion; partiality lives on the rows
    assert_eq!(done.status, ScanStatus::Completed);
    assert_eq!(done.points_completed, 9);

    let points = scan_points::list_by_scan(fx.db.pool(), &scan.id)
        .await
        .expect("list points");
    assert!(points
        .iter()
        .all(|p| p.status == scan_points::PointStatus::Failed));

    let rankings = scan_rankings::count_by_scan(fx.db.pool(), &scan.id)
        .await
        .expect("count rankings");
    assert_eq!(rankings, 0);
}

#[tokio::test]
async fn validation_rejects_bad_requests() {
    let fx = fixture().await;

    let registry = EngineRegistry::new();
    registry.register(StubEngine::new("bing_api", vec![]));
    let orchestrator =
        ScanOrchestrator::new(fx.db.clone(), registry).with_timing(fast_timing());

    // Unknown area
    let err = orchestrator
        .create_scan(CreateScanRequest {
            service_area_id: "nope".to_string(),
            category_id: fx.category_id.clone(),
            keyword: "pizza".to_string(),
            engine_id: "bing_api".to_string(),
            grid_size: 3,
            scheduled_at: None,
        })
        .await
        .expect_err("missing area rejected");
    assert!(err.to_string().contains("service area"));

    // Out-of-range grid size
    let err = orchestrator
        .create_scan(CreateScanRequest {
            service_area_id: fx.area_id.clone(),
            category_id: fx.category_id.clone(),
            keyword: "pizza".to_string(),
            engine_id: "bing_api".to_string(),
            grid_size: 4,
            scheduled_at: None,
        })
        .await
        .expect_err("bad grid size rejected");
    assert!(err.to_string().contains("grid size"));

    // Unregistered engine
    let err = orchestrator
        .create_scan(CreateScanRequest {
            service_area_id: fx.area_id.clone(),
            category_id: fx.category_id.clone(),
            keyword: "pizza".to_string(),
            engine_id: "duckduckgo".to_string(),
            grid_size: 3,
            scheduled_at: None,
        })
        .await
        .expect_err("unregistered engine rejected");
    assert!(err.to_string().contains("not registered"));

    // Nothing persisted by any of the rejected requests
    let orphans = scans::list_orphaned(fx.db.pool()).await.expect("list scans");
    assert!(orphans.is_empty());
}

#[tokio::test]
async fn full_scan_expands_combinations() {
    let fx = fixture().await;

    categories::create_keyword(fx.db.pool(), &fx.category_id, "pizza near me", 2)
        .await
        .expect("create keyword");
    categories::create_keyword(fx.db.pool(), &fx.category_id, "best pizza", 1)
        .await
        .expect("create keyword");

    let registry = EngineRegistry::new();
    registry.register(StubEngine::new("bing_api", vec![]));
    registry.register(StubEngine::new("duckduckgo", vec![]));

    let orchestrator = ScanOrchestrator::new(fx.db.clone(), registry)
        .with_timing(fast_timing())
        .with_default_grid_size(3);

    let created = orchestrator
        .create_full_scan(FullScanRequest::default())
        .await
        .expect("create full scan");

    // 1 area x 1 category x 2 keywords x 2 engines
    assert_eq!(created.len(), 4);

    for scan in &created {
        let done = wait_terminal(&fx.db, &scan.id).await;
        assert_eq!(done.status, ScanStatus::Completed);
        assert_eq!(done.points_completed, 9);
    }
}

#[tokio::test]
async fn full_scan_falls_back_to_category_name() {
    let fx = fixture().await;

    let registry = EngineRegistry::new();
    registry.register(StubEngine::new("bing_api", vec![]));

    let orchestrator = ScanOrchestrator::new(fx.db.clone(), registry)
        .with_timing(fast_timing())
        .with_default_grid_size(3);

    let created = orchestrator
        .create_full_scan(FullScanRequest::default())
        .await
        .expect("create full scan");

    assert_eq!(created.len(), 1);
    assert_eq!(created[0].keyword, "Pizza");
}

#[tokio::test]
async fn orphaned_scans_recover_and_complete() {
    let fx = fixture().await;

    // A scan left mid-flight by a dead process: 4 of 9 points done
    let scan = scans::create_scan(
        fx.db.pool(),
        &scans::NewScan {
            service_area_id: fx.area_id.clone(),
            category_id: fx.category_id.clone(),
            keyword: "pizza".to_string(),
            engine_id: "bing_api".to_string(),
            grid_size: 3,
            radius_miles: 1.0,
            scheduled_at: None,
        },
    )
    .await
    .expect("create scan");
    scans::mark_running(fx.db.pool(), &scan.id)
        .await
        .expect("mark running");

    let grid = gridrank_scanner::generate(26.4615, -80.0728, 1.0, 3);
    for (i, gp) in grid.iter().enumerate() {
        let point =
            scan_points::create_point(fx.db.pool(), &scan.id, gp.row, gp.col, gp.lat, gp.lng)
                .await
                .expect("create point");
        if i < 4 {
            scan_points::set_status(
                fx.db.pool(),
                &point.id,
                scan_points::PointStatus::Completed,
            )
            .await
            .expect("set status");
            scans::increment_points_completed(fx.db.pool(), &scan.id)
                .await
                .expect("increment");
        }
    }

    let engine = StubEngine::new("bing_api", vec![]);
    let registry = EngineRegistry::new();
    registry.register(engine.clone());

    let orchestrator =
        ScanOrchestrator::new(fx.db.clone(), registry).with_timing(fast_timing());

    let recovered = orchestrator
        .recover_orphaned_scans()
        .await
        .expect("recover orphans");
    assert_eq!(recovered, 1);

    let done = wait_terminal(&fx.db, &scan.id).await;
    assert_eq!(done.status, ScanStatus::Completed);
    assert_eq!(done.points_completed, 9);

    // Exactly the five pending points were re-executed
    assert_eq!(engine.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn recovery_finalizes_scans_with_no_pending_points() {
    let fx = fixture().await;

    let scan = scans::create_scan(
        fx.db.pool(),
        &scans::NewScan {
            service_area_id: fx.area_id.clone(),
            category_id: fx.category_id.clone(),
            keyword: "pizza".to_string(),
            engine_id: "bing_api".to_string(),
            grid_size: 3,
            radius_miles: 1.0,
            scheduled_at: None,
        },
    )
    .await
    .expect("create scan");
    scans::mark_running(fx.db.pool(), &scan.id)
        .await
        .expect("mark running");

    for _ in 0..9 {
        scans::increment_points_completed(fx.db.pool(), &scan.id)
            .await
            .expect("increment");
    }

    let registry = EngineRegistry::new();
    registry.register(StubEngine::new("bing_api", vec![]));
    let orchestrator =
        ScanOrchestrator::new(fx.db.clone(), registry).with_timing(fast_timing());

    let recovered = orchestrator
        .recover_orphaned_scans()
        .await
        .expect("recover orphans");
    assert_eq!(recovered, 0);

    let done = scans::get_by_id(fx.db.pool(), &scan.id)
        .await
        .expect("get scan")
        .expect("scan exists");
    assert_eq!(done.status, ScanStatus::Completed);
}

#[tokio::test]
async fn cancelled_scan_stays_cancelled() {
    let fx = fixture().await;

    let engine = StubEngine::new("bing_api", vec![]);
    // Slow the engine down so cancellation lands mid-scan
    engine.delay_ms.store(100, Ordering::SeqCst);
    let registry = EngineRegistry::new();
    registry.register(engine);
    let orchestrator =
        ScanOrchestrator::new(fx.db.clone(), registry).with_timing(fast_timing());

    let scan = orchestrator
        .create_scan(CreateScanRequest {
            service_area_id: fx.area_id.clone(),
            category_id: fx.category_id.clone(),
            keyword: "pizza".to_string(),
            engine_id: "bing_api".to_string(),
            grid_size: 3,
            scheduled_at: None,
        })
        .await
        .expect("create scan");

    orchestrator
        .cancel_scan(&scan.id)
        .await
        .expect("cancel scan");

    let done = wait_terminal(&fx.db, &scan.id).await;
    assert_eq!(done.status, ScanStatus::Cancelled);

    // Terminal status never regresses, even as in-flight tasks persist
    tokio::time::sleep(Duration::from_millis(200)).await;
    let later = scans::get_by_id(fx.db.pool(), &scan.id)
        .await
        .expect("get scan")
        .expect("scan exists");
    assert_eq!(later.status, ScanStatus::Cancelled);
}
