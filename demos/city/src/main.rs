//! city: end-to-end demo of the roadtrack engine.
//!
//! Drives a handful of vehicles around a synthetic downtown grid and feeds
//! every tick through the matching controller.  The routing "service" is the
//! local graph behind a provider that times out on every fifth call, so the
//! local fallback is exercised too.
//!
//! ```text
//! RUST_LOG=info cargo run -p city -- [config.json]
//! ```
//!
//! The optional JSON file overrides any of `ticks`, `vehicles`, `sim`, and
//! `matching` (see [`DemoConfig`]).

mod network;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use rt_core::{BoundingBox, GeoPoint, SegmentId, SimRng, VehicleId};
use rt_graph::RoadGraph;
use rt_match::{
    GraphProvider, MatchConfig, MatchController, MatchOptions, MatchResponse, ProviderError,
    ProviderResult, RoutingProvider, SnapOptions, SnapResponse,
};
use rt_sim::{MatchingObserver, SimBuilder, SimConfig, SimObserver, VehicleKind};

use network::build_city;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoConfig {
    ticks:    u64,
    vehicles: usize,
    sim:      SimConfig,
    matching: MatchConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            ticks:    120,
            vehicles: 6,
            sim:      SimConfig::default(),
            matching: MatchConfig::default(),
        }
    }
}

fn load_config() -> Result<DemoConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {path}"))
        }
        None => Ok(DemoConfig::default()),
    }
}

// ── Flaky provider ────────────────────────────────────────────────────────────

/// Answers from the local graph, but times out on every fifth call.
struct FlakyProvider {
    inner: GraphProvider,
    calls: AtomicUsize,
}

impl FlakyProvider {
    fn new(graph: Arc<RoadGraph>) -> Self {
        Self { inner: GraphProvider::new(graph).with_name("flaky-router"), calls: AtomicUsize::new(0) }
    }

    fn trip(&self) -> ProviderResult<()> {
        if (self.calls.fetch_add(1, Ordering::Relaxed) + 1) % 5 == 0 {
            Err(ProviderError::Timeout)
        } else {
            Ok(())
        }
    }
}

impl RoutingProvider for FlakyProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn snap_to_road(&self, point: GeoPoint, opts: &SnapOptions) -> ProviderResult<SnapResponse> {
        self.trip()?;
        self.inner.snap_to_road(point, opts)
    }

    fn match_to_roads(&self, points: &[GeoPoint], opts: &MatchOptions) -> ProviderResult<MatchResponse> {
        self.trip()?;
        self.inner.match_to_roads(points, opts)
    }

    fn service_health(&self) -> BTreeMap<String, bool> {
        self.inner.service_health()
    }
}

// ── Dead-end reporter ─────────────────────────────────────────────────────────

#[derive(Default)]
struct DeadEnds(Vec<(VehicleId, SegmentId)>);

impl SimObserver for DeadEnds {
    fn on_dead_end(&mut self, vehicle: VehicleId, segment: SegmentId) {
        self.0.push((vehicle, segment));
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut cfg = load_config()?;

    println!("=== city: roadtrack demo ===");

    // 1. Road network.
    let (graph, corners) = build_city()?;
    let graph = Arc::new(graph);
    println!("Road graph: {} junctions, {} segments", graph.node_count(), graph.segment_count());

    // 2. Matching controller.  Vehicles are expected around the grid, which
    //    also lets the controller undo swapped lat/lon pairs.
    if cfg.matching.plausible_region.is_none() {
        let bounds = graph.bounds().context("road graph has no extent")?;
        cfg.matching.plausible_region = Some(BoundingBox::new(
            bounds.min_lat - 0.01,
            bounds.min_lon - 0.01,
            bounds.max_lat + 0.01,
            bounds.max_lon + 0.01,
        ));
    }
    let provider = Arc::new(FlakyProvider::new(graph.clone()));
    let controller = Arc::new(MatchController::with_provider(graph.clone(), provider, cfg.matching.clone())?);

    // 3. Fleet: a seeded draw of vehicle class and starting corner.
    let kinds = [VehicleKind::Car, VehicleKind::Van, VehicleKind::Truck, VehicleKind::Motorcycle];
    let mut rng = SimRng::new(cfg.sim.seed);
    let mut builder = SimBuilder::new(graph.clone()).config(cfg.sim.clone());
    for i in 0..cfg.vehicles {
        let corner = graph.node_pos(corners[rng.gen_range(0..corners.len())])?;
        let kind = kinds[rng.gen_range(0..kinds.len())];
        builder = builder.vehicle_near(VehicleId(i as u32), kind, corner);
    }
    let mut sim = builder.build()?;

    // 4. Run.
    let started = Instant::now();
    let mut observers = (MatchingObserver::new(controller.clone()), DeadEnds::default());
    let emitted = sim.run_ticks(cfg.ticks, &mut observers)?;
    let (bridge, dead_ends) = &mut observers;
    if let Some(e) = bridge.take_error() {
        return Err(e).context("matching failed during the run");
    }
    info!("{emitted} positions in {:.1?}", started.elapsed());

    // 5. A fix with latitude and longitude exchanged is corrected, not dropped.
    let probe = VehicleId(cfg.vehicles as u32);
    let corner = graph.node_pos(corners[0])?;
    let accepted = controller.ingest(probe, corner.swapped(), sim.clock().now_ms())?;
    println!(
        "Swapped fix {} -> {} ({:?}, corrected: {})",
        corner.swapped(),
        accepted.point.point,
        accepted.disposition,
        accepted.axis_swapped
    );

    // 6. Report.
    println!();
    println!("Ticks: {}  |  Positions: {emitted}  |  Ingested: {}", cfg.ticks, bridge.ingested());
    for (id, state) in sim.vehicles() {
        let trail = controller.trail(id);
        let segment = graph.segment(state.position.segment())?;
        println!(
            "{id}: {:?} on {} ({}) at {:.0}% | {:.0} km/h | trail {} points, last {}",
            state.kind,
            segment.name,
            segment.class,
            state.position.offset() * 100.0,
            state.speed_kmh,
            trail.len(),
            trail.last().map_or_else(|| "-".to_string(), |p| format!("{} [{:?}]", p.point, p.kind)),
        );
    }
    for (vehicle, segment) in &dead_ends.0 {
        println!("{vehicle} reached a dead end on {segment}");
    }

    let stats = controller.stats();
    println!();
    println!("Controller: {}", serde_json::to_string(&stats)?);
    println!("Health:     {}", serde_json::to_string(&controller.service_health())?);

    Ok(())
}
