//! Unit tests for rt-match.
//!
//! The road network is a single two-way street in Berlin; providers are
//! scripted in-process stand-ins.

#[cfg(test)]
mod helpers {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Mutex};

    use rt_core::{BoundingBox, GeoPoint, SegmentId};
    use rt_graph::{RoadClass, RoadGraph, RoadGraphBuilder};

    use crate::{
        MatchOptions, MatchResponse, ProviderError, ProviderResult, RoutingProvider, SnapOptions,
        SnapResponse,
    };

    /// Two-way "Main St" along lat 52.5 from lon 13.40 to 13.41 (≈ 680 m).
    /// Returns `(graph, eastbound, westbound)`.
    pub fn main_street() -> (Arc<RoadGraph>, SegmentId, SegmentId) {
        let mut b = RoadGraphBuilder::new();
        let w = b.add_node(GeoPoint::new(52.5, 13.40));
        let e = b.add_node(GeoPoint::new(52.5, 13.41));
        let (east, west) = b.add_road(w, e, "Main St", RoadClass::Secondary).unwrap();
        (Arc::new(b.build()), east, west)
    }

    pub fn empty_graph() -> Arc<RoadGraph> {
        Arc::new(RoadGraph::empty())
    }

    /// ≈ 11 m north of Main St: local confidence ≈ 0.78.
    pub fn near_road() -> GeoPoint {
        GeoPoint::new(52.5001, 13.405)
    }

    /// ≈ 44 m north of Main St: local confidence ≈ 0.11.
    pub fn far_from_road() -> GeoPoint {
        GeoPoint::new(52.5004, 13.405)
    }

    pub fn berlin() -> BoundingBox {
        BoundingBox::new(52.0, 13.0, 53.0, 14.0)
    }

    pub fn snap_ok(location: GeoPoint, confidence: f64) -> ProviderResult<SnapResponse> {
        Ok(SnapResponse {
            location,
            heading: None,
            distance_m: 0.0,
            road_name: Some("Main St".into()),
            confidence,
        })
    }

    /// Provider answering every call with a fixed response.
    pub struct Scripted {
        snap: ProviderResult<SnapResponse>,
        path: ProviderResult<MatchResponse>,
        pub snap_calls: AtomicUsize,
        pub path_calls: AtomicUsize,
    }

    impl Scripted {
        pub fn new(
            snap: ProviderResult<SnapResponse>,
            path: ProviderResult<MatchResponse>,
        ) -> Self {
            Self { snap, path, snap_calls: AtomicUsize::new(0), path_calls: AtomicUsize::new(0) }
        }

        pub fn failing() -> Self {
            Self::new(
                Err(ProviderError::Timeout),
                Err(ProviderError::Transport("connection refused".into())),
            )
        }

        pub fn snaps(&self) -> usize {
            self.snap_calls.load(Ordering::SeqCst)
        }

        pub fn paths(&self) -> usize {
            self.path_calls.load(Ordering::SeqCst)
        }
    }

    impl RoutingProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn snap_to_road(&self, _: GeoPoint, _: &SnapOptions) -> ProviderResult<SnapResponse> {
            self.snap_calls.fetch_add(1, Ordering::SeqCst);
            self.snap.clone()
        }

        fn match_to_roads(&self, _: &[GeoPoint], _: &MatchOptions) -> ProviderResult<MatchResponse> {
            self.path_calls.fetch_add(1, Ordering::SeqCst);
            self.path.clone()
        }
    }

    /// Provider whose snap blocks until the test releases it.
    pub struct Gate {
        pub entered: Mutex<mpsc::Sender<()>>,
        pub release: Mutex<mpsc::Receiver<()>>,
        pub calls: AtomicUsize,
    }

    impl RoutingProvider for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        fn snap_to_road(&self, point: GeoPoint, _: &SnapOptions) -> ProviderResult<SnapResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            snap_ok(GeoPoint::new(52.5, point.lon), 0.9)
        }

        fn match_to_roads(&self, _: &[GeoPoint], _: &MatchOptions) -> ProviderResult<MatchResponse> {
            Err(ProviderError::Timeout)
        }
    }

    /// Provider that panics mid-call.
    pub struct Panicking;

    impl RoutingProvider for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn snap_to_road(&self, _: GeoPoint, _: &SnapOptions) -> ProviderResult<SnapResponse> {
            panic!("provider blew up");
        }

        fn match_to_roads(&self, _: &[GeoPoint], _: &MatchOptions) -> ProviderResult<MatchResponse> {
            panic!("provider blew up");
        }
    }
}

// ── Geohash ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod geohash {
    use rt_core::GeoPoint;
    use crate::Geohash;

    #[test]
    fn known_vectors() {
        assert_eq!(Geohash::encode(GeoPoint::new(57.64911, 10.40744), 11).to_string(), "u4pruydqqvj");
        assert_eq!(Geohash::encode(GeoPoint::new(42.6, -5.6), 5).to_string(), "ezs42");
    }

    #[test]
    fn precision_is_clamped() {
        let p = GeoPoint::new(52.5, 13.4);
        assert_eq!(Geohash::encode(p, 0).precision(), 1);
        assert_eq!(Geohash::encode(p, 40).precision(), 12);
    }

    #[test]
    fn cell_contains_point_and_shares_key() {
        let p = GeoPoint::new(52.5163, 13.3777);
        let gh = Geohash::encode(p, 7);
        let cell = gh.bounds();
        assert!(cell.contains(p));

        let centre = GeoPoint::new(
            (cell.min_lat + cell.max_lat) / 2.0,
            (cell.min_lon + cell.max_lon) / 2.0,
        );
        let nudged = GeoPoint::new(centre.lat + 1e-5, centre.lon - 1e-5);
        assert_eq!(Geohash::encode(centre, 7), gh);
        assert_eq!(Geohash::encode(nudged, 7), gh);
    }

    #[test]
    fn same_bits_different_precision_differ() {
        let p = GeoPoint::new(0.0, 0.0);
        assert_ne!(Geohash::encode(p, 5), Geohash::encode(p, 6));
    }
}

// ── SpatialCache ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod cache {
    use rt_core::GeoPoint;
    use crate::SpatialCache;

    const TTL: u64 = 30_000;

    fn query() -> GeoPoint {
        GeoPoint::new(52.5001, 13.405)
    }

    fn matched() -> GeoPoint {
        GeoPoint::new(52.5, 13.405)
    }

    #[test]
    fn hit_just_before_ttl() {
        let c = SpatialCache::new(7, TTL);
        c.put(query(), matched(), Some(90.0), 1_000);
        let hit = c.get(query(), 1_000 + TTL - 1).unwrap();
        assert_eq!(hit.point, matched());
        assert_eq!(hit.heading, Some(90.0));
        assert_eq!(hit.inserted_ms, 1_000);
    }

    #[test]
    fn miss_after_ttl_and_entry_dropped() {
        let c = SpatialCache::new(7, TTL);
        c.put(query(), matched(), None, 1_000);
        assert!(c.get(query(), 1_000 + TTL + 1).is_none());
        assert!(c.is_empty());
    }

    #[test]
    fn miss_in_other_cell() {
        let c = SpatialCache::new(7, TTL);
        c.put(query(), matched(), None, 0);
        assert!(c.get(GeoPoint::new(52.5001, 13.409), 10).is_none());
    }

    #[test]
    fn put_overwrites() {
        let c = SpatialCache::new(7, TTL);
        c.put(query(), matched(), None, 0);
        let newer = GeoPoint::new(52.50005, 13.405);
        c.put(query(), newer, Some(270.0), 500);
        assert_eq!(c.len(), 1);
        let hit = c.get(query(), 600).unwrap();
        assert_eq!(hit.point, newer);
        assert_eq!(hit.inserted_ms, 500);
    }

    #[test]
    fn sweep_drops_only_expired() {
        let c = SpatialCache::new(7, TTL);
        c.put(query(), matched(), None, 0);
        c.put(GeoPoint::new(48.8566, 2.3522), GeoPoint::new(48.8566, 2.3522), None, 20_000);
        assert_eq!(c.sweep(TTL + 1), 1);
        assert_eq!(c.len(), 1);
        assert_eq!(c.sweep(TTL + 1), 0);
    }

    #[test]
    fn clear_empties() {
        let c = SpatialCache::new(7, TTL);
        c.put(query(), matched(), None, 0);
        c.clear();
        assert!(c.is_empty());
    }
}

// ── PendingSet ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod pending {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use rt_core::VehicleId;
    use crate::PendingSet;

    #[test]
    fn second_acquire_refused_until_release() {
        let set = PendingSet::new();
        let v = VehicleId(1);
        let guard = set.try_acquire(v).unwrap();
        assert_eq!(guard.vehicle(), v);
        assert!(set.contains(v));
        assert!(set.try_acquire(v).is_none());
        drop(guard);
        assert!(!set.contains(v));
        assert!(set.try_acquire(v).is_some());
    }

    #[test]
    fn vehicles_are_independent() {
        let set = PendingSet::new();
        let _a = set.try_acquire(VehicleId(1)).unwrap();
        let _b = set.try_acquire(VehicleId(2)).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn released_when_holder_panics() {
        let set = PendingSet::new();
        let v = VehicleId(7);
        let r = catch_unwind(AssertUnwindSafe(|| {
            let _guard = set.try_acquire(v).unwrap();
            panic!("match failed hard");
        }));
        assert!(r.is_err());
        assert!(set.is_empty());
        assert!(set.try_acquire(v).is_some());
    }
}

// ── Trail ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod trail {
    use rt_core::{GeoPoint, VehicleId};
    use crate::{PointKind, Trail, TrailPoint, TrailStore};

    fn at(ts: u64) -> TrailPoint {
        TrailPoint {
            point: GeoPoint::new(52.5, 13.4 + ts as f64 * 1e-5),
            heading: None,
            timestamp_ms: ts,
            kind: PointKind::Raw,
        }
    }

    fn stamps(t: &Trail) -> Vec<u64> {
        t.iter().map(|p| p.timestamp_ms).collect()
    }

    #[test]
    fn capped_oldest_dropped() {
        let mut t = Trail::new(3);
        for ts in 1..=5 {
            t.push(at(ts));
        }
        assert_eq!(t.len(), 3);
        assert_eq!(stamps(&t), vec![3, 4, 5]);
        assert_eq!(t.last().unwrap().timestamp_ms, 5);
    }

    #[test]
    fn late_point_inserted_in_order() {
        let mut t = Trail::new(10);
        t.push(at(10));
        t.push(at(30));
        t.push(at(20));
        assert_eq!(stamps(&t), vec![10, 20, 30]);
    }

    #[test]
    fn late_point_older_than_window_is_evicted() {
        let mut t = Trail::new(2);
        t.push(at(10));
        t.push(at(20));
        t.push(at(5));
        assert_eq!(stamps(&t), vec![10, 20]);
    }

    #[test]
    fn zero_cap_raised_to_one() {
        assert_eq!(Trail::new(0).cap(), 1);
    }

    #[test]
    fn store_per_vehicle() {
        let store = TrailStore::new(4);
        store.push(VehicleId(1), at(1));
        store.push(VehicleId(2), at(2));
        store.push(VehicleId(1), at(3));
        assert_eq!(store.vehicle_count(), 2);
        assert_eq!(store.trail(VehicleId(1)).len(), 2);
        assert_eq!(store.last(VehicleId(2)).unwrap().timestamp_ms, 2);
        assert!(store.trail(VehicleId(9)).is_empty());
        assert!(store.remove(VehicleId(1)).is_some());
        assert!(store.last(VehicleId(1)).is_none());
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod config {
    use rt_core::BoundingBox;
    use crate::tests::helpers::main_street;
    use crate::{MatchConfig, MatchController, MatchError};

    #[test]
    fn default_is_valid() {
        MatchConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            MatchConfig { geohash_precision: 0, ..Default::default() },
            MatchConfig { geohash_precision: 13, ..Default::default() },
            MatchConfig { min_snap_confidence: 1.5, ..Default::default() },
            MatchConfig { min_path_confidence: f64::NAN, ..Default::default() },
            MatchConfig { snap_radius_m: 0.0, ..Default::default() },
            MatchConfig { max_trail_len: 0, ..Default::default() },
            MatchConfig { cache_ttl_ms: 0, ..Default::default() },
            MatchConfig { cache_sweep_interval_ms: 10_000, ..Default::default() },
            MatchConfig {
                plausible_region: Some(BoundingBox::new(53.0, 13.0, 52.0, 14.0)),
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(MatchError::Config(_))), "{cfg:?}");
        }
    }

    #[test]
    fn controller_refuses_invalid_config() {
        let (g, _, _) = main_street();
        let cfg = MatchConfig { snap_radius_m: -1.0, ..Default::default() };
        assert!(matches!(MatchController::new(g, cfg), Err(MatchError::Config(_))));
    }
}

// ── MapMatcher ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod matcher {
    use std::sync::Arc;

    use rt_core::{angular_difference, GeoPoint};
    use crate::tests::helpers::*;
    use crate::{
        local_confidence, MapMatcher, MatchConfig, MatchError, MatchOutcome, MatchResponse,
        MatchSource, ProviderError,
    };

    fn local(g: Arc<rt_graph::RoadGraph>) -> MapMatcher {
        MapMatcher::new(g, &MatchConfig::default())
    }

    fn matched(o: MatchOutcome) -> crate::MatchedPoint {
        match o {
            MatchOutcome::Matched(m) => m,
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn confidence_curve() {
        assert_eq!(local_confidence(0.0, 50.0), 1.0);
        assert!((local_confidence(25.0, 50.0) - 0.5).abs() < 1e-12);
        assert_eq!(local_confidence(60.0, 50.0), 0.0);
        assert_eq!(local_confidence(f64::NAN, 50.0), 0.0);
        assert_eq!(local_confidence(1.0, 0.0), 0.0);
    }

    #[test]
    fn local_match_near_road() {
        let (g, east, _) = main_street();
        let m = matched(local(g).match_point(near_road(), None).unwrap());
        assert_eq!(m.source, MatchSource::LocalGraph);
        assert_eq!(m.segment, Some(east));
        assert!((m.point.lat - 52.5).abs() < 1e-6);
        assert!((m.point.lon - 13.405).abs() < 1e-6);
        assert!(m.confidence > 0.7 && m.confidence < 0.8, "{}", m.confidence);
    }

    #[test]
    fn far_point_is_unmatched() {
        let (g, _, _) = main_street();
        match local(g).match_point(far_from_road(), None).unwrap() {
            MatchOutcome::Unmatched { best_confidence } => {
                assert!(best_confidence > 0.0 && best_confidence < 0.3);
            }
            other => panic!("expected unmatched, got {other:?}"),
        }
    }

    #[test]
    fn empty_graph_is_no_road_data() {
        let m = local(empty_graph());
        assert_eq!(m.match_point(near_road(), None), Err(MatchError::NoRoadData));
    }

    #[test]
    fn invalid_input_rejected() {
        let (g, _, _) = main_street();
        let m = local(g);
        assert!(matches!(
            m.match_point(GeoPoint::new(f64::NAN, 13.4), None),
            Err(MatchError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            m.match_pair(near_road(), GeoPoint::new(91.0, 13.4), None),
            Err(MatchError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn remote_snap_accepted_above_threshold() {
        let (g, _, _) = main_street();
        let p = Arc::new(Scripted::new(snap_ok(GeoPoint::new(52.5, 13.405), 0.9), Err(ProviderError::Timeout)));
        let m = local(g).with_provider(p.clone());
        let out = matched(m.match_point(near_road(), None).unwrap());
        assert_eq!(out.source, MatchSource::RemoteSnap);
        assert_eq!(out.point, GeoPoint::new(52.5, 13.405));
        // Heading borrowed from the local graph when the provider omits it.
        assert!(angular_difference(out.heading.unwrap(), 90.0) < 1.0);
        assert_eq!(p.snaps(), 1);
    }

    #[test]
    fn remote_at_threshold_is_not_accepted() {
        let (g, _, _) = main_street();
        let p = Arc::new(Scripted::new(snap_ok(GeoPoint::new(52.5, 13.405), 0.3), Err(ProviderError::Timeout)));
        let m = local(g).with_provider(p);
        assert_eq!(
            m.match_point(far_from_road(), None).unwrap(),
            MatchOutcome::Unmatched { best_confidence: 0.3 }
        );
    }

    #[test]
    fn low_remote_falls_back_to_local() {
        let (g, _, _) = main_street();
        let p = Arc::new(Scripted::new(snap_ok(GeoPoint::new(52.5, 13.405), 0.1), Err(ProviderError::Timeout)));
        let out = matched(local(g).with_provider(p).match_point(near_road(), None).unwrap());
        assert_eq!(out.source, MatchSource::LocalGraph);
    }

    #[test]
    fn provider_error_falls_back_to_local() {
        let (g, _, _) = main_street();
        let p = Arc::new(Scripted::failing());
        let m = local(g).with_provider(p.clone());
        let out = matched(m.match_point(near_road(), None).unwrap());
        assert_eq!(out.source, MatchSource::LocalGraph);
        assert_eq!(p.snaps(), 1);
    }

    #[test]
    fn empty_graph_with_weak_remote_is_no_road_data() {
        let p = Arc::new(Scripted::new(snap_ok(near_road(), 0.2), Err(ProviderError::Timeout)));
        let m = local(empty_graph()).with_provider(p);
        assert_eq!(m.match_point(near_road(), None), Err(MatchError::NoRoadData));
    }

    #[test]
    fn remote_path_accepted() {
        let (g, _, _) = main_street();
        let path = MatchResponse {
            matched: vec![GeoPoint::new(52.5, 13.404), GeoPoint::new(52.5, 13.405)],
            confidence: 0.8,
        };
        let p = Arc::new(Scripted::new(Err(ProviderError::Timeout), Ok(path)));
        let m = local(g).with_provider(p.clone());
        let out = matched(m.match_pair(GeoPoint::new(52.5001, 13.404), near_road(), None).unwrap());
        assert_eq!(out.source, MatchSource::RemotePath);
        assert_eq!(out.point, GeoPoint::new(52.5, 13.405));
        assert!(angular_difference(out.heading.unwrap(), 90.0) < 1.0);
        assert_eq!((p.paths(), p.snaps()), (1, 0));
    }

    #[test]
    fn path_at_threshold_falls_back_to_snap_then_local() {
        let (g, _, _) = main_street();
        let path = MatchResponse {
            matched: vec![GeoPoint::new(52.5, 13.404), GeoPoint::new(52.5, 13.405)],
            confidence: 0.6,
        };
        let p = Arc::new(Scripted::new(Err(ProviderError::Timeout), Ok(path)));
        let m = local(g).with_provider(p.clone());
        let out = matched(m.match_pair(GeoPoint::new(52.5001, 13.404), near_road(), None).unwrap());
        assert_eq!(out.source, MatchSource::LocalGraph);
        assert_eq!((p.paths(), p.snaps()), (1, 1));
    }

    #[test]
    fn path_ending_off_the_globe_falls_back_to_snap() {
        let (g, _, _) = main_street();
        let path = MatchResponse {
            matched: vec![GeoPoint::new(52.5, 13.404), GeoPoint::new(152.5, 13.405)],
            confidence: 0.9,
        };
        let p = Arc::new(Scripted::new(snap_ok(GeoPoint::new(52.5, 13.405), 0.9), Ok(path)));
        let m = local(g).with_provider(p.clone());
        let out = matched(m.match_pair(GeoPoint::new(52.5001, 13.404), near_road(), None).unwrap());
        assert_eq!(out.source, MatchSource::RemoteSnap);
        assert_eq!(out.point, GeoPoint::new(52.5, 13.405));
        assert_eq!((p.paths(), p.snaps()), (1, 1));
    }

    #[test]
    fn travel_direction_picks_carriageway() {
        let (g, east, west) = main_street();
        let m = local(g);

        let eastbound = matched(m.match_pair(GeoPoint::new(52.5001, 13.404), near_road(), None).unwrap());
        assert_eq!(eastbound.segment, Some(east));

        let westbound = matched(m.match_pair(GeoPoint::new(52.5001, 13.406), near_road(), None).unwrap());
        assert_eq!(westbound.segment, Some(west));
        assert!(angular_difference(westbound.heading.unwrap(), 270.0) < 1.0);
    }

    #[test]
    fn health_includes_local_graph() {
        let (g, _, _) = main_street();
        let m = local(g).with_provider(Arc::new(Scripted::failing()));
        let h = m.service_health();
        assert_eq!(h.get("local-graph"), Some(&true));
        assert_eq!(h.get("scripted"), Some(&true));

        assert_eq!(local(empty_graph()).service_health().get("local-graph"), Some(&false));
    }
}

// ── GraphProvider ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod graph_provider {
    use rt_core::GeoPoint;
    use crate::tests::helpers::*;
    use crate::{GraphProvider, MatchOptions, ProviderError, RoutingProvider, SnapOptions};

    const SNAP: SnapOptions = SnapOptions { radius_m: 50.0 };

    fn path_opts() -> MatchOptions {
        MatchOptions { radius_m: 50.0, geometries: Default::default() }
    }

    #[test]
    fn snap_within_radius() {
        let (g, _, _) = main_street();
        let r = GraphProvider::new(g).snap_to_road(near_road(), &SNAP).unwrap();
        assert!(r.confidence > 0.7);
        assert_eq!(r.road_name.as_deref(), Some("Main St"));
        assert!(r.distance_m > 10.0 && r.distance_m < 12.5);
    }

    #[test]
    fn snap_outside_radius_has_zero_confidence() {
        let (g, _, _) = main_street();
        let r = GraphProvider::new(g)
            .snap_to_road(GeoPoint::new(52.51, 13.405), &SNAP)
            .unwrap();
        assert_eq!(r.confidence, 0.0);
        assert!(r.road_name.is_none());
    }

    #[test]
    fn path_needs_two_points() {
        let (g, _, _) = main_street();
        let p = GraphProvider::new(g);
        assert!(matches!(
            p.match_to_roads(&[near_road()], &path_opts()),
            Err(ProviderError::InvalidRequest(_))
        ));
    }

    #[test]
    fn path_confidence_is_weakest_point() {
        let (g, _, _) = main_street();
        let p = GraphProvider::new(g);
        let r = p
            .match_to_roads(&[GeoPoint::new(52.5, 13.404), far_from_road()], &path_opts())
            .unwrap();
        assert_eq!(r.matched.len(), 2);
        assert!(r.confidence < 0.3);
    }

    #[test]
    fn named_health() {
        let p = GraphProvider::new(empty_graph()).with_name("osrm-local");
        assert_eq!(p.name(), "osrm-local");
        assert_eq!(p.service_health().get("osrm-local"), Some(&false));
    }
}

// ── MatchController ───────────────────────────────────────────────────────────

#[cfg(test)]
mod controller {
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Barrier, Mutex};
    use std::thread;

    use rt_core::{GeoPoint, VehicleId};
    use crate::tests::helpers::*;
    use crate::{
        Disposition, MatchConfig, MatchController, MatchError, MatchSource, PointKind,
    };

    const V: VehicleId = VehicleId(1);

    fn local_controller(cfg: MatchConfig) -> MatchController {
        let (g, _, _) = main_street();
        MatchController::new(g, cfg).unwrap()
    }

    #[test]
    fn first_fix_matched_locally() {
        let c = local_controller(MatchConfig::default());
        let a = c.ingest(V, near_road(), 0).unwrap();
        assert_eq!(a.disposition, Disposition::Matched(MatchSource::LocalGraph));
        assert_eq!(a.point.kind, PointKind::Matched);
        assert!((a.point.point.lat - 52.5).abs() < 1e-6);
        assert!(!a.axis_swapped);
        assert_eq!(c.last_snap_ms(V), Some(0));
        assert_eq!(c.trail(V), vec![a.point]);
        assert!(!c.is_in_flight(V));
    }

    #[test]
    fn cached_inside_window() {
        let c = local_controller(MatchConfig::default());
        let first = c.ingest(V, near_road(), 0).unwrap();
        let again = c.ingest(V, near_road(), 1_000).unwrap();
        assert_eq!(again.disposition, Disposition::Cached);
        assert_eq!(again.point.kind, PointKind::Cached);
        assert_eq!(again.point.point, first.point.point);
        assert_eq!(again.point.timestamp_ms, 1_000);
        // Reusing the cache does not restart the window.
        assert_eq!(c.last_snap_ms(V), Some(0));
    }

    #[test]
    fn raw_kept_inside_window_without_cache_hit() {
        let c = local_controller(MatchConfig::default());
        c.ingest(V, near_road(), 0).unwrap();
        let elsewhere = GeoPoint::new(52.5001, 13.409);
        let a = c.ingest(V, elsewhere, 1_000).unwrap();
        assert_eq!(a.disposition, Disposition::Throttled);
        assert_eq!(a.point.kind, PointKind::Raw);
        assert_eq!(a.point.point, elsewhere);
    }

    #[test]
    fn window_boundary_rematches() {
        let c = local_controller(MatchConfig::default());
        c.ingest(V, near_road(), 0).unwrap();
        let a = c.ingest(V, GeoPoint::new(52.5001, 13.406), 3_000).unwrap();
        assert!(matches!(a.disposition, Disposition::Matched(_)));
        assert_eq!(c.last_snap_ms(V), Some(3_000));
    }

    #[test]
    fn unmatched_keeps_raw_and_does_not_throttle() {
        let c = local_controller(MatchConfig::default());
        let a = c.ingest(V, far_from_road(), 0).unwrap();
        assert_eq!(a.disposition, Disposition::Unmatched);
        assert_eq!(a.point.point, far_from_road());
        assert_eq!(c.last_snap_ms(V), None);

        let b = c.ingest(V, far_from_road(), 500).unwrap();
        assert_eq!(b.disposition, Disposition::Unmatched);
        assert_eq!(c.trail(V).len(), 2);
    }

    #[test]
    fn no_road_data_keeps_raw() {
        let c = MatchController::new(empty_graph(), MatchConfig::default()).unwrap();
        let a = c.ingest(V, near_road(), 0).unwrap();
        assert_eq!(a.disposition, Disposition::NoRoadData);
        assert_eq!(a.point.kind, PointKind::Raw);
        assert!(!c.is_in_flight(V));
    }

    #[test]
    fn invalid_fix_dropped() {
        let c = local_controller(MatchConfig::default());
        assert!(matches!(
            c.ingest(V, GeoPoint::new(f64::NAN, 13.4), 0),
            Err(MatchError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            c.ingest(V, GeoPoint::new(95.0, 13.4), 0),
            Err(MatchError::InvalidCoordinates { .. })
        ));
        assert!(c.trail(V).is_empty());
        assert_eq!(c.stats().rejected, 2);
    }

    #[test]
    fn swapped_axes_corrected_and_flagged() {
        let cfg = MatchConfig { plausible_region: Some(berlin()), ..Default::default() };
        let c = local_controller(cfg);
        let swapped = near_road().swapped();
        let a = c.ingest(V, swapped, 0).unwrap();
        assert!(a.axis_swapped);
        assert_eq!(a.disposition, Disposition::Matched(MatchSource::LocalGraph));
        assert!(berlin().contains(a.point.point));
        assert_eq!(c.stats().axis_swaps, 1);
    }

    #[test]
    fn swap_with_out_of_range_latitude() {
        let cfg = MatchConfig { plausible_region: Some(berlin()), ..Default::default() };
        let c = local_controller(cfg);
        // Swapped reading of a point in a region whose longitude exceeds 90°.
        let c2 = {
            let (g, _, _) = main_street();
            let region = rt_core::BoundingBox::new(-40.0, 170.0, -30.0, 180.0);
            MatchController::new(g, MatchConfig { plausible_region: Some(region), ..Default::default() })
                .unwrap()
        };
        let a = c2.ingest(V, GeoPoint::new(174.7, -36.8), 0).unwrap();
        assert!(a.axis_swapped);
        assert_eq!(a.point.point, GeoPoint::new(-36.8, 174.7));

        // Already plausible: left alone.
        let b = c.ingest(V, near_road(), 0).unwrap();
        assert!(!b.axis_swapped);
    }

    #[test]
    fn provider_failure_falls_back_and_releases() {
        let (g, _, _) = main_street();
        let p = Arc::new(Scripted::failing());
        let c = MatchController::with_provider(g, p.clone(), MatchConfig::default()).unwrap();

        let a = c.ingest(V, near_road(), 0).unwrap();
        assert_eq!(a.disposition, Disposition::Matched(MatchSource::LocalGraph));
        assert!(!c.is_in_flight(V));
        assert_eq!((p.paths(), p.snaps()), (0, 1));

        // Second match has a previous point: path first, then snap.
        c.ingest(V, GeoPoint::new(52.5001, 13.406), 5_000).unwrap();
        assert_eq!((p.paths(), p.snaps()), (1, 2));
    }

    #[test]
    fn remote_disabled_never_calls_provider() {
        let (g, _, _) = main_street();
        let p = Arc::new(Scripted::failing());
        let cfg = MatchConfig { use_remote: false, ..Default::default() };
        let c = MatchController::with_provider(g, p.clone(), cfg).unwrap();
        c.ingest(V, near_road(), 0).unwrap();
        assert_eq!((p.paths(), p.snaps()), (0, 0));
        assert!(!c.matcher().has_provider());
    }

    #[test]
    fn released_after_provider_panic() {
        let (g, _, _) = main_street();
        let c = MatchController::with_provider(g, Arc::new(Panicking), MatchConfig::default()).unwrap();
        let r = catch_unwind(AssertUnwindSafe(|| c.ingest(V, near_road(), 0)));
        assert!(r.is_err());
        assert!(!c.is_in_flight(V));
    }

    #[test]
    fn one_match_in_flight_per_vehicle() {
        let (g, _, _) = main_street();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Arc::new(Gate {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
            calls: AtomicUsize::new(0),
        });
        let c = MatchController::with_provider(g, gate.clone(), MatchConfig::default()).unwrap();

        thread::scope(|s| {
            let first = s.spawn(|| c.ingest(V, near_road(), 0));

            entered_rx.recv().unwrap();
            assert!(c.is_in_flight(V));

            let racing = c.ingest(V, GeoPoint::new(52.5001, 13.4051), 10).unwrap();
            assert_eq!(racing.disposition, Disposition::InFlight);
            assert_eq!(racing.point.kind, PointKind::Raw);

            release_tx.send(()).unwrap();
            let done = first.join().unwrap().unwrap();
            assert_eq!(done.disposition, Disposition::Matched(MatchSource::RemoteSnap));
        });

        assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
        assert!(!c.is_in_flight(V));
        assert_eq!(c.stats().in_flight, 1);
        // Both fixes recorded, in timestamp order.
        let ts: Vec<u64> = c.trail(V).iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(ts, vec![0, 10]);
    }

    #[test]
    fn fix_queued_behind_a_match_lands_in_its_window() {
        let (g, _, _) = main_street();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Arc::new(Gate {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
            calls: AtomicUsize::new(0),
        });
        let c = MatchController::with_provider(g, gate.clone(), MatchConfig::default()).unwrap();

        thread::scope(|s| {
            let first = s.spawn(|| c.ingest(V, near_road(), 0));
            entered_rx.recv().unwrap();
            release_tx.send(()).unwrap();
            first.join().unwrap().unwrap();
        });

        // Same instant as the landed match: no second provider call.
        let late = c.ingest(V, near_road(), 0).unwrap();
        assert_eq!(late.disposition, Disposition::Cached);
        let elsewhere = c.ingest(V, GeoPoint::new(52.5001, 13.409), 0).unwrap();
        assert_eq!(elsewhere.disposition, Disposition::Throttled);
        assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.last_snap_ms(V), Some(0));
    }

    #[test]
    fn racing_fixes_yield_one_match_per_window() {
        const RACERS: usize = 8;
        for _ in 0..50 {
            let c = local_controller(MatchConfig::default());
            let start = Barrier::new(RACERS);
            let results: Vec<Disposition> = thread::scope(|s| {
                let handles: Vec<_> = (0..RACERS)
                    .map(|_| {
                        s.spawn(|| {
                            start.wait();
                            c.ingest(V, near_road(), 0).unwrap().disposition
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let matched = results.iter().filter(|d| matches!(d, Disposition::Matched(_))).count();
            assert_eq!(matched, 1, "{results:?}");
            assert!(results.iter().all(|d| matches!(
                d,
                Disposition::Matched(_) | Disposition::Cached | Disposition::InFlight
            )));
            assert_eq!(c.stats().matched, 1);
            assert!(!c.is_in_flight(V));
        }
    }

    #[test]
    fn trail_capped() {
        let cfg = MatchConfig { max_trail_len: 3, throttle_window_ms: 1, ..Default::default() };
        let c = local_controller(cfg);
        for i in 0..6u64 {
            c.ingest(V, GeoPoint::new(52.5001, 13.401 + i as f64 * 0.001), i * 1_000).unwrap();
        }
        let t = c.trail(V);
        assert_eq!(t.len(), 3);
        assert_eq!(t[0].timestamp_ms, 3_000);
    }

    #[test]
    fn sweep_and_remove() {
        let c = local_controller(MatchConfig::default());
        c.ingest(V, near_road(), 0).unwrap();
        assert_eq!(c.cache().len(), 1);
        assert_eq!(c.sweep_cache(30_000), 1);

        c.remove_vehicle(V);
        assert!(c.trail(V).is_empty());
        assert_eq!(c.last_snap_ms(V), None);
    }

    #[test]
    fn batch_preserves_order() {
        let c = local_controller(MatchConfig::default());
        let fixes = [
            (VehicleId(1), near_road()),
            (VehicleId(2), far_from_road()),
            (VehicleId(3), GeoPoint::new(f64::INFINITY, 0.0)),
        ];
        let out = c.ingest_batch(&fixes, 0);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap().vehicle, VehicleId(1));
        assert!(matches!(out[0].as_ref().unwrap().disposition, Disposition::Matched(_)));
        assert_eq!(out[1].as_ref().unwrap().disposition, Disposition::Unmatched);
        assert!(out[2].is_err());
    }

    #[test]
    fn stats_count_dispositions() {
        let c = local_controller(MatchConfig::default());
        c.ingest(V, near_road(), 0).unwrap();                           // matched
        c.ingest(V, near_road(), 100).unwrap();                         // cached
        c.ingest(V, GeoPoint::new(52.5001, 13.409), 200).unwrap();      // throttled
        c.ingest(VehicleId(2), far_from_road(), 0).unwrap();            // unmatched
        let s = c.stats();
        assert_eq!((s.matched, s.cached, s.throttled, s.unmatched), (1, 1, 1, 1));
        assert_eq!((s.in_flight, s.no_road_data, s.rejected), (0, 0, 0));
    }

    #[test]
    fn health_reports_local_graph() {
        let c = local_controller(MatchConfig::default());
        assert_eq!(c.service_health().get("local-graph"), Some(&true));
    }
}
