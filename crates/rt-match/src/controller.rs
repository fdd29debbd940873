//! Throttling, caching, and fallback control around the matcher.
//!
//! Per vehicle the controller is a two-state machine, `Idle ⇄ MatchInFlight`,
//! whose in-flight state is the vehicle's entry in the [`PendingSet`].
//! Each raw fix is handled as follows:
//!
//! ```text
//! validate ─> axis-swap correction ─┬─ in flight ──────────────> raw      (InFlight)
//!                                   ├─ in window, cache hit ───> cached   (Cached)
//!                                   ├─ in window, cache miss ──> raw      (Throttled)
//!                                   └─ window elapsed ─> acquire ─> match_pair / match_point
//!                                          ├─ accepted ─> cache + last-snap + matched (Matched)
//!                                          └─ rejected ─> raw  (Unmatched / NoRoadData)
//! ```
//!
//! Every accepted fix, whatever its kind, is appended to the vehicle's trail.
//! Only a genuinely accepted match refreshes the throttle timestamp.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use rt_core::{GeoPoint, VehicleId};
use rt_graph::RoadGraph;

use crate::sync::{lock, VehicleMap};
use crate::{
    MapMatcher, MatchConfig, MatchError, MatchOutcome, MatchResult, MatchSource, PendingSet,
    PointKind, RoutingProvider, SpatialCache, TrailPoint, TrailStore,
};

/// What the controller did with a fix.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Disposition {
    /// A fresh match was adopted.
    Matched(MatchSource),
    /// A cached match was reused inside the throttle window.
    Cached,
    /// Inside the throttle window with no cached match; raw kept.
    Throttled,
    /// Another match for this vehicle was in flight; raw kept.
    InFlight,
    /// Matching ran but nothing cleared the confidence gate; raw kept.
    Unmatched,
    /// No road data to match against; raw kept.
    NoRoadData,
}

/// The fix as appended to the trail.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Accepted {
    pub vehicle: VehicleId,
    pub point: TrailPoint,
    pub disposition: Disposition,
    /// The input had latitude and longitude exchanged and was corrected.
    pub axis_swapped: bool,
}

/// Snapshot of the controller's counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerStats {
    pub matched: u64,
    pub cached: u64,
    pub throttled: u64,
    pub in_flight: u64,
    pub unmatched: u64,
    pub no_road_data: u64,
    pub rejected: u64,
    pub axis_swaps: u64,
}

#[derive(Default)]
struct Counters {
    matched: AtomicU64,
    cached: AtomicU64,
    throttled: AtomicU64,
    in_flight: AtomicU64,
    unmatched: AtomicU64,
    no_road_data: AtomicU64,
    rejected: AtomicU64,
    axis_swaps: AtomicU64,
}

impl Counters {
    fn record(&self, d: Disposition) {
        let c = match d {
            Disposition::Matched(_) => &self.matched,
            Disposition::Cached     => &self.cached,
            Disposition::Throttled  => &self.throttled,
            Disposition::InFlight   => &self.in_flight,
            Disposition::Unmatched  => &self.unmatched,
            Disposition::NoRoadData => &self.no_road_data,
        };
        c.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ControllerStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ControllerStats {
            matched:      get(&self.matched),
            cached:       get(&self.cached),
            throttled:    get(&self.throttled),
            in_flight:    get(&self.in_flight),
            unmatched:    get(&self.unmatched),
            no_road_data: get(&self.no_road_data),
            rejected:     get(&self.rejected),
            axis_swaps:   get(&self.axis_swaps),
        }
    }
}

/// Owns all shared matching state: cache, pending set, throttle timestamps,
/// and trails.
///
/// `MatchController` is `Send + Sync`; share it with `Arc` and call
/// [`ingest`](Self::ingest) from any thread.  Distinct vehicles match
/// concurrently; a vehicle never has two matches in flight.
pub struct MatchController {
    config: MatchConfig,
    matcher: MapMatcher,
    cache: SpatialCache,
    pending: PendingSet,
    last_snap: Mutex<VehicleMap<u64>>,
    trails: TrailStore,
    counters: Counters,
}

impl MatchController {
    /// A controller matching against `graph` only.
    pub fn new(graph: Arc<RoadGraph>, config: MatchConfig) -> MatchResult<Self> {
        config.validate()?;
        let matcher = MapMatcher::new(graph, &config);
        Ok(Self::assemble(config, matcher))
    }

    /// A controller that consults `provider` first (when
    /// `config.use_remote`) and falls back to `graph`.
    pub fn with_provider(
        graph:    Arc<RoadGraph>,
        provider: Arc<dyn RoutingProvider>,
        config:   MatchConfig,
    ) -> MatchResult<Self> {
        config.validate()?;
        let mut matcher = MapMatcher::new(graph, &config);
        if config.use_remote {
            matcher = matcher.with_provider(provider);
        }
        Ok(Self::assemble(config, matcher))
    }

    fn assemble(config: MatchConfig, matcher: MapMatcher) -> Self {
        Self {
            cache: SpatialCache::new(config.geohash_precision, config.cache_ttl_ms),
            trails: TrailStore::new(config.max_trail_len),
            pending: PendingSet::new(),
            last_snap: Mutex::new(VehicleMap::default()),
            counters: Counters::default(),
            matcher,
            config,
        }
    }

    // ── Ingest ────────────────────────────────────────────────────────────

    /// Handle one raw fix for `vehicle` observed at `now_ms`.
    ///
    /// Fails only with [`MatchError::InvalidCoordinates`] (the fix is
    /// dropped) or on a graph inconsistency.  Provider failures and
    /// low-confidence matches fall back to the raw coordinate.
    pub fn ingest(&self, vehicle: VehicleId, raw: GeoPoint, now_ms: u64) -> MatchResult<Accepted> {
        let (point, axis_swapped) = match self.normalize(vehicle, raw) {
            Ok(v) => v,
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };
        if axis_swapped {
            self.counters.axis_swaps.fetch_add(1, Ordering::Relaxed);
        }

        // `last_snap` is only written under the marker, so the window is
        // read under it too.
        let Some(_guard) = self.pending.try_acquire(vehicle) else {
            return Ok(self.accept_raw(vehicle, point, now_ms, Disposition::InFlight, axis_swapped));
        };

        if self.within_throttle_window(vehicle, now_ms) {
            if let Some(hit) = self.cache.get(point, now_ms) {
                let p = TrailPoint {
                    point: hit.point,
                    heading: hit.heading,
                    timestamp_ms: now_ms,
                    kind: PointKind::Cached,
                };
                return Ok(self.accept(vehicle, p, Disposition::Cached, axis_swapped));
            }
            return Ok(self.accept_raw(vehicle, point, now_ms, Disposition::Throttled, axis_swapped));
        }

        let previous = self.trails.last(vehicle);
        let hint = previous.and_then(|p| p.heading);
        let outcome = match previous {
            Some(prev) => self.matcher.match_pair(prev.point, point, hint),
            None => self.matcher.match_point(point, hint),
        };

        match outcome {
            Ok(MatchOutcome::Matched(m)) => {
                self.cache.put(point, m.point, m.heading, now_ms);
                lock(&self.last_snap).insert(vehicle, now_ms);
                debug!(
                    "{vehicle}: matched {point} -> {} ({:?}, confidence {:.2})",
                    m.point, m.source, m.confidence
                );
                let p = TrailPoint {
                    point: m.point,
                    heading: m.heading,
                    timestamp_ms: now_ms,
                    kind: PointKind::Matched,
                };
                Ok(self.accept(vehicle, p, Disposition::Matched(m.source), axis_swapped))
            }
            Ok(MatchOutcome::Unmatched { best_confidence }) => {
                debug!("{vehicle}: no match above threshold (best {best_confidence:.2}), keeping raw");
                Ok(self.accept_raw(vehicle, point, now_ms, Disposition::Unmatched, axis_swapped))
            }
            Err(MatchError::NoRoadData) => {
                debug!("{vehicle}: no road data, keeping raw");
                Ok(self.accept_raw(vehicle, point, now_ms, Disposition::NoRoadData, axis_swapped))
            }
            Err(e) => Err(e),
        }
    }

    /// Ingest one fix per vehicle observed at the same instant.  Results are
    /// returned in input order.  With the `parallel` feature the fixes are
    /// processed concurrently; a vehicle listed twice is then handled as two
    /// racing fixes.  The second sees the first in flight, or, once that
    /// match has landed, falls inside its throttle window.
    pub fn ingest_batch(
        &self,
        fixes:  &[(VehicleId, GeoPoint)],
        now_ms: u64,
    ) -> Vec<MatchResult<Accepted>> {
        #[cfg(not(feature = "parallel"))]
        {
            fixes.iter().map(|&(v, p)| self.ingest(v, p, now_ms)).collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            fixes.par_iter().map(|&(v, p)| self.ingest(v, p, now_ms)).collect()
        }
    }

    // ── Maintenance & accessors ───────────────────────────────────────────

    /// Drop expired cache entries.  Run every `cache_sweep_interval_ms`.
    pub fn sweep_cache(&self, now_ms: u64) -> usize {
        let dropped = self.cache.sweep(now_ms);
        if dropped > 0 {
            debug!("cache sweep dropped {dropped} expired entries");
        }
        dropped
    }

    /// The vehicle's trail, oldest first.
    pub fn trail(&self, vehicle: VehicleId) -> Vec<TrailPoint> {
        self.trails.trail(vehicle)
    }

    /// Forget a vehicle's trail and throttle state.
    pub fn remove_vehicle(&self, vehicle: VehicleId) {
        self.trails.remove(vehicle);
        lock(&self.last_snap).remove(&vehicle);
    }

    pub fn is_in_flight(&self, vehicle: VehicleId) -> bool {
        self.pending.contains(vehicle)
    }

    /// When the vehicle's last match was accepted.
    pub fn last_snap_ms(&self, vehicle: VehicleId) -> Option<u64> {
        lock(&self.last_snap).get(&vehicle).copied()
    }

    pub fn service_health(&self) -> BTreeMap<String, bool> {
        self.matcher.service_health()
    }

    pub fn stats(&self) -> ControllerStats {
        self.counters.snapshot()
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn cache(&self) -> &SpatialCache {
        &self.cache
    }

    pub fn matcher(&self) -> &MapMatcher {
        &self.matcher
    }

    // ── Internals ─────────────────────────────────────────────────────────

    /// Reject non-finite or out-of-range fixes, correcting an exchanged
    /// lat/lon pair when only the exchanged reading is plausible.
    fn normalize(&self, vehicle: VehicleId, raw: GeoPoint) -> MatchResult<(GeoPoint, bool)> {
        if !(raw.lat.is_finite() && raw.lon.is_finite()) {
            return Err(MatchError::InvalidCoordinates { lat: raw.lat, lon: raw.lon });
        }

        if let Some(region) = self.config.plausible_region {
            let as_given = raw.is_valid() && region.contains(raw);
            let swapped = raw.swapped();
            if !as_given && swapped.is_valid() && region.contains(swapped) {
                warn!("{vehicle}: latitude/longitude swapped in {raw}, using {swapped}");
                return Ok((swapped, true));
            }
        }

        Ok((raw.checked()?, false))
    }

    fn within_throttle_window(&self, vehicle: VehicleId, now_ms: u64) -> bool {
        lock(&self.last_snap)
            .get(&vehicle)
            .is_some_and(|&last| now_ms.saturating_sub(last) < self.config.throttle_window_ms)
    }

    fn accept_raw(
        &self,
        vehicle:      VehicleId,
        point:        GeoPoint,
        now_ms:       u64,
        disposition:  Disposition,
        axis_swapped: bool,
    ) -> Accepted {
        let heading = self.trails.last(vehicle).and_then(|p| p.heading);
        let p = TrailPoint { point, heading, timestamp_ms: now_ms, kind: PointKind::Raw };
        self.accept(vehicle, p, disposition, axis_swapped)
    }

    fn accept(
        &self,
        vehicle:      VehicleId,
        point:        TrailPoint,
        disposition:  Disposition,
        axis_swapped: bool,
    ) -> Accepted {
        self.trails.push(vehicle, point);
        self.counters.record(disposition);
        Accepted { vehicle, point, disposition, axis_swapped }
    }
}
