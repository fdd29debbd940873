//! Single-point and two-point map matching with provider fallback.
//!
//! Both entry points apply the same acceptance rule: a candidate is adopted
//! only when its confidence is strictly greater than the threshold for its
//! match type (`min_snap_confidence` for one point, `min_path_confidence`
//! for a path).  Anything else comes back as [`MatchOutcome::Unmatched`] and
//! the caller keeps the raw coordinate.
//!
//! Fallback chain:
//!
//! ```text
//! match_pair:  remote path ──(error / below threshold)──> match_point
//! match_point: remote snap ──(error / below threshold)──> local graph
//! ```
//!
//! The local graph never fails except when it is empty (`NoRoadData`).

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};

use rt_core::{GeoPoint, SegmentId};
use rt_graph::RoadGraph;

use crate::{MatchConfig, MatchOptions, MatchResult, RoutingProvider, SnapOptions};

/// Below this separation (metres) two fixes give no usable direction.
const MIN_HEADING_BASE_M: f64 = 1.0;

/// Confidence for a local snap `distance_m` away from the road: 1 on the
/// road, falling linearly to 0 at `radius_m`.
#[inline]
pub fn local_confidence(distance_m: f64, radius_m: f64) -> f64 {
    if !(distance_m.is_finite() && radius_m > 0.0) {
        return 0.0;
    }
    (1.0 - distance_m / radius_m).clamp(0.0, 1.0)
}

/// Which path produced a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchSource {
    RemoteSnap,
    RemotePath,
    LocalGraph,
}

/// An accepted match.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchedPoint {
    pub point: GeoPoint,
    /// Degrees in `[0, 360)`, when known.
    pub heading: Option<f64>,
    pub confidence: f64,
    pub source: MatchSource,
    /// Segment of the local graph, for local matches.
    pub segment: Option<SegmentId>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    Matched(MatchedPoint),
    /// Nothing cleared the threshold.  `best_confidence` is the highest
    /// confidence any strategy produced.
    Unmatched { best_confidence: f64 },
}

/// Map matcher over a local graph and an optional routing provider.
pub struct MapMatcher {
    graph: Arc<RoadGraph>,
    provider: Option<Arc<dyn RoutingProvider>>,
    min_snap_confidence: f64,
    min_path_confidence: f64,
    snap_radius_m: f64,
}

impl MapMatcher {
    /// A local-only matcher.
    pub fn new(graph: Arc<RoadGraph>, config: &MatchConfig) -> Self {
        Self {
            graph,
            provider: None,
            min_snap_confidence: config.min_snap_confidence,
            min_path_confidence: config.min_path_confidence,
            snap_radius_m: config.snap_radius_m,
        }
    }

    /// Attach a routing provider consulted before the local graph.
    pub fn with_provider(mut self, provider: Arc<dyn RoutingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn graph(&self) -> &Arc<RoadGraph> {
        &self.graph
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Snap one raw coordinate.  `heading_hint` breaks ties between equally
    /// near segments (both directions of a two-way road).
    pub fn match_point(
        &self,
        raw:          GeoPoint,
        heading_hint: Option<f64>,
    ) -> MatchResult<MatchOutcome> {
        let raw = raw.checked()?;

        let mut best_confidence = 0.0_f64;

        if let Some(provider) = &self.provider {
            let opts = SnapOptions { radius_m: self.snap_radius_m };
            match provider.snap_to_road(raw, &opts) {
                Ok(resp) if resp.confidence > self.min_snap_confidence && resp.location.is_valid() => {
                    let heading = resp
                        .heading
                        .map(rt_core::normalize_bearing)
                        .or_else(|| self.local_heading(resp.location, heading_hint));
                    return Ok(MatchOutcome::Matched(MatchedPoint {
                        point: resp.location,
                        heading,
                        confidence: resp.confidence.min(1.0),
                        source: MatchSource::RemoteSnap,
                        segment: None,
                    }));
                }
                Ok(resp) => {
                    debug!(
                        "{}: snap confidence {:.2} not above {:.2}, using local graph",
                        provider.name(),
                        resp.confidence,
                        self.min_snap_confidence
                    );
                    best_confidence = resp.confidence.clamp(0.0, 1.0);
                }
                Err(e) => warn!("{}: snap failed ({e}), using local graph", provider.name()),
            }
        }

        let snap = self.graph.nearest_segment_towards(raw, heading_hint)?;
        let confidence = local_confidence(snap.distance_m, self.snap_radius_m);
        if confidence > self.min_snap_confidence {
            Ok(MatchOutcome::Matched(MatchedPoint {
                point: snap.position.point(),
                heading: Some(snap.position.heading()),
                confidence,
                source: MatchSource::LocalGraph,
                segment: Some(snap.position.segment()),
            }))
        } else {
            Ok(MatchOutcome::Unmatched { best_confidence: best_confidence.max(confidence) })
        }
    }

    /// Match the movement from `previous` to `raw`.
    ///
    /// Asks the provider for a path first; the new matched point is the
    /// path's last coordinate and the heading is the bearing between its last
    /// two.  Falls back to [`match_point`](Self::match_point) on `raw`, using
    /// the `previous → raw` direction as the heading hint.
    pub fn match_pair(
        &self,
        previous:     GeoPoint,
        raw:          GeoPoint,
        heading_hint: Option<f64>,
    ) -> MatchResult<MatchOutcome> {
        let raw = raw.checked()?;
        if !previous.is_valid() {
            return self.match_point(raw, heading_hint);
        }

        let moved = previous.distance_m(raw) >= MIN_HEADING_BASE_M;
        let travel_heading = moved.then(|| previous.bearing_to(raw));

        if let Some(provider) = &self.provider {
            let opts = MatchOptions { radius_m: self.snap_radius_m, geometries: Default::default() };
            match provider.match_to_roads(&[previous, raw], &opts) {
                Ok(resp) if resp.matched.len() >= 2 && resp.confidence > self.min_path_confidence => {
                    let n = resp.matched.len();
                    let (before, last) = (resp.matched[n - 2], resp.matched[n - 1]);
                    if last.is_valid() {
                        let heading = if before.distance_m(last) >= MIN_HEADING_BASE_M {
                            Some(before.bearing_to(last))
                        } else {
                            travel_heading.or(heading_hint)
                        };
                        return Ok(MatchOutcome::Matched(MatchedPoint {
                            point: last,
                            heading,
                            confidence: resp.confidence.min(1.0),
                            source: MatchSource::RemotePath,
                            segment: None,
                        }));
                    }
                    debug!(
                        "{}: path match ended on invalid {last}, falling back to snap",
                        provider.name()
                    );
                }
                Ok(resp) => debug!(
                    "{}: path match gave {} points at confidence {:.2}, falling back to snap",
                    provider.name(),
                    resp.matched.len(),
                    resp.confidence
                ),
                Err(e) => warn!("{}: path match failed ({e}), falling back to snap", provider.name()),
            }
        }

        self.match_point(raw, travel_heading.or(heading_hint))
    }

    /// Provider health plus the local graph's own availability.
    pub fn service_health(&self) -> BTreeMap<String, bool> {
        let mut health = self
            .provider
            .as_ref()
            .map(|p| p.service_health())
            .unwrap_or_default();
        health.insert("local-graph".to_string(), !self.graph.is_empty());
        health
    }

    fn local_heading(&self, point: GeoPoint, hint: Option<f64>) -> Option<f64> {
        self.graph
            .nearest_segment_towards(point, hint)
            .ok()
            .map(|s| s.position.heading())
    }
}
