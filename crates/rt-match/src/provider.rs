//! Routing-provider interface.
//!
//! The external snap/match service is consumed through [`RoutingProvider`].
//! Implementations wrap whatever transport they need; the matcher only sees
//! typed responses and a [`ProviderError`] on failure.  Timeouts are the
//! implementation's concern and surface as [`ProviderError::Timeout`].
//!
//! Coordinates travel as [`GeoPoint`]; implementations speaking a
//! `[lon, lat]` wire format convert at their boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use rt_core::GeoPoint;
use rt_graph::{GraphError, RoadGraph};

use crate::matcher::local_confidence;
use crate::{ProviderError, ProviderResult};

/// Options for [`RoutingProvider::snap_to_road`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SnapOptions {
    pub radius_m: f64,
}

/// Geometry encoding requested from a path match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometries {
    #[default]
    GeoJson,
    Polyline,
    Polyline6,
}

/// Options for [`RoutingProvider::match_to_roads`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MatchOptions {
    pub radius_m: f64,
    pub geometries: Geometries,
}

/// Result of snapping one coordinate.  `confidence == 0` means no road was
/// found within the requested radius.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapResponse {
    pub location: GeoPoint,
    pub heading: Option<f64>,
    pub distance_m: f64,
    pub road_name: Option<String>,
    pub confidence: f64,
}

/// Result of matching a sequence of coordinates to a road path.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResponse {
    pub matched: Vec<GeoPoint>,
    pub confidence: f64,
}

/// An external snap-to-road / map-matching service.
///
/// Implementations must be `Send + Sync`: one provider is shared by every
/// vehicle's match operation.
pub trait RoutingProvider: Send + Sync {
    /// Short name used in logs and health reports.
    fn name(&self) -> &str;

    /// Snap one coordinate to the nearest road within `opts.radius_m`.
    fn snap_to_road(&self, point: GeoPoint, opts: &SnapOptions) -> ProviderResult<SnapResponse>;

    /// Match a path of at least two coordinates onto the road network.
    fn match_to_roads(
        &self,
        points: &[GeoPoint],
        opts:   &MatchOptions,
    ) -> ProviderResult<MatchResponse>;

    /// Best-effort liveness per backing service.  Observability only.
    fn service_health(&self) -> BTreeMap<String, bool> {
        BTreeMap::from([(self.name().to_string(), true)])
    }
}

// ── GraphProvider ─────────────────────────────────────────────────────────────

/// A [`RoutingProvider`] answered from a local [`RoadGraph`].
///
/// Stands in for a remote service in demos and tests; confidence follows the
/// same distance heuristic as the matcher's local fallback.
pub struct GraphProvider {
    graph: Arc<RoadGraph>,
    name: String,
}

impl GraphProvider {
    pub fn new(graph: Arc<RoadGraph>) -> Self {
        Self { graph, name: "local-graph-provider".to_string() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn snap(&self, point: GeoPoint, radius_m: f64) -> ProviderResult<SnapResponse> {
        match self.graph.nearest_segment(point) {
            Ok(snap) if snap.distance_m <= radius_m => {
                let road_name = self
                    .graph
                    .segment(snap.position.segment())
                    .ok()
                    .map(|s| s.name.clone());
                Ok(SnapResponse {
                    location:   snap.position.point(),
                    heading:    Some(snap.position.heading()),
                    distance_m: snap.distance_m,
                    road_name,
                    confidence: local_confidence(snap.distance_m, radius_m),
                })
            }
            Ok(_) | Err(GraphError::GraphEmpty) => Ok(SnapResponse {
                location:   point,
                heading:    None,
                distance_m: 0.0,
                road_name:  None,
                confidence: 0.0,
            }),
            Err(e) => Err(ProviderError::Transport(e.to_string())),
        }
    }
}

impl RoutingProvider for GraphProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn snap_to_road(&self, point: GeoPoint, opts: &SnapOptions) -> ProviderResult<SnapResponse> {
        if !point.is_valid() {
            return Err(ProviderError::InvalidRequest(format!("invalid coordinate {point}")));
        }
        self.snap(point, opts.radius_m)
    }

    fn match_to_roads(
        &self,
        points: &[GeoPoint],
        opts:   &MatchOptions,
    ) -> ProviderResult<MatchResponse> {
        if points.len() < 2 {
            return Err(ProviderError::InvalidRequest(format!(
                "path match needs at least 2 points, got {}",
                points.len()
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
            return Err(ProviderError::InvalidRequest(format!("invalid coordinate {bad}")));
        }

        let mut matched = Vec::with_capacity(points.len());
        let mut confidence = 1.0_f64;
        for &p in points {
            let snap = self.snap(p, opts.radius_m)?;
            if snap.confidence <= 0.0 {
                return Ok(MatchResponse { matched: Vec::new(), confidence: 0.0 });
            }
            confidence = confidence.min(snap.confidence);
            matched.push(snap.location);
        }
        Ok(MatchResponse { matched, confidence })
    }

    fn service_health(&self) -> BTreeMap<String, bool> {
        BTreeMap::from([(self.name.clone(), !self.graph.is_empty())])
    }
}
