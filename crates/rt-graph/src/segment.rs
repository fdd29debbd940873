//! Road segments and road classes.

use rt_core::{GeoPoint, NodeId, SegmentId};

/// Functional class of a road.  Determines the default (free-flow) speed a
/// vehicle may drive on it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoadClass {
    Motorway,
    Primary,
    Secondary,
    #[default]
    Residential,
    Service,
}

impl RoadClass {
    /// Default speed in km/h.
    pub fn default_speed_kmh(self) -> f64 {
        match self {
            RoadClass::Motorway    => 110.0,
            RoadClass::Primary     => 70.0,
            RoadClass::Secondary   => 50.0,
            RoadClass::Residential => 30.0,
            RoadClass::Service     => 20.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoadClass::Motorway    => "motorway",
            RoadClass::Primary     => "primary",
            RoadClass::Secondary   => "secondary",
            RoadClass::Residential => "residential",
            RoadClass::Service     => "service",
        }
    }
}

impl std::fmt::Display for RoadClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, straight road edge between two junctions.
///
/// Segments are created by [`RoadGraphBuilder`](crate::RoadGraphBuilder) and
/// never mutated afterwards.  Vehicles traverse a segment from `start`
/// (offset 0) to `end` (offset 1).
#[derive(Clone, Debug)]
pub struct RoadSegment {
    pub id: SegmentId,
    /// Junction at offset 0.
    pub from: NodeId,
    /// Junction at offset 1.
    pub to: NodeId,
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// Physical length in metres.
    pub length_m: f64,
    pub name: String,
    pub class: RoadClass,
    /// Geodesic bearing from `start` to `end`, in `[0, 360)`.
    pub bearing: f64,
    /// The segment running the opposite way between the same two junctions,
    /// if the road is two-way.
    pub reverse: Option<SegmentId>,
    /// Segments a vehicle may continue onto at `to`, sorted by id.  Never
    /// contains `reverse`.
    pub connected: Vec<SegmentId>,
    /// Segments that list `self` in their `connected` set, sorted by id.
    pub predecessors: Vec<SegmentId>,
}

impl RoadSegment {
    /// Point at `offset` along the segment (clamped to `[0, 1]`).
    #[inline]
    pub fn point_at(&self, offset: f64) -> GeoPoint {
        self.start.lerp(self.end, offset)
    }

    /// `true` when no segment continues from `to`.
    #[inline]
    pub fn is_dead_end(&self) -> bool {
        self.connected.is_empty()
    }
}
