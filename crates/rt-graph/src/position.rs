//! Positions on the graph.

use rt_core::{GeoPoint, SegmentId};

use crate::RoadSegment;

/// "Where on the graph": a segment plus a normalised offset along it.
///
/// `point` and `heading` are always derived from the segment and offset, so
/// fields are private and the only constructors go through a
/// [`RoadSegment`].  The offset is clamped to `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SegmentPosition {
    segment: SegmentId,
    offset: f64,
    point: GeoPoint,
    heading: f64,
}

impl SegmentPosition {
    /// Position `offset` of the way along `segment`.  Non-finite offsets
    /// collapse to the segment start.
    pub fn on(segment: &RoadSegment, offset: f64) -> Self {
        let offset = if offset.is_finite() { offset.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            segment: segment.id,
            offset,
            point: segment.point_at(offset),
            heading: segment.bearing,
        }
    }

    #[inline]
    pub fn segment(&self) -> SegmentId {
        self.segment
    }

    /// Normalised offset in `[0, 1]`.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    #[inline]
    pub fn point(&self) -> GeoPoint {
        self.point
    }

    /// Bearing of the segment, in `[0, 360)`.
    #[inline]
    pub fn heading(&self) -> f64 {
        self.heading
    }
}

/// Result of snapping an arbitrary point onto the nearest segment.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SnapResult {
    /// The perpendicular projection of the query onto the segment.
    pub position: SegmentPosition,
    /// Great-circle distance from the query to the projected point, metres.
    pub distance_m: f64,
}
