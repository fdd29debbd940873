//! Advancing a position along the graph.
//!
//! [`advance`] walks forward from a [`SegmentPosition`], crossing junctions
//! as needed.  At each junction the next segment is chosen by
//! [`select_next_segment`], evaluated in this order:
//!
//! 1. no connected segment → dead end, stop at the junction;
//! 2. exactly one → take it;
//! 3. a preferred bearing is given → smallest angular difference
//!    (ties → lowest id);
//! 4. connected segments sharing the current road name → uniform random;
//! 5. otherwise → uniform random among all connected segments.
//!
//! Randomness comes from the caller's RNG so runs are reproducible.

use rand::seq::SliceRandom;
use rand::Rng;

use rt_core::angular_difference;

use crate::{GraphResult, RoadGraph, RoadSegment, SegmentPosition};

/// Outcome of [`advance`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Advance {
    pub position: SegmentPosition,
    /// Distance actually covered, metres.  Less than requested only at a
    /// dead end.
    pub travelled_m: f64,
    /// `true` when the walk stopped at a junction with nowhere to go.
    pub dead_end: bool,
}

/// Move `position` forward by `distance_m` metres.
///
/// Negative or non-finite distances are treated as zero.  Reaching a dead end
/// is not an error: the returned position sits on the junction (offset 1)
/// and `dead_end` is set.
pub fn advance<R: Rng + ?Sized>(
    graph:             &RoadGraph,
    position:          SegmentPosition,
    distance_m:        f64,
    preferred_bearing: Option<f64>,
    rng:               &mut R,
) -> GraphResult<Advance> {
    let mut seg = graph.segment(position.segment())?;
    let mut offset = position.offset();
    let mut remaining = if distance_m.is_finite() { distance_m.max(0.0) } else { 0.0 };
    let mut travelled = 0.0;
    let mut dead_end = false;
    // Consecutive hops that consumed no distance (zero-length segments).
    let mut idle_hops = 0usize;

    while remaining > 0.0 {
        let left_on_segment = seg.length_m * (1.0 - offset);
        if remaining <= left_on_segment {
            offset = (offset + remaining / seg.length_m).min(1.0);
            travelled += remaining;
            break;
        }

        travelled += left_on_segment;
        remaining -= left_on_segment;
        offset = 1.0;

        let Some(next) = select_next_segment(graph, seg, preferred_bearing, rng) else {
            dead_end = true;
            break;
        };

        idle_hops = if left_on_segment > 0.0 { 0 } else { idle_hops + 1 };
        if idle_hops > graph.segment_count() {
            // A loop of zero-length segments; stay on the junction.
            break;
        }

        seg = next;
        offset = 0.0;
    }

    Ok(Advance {
        position: SegmentPosition::on(seg, offset),
        travelled_m: travelled,
        dead_end,
    })
}

/// Choose the segment to continue onto at the far junction of `current`.
///
/// Returns `None` at a dead end.
pub fn select_next_segment<'g, R: Rng + ?Sized>(
    graph:             &'g RoadGraph,
    current:           &RoadSegment,
    preferred_bearing: Option<f64>,
    rng:               &mut R,
) -> Option<&'g RoadSegment> {
    let candidates: Vec<&RoadSegment> = current
        .connected
        .iter()
        .filter_map(|id| graph.segment(*id).ok())
        .collect();

    match candidates.as_slice() {
        [] => return None,
        [only] => return Some(*only),
        _ => {}
    }

    if let Some(bearing) = preferred_bearing.filter(|b| b.is_finite()) {
        let mut best = candidates[0];
        let mut best_diff = angular_difference(best.bearing, bearing);
        for &c in &candidates[1..] {
            let diff = angular_difference(c.bearing, bearing);
            if diff < best_diff {
                best = c;
                best_diff = diff;
            }
        }
        return Some(best);
    }

    let same_road: Vec<&RoadSegment> = candidates
        .iter()
        .copied()
        .filter(|c| !current.name.is_empty() && c.name == current.name)
        .collect();
    if !same_road.is_empty() {
        return same_road.choose(rng).copied();
    }

    candidates.choose(rng).copied()
}
