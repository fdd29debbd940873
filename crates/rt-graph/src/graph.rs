//! Road graph representation and builder.
//!
//! # Data layout
//!
//! Segments are stored in a flat `Vec<RoadSegment>` indexed by `SegmentId`.
//! Outgoing segments per junction use **Compressed Sparse Row (CSR)**
//! format: the segments leaving node `n` are
//!
//! ```text
//! node_out[ node_out_start[n] .. node_out_start[n+1] ]
//! ```
//!
//! sorted by `SegmentId`, so every adjacency list derived from it is
//! deterministic.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) holds every segment as a line in a local planar
//! frame: `x = lon · cos(ref_lat)`, `y = lat`, where `ref_lat` is the mean
//! node latitude fixed at build time.  Both R-tree pruning and the exact
//! point-to-segment projection run in that frame, so nearest-segment queries
//! cost O(log n) and agree with a brute-force scan.  Reported distances are
//! haversine metres between the query and its projection.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use rt_core::{angular_difference, BoundingBox, GeoPoint, NodeId, SegmentId};

use crate::{GraphError, GraphResult, RoadClass, RoadSegment, SegmentPosition, SnapResult};

/// Metres per degree of latitude on the mean-radius sphere.
const METRES_PER_DEG: f64 = 111_195.0;

/// Squared planar distance (deg²) under which two candidates count as equally
/// near.  Twin segments of a two-way road share geometry and land here.
const TIE_EPS_2: f64 = 1e-14;

// ── Planar frame ──────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
struct Frame {
    cos_ref: f64,
}

impl Frame {
    #[inline]
    fn xy(self, p: GeoPoint) -> [f64; 2] {
        [p.lon * self.cos_ref, p.lat]
    }
}

/// Projection parameter of `q` onto `a→b` clamped to `[0, 1]`, and the
/// squared distance from `q` to that projection.
#[inline]
fn project(a: [f64; 2], b: [f64; 2], q: [f64; 2]) -> (f64, f64) {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len_2 = dx * dx + dy * dy;
    let t = if len_2 > 0.0 {
        (((q[0] - a[0]) * dx + (q[1] - a[1]) * dy) / len_2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let px = a[0] + dx * t - q[0];
    let py = a[1] + dy * t - q[1];
    (t, px * px + py * py)
}

// ── R-tree segment entry ──────────────────────────────────────────────────────

#[derive(Clone)]
struct SegmentEntry {
    a: [f64; 2],
    b: [f64; 2],
    id: SegmentId,
}

impl RTreeObject for SegmentEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a, self.b)
    }
}

impl PointDistance for SegmentEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        project(self.a, self.b, *point).1
    }
}

// ── RoadGraph ─────────────────────────────────────────────────────────────────

/// Immutable road graph of directed segments plus a segment spatial index.
///
/// Do not construct directly; use [`RoadGraphBuilder`].
pub struct RoadGraph {
    /// Geographic position of each junction.  Indexed by `NodeId`.
    pub(crate) node_pos: Vec<GeoPoint>,

    /// CSR row pointer into `node_out`.  Length = `node_count + 1`.
    pub(crate) node_out_start: Vec<u32>,

    /// Outgoing segments grouped by source node.
    pub(crate) node_out: Vec<SegmentId>,

    segments: Vec<RoadSegment>,
    frame: Frame,
    spatial_idx: RTree<SegmentEntry>,
}

impl RoadGraph {
    /// A graph with no nodes or segments.  Every snap against it fails with
    /// [`GraphError::GraphEmpty`].
    pub fn empty() -> Self {
        RoadGraphBuilder::new().build()
    }

    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// `true` when the graph has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    // ── Lookup ────────────────────────────────────────────────────────────

    pub fn segment(&self, id: SegmentId) -> GraphResult<&RoadSegment> {
        self.segments
            .get(id.index())
            .ok_or(GraphError::SegmentNotFound(id))
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    pub fn node_pos(&self, id: NodeId) -> GraphResult<GeoPoint> {
        self.node_pos
            .get(id.index())
            .copied()
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Segments leaving junction `node`, ascending by id.
    pub fn out_segments(&self, node: NodeId) -> GraphResult<&[SegmentId]> {
        if node.index() >= self.node_count() {
            return Err(GraphError::NodeNotFound(node));
        }
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        Ok(&self.node_out[start..end])
    }

    /// Segments a vehicle on `id` may continue onto at its far junction.
    pub fn connected_segments(
        &self,
        id: SegmentId,
    ) -> GraphResult<impl Iterator<Item = &RoadSegment> + '_> {
        let seg = self.segment(id)?;
        Ok(seg.connected.iter().map(|c| &self.segments[c.index()]))
    }

    /// The opposite-direction twin of `id`, if the road is two-way.
    pub fn reverse_of(&self, id: SegmentId) -> GraphResult<Option<SegmentId>> {
        Ok(self.segment(id)?.reverse)
    }

    pub fn bearing(&self, id: SegmentId) -> GraphResult<f64> {
        Ok(self.segment(id)?.bearing)
    }

    /// Position `offset` of the way along segment `id`.
    pub fn position_at(&self, id: SegmentId, offset: f64) -> GraphResult<SegmentPosition> {
        Ok(SegmentPosition::on(self.segment(id)?, offset))
    }

    /// Lat/lon envelope of all nodes, or `None` for an empty graph.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let first = self.node_pos.first()?;
        let mut b = BoundingBox::new(first.lat, first.lon, first.lat, first.lon);
        for p in &self.node_pos[1..] {
            b.min_lat = b.min_lat.min(p.lat);
            b.min_lon = b.min_lon.min(p.lon);
            b.max_lat = b.max_lat.max(p.lat);
            b.max_lon = b.max_lon.max(p.lon);
        }
        Some(b)
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Snap `point` onto the nearest segment.
    ///
    /// Equally near candidates (for instance both directions of a two-way
    /// road) resolve to the lowest `SegmentId`.
    pub fn nearest_segment(&self, point: GeoPoint) -> GraphResult<SnapResult> {
        self.nearest_segment_towards(point, None)
    }

    /// Like [`nearest_segment`](Self::nearest_segment), but equally near
    /// candidates resolve to the one whose bearing is closest to
    /// `heading_hint`.
    pub fn nearest_segment_towards(
        &self,
        point: GeoPoint,
        heading_hint: Option<f64>,
    ) -> GraphResult<SnapResult> {
        let q = self.frame.xy(point);
        let mut iter = self.spatial_idx.nearest_neighbor_iter_with_distance_2(&q);
        let (first, best_d2) = iter.next().ok_or(GraphError::GraphEmpty)?;

        let mut chosen = first.id;
        for (entry, d2) in iter {
            if d2 > best_d2 + TIE_EPS_2 {
                break;
            }
            if self.prefer(entry.id, chosen, heading_hint) {
                chosen = entry.id;
            }
        }

        let seg = &self.segments[chosen.index()];
        let (t, _) = project(self.frame.xy(seg.start), self.frame.xy(seg.end), q);
        let position = SegmentPosition::on(seg, t);
        Ok(SnapResult {
            position,
            distance_m: point.distance_m(position.point()),
        })
    }

    /// Every segment whose projected point lies within `radius_m` of
    /// `point`, nearest first.
    pub fn segments_within(&self, point: GeoPoint, radius_m: f64) -> Vec<SnapResult> {
        if radius_m.is_nan() || radius_m < 0.0 {
            return Vec::new();
        }
        let q = self.frame.xy(point);
        // Planar x shrinks metres by cos(lat) / cos_ref; widen the search
        // when the query sits poleward of the reference latitude.
        let stretch = (self.frame.cos_ref / point.lat.to_radians().cos().max(0.01)).max(1.0);
        let r_deg = radius_m / METRES_PER_DEG * stretch * 1.01;

        let mut found: Vec<SnapResult> = self
            .spatial_idx
            .locate_within_distance(q, r_deg * r_deg)
            .map(|entry| {
                let seg = &self.segments[entry.id.index()];
                let (t, _) = project(entry.a, entry.b, q);
                let position = SegmentPosition::on(seg, t);
                SnapResult { position, distance_m: point.distance_m(position.point()) }
            })
            .filter(|s| s.distance_m <= radius_m)
            .collect();

        found.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then(a.position.segment().cmp(&b.position.segment()))
        });
        found
    }

    /// Tie-break between equally near candidates.
    fn prefer(&self, candidate: SegmentId, current: SegmentId, heading_hint: Option<f64>) -> bool {
        if let Some(h) = heading_hint {
            let dc = angular_difference(self.segments[candidate.index()].bearing, h);
            let dk = angular_difference(self.segments[current.index()].bearing, h);
            if dc != dk {
                return dc < dk;
            }
        }
        candidate < current
    }
}

// ── RoadGraphBuilder ──────────────────────────────────────────────────────────

/// Construct a [`RoadGraph`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use rt_core::GeoPoint;
/// use rt_graph::{RoadClass, RoadGraphBuilder};
///
/// let mut b = RoadGraphBuilder::new();
/// let a = b.add_node(GeoPoint::new(-33.870, 151.200));
/// let c = b.add_node(GeoPoint::new(-33.860, 151.200));
/// b.add_road(a, c, "George St", RoadClass::Primary).unwrap();
/// let graph = b.build();
/// assert_eq!(graph.segment_count(), 2); // one per direction
/// ```
pub struct RoadGraphBuilder {
    nodes:        Vec<GeoPoint>,
    raw_segments: Vec<RawSegment>,
}

struct RawSegment {
    from:     NodeId,
    to:       NodeId,
    length_m: Option<f64>,
    name:     String,
    class:    RoadClass,
}

impl RoadGraphBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), raw_segments: Vec::new() }
    }

    pub fn with_capacity(nodes: usize, segments: usize) -> Self {
        Self {
            nodes:        Vec::with_capacity(nodes),
            raw_segments: Vec::with_capacity(segments),
        }
    }

    /// Add a junction and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: GeoPoint) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        id
    }

    /// Add a **directed** segment; its length is the haversine distance
    /// between the two junctions.
    pub fn add_segment(
        &mut self,
        from:  NodeId,
        to:    NodeId,
        name:  impl Into<String>,
        class: RoadClass,
    ) -> GraphResult<SegmentId> {
        self.push_segment(from, to, None, name.into(), class)
    }

    /// Add a **directed** segment with an explicit length in metres.
    pub fn add_segment_with_length(
        &mut self,
        from:     NodeId,
        to:       NodeId,
        length_m: f64,
        name:     impl Into<String>,
        class:    RoadClass,
    ) -> GraphResult<SegmentId> {
        self.push_segment(from, to, Some(length_m.max(0.0)), name.into(), class)
    }

    /// Add a two-way road: one segment in each direction.  The pair become
    /// each other's reverse twin.
    pub fn add_road(
        &mut self,
        a:     NodeId,
        b:     NodeId,
        name:  impl Into<String>,
        class: RoadClass,
    ) -> GraphResult<(SegmentId, SegmentId)> {
        let name = name.into();
        let fwd = self.push_segment(a, b, None, name.clone(), class)?;
        let back = self.push_segment(b, a, None, name, class)?;
        Ok((fwd, back))
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn segment_count(&self) -> usize { self.raw_segments.len() }

    fn push_segment(
        &mut self,
        from:     NodeId,
        to:       NodeId,
        length_m: Option<f64>,
        name:     String,
        class:    RoadClass,
    ) -> GraphResult<SegmentId> {
        for node in [from, to] {
            if node.index() >= self.nodes.len() {
                return Err(GraphError::NodeNotFound(node));
            }
        }
        let id = SegmentId(self.raw_segments.len() as u32);
        self.raw_segments.push(RawSegment { from, to, length_m, name, class });
        Ok(id)
    }

    /// Consume the builder and produce a [`RoadGraph`].
    ///
    /// O(S log S) overall: CSR construction is linear, adjacency derivation
    /// is linear in the sum of junction degrees, and the R-tree is bulk
    /// loaded.
    pub fn build(self) -> RoadGraph {
        let node_count = self.nodes.len();

        let mut segments: Vec<RoadSegment> = self
            .raw_segments
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                let start = self.nodes[raw.from.index()];
                let end   = self.nodes[raw.to.index()];
                RoadSegment {
                    id:           SegmentId(i as u32),
                    from:         raw.from,
                    to:           raw.to,
                    start,
                    end,
                    length_m:     raw.length_m.unwrap_or_else(|| start.distance_m(end)),
                    name:         raw.name,
                    class:        raw.class,
                    bearing:      start.bearing_to(end),
                    reverse:      None,
                    connected:    Vec::new(),
                    predecessors: Vec::new(),
                }
            })
            .collect();

        // CSR over source nodes.  Filling in id order keeps each row sorted.
        let mut node_out_start = vec![0u32; node_count + 1];
        for s in &segments {
            node_out_start[s.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        let mut cursor: Vec<u32> = node_out_start[..node_count].to_vec();
        let mut node_out = vec![SegmentId::INVALID; segments.len()];
        for s in &segments {
            let slot = &mut cursor[s.from.index()];
            node_out[*slot as usize] = s.id;
            *slot += 1;
        }

        // Reverse twins and forward connectivity.
        for i in 0..segments.len() {
            let (from, to) = (segments[i].from, segments[i].to);
            let start = node_out_start[to.index()] as usize;
            let end   = node_out_start[to.index() + 1] as usize;
            let outs  = &node_out[start..end];

            let reverse = outs.iter().copied().find(|o| {
                let other = &segments[o.index()];
                other.to == from && other.id != segments[i].id
            });
            let connected = outs
                .iter()
                .copied()
                .filter(|o| Some(*o) != reverse)
                .collect();

            segments[i].reverse = reverse;
            segments[i].connected = connected;
        }

        // Predecessors are the exact inverse of `connected`, so the relation
        // is symmetric by construction.
        for i in 0..segments.len() {
            let id = segments[i].id;
            for k in 0..segments[i].connected.len() {
                let next = segments[i].connected[k];
                segments[next.index()].predecessors.push(id);
            }
        }

        let ref_lat = if node_count == 0 {
            0.0
        } else {
            self.nodes.iter().map(|p| p.lat).sum::<f64>() / node_count as f64
        };
        let frame = Frame { cos_ref: ref_lat.to_radians().cos().max(0.01) };

        let entries: Vec<SegmentEntry> = segments
            .iter()
            .map(|s| SegmentEntry { a: frame.xy(s.start), b: frame.xy(s.end), id: s.id })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        RoadGraph {
            node_pos: self.nodes,
            node_out_start,
            node_out,
            segments,
            frame,
            spatial_idx,
        }
    }
}

impl Default for RoadGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
