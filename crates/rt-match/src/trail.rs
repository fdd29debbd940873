//! Capped, time-ordered per-vehicle position history.

use std::collections::VecDeque;
use std::sync::Mutex;

use rt_core::{GeoPoint, VehicleId};

use crate::sync::{lock, VehicleMap};

/// How a trail point was obtained.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointKind {
    /// The (validated, possibly axis-corrected) raw coordinate.
    Raw,
    /// A recent match reused from the spatial cache.
    Cached,
    /// A fresh match.
    Matched,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrailPoint {
    pub point: GeoPoint,
    pub heading: Option<f64>,
    pub timestamp_ms: u64,
    pub kind: PointKind,
}

/// Ring buffer of the most recent `cap` points, oldest first.
#[derive(Clone, Debug)]
pub struct Trail {
    points: VecDeque<TrailPoint>,
    cap: usize,
}

impl Trail {
    /// `cap` is raised to at least 1.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { points: VecDeque::with_capacity(cap.min(1_024)), cap }
    }

    /// Insert `p` keeping timestamp order (a point stamped earlier than the
    /// newest goes before it), then drop from the front down to `cap`.
    pub fn push(&mut self, p: TrailPoint) {
        let idx = self
            .points
            .iter()
            .rposition(|q| q.timestamp_ms <= p.timestamp_ms)
            .map_or(0, |i| i + 1);
        self.points.insert(idx, p);
        while self.points.len() > self.cap {
            self.points.pop_front();
        }
    }

    pub fn last(&self) -> Option<&TrailPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrailPoint> + '_ {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<TrailPoint> {
        self.points.iter().copied().collect()
    }
}

/// Trails for all vehicles behind one lock.
pub struct TrailStore {
    cap: usize,
    trails: Mutex<VehicleMap<Trail>>,
}

impl TrailStore {
    pub fn new(cap: usize) -> Self {
        Self { cap, trails: Mutex::new(VehicleMap::default()) }
    }

    pub fn push(&self, vehicle: VehicleId, p: TrailPoint) {
        lock(&self.trails)
            .entry(vehicle)
            .or_insert_with(|| Trail::new(self.cap))
            .push(p);
    }

    /// Copy of `vehicle`'s trail, oldest first.  Empty for unknown vehicles.
    pub fn trail(&self, vehicle: VehicleId) -> Vec<TrailPoint> {
        lock(&self.trails)
            .get(&vehicle)
            .map(Trail::to_vec)
            .unwrap_or_default()
    }

    pub fn last(&self, vehicle: VehicleId) -> Option<TrailPoint> {
        lock(&self.trails).get(&vehicle).and_then(|t| t.last().copied())
    }

    pub fn remove(&self, vehicle: VehicleId) -> Option<Trail> {
        lock(&self.trails).remove(&vehicle)
    }

    pub fn vehicle_count(&self) -> usize {
        lock(&self.trails).len()
    }
}
