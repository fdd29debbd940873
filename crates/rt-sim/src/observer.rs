//! Subscribers to simulator output.

use rt_core::{GeoPoint, SegmentId, Tick, VehicleId};
use rt_graph::SegmentPosition;

/// One vehicle's position after a tick.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PositionUpdate {
    pub vehicle: VehicleId,
    pub tick: Tick,
    pub timestamp_ms: u64,
    pub position: SegmentPosition,
    pub speed_kmh: f64,
}

impl PositionUpdate {
    #[inline]
    pub fn point(&self) -> GeoPoint {
        self.position.point()
    }

    #[inline]
    pub fn heading(&self) -> f64 {
        self.position.heading()
    }
}

/// Callbacks invoked by [`Simulator::step`](crate::Simulator::step).
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Example: trail printer
///
/// ```rust,ignore
/// struct Printer;
///
/// impl SimObserver for Printer {
///     fn on_position_update(&mut self, u: &PositionUpdate) {
///         println!("{} @ {}: {}", u.vehicle, u.timestamp_ms, u.point());
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the start of each tick, before any vehicle moves.
    fn on_tick_start(&mut self, _tick: Tick, _now_ms: u64) {}

    /// Called once per active vehicle per tick, in ascending id order.
    fn on_position_update(&mut self, _update: &PositionUpdate) {}

    /// Called when a vehicle's advance ended at a junction with no exit.
    fn on_dead_end(&mut self, _vehicle: VehicleId, _segment: SegmentId) {}

    /// Called at the end of each tick.  `emitted` is the number of position
    /// updates produced this tick.
    fn on_tick_end(&mut self, _tick: Tick, _emitted: usize) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

/// Forward every callback to both observers.
impl<A: SimObserver, B: SimObserver> SimObserver for (A, B) {
    fn on_tick_start(&mut self, tick: Tick, now_ms: u64) {
        self.0.on_tick_start(tick, now_ms);
        self.1.on_tick_start(tick, now_ms);
    }

    fn on_position_update(&mut self, update: &PositionUpdate) {
        self.0.on_position_update(update);
        self.1.on_position_update(update);
    }

    fn on_dead_end(&mut self, vehicle: VehicleId, segment: SegmentId) {
        self.0.on_dead_end(vehicle, segment);
        self.1.on_dead_end(vehicle, segment);
    }

    fn on_tick_end(&mut self, tick: Tick, emitted: usize) {
        self.0.on_tick_end(tick, emitted);
        self.1.on_tick_end(tick, emitted);
    }
}
