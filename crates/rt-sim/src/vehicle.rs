//! Per-vehicle movement state.

use rt_graph::SegmentPosition;

/// Kind of simulated vehicle.  Sets the base (target) speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleKind {
    #[default]
    Car,
    Van,
    Truck,
    Motorcycle,
}

impl VehicleKind {
    /// Base speed in km/h, before jitter and road-class capping.
    pub fn base_speed_kmh(self) -> f64 {
        match self {
            VehicleKind::Car        => 50.0,
            VehicleKind::Van        => 45.0,
            VehicleKind::Truck      => 40.0,
            VehicleKind::Motorcycle => 55.0,
        }
    }
}

/// Movement state of one simulated vehicle.  Owned and mutated only by the
/// [`Simulator`](crate::Simulator).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VehicleMovementState {
    pub position: SegmentPosition,
    /// Speed used for the most recent tick, km/h.
    pub speed_kmh: f64,
    pub base_speed_kmh: f64,
    pub kind: VehicleKind,
    /// Simulated time of the last emitted position.
    pub last_update_ms: u64,
    /// Inactive vehicles are skipped by the tick loop.
    pub active: bool,
    /// The last advance ended at a junction with no exit.
    pub stopped_at_dead_end: bool,
}

impl VehicleMovementState {
    pub fn new(kind: VehicleKind, position: SegmentPosition, now_ms: u64) -> Self {
        Self {
            position,
            speed_kmh: 0.0,
            base_speed_kmh: kind.base_speed_kmh(),
            kind,
            last_update_ms: now_ms,
            active: true,
            stopped_at_dead_end: false,
        }
    }
}
