//! Fluent builder for constructing a [`Simulator`].

use std::sync::Arc;

use log::info;

use rt_core::{GeoPoint, SegmentId, VehicleId};
use rt_graph::RoadGraph;

use crate::{SimConfig, SimResult, Simulator, VehicleKind};

/// Where a vehicle starts.
enum Placement {
    On { segment: SegmentId, offset: f64 },
    Near(GeoPoint),
}

struct PendingVehicle {
    id:        VehicleId,
    kind:      VehicleKind,
    placement: Placement,
    speed_kmh: Option<f64>,
    active:    bool,
}

/// Fluent builder for [`Simulator`].
///
/// # Optional inputs (have defaults)
///
/// | Method                     | Default                 |
/// |----------------------------|-------------------------|
/// | `.config(c)`               | `SimConfig::default()`  |
/// | `.vehicle(..)`             | no vehicles             |
/// | `.vehicle_near(..)`        | no vehicles             |
///
/// # Example
///
/// ```rust,ignore
/// let sim = SimBuilder::new(graph)
///     .config(SimConfig { seed: 7, ..Default::default() })
///     .vehicle(VehicleId(0), VehicleKind::Car, SegmentId(0), 0.0)
///     .vehicle_near(VehicleId(1), VehicleKind::Truck, depot)
///     .build()?;
/// ```
pub struct SimBuilder {
    graph:    Arc<RoadGraph>,
    config:   SimConfig,
    vehicles: Vec<PendingVehicle>,
}

impl SimBuilder {
    pub fn new(graph: Arc<RoadGraph>) -> Self {
        Self { graph, config: SimConfig::default(), vehicles: Vec::new() }
    }

    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a vehicle `offset` of the way along `segment`.
    pub fn vehicle(mut self, id: VehicleId, kind: VehicleKind, segment: SegmentId, offset: f64) -> Self {
        self.vehicles.push(PendingVehicle {
            id,
            kind,
            placement: Placement::On { segment, offset },
            speed_kmh: None,
            active: true,
        });
        self
    }

    /// Start a vehicle on the road nearest to `point`.
    pub fn vehicle_near(mut self, id: VehicleId, kind: VehicleKind, point: GeoPoint) -> Self {
        self.vehicles.push(PendingVehicle {
            id,
            kind,
            placement: Placement::Near(point),
            speed_kmh: None,
            active: true,
        });
        self
    }

    /// Override the base speed of the most recently added vehicle.
    pub fn base_speed(mut self, kmh: f64) -> Self {
        if let Some(v) = self.vehicles.last_mut() {
            v.speed_kmh = Some(kmh);
        }
        self
    }

    /// Start the most recently added vehicle inactive.
    pub fn inactive(mut self) -> Self {
        if let Some(v) = self.vehicles.last_mut() {
            v.active = false;
        }
        self
    }

    /// Validate the configuration, place every vehicle, and return a
    /// ready-to-run [`Simulator`].
    pub fn build(self) -> SimResult<Simulator> {
        let mut sim = Simulator::new(self.graph, self.config)?;

        for v in self.vehicles {
            match v.placement {
                Placement::On { segment, offset } => {
                    let position = sim.graph.position_at(segment, offset)?;
                    sim.add_vehicle(v.id, v.kind, position)?;
                }
                Placement::Near(point) => sim.add_vehicle_near(v.id, v.kind, point)?,
            }
            if let Some(kmh) = v.speed_kmh {
                sim.set_base_speed(v.id, kmh)?;
            }
            if !v.active {
                sim.set_active(v.id, false)?;
            }
        }

        info!(
            "simulator ready: {} vehicles on {} segments, {} ms ticks",
            sim.vehicle_count(),
            sim.graph.segment_count(),
            sim.config.tick_interval_ms
        );
        Ok(sim)
    }
}
