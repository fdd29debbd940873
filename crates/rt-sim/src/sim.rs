//! The `Simulator` and its tick loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};

use rt_core::{GeoPoint, SimClock, Tick, VehicleId, VehicleRng};
use rt_graph::{advance, RoadGraph, SegmentPosition};

use crate::{
    PositionUpdate, SimConfig, SimError, SimObserver, SimResult, VehicleKind,
    VehicleMovementState,
};

/// One vehicle's state plus its private random stream.
pub(crate) struct SimVehicle {
    pub(crate) state: VehicleMovementState,
    pub(crate) rng:   VehicleRng,
}

/// Drives simulated vehicles along a [`RoadGraph`].
///
/// Vehicles are kept in a `BTreeMap` so every tick visits them in ascending
/// [`VehicleId`] order; together with per-vehicle RNGs this makes a run with
/// the same seed and fleet replay identically.
///
/// Create via [`SimBuilder`](crate::SimBuilder) or [`Simulator::new`].
pub struct Simulator {
    pub(crate) graph:    Arc<RoadGraph>,
    pub(crate) config:   SimConfig,
    pub(crate) clock:    SimClock,
    pub(crate) vehicles: BTreeMap<VehicleId, SimVehicle>,
}

impl Simulator {
    /// An empty simulator over `graph`.
    pub fn new(graph: Arc<RoadGraph>, config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            clock: SimClock::new(0, config.tick_interval_ms),
            graph,
            config,
            vehicles: BTreeMap::new(),
        })
    }

    // ── Fleet ─────────────────────────────────────────────────────────────

    /// Place a new vehicle at `position`.
    pub fn add_vehicle(
        &mut self,
        id:       VehicleId,
        kind:     VehicleKind,
        position: SegmentPosition,
    ) -> SimResult<()> {
        if self.vehicles.contains_key(&id) {
            return Err(SimError::DuplicateVehicle(id));
        }
        self.graph.segment(position.segment())?;
        let state = VehicleMovementState::new(kind, position, self.clock.now_ms());
        let rng = VehicleRng::new(self.config.seed, id);
        self.vehicles.insert(id, SimVehicle { state, rng });
        debug!("{id}: added {kind:?} on {}", position.segment());
        Ok(())
    }

    /// Place a new vehicle on the road nearest to `point`.
    pub fn add_vehicle_near(
        &mut self,
        id:    VehicleId,
        kind:  VehicleKind,
        point: GeoPoint,
    ) -> SimResult<()> {
        let snap = self.graph.nearest_segment(point)?;
        self.add_vehicle(id, kind, snap.position)
    }

    /// Remove a vehicle, returning its final state.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> SimResult<VehicleMovementState> {
        self.vehicles
            .remove(&id)
            .map(|v| v.state)
            .ok_or(SimError::VehicleNotFound(id))
    }

    pub fn set_active(&mut self, id: VehicleId, active: bool) -> SimResult<()> {
        self.vehicle_mut(id)?.state.active = active;
        Ok(())
    }

    /// Override the vehicle kind's default base speed.
    pub fn set_base_speed(&mut self, id: VehicleId, kmh: f64) -> SimResult<()> {
        if !(kmh.is_finite() && kmh >= 0.0) {
            return Err(SimError::Config(format!("base speed must be non-negative, got {kmh}")));
        }
        self.vehicle_mut(id)?.state.base_speed_kmh = kmh;
        Ok(())
    }

    pub fn state(&self, id: VehicleId) -> Option<&VehicleMovementState> {
        self.vehicles.get(&id).map(|v| &v.state)
    }

    /// All vehicles in ascending id order.
    pub fn vehicles(&self) -> impl Iterator<Item = (VehicleId, &VehicleMovementState)> + '_ {
        self.vehicles.iter().map(|(&id, v)| (id, &v.state))
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn graph(&self) -> &Arc<RoadGraph> {
        &self.graph
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // ── Tick loop ─────────────────────────────────────────────────────────

    /// Run exactly `n` ticks.  Returns the number of positions emitted.
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<usize> {
        info!("running {n} ticks with {} vehicles", self.vehicles.len());
        let mut emitted = 0;
        for _ in 0..n {
            emitted += self.step(observer)?;
        }
        Ok(emitted)
    }

    /// Advance every active vehicle by one tick and emit its new position.
    /// Returns the number of positions emitted.
    pub fn step<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<usize> {
        let tick = self.clock.current_tick;
        let now_ms = self.clock.now_ms();
        let tick_secs = self.clock.tick_secs();
        let jitter = self.config.speed_jitter;

        observer.on_tick_start(tick, now_ms);
        let mut emitted = 0;

        for (&id, vehicle) in self.vehicles.iter_mut() {
            if !vehicle.state.active {
                continue;
            }
            let (update, reached_dead_end) =
                move_vehicle(&self.graph, id, vehicle, tick, now_ms, tick_secs, jitter)?;
            emitted += 1;
            observer.on_position_update(&update);
            if reached_dead_end {
                observer.on_dead_end(id, update.position.segment());
            }
        }

        observer.on_tick_end(tick, emitted);
        self.clock.advance();
        Ok(emitted)
    }

    pub fn current_tick(&self) -> Tick {
        self.clock.current_tick
    }

    fn vehicle_mut(&mut self, id: VehicleId) -> SimResult<&mut SimVehicle> {
        self.vehicles.get_mut(&id).ok_or(SimError::VehicleNotFound(id))
    }
}

/// One vehicle's tick: U-turn out of a dead end, pick a speed, advance.
/// The flag is set when this tick's advance stopped at a dead end.
fn move_vehicle(
    graph:     &RoadGraph,
    id:        VehicleId,
    vehicle:   &mut SimVehicle,
    tick:      Tick,
    now_ms:    u64,
    tick_secs: f64,
    jitter:    f64,
) -> SimResult<(PositionUpdate, bool)> {
    let state = &mut vehicle.state;

    if state.stopped_at_dead_end {
        if let Some(twin) = graph.reverse_of(state.position.segment())? {
            debug!("{id}: U-turn at dead end onto {twin}");
            state.position = graph.position_at(twin, 0.0)?;
            state.stopped_at_dead_end = false;
        }
    }

    let segment = graph.segment(state.position.segment())?;
    let factor = if jitter > 0.0 {
        1.0 + vehicle.rng.gen_range(-jitter..=jitter)
    } else {
        1.0
    };
    let speed_kmh = if state.stopped_at_dead_end {
        0.0
    } else {
        (state.base_speed_kmh * factor).min(segment.class.default_speed_kmh()).max(0.0)
    };
    let distance_m = speed_kmh / 3.6 * tick_secs;

    let step = advance(
        graph,
        state.position,
        distance_m,
        Some(state.position.heading()),
        vehicle.rng.inner(),
    )?;

    state.position = step.position;
    state.speed_kmh = speed_kmh;
    state.last_update_ms = now_ms;
    state.stopped_at_dead_end = step.dead_end || (state.stopped_at_dead_end && distance_m == 0.0);

    if step.dead_end {
        debug!("{id}: stopped at dead end of {}", state.position.segment());
    }

    let update = PositionUpdate {
        vehicle: id,
        tick,
        timestamp_ms: now_ms,
        position: state.position,
        speed_kmh,
    };
    Ok((update, step.dead_end))
}
