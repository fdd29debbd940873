//! Bridge from simulator output into the matching pipeline.

use std::sync::Arc;

use log::{debug, warn};

use rt_core::{GeoPoint, Tick, VehicleId};
use rt_match::{MatchController, MatchError};

use crate::{PositionUpdate, SimObserver};

/// Feeds each tick's positions into a [`MatchController`].
///
/// Updates are buffered during the tick and ingested as one batch at
/// `on_tick_end`, so with `rt-match/parallel` distinct vehicles match
/// concurrently.  Expired cache entries are swept every
/// `cache_sweep_interval_ms` of simulated time.
///
/// Match failures never interrupt the simulation: rejected coordinates are
/// counted, and the first unexpected error is kept for
/// [`take_error`](Self::take_error).
pub struct MatchingObserver {
    controller:    Arc<MatchController>,
    batch:         Vec<(VehicleId, GeoPoint)>,
    now_ms:        u64,
    last_sweep_ms: Option<u64>,
    ingested:      u64,
    rejected:      u64,
    error:         Option<MatchError>,
}

impl MatchingObserver {
    pub fn new(controller: Arc<MatchController>) -> Self {
        Self {
            controller,
            batch:         Vec::new(),
            now_ms:        0,
            last_sweep_ms: None,
            ingested:      0,
            rejected:      0,
            error:         None,
        }
    }

    pub fn controller(&self) -> &Arc<MatchController> {
        &self.controller
    }

    /// Positions accepted into a trail so far.
    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    /// Positions dropped as invalid coordinates.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// The first unexpected matching error, if any.  Clears it.
    pub fn take_error(&mut self) -> Option<MatchError> {
        self.error.take()
    }

    fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        for result in self.controller.ingest_batch(&self.batch, self.now_ms) {
            match result {
                Ok(_) => self.ingested += 1,
                Err(MatchError::InvalidCoordinates { lat, lon }) => {
                    warn!("dropping invalid position ({lat}, {lon})");
                    self.rejected += 1;
                }
                Err(e) => {
                    warn!("matching failed: {e}");
                    self.error.get_or_insert(e);
                }
            }
        }
        self.batch.clear();
    }

    fn maybe_sweep(&mut self) {
        let interval = self.controller.config().cache_sweep_interval_ms;
        let last = *self.last_sweep_ms.get_or_insert(self.now_ms);
        if self.now_ms.saturating_sub(last) >= interval {
            let dropped = self.controller.sweep_cache(self.now_ms);
            debug!("swept {dropped} cache entries at {} ms", self.now_ms);
            self.last_sweep_ms = Some(self.now_ms);
        }
    }
}

impl SimObserver for MatchingObserver {
    fn on_tick_start(&mut self, _tick: Tick, now_ms: u64) {
        self.now_ms = now_ms;
        self.batch.clear();
    }

    fn on_position_update(&mut self, update: &PositionUpdate) {
        self.batch.push((update.vehicle, update.point()));
    }

    fn on_tick_end(&mut self, _tick: Tick, _emitted: usize) {
        self.flush();
        self.maybe_sweep();
    }
}
