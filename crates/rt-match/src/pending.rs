//! Per-vehicle exclusion for in-flight match operations.

use std::sync::Mutex;

use rt_core::VehicleId;

use crate::sync::{lock, VehicleSet};

/// Vehicles with a match currently in flight.
///
/// Membership is the lock: [`try_acquire`](Self::try_acquire) inserts the id
/// and hands back a [`PendingGuard`] whose `Drop` removes it, so release
/// happens on every exit path of the match, including unwinding.
#[derive(Default)]
pub struct PendingSet {
    inner: Mutex<VehicleSet>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `vehicle` in flight.  `None` if it already is.
    pub fn try_acquire(&self, vehicle: VehicleId) -> Option<PendingGuard<'_>> {
        if lock(&self.inner).insert(vehicle) {
            Some(PendingGuard { set: self, vehicle })
        } else {
            None
        }
    }

    pub fn contains(&self, vehicle: VehicleId) -> bool {
        lock(&self.inner).contains(&vehicle)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds one vehicle's in-flight marker; releases it when dropped.
#[must_use = "the vehicle is released as soon as the guard is dropped"]
pub struct PendingGuard<'a> {
    set: &'a PendingSet,
    vehicle: VehicleId,
}

impl PendingGuard<'_> {
    pub fn vehicle(&self) -> VehicleId {
        self.vehicle
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(&self.set.inner).remove(&self.vehicle);
    }
}
