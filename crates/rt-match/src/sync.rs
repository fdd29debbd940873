//! Lock and map helpers shared by the controller's state holders.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rt_core::VehicleId;

#[cfg(feature = "fx-hash")]
pub(crate) type VehicleMap<V> = rustc_hash::FxHashMap<VehicleId, V>;
#[cfg(not(feature = "fx-hash"))]
pub(crate) type VehicleMap<V> = std::collections::HashMap<VehicleId, V>;

#[cfg(feature = "fx-hash")]
pub(crate) type VehicleSet = rustc_hash::FxHashSet<VehicleId>;
#[cfg(not(feature = "fx-hash"))]
pub(crate) type VehicleSet = std::collections::HashSet<VehicleId>;

/// Lock `m`, recovering the data if a previous holder panicked.  Every
/// critical section here leaves the protected value consistent, so a
/// poisoned lock carries no torn state.
#[inline]
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
