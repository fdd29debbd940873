//! TTL-bounded spatial cache of recent matches.

use std::collections::HashMap;
use std::sync::Mutex;

use rt_core::GeoPoint;

use crate::sync::lock;
use crate::Geohash;

/// A cached match result.  Immutable once written.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheEntry {
    pub point: GeoPoint,
    pub heading: Option<f64>,
    pub inserted_ms: u64,
}

/// Matched points keyed by the geohash of the query coordinate.
///
/// The precision is fixed at construction and used for every read and
/// write.  Entries are served while `now − inserted < ttl`; expired entries
/// are dropped lazily on read and in bulk by [`sweep`](Self::sweep).
pub struct SpatialCache {
    precision: u8,
    ttl_ms: u64,
    entries: Mutex<HashMap<Geohash, CacheEntry>>,
}

impl SpatialCache {
    pub fn new(precision: u8, ttl_ms: u64) -> Self {
        Self { precision, ttl_ms, entries: Mutex::new(HashMap::new()) }
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Cache key for `point`.
    pub fn key(&self, point: GeoPoint) -> Geohash {
        Geohash::encode(point, self.precision)
    }

    /// The live entry for `point`'s cell, if any.
    pub fn get(&self, point: GeoPoint, now_ms: u64) -> Option<CacheEntry> {
        let key = self.key(point);
        let mut entries = lock(&self.entries);
        match entries.get(&key) {
            Some(e) if now_ms.saturating_sub(e.inserted_ms) < self.ttl_ms => Some(*e),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a match for `point`'s cell, replacing any previous entry.
    pub fn put(&self, point: GeoPoint, matched: GeoPoint, heading: Option<f64>, now_ms: u64) {
        let entry = CacheEntry { point: matched, heading, inserted_ms: now_ms };
        lock(&self.entries).insert(self.key(point), entry);
    }

    /// Remove every expired entry.  Returns how many were dropped.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, e| now_ms.saturating_sub(e.inserted_ms) < self.ttl_ms);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}
