//! Matching configuration.

use rt_core::BoundingBox;

use crate::{MatchError, MatchResult};

/// Tunables for [`MatchController`](crate::MatchController) and
/// [`MapMatcher`](crate::MapMatcher).
///
/// Typically deserialised from the application's config file (feature
/// `serde`) and checked once with [`validate`](Self::validate).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatchConfig {
    /// Minimum interval between two accepted matches for one vehicle.
    pub throttle_window_ms: u64,

    /// Age after which a cache entry is no longer served.
    pub cache_ttl_ms: u64,

    /// Interval of the background sweep that drops expired cache entries.
    /// Must be at least `cache_ttl_ms`.
    pub cache_sweep_interval_ms: u64,

    /// Geohash length (1..=12) used for both cache reads and writes.
    /// 7 characters ≈ 150 m × 150 m cells.
    pub geohash_precision: u8,

    /// A single-point match is adopted only when its confidence exceeds this.
    pub min_snap_confidence: f64,

    /// A two-point path match is adopted only when its confidence exceeds
    /// this; otherwise the single-point path is tried.
    pub min_path_confidence: f64,

    /// Search radius for snapping, metres.  Local confidence falls linearly
    /// from 1 at the road to 0 at this distance.
    pub snap_radius_m: f64,

    /// Per-vehicle trail capacity.
    pub max_trail_len: usize,

    /// Region where vehicles are expected to be.  When set, a fix outside it
    /// whose lat/lon-swapped reading falls inside is corrected.
    pub plausible_region: Option<BoundingBox>,

    /// Consult the routing provider (when one is attached).
    pub use_remote: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            throttle_window_ms:      3_000,
            cache_ttl_ms:            30_000,
            cache_sweep_interval_ms: 60_000,
            geohash_precision:       7,
            min_snap_confidence:     0.3,
            min_path_confidence:     0.6,
            snap_radius_m:           50.0,
            max_trail_len:           100,
            plausible_region:        None,
            use_remote:              true,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> MatchResult<()> {
        if !(1..=12).contains(&self.geohash_precision) {
            return Err(MatchError::Config(format!(
                "geohash_precision must be in 1..=12, got {}",
                self.geohash_precision
            )));
        }
        for (name, v) in [
            ("min_snap_confidence", self.min_snap_confidence),
            ("min_path_confidence", self.min_path_confidence),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(MatchError::Config(format!("{name} must be in [0, 1], got {v}")));
            }
        }
        if !(self.snap_radius_m.is_finite() && self.snap_radius_m > 0.0) {
            return Err(MatchError::Config(format!(
                "snap_radius_m must be positive, got {}",
                self.snap_radius_m
            )));
        }
        if self.max_trail_len == 0 {
            return Err(MatchError::Config("max_trail_len must be at least 1".into()));
        }
        if self.cache_ttl_ms == 0 {
            return Err(MatchError::Config("cache_ttl_ms must be positive".into()));
        }
        if self.cache_sweep_interval_ms < self.cache_ttl_ms {
            return Err(MatchError::Config(format!(
                "cache_sweep_interval_ms ({}) must not be shorter than cache_ttl_ms ({})",
                self.cache_sweep_interval_ms, self.cache_ttl_ms
            )));
        }
        if let Some(r) = self.plausible_region {
            if !(r.min_lat <= r.max_lat && r.min_lon <= r.max_lon) {
                return Err(MatchError::Config(format!("plausible_region is inverted: {r:?}")));
            }
        }
        Ok(())
    }
}
