//! `rt-match`: map matching and the throttled, cached, per-vehicle
//! exclusive matching pipeline.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`provider`]   | `RoutingProvider` trait, `GraphProvider` (local stand-in)  |
//! | [`matcher`]    | `MapMatcher`: single-point and two-point matching          |
//! | [`geohash`]    | `Geohash` cache keys                                       |
//! | [`cache`]      | `SpatialCache`, TTL-bounded and geohash-keyed            |
//! | [`pending`]    | `PendingSet` + RAII `PendingGuard`                         |
//! | [`trail`]      | `Trail`, `TrailStore`: capped per-vehicle history         |
//! | [`controller`] | `MatchController`: the per-fix decision pipeline          |
//! | [`config`]     | `MatchConfig`                                              |
//! | [`error`]      | `MatchError`, `ProviderError`                              |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                   |
//! |------------|----------------------------------------------------------|
//! | `parallel` | `ingest_batch` runs on Rayon's thread pool.              |
//! | `fx-hash`  | FxHash for per-vehicle maps.                             |
//! | `serde`    | Derives on config and result types.                      |

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod geohash;
pub mod matcher;
pub mod pending;
pub mod provider;
pub mod trail;

mod sync;

#[cfg(test)]
mod tests;

pub use cache::{CacheEntry, SpatialCache};
pub use config::MatchConfig;
pub use controller::{Accepted, ControllerStats, Disposition, MatchController};
pub use error::{MatchError, MatchResult, ProviderError, ProviderResult};
pub use geohash::Geohash;
pub use matcher::{local_confidence, MapMatcher, MatchOutcome, MatchSource, MatchedPoint};
pub use pending::{PendingGuard, PendingSet};
pub use provider::{
    GraphProvider, Geometries, MatchOptions, MatchResponse, RoutingProvider, SnapOptions,
    SnapResponse,
};
pub use trail::{PointKind, Trail, TrailPoint, TrailStore};
