//! `rt-core`: foundational types for the `roadtrack` engine.
//!
//! This crate is a dependency of every other `rt-*` crate.  It has no `rt-*`
//! dependencies and minimal external ones (only `rand` and `thiserror`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                                 |
//! |-----------|----------------------------------------------------------|
//! | [`ids`]   | `VehicleId`, `SegmentId`, `NodeId`                       |
//! | [`geo`]   | `GeoPoint`, `BoundingBox`, bearing helpers               |
//! | [`time`]  | `Tick`, `SimClock` (simulated milliseconds)              |
//! | [`rng`]   | `VehicleRng` (per-vehicle), `SimRng` (global)            |
//! | [`error`] | `CoreError`, `CoreResult`                                |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::{angular_difference, normalize_bearing, BoundingBox, GeoPoint};
pub use ids::{NodeId, SegmentId, VehicleId};
pub use rng::{SimRng, VehicleRng};
pub use time::{SimClock, Tick};
