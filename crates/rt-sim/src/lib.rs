//! `rt-sim`: moves simulated vehicles along a road graph and feeds their
//! positions to subscribers.
//!
//! # Tick loop
//!
//! ```text
//! for each tick:
//!   on_tick_start(tick, now_ms)
//!   for each active vehicle, ascending VehicleId:
//!     ① U-turn:  a vehicle stopped at a dead end turns onto the
//!                 reverse twin, if the road has one
//!     ② Speed:   base speed ± jitter, capped at the road-class speed
//!     ③ Advance: traversal::advance by speed × tick, preferring the
//!                 current heading at junctions
//!     ④ Emit:    on_position_update (+ on_dead_end when stopped)
//!   on_tick_end(tick, emitted)
//! ```
//!
//! [`MatchingObserver`] is the subscriber that forwards each tick's
//! positions into an `rt_match::MatchController`.
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                   |
//! |------------|----------------------------------------------------------|
//! | `parallel` | Each tick's batch is matched on Rayon's thread pool.     |
//! | `fx-hash`  | Forwarded to `rt-match`.                                 |
//! | `serde`    | Derives on config and state types.                       |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! let mut sim = SimBuilder::new(graph.clone())
//!     .config(SimConfig { tick_interval_ms: 1_000, ..Default::default() })
//!     .vehicle_near(VehicleId(0), VehicleKind::Car, start)
//!     .build()?;
//! let mut bridge = MatchingObserver::new(controller.clone());
//! sim.run_ticks(60, &mut bridge)?;
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod matching;
pub mod observer;
pub mod sim;
pub mod vehicle;


pub use builder::SimBuilder;
pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use matching::MatchingObserver;
pub use observer::{NoopObserver, PositionUpdate, SimObserver};
pub use sim::Simulator;
pub use vehicle::{VehicleKind, VehicleMovementState};
