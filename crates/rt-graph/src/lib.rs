//! `rt-graph`: road segment graph, spatial snapping, and traversal.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                  |
//! |---------------|-----------------------------------------------------------|
//! | [`segment`]   | `RoadSegment`, `RoadClass`                                |
//! | [`graph`]     | `RoadGraph` (CSR + segment R-tree), `RoadGraphBuilder`    |
//! | [`position`]  | `SegmentPosition`, `SnapResult`                           |
//! | [`traversal`] | `advance` and the next-segment policy                     |
//! | [`error`]     | `GraphError`, `GraphResult<T>`                            |
//!
//! The graph is immutable once built.  Every query is synchronous and
//! allocation-light, so a single `Arc<RoadGraph>` is shared by the simulator
//! and every matcher thread.

pub mod error;
pub mod graph;
pub mod position;
pub mod segment;
pub mod traversal;


pub use error::{GraphError, GraphResult};
pub use graph::{RoadGraph, RoadGraphBuilder};
pub use position::{SegmentPosition, SnapResult};
pub use segment::{RoadClass, RoadSegment};
pub use traversal::{advance, select_next_segment, Advance};
