//! Synthetic downtown grid.
//!
//! Three east-west streets crossed by three north-south streets, every block
//! two-way, loosely laid over downtown Mobile, Alabama.  A one-way service
//! lane leaves the south-east corner and dead-ends.

use rt_core::{GeoPoint, NodeId};
use rt_graph::{RoadClass, RoadGraph, RoadGraphBuilder, GraphResult};

const ORIGIN_LAT: f64 = 30.688;
const ORIGIN_LON: f64 = -88.046;
const BLOCK_DEG:  f64 = 0.002;

const STREETS: [(&str, RoadClass); 3] = [
    ("Government St", RoadClass::Primary),
    ("Dauphin St",    RoadClass::Secondary),
    ("St Francis St", RoadClass::Residential),
];

const AVENUES: [(&str, RoadClass); 3] = [
    ("Water St",   RoadClass::Primary),
    ("Royal St",   RoadClass::Secondary),
    ("Conception St", RoadClass::Residential),
];

/// Build the grid.  Returns the graph and its corner junctions
/// `[south_west, south_east, north_west, north_east]`.
pub fn build_city() -> GraphResult<(RoadGraph, [NodeId; 4])> {
    let mut b = RoadGraphBuilder::new();

    let mut grid = [[NodeId::INVALID; 3]; 3];
    for (row, nodes) in grid.iter_mut().enumerate() {
        for (col, node) in nodes.iter_mut().enumerate() {
            *node = b.add_node(GeoPoint::new(
                ORIGIN_LAT + row as f64 * BLOCK_DEG,
                ORIGIN_LON + col as f64 * BLOCK_DEG,
            ));
        }
    }

    for (row, (name, class)) in STREETS.iter().enumerate() {
        for col in 0..2 {
            b.add_road(grid[row][col], grid[row][col + 1], *name, *class)?;
        }
    }
    for (col, (name, class)) in AVENUES.iter().enumerate() {
        for row in 0..2 {
            b.add_road(grid[row][col], grid[row + 1][col], *name, *class)?;
        }
    }

    let lane_end = b.add_node(GeoPoint::new(ORIGIN_LAT - BLOCK_DEG, ORIGIN_LON + 2.5 * BLOCK_DEG));
    b.add_segment(grid[0][2], lane_end, "Dock Ln", RoadClass::Service)?;

    let corners = [grid[0][0], grid[0][2], grid[2][0], grid[2][2]];
    Ok((b.build(), corners))
}
