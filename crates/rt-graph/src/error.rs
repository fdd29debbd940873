//! Graph-subsystem error type.

use thiserror::Error;

use rt_core::{NodeId, SegmentId};

/// Errors produced by `rt-graph`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("road graph has no segments")]
    GraphEmpty,

    #[error("segment {0} not found in graph")]
    SegmentNotFound(SegmentId),

    #[error("node {0} not found in graph")]
    NodeNotFound(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;
