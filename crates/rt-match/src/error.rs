//! Error types for rt-match.

use rt_core::CoreError;
use rt_graph::GraphError;
use thiserror::Error;

/// Errors surfaced by the matcher and controller.
///
/// Provider failures never appear here: they are absorbed into the local
/// fallback.  A match below the confidence threshold is not an error either;
/// it is reported as [`MatchOutcome::Unmatched`](crate::MatchOutcome).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("invalid coordinates: lat {lat}, lon {lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("no road data available for matching")]
    NoRoadData,

    #[error("match configuration error: {0}")]
    Config(String),

    #[error("road graph error: {0}")]
    Graph(GraphError),
}

impl From<GraphError> for MatchError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::GraphEmpty => MatchError::NoRoadData,
            other => MatchError::Graph(other),
        }
    }
}

impl From<CoreError> for MatchError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidCoordinates { lat, lon } => MatchError::InvalidCoordinates { lat, lon },
        }
    }
}

pub type MatchResult<T> = Result<T, MatchError>;

/// Failure of a routing-provider call.  Always recoverable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider transport failure: {0}")]
    Transport(String),

    #[error("provider call timed out")]
    Timeout,

    #[error("invalid provider request: {0}")]
    InvalidRequest(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
