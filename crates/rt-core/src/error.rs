//! Core error type.
//!
//! Sub-crates define their own error enums and convert `CoreError` into them
//! via `From` impls where a core error can surface.

use thiserror::Error;

/// The base error type for `rt-core`.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum CoreError {
    #[error("invalid coordinates: lat {lat}, lon {lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },
}

/// Shorthand result type for `rt-core`.
pub type CoreResult<T> = Result<T, CoreError>;
