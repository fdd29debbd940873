use rt_core::VehicleId;
use rt_graph::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("vehicle {0} already exists")]
    DuplicateVehicle(VehicleId),

    #[error("road graph error: {0}")]
    Graph(#[from] GraphError),
}

pub type SimResult<T> = Result<T, SimError>;
