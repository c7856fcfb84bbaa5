use std::{error::Error, fmt::Display};

use cluster::{dispatcher::DispatchError, error::CoordinationError};

use crate::barrier::BarrierError;

#[derive(Debug)]
pub enum MasterError {
    Coordination(CoordinationError),
    Dispatch(DispatchError),
    Barrier(BarrierError),
    EmptyNamespace,
    InvalidWeights(String),
}

impl Display for MasterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MasterError::Coordination(e) => write!(f, "Coordination failed : {}", e),
            MasterError::Dispatch(e) => write!(f, "Dispatch failed : {}", e),
            MasterError::Barrier(e) => write!(f, "Waiting for the phase failed : {}", e),
            MasterError::EmptyNamespace => {
                write!(f, "No generated entry to run the workload against")
            }
            MasterError::InvalidWeights(e) => write!(f, "Invalid workload weights : {}", e),
        }
    }
}

impl Error for MasterError {}

impl From<CoordinationError> for MasterError {
    fn from(value: CoordinationError) -> Self {
        MasterError::Coordination(value)
    }
}

impl From<DispatchError> for MasterError {
    fn from(value: DispatchError) -> Self {
        MasterError::Dispatch(value)
    }
}

impl From<BarrierError> for MasterError {
    fn from(value: BarrierError) -> Self {
        MasterError::Barrier(value)
    }
}
