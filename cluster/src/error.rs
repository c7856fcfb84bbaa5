use std::error::Error;
use std::fmt::Display;

#[derive(Clone, Debug)]
pub enum CoordinationError {
    Unavailable(String),
    Internal(String),
}

impl Display for CoordinationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinationError::Unavailable(msg) => {
                write!(f, "Coordination substrate unavailable : {}", msg)
            }
            CoordinationError::Internal(msg) => {
                write!(f, "Coordination substrate internal error : {}", msg)
            }
        }
    }
}

impl Error for CoordinationError {}
