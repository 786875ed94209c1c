//! Error types for servoctl

use servokit::prelude::ServoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Servo not found: {0}")]
    ServoNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Controller error: {0}")]
    Servo(#[source] ServoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ServoError> for CliError {
    fn from(error: ServoError) -> Self {
        match error {
            ServoError::InvalidServoId { .. } => Self::ServoNotFound(error.to_string()),
            ServoError::InvalidConfiguration { .. } | ServoError::PositionOutOfRange { .. } => {
                Self::Validation(error.to_string())
            }
            other => Self::Servo(other),
        }
    }
}
