//! The servokit error enum and its severity classification.

use core::fmt;
use std::time::Duration;

/// Errors reported by servos, controllers, transitions and silencers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServoError {
    /// Positioning was attempted on a disabled servo.
    #[error("Servo '{servo}' is disabled")]
    NotEnabled {
        /// Servo name
        servo: String,
    },

    /// The object has not been opened yet, or has already been closed.
    #[error("{what} is not initialized")]
    NotInitialized {
        /// Description of the object
        what: String,
    },

    /// `open()` was called on an object that is not in its initial state.
    #[error("{what} is already initialized")]
    AlreadyInitialized {
        /// Description of the object
        what: String,
    },

    /// A transition controller is already attached lower in the servo stack.
    #[error("Transition controller already attached to servo '{servo}' in this stack")]
    StackConflict {
        /// Name of the servo that already has a controller attached
        servo: String,
    },

    /// The handoff channel has been stopped.
    #[error("Transition is over")]
    TransitionOver,

    /// The transition was cancelled before it completed.
    #[error("Transition was cancelled")]
    TransitionCancelled,

    /// The transition pattern failed.
    #[error("Transition failed: {reason}")]
    TransitionFailed {
        /// Failure description
        reason: String,
    },

    /// Communication with the hardware failed.
    #[error("Hardware I/O error on {device}: {message}")]
    HardwareIo {
        /// Device identifier (port name or servo name)
        device: String,
        /// Error message
        message: String,
    },

    /// A listener was removed that had never been added.
    #[error("Listener is not registered")]
    NotRegistered,

    /// The metadata does not declare the requested feature or property.
    #[error("Unsupported capability: {key}")]
    UnsupportedCapability {
        /// Feature or property key
        key: String,
    },

    /// The metadata entry exists but has no writer.
    #[error("Metadata entry '{key}' is read-only")]
    ReadOnly {
        /// Feature or property key
        key: String,
    },

    /// A metadata value was rejected.
    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        /// Feature or property key
        key: String,
        /// Rejected value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// A position outside of `[0.0, 1.0]` was requested.
    #[error("Position {position} is outside of 0.0...1.0 range")]
    PositionOutOfRange {
        /// Rejected position
        position: f64,
    },

    /// A servo id could not be resolved.
    #[error("Invalid servo id '{id}': {reason}")]
    InvalidServoId {
        /// Requested id
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Why it was rejected
        reason: String,
    },

    /// A bounded wait elapsed before the awaited event happened.
    #[error("Timed out after {waited:?}")]
    Timeout {
        /// How long the caller waited
        waited: Duration,
    },

    /// A background thread could not be started.
    #[error("Failed to spawn thread '{name}': {reason}")]
    ThreadSpawn {
        /// Thread name
        name: String,
        /// OS error description
        reason: String,
    },
}

impl ServoError {
    /// Create a `NotEnabled` error for the named servo.
    #[must_use]
    pub fn not_enabled(servo: impl Into<String>) -> Self {
        Self::NotEnabled {
            servo: servo.into(),
        }
    }

    /// Create a `NotInitialized` error.
    #[must_use]
    pub fn not_initialized(what: impl Into<String>) -> Self {
        Self::NotInitialized { what: what.into() }
    }

    /// Create an `AlreadyInitialized` error.
    #[must_use]
    pub fn already_initialized(what: impl Into<String>) -> Self {
        Self::AlreadyInitialized { what: what.into() }
    }

    /// Create a `StackConflict` error naming the servo that owns the controller.
    #[must_use]
    pub fn stack_conflict(servo: impl Into<String>) -> Self {
        Self::StackConflict {
            servo: servo.into(),
        }
    }

    /// Create a `TransitionFailed` error.
    #[must_use]
    pub fn transition_failed(reason: impl Into<String>) -> Self {
        Self::TransitionFailed {
            reason: reason.into(),
        }
    }

    /// Create a `HardwareIo` error from any displayable cause.
    #[must_use]
    pub fn hardware_io(device: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::HardwareIo {
            device: device.into(),
            message: cause.to_string(),
        }
    }

    /// Create an `UnsupportedCapability` error.
    #[must_use]
    pub fn unsupported(key: impl Into<String>) -> Self {
        Self::UnsupportedCapability { key: key.into() }
    }

    /// Create a `ReadOnly` error.
    #[must_use]
    pub fn read_only(key: impl Into<String>) -> Self {
        Self::ReadOnly { key: key.into() }
    }

    /// Create an `InvalidValue` error.
    #[must_use]
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a `PositionOutOfRange` error.
    #[must_use]
    pub fn out_of_range(position: f64) -> Self {
        Self::PositionOutOfRange { position }
    }

    /// Create an `InvalidServoId` error.
    #[must_use]
    pub fn invalid_servo_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidServoId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an `InvalidConfiguration` error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Create a `Timeout` error.
    #[must_use]
    pub fn timeout(waited: Duration) -> Self {
        Self::Timeout { waited }
    }

    /// Create a `ThreadSpawn` error.
    #[must_use]
    pub fn thread_spawn(name: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::ThreadSpawn {
            name: name.into(),
            reason: cause.to_string(),
        }
    }

    /// Get the error severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TransitionOver | Self::TransitionCancelled => ErrorSeverity::Info,
            Self::NotEnabled { .. }
            | Self::NotInitialized { .. }
            | Self::AlreadyInitialized { .. }
            | Self::StackConflict { .. }
            | Self::NotRegistered
            | Self::UnsupportedCapability { .. }
            | Self::ReadOnly { .. }
            | Self::InvalidValue { .. }
            | Self::PositionOutOfRange { .. }
            | Self::InvalidServoId { .. }
            | Self::InvalidConfiguration { .. }
            | Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::HardwareIo { .. } | Self::TransitionFailed { .. } => ErrorSeverity::Error,
            Self::ThreadSpawn { .. } => ErrorSeverity::Critical,
        }
    }

    /// Check if this error was caused by the caller misusing the API.
    pub fn is_caller_error(&self) -> bool {
        self.severity() == ErrorSeverity::Warning && !matches!(self, Self::Timeout { .. })
    }

    /// Check if this error ends a transition without being a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::TransitionOver | Self::TransitionCancelled)
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, no action required
    Info = 0,
    /// Warning, the caller should fix its request
    Warning = 1,
    /// Error, operation failed
    Error = 2,
    /// Critical, the system may be in an unstable state
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
    }

    #[test]
    fn test_caller_errors() {
        assert!(ServoError::not_enabled("0").is_caller_error());
        assert!(ServoError::stack_conflict("1").is_caller_error());
        assert!(ServoError::NotRegistered.is_caller_error());
        assert!(!ServoError::timeout(Duration::from_millis(5)).is_caller_error());
        assert!(!ServoError::hardware_io("/dev/null", "broken pipe").is_caller_error());
    }

    #[test]
    fn test_cancellation() {
        assert!(ServoError::TransitionOver.is_cancellation());
        assert!(ServoError::TransitionCancelled.is_cancellation());
        assert!(!ServoError::transition_failed("boom").is_cancellation());
    }
}
