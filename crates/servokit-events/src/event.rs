//! Event payloads and the listener contract.

use servokit_errors::ServoError;

/// Something a servo or controller wants its observers to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The requested position changed.
    PositionChanged {
        /// Name of the publishing servo
        source: String,
        /// New requested position
        position: f64,
    },
    /// A position was physically applied.
    ActualPositionChanged {
        /// Name of the publishing servo
        source: String,
        /// Applied position
        position: f64,
    },
    /// The control signal was stopped (`active == false`) or resumed.
    SilentStatusChanged {
        /// Name of the publishing servo or controller
        source: String,
        /// Whether the control signal is present
        active: bool,
    },
    /// An asynchronous operation failed.
    Exception {
        /// Name of the publishing servo or controller
        source: String,
        /// What went wrong
        error: ServoError,
    },
}

impl Event {
    /// Name of the object that published the event.
    pub fn source(&self) -> &str {
        match self {
            Event::PositionChanged { source, .. }
            | Event::ActualPositionChanged { source, .. }
            | Event::SilentStatusChanged { source, .. }
            | Event::Exception { source, .. } => source,
        }
    }

    /// Invoke the matching listener callback.
    pub fn deliver(&self, listener: &dyn Listener) {
        match self {
            Event::PositionChanged { source, position } => {
                listener.position_changed(source, *position);
            }
            Event::ActualPositionChanged { source, position } => {
                listener.actual_position_changed(source, *position);
            }
            Event::SilentStatusChanged { source, active } => {
                listener.silent_status_changed(source, *active);
            }
            Event::Exception { source, error } => listener.exception(source, error),
        }
    }
}

/// Observer of servo and controller events.
///
/// All callbacks default to doing nothing, so implementors only override
/// what they care about. Callbacks run on dispatcher threads.
pub trait Listener: Send + Sync {
    /// The requested position of `source` changed.
    fn position_changed(&self, source: &str, position: f64) {
        let _ = (source, position);
    }

    /// `source` physically reached `position`.
    fn actual_position_changed(&self, source: &str, position: f64) {
        let _ = (source, position);
    }

    /// The control signal of `source` was stopped or resumed.
    fn silent_status_changed(&self, source: &str, active: bool) {
        let _ = (source, active);
    }

    /// An asynchronous operation on `source` failed.
    fn exception(&self, source: &str, error: &ServoError) {
        let _ = (source, error);
    }
}
