//! Listener that keeps every event for the final report.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use servokit::prelude::{Listener, ServoError};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoggedEvent {
    PositionChanged { source: String, position: f64 },
    ActualPositionChanged { source: String, position: f64 },
    SilentStatusChanged { source: String, active: bool },
    Exception { source: String, error: String },
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LoggedEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().clone()
    }

    fn push(&self, event: LoggedEvent) {
        tracing::debug!(?event, "event");
        self.events.lock().push(event);
    }
}

impl Listener for EventLog {
    fn position_changed(&self, source: &str, position: f64) {
        self.push(LoggedEvent::PositionChanged {
            source: source.to_owned(),
            position,
        });
    }

    fn actual_position_changed(&self, source: &str, position: f64) {
        self.push(LoggedEvent::ActualPositionChanged {
            source: source.to_owned(),
            position,
        });
    }

    fn silent_status_changed(&self, source: &str, active: bool) {
        self.push(LoggedEvent::SilentStatusChanged {
            source: source.to_owned(),
            active,
        });
    }

    fn exception(&self, source: &str, error: &ServoError) {
        self.push(LoggedEvent::Exception {
            source: source.to_owned(),
            error: error.to_string(),
        });
    }
}
