//! Prelude for convenient imports.

pub use crate::bus::EventBus;
pub use crate::dispatcher::{
    DEFAULT_DISPATCH_WORKERS, DispatchStats, Dispatcher, IDLE_KEEPALIVE, SHUTDOWN_GRACE,
};
pub use crate::event::{Event, Listener};
pub use servokit_errors::{ServoError, ServoResult};
