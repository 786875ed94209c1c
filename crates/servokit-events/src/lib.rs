//! Listener fan-out for servokit.
//!
//! Servos and controllers publish [`Event`]s on an [`EventBus`]. The bus
//! owns the registration table; delivery happens on the worker threads of a
//! shared [`Dispatcher`], so the thread that triggered an event never runs
//! listener code.
//!
//! # Guarantees
//!
//! - Publishing never blocks on listener execution.
//! - A listener that panics is logged and skipped; other listeners and the
//!   dispatcher keep working.
//! - A listener that never returns holds one worker thread; the dispatcher
//!   starts more threads so other deliveries keep flowing.
//! - No ordering is guaranteed across listeners.
//! - Removing a listener that is not registered fails with `NotRegistered`.

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod bus;
pub mod dispatcher;
pub mod event;
pub mod prelude;

pub use bus::EventBus;
pub use dispatcher::{
    DEFAULT_DISPATCH_WORKERS, DispatchStats, Dispatcher, IDLE_KEEPALIVE, SHUTDOWN_GRACE,
};
pub use event::{Event, Listener};
