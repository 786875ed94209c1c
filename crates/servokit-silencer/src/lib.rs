//! Silent mode for servokit.
//!
//! A hardware object that supports silent mode stops its control signal
//! after a period of inactivity and briefly re-asserts it every heartbeat
//! interval. This crate splits that behaviour in two:
//!
//! - [`SilencerState`]: a pure state machine. Every operation takes the
//!   current instant explicitly, so tests drive it deterministically.
//! - [`Silencer`]: a timer thread that sleeps until the next deadline and a
//!   single dispatch worker that executes the resulting sleep/wake commands
//!   against a [`SilentTarget`]. The timer never performs hardware I/O and
//!   the worker never holds the silencer lock while doing so.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use servokit_silencer::prelude::*;
//!
//! let t0 = Instant::now();
//! let mut state = SilencerState::new(Duration::from_millis(100), Duration::from_millis(200));
//! state.set_enabled(true, t0);
//!
//! assert_eq!(state.poll(t0 + Duration::from_millis(50)), None);
//! assert_eq!(state.poll(t0 + Duration::from_millis(100)), Some(SilentCommand::Sleep));
//! assert_eq!(state.poll(t0 + Duration::from_millis(300)), Some(SilentCommand::Wake));
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod config;
pub mod prelude;
pub mod silencer;
pub mod state;

pub use config::{SilencerConfig, SilencerConfigBuilder};
pub use silencer::{SilentTarget, Silencer};
pub use state::{SilencerPhase, SilencerState, SilentCommand};
