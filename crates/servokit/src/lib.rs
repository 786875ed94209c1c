//! Uniform control of hobby and industrial servo controllers.
//!
//! A [`ServoController`] wraps a vendor [`ControllerDriver`] and hands out
//! [`Servo`]s. Servos can be positioned directly, moved smoothly by an
//! attached [`TransitionController`](servokit_transition::TransitionController),
//! stacked behind coordinate transformers, and de-energized when idle by
//! silent mode. Observers subscribe to position, silent-status and error
//! events through [`Listener`](servokit_events::Listener)s.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use servokit::prelude::*;
//!
//! # fn main() -> ServoResult<()> {
//! let controller = ServoController::new(
//!     "demo",
//!     NullController::new().with_write_delay(Duration::ZERO),
//! )?;
//! controller.open()?;
//!
//! let servo = controller.servo("0")?;
//! let reversed = servo.transformed(Reverser)?;
//! reversed.attach(Some(Arc::new(CrawlTransitionController::new())), false)?;
//!
//! let status = reversed.set_position(0.25)?;
//! assert!(status.wait().is_ok());
//! assert!((servo.actual_position() - 0.75).abs() < 1e-9);
//!
//! controller.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic
)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod config;
pub mod controller;
pub mod hardware;
mod io;
mod mover;
pub mod null;
pub mod prelude;
pub mod servo;
pub mod transform;
pub mod write_policy;

pub use config::{ControllerConfig, ServoConfig, SilentConfig, TransformConfig, TransitionConfig};
pub use controller::{ControllerOptions, ServoController};
pub use hardware::ControllerDriver;
pub use io::Lifecycle;
pub use null::NullController;
pub use servo::{NEUTRAL_POSITION, Servo, ServoPhase};
pub use transform::{CoordinateTransform, Cosine, Limit, Linear, Reverser, Scale, Sine};
pub use write_policy::WritePolicy;

pub use servokit_errors as errors;
pub use servokit_events as events;
pub use servokit_meta as meta;
pub use servokit_silencer as silencer;
pub use servokit_transition as transition;
