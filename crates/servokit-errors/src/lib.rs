//! Error types for the servokit servo abstraction layer.
//!
//! Every servokit crate reports failures through [`ServoError`]. The enum is
//! `Clone` because a single failure often has more than one observer: the
//! status handle returned to the caller that started a transition, and the
//! exception notification delivered to every registered listener.
//!
//! # Classification
//!
//! - Caller errors (`NotEnabled`, `NotInitialized`, `StackConflict`, ...) are
//!   surfaced synchronously to the caller that made the mistake.
//! - Hardware errors (`HardwareIo`) are surfaced synchronously on the direct
//!   positioning path and through notifications on asynchronous paths.
//! - `TransitionOver` is an internal signal of the handoff channel and is
//!   translated into cancellation bookkeeping before reaching users.
//!
//! # Example
//!
//! ```
//! use servokit_errors::prelude::*;
//!
//! fn check(position: f64) -> ServoResult<f64> {
//!     if !(0.0..=1.0).contains(&position) {
//!         return Err(ServoError::out_of_range(position));
//!     }
//!     Ok(position)
//! }
//!
//! assert!(check(0.5).is_ok());
//! assert!(check(1.5).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod prelude;

pub use error::{ErrorSeverity, ServoError};

/// A specialized `Result` type for servokit operations.
pub type ServoResult<T> = std::result::Result<T, ServoError>;
