//! Smooth-transition building blocks for servokit.
//!
//! A transition moves a servo from its actual position to a requested one
//! through a series of intermediate positions. Three pieces cooperate:
//!
//! - [`TransitionToken`]: single-slot blocking handoff between the pattern
//!   that produces positions and the loop that applies them, with a stop
//!   signal observable from both ends.
//! - [`TransitionController`]: a movement pattern. It reads the target's
//!   actual position and metadata, then [`supply`](TransitionToken::supply)s
//!   intermediate positions.
//! - [`TransitionStatus`] / [`TransitionCompleter`]: the completion record
//!   handed to the caller. Only the holder of the completer can finish it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use servokit_transition::prelude::*;
//!
//! let token = Arc::new(TransitionToken::new());
//! let producer = {
//!     let token = Arc::clone(&token);
//!     thread::spawn(move || {
//!         for step in [0.25, 0.5, 0.75] {
//!             token.supply(step)?;
//!         }
//!         token.finish()
//!     })
//! };
//!
//! let mut applied = Vec::new();
//! while let Ok(position) = token.consume() {
//!     applied.push(position);
//! }
//! assert_eq!(applied, vec![0.25, 0.5, 0.75]);
//! assert!(matches!(producer.join(), Ok(Ok(()))));
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic
)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod crawl;
pub mod linear;
pub mod pattern;
pub mod prelude;
pub mod status;
pub mod token;

pub use crawl::CrawlTransitionController;
pub use linear::LinearTransitionController;
pub use pattern::{TransitionController, TransitionTarget, precision_of};
pub use status::{TransitionCompleter, TransitionOutcome, TransitionStatus, transition_status};
pub use token::TransitionToken;
