//! Capability metadata for servo controllers and servos.
//!
//! Hardware drivers describe what they can do through a [`Meta`] store:
//! boolean *features* (`servo/silent`, `controller/allow_disconnect`) and
//! string *properties* (`controller/precision`, `manufacturer/name`).
//! Some entries are writable; writes go through a validating
//! [`MetaWriter`] supplied by the driver.
//!
//! Querying an entry that was never declared fails with
//! `UnsupportedCapability`, which is distinct from a declared feature whose
//! value is `false`.
//!
//! # Example
//!
//! ```
//! use servokit_meta::prelude::*;
//!
//! let meta = Meta::builder()
//!     .feature(keys::SERVO_SILENT, true)
//!     .property(keys::SERVO_PRECISION, 1024)
//!     .build();
//!
//! assert!(meta.supports(keys::SERVO_SILENT));
//! assert_eq!(meta.property_as::<u32>(keys::SERVO_PRECISION).ok(), Some(1024));
//! assert!(meta.feature(keys::CONTROLLER_SILENT).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod keys;
pub mod meta;
pub mod prelude;

pub use meta::{META_PREFIX, Meta, MetaBuilder, MetaSnapshot, MetaUpdate, MetaWriter};
