//! Prelude for convenient imports.

pub use crate::keys;
pub use crate::meta::{Meta, MetaBuilder, MetaSnapshot, MetaUpdate, MetaWriter};
pub use servokit_errors::{ServoError, ServoResult};
