//! Prelude for convenient imports.
//!
//! ```
//! use servokit_errors::prelude::*;
//! ```

pub use crate::ServoResult;
pub use crate::error::{ErrorSeverity, ServoError};
