//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use servokit_test_helpers::prelude::*;
//! ```

pub use crate::must::{must, must_some, must_with};
pub use crate::{assert_approx_eq, assert_monotonic};

#[cfg(feature = "mock")]
pub use crate::mock::{
    DriverProbe, PanickingListener, RecordingDriver, RecordingListener, StepPattern,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
