//! Prelude for convenient imports.

pub use crate::config::{SilencerConfig, SilencerConfigBuilder};
pub use crate::silencer::{SilentTarget, Silencer};
pub use crate::state::{SilencerPhase, SilencerState, SilentCommand};
pub use servokit_errors::{ServoError, ServoResult};
