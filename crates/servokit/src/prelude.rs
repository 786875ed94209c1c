//! Common imports for servokit users.

pub use crate::config::{
    ControllerConfig, ServoConfig, SilentConfig, TransformConfig, TransitionConfig,
};
pub use crate::controller::{ControllerOptions, ServoController};
pub use crate::hardware::ControllerDriver;
pub use crate::io::Lifecycle;
pub use crate::null::NullController;
pub use crate::servo::{Servo, ServoPhase};
pub use crate::transform::{CoordinateTransform, Cosine, Limit, Linear, Reverser, Scale, Sine};
pub use servokit_errors::{ServoError, ServoResult};
pub use servokit_events::{Event, Listener};
pub use servokit_meta::{Meta, keys};
pub use servokit_silencer::{SilencerConfig, SilencerPhase};
pub use servokit_transition::{
    CrawlTransitionController, LinearTransitionController, TransitionController,
    TransitionOutcome, TransitionStatus, TransitionTarget, TransitionToken,
};
