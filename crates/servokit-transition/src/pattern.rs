//! The contract between movement patterns and the servos they move.

use std::fmt;
use std::sync::Arc;

use servokit_errors::{ServoError, ServoResult};
use servokit_meta::{Meta, keys};

use crate::token::TransitionToken;

/// What a movement pattern may observe about the servo it moves.
pub trait TransitionTarget: Send + Sync {
    /// Servo name, for logging.
    fn name(&self) -> String;

    /// Position last applied to the hardware, in the target's coordinates.
    fn actual_position(&self) -> f64;

    /// Servo metadata.
    fn meta(&self) -> Arc<Meta>;

    /// Metadata of the controller that owns the servo.
    fn controller_meta(&self) -> Arc<Meta>;
}

/// A movement pattern.
///
/// `move_to` produces the intermediate positions between the target's
/// actual position and `position` by calling
/// [`TransitionToken::supply`], and returns once the last one has been
/// supplied. When `supply` fails with `TransitionOver` the pattern must
/// return promptly; propagating the error with `?` is enough.
///
/// One instance may be attached to many servos and run for several of them
/// at once, so implementations keep per-move state on the stack.
pub trait TransitionController: Send + Sync + fmt::Debug {
    /// Move `target` to `position`, feeding intermediate positions into `token`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionOver` when the transition was stopped, or any
    /// error that prevents the pattern from running.
    fn move_to(
        &self,
        target: &dyn TransitionTarget,
        token: &TransitionToken,
        position: f64,
    ) -> ServoResult<()>;
}

/// Number of distinct positions the target can take.
///
/// Prefers `servo/precision` and falls back to `controller/precision`.
///
/// # Errors
///
/// Returns `UnsupportedCapability` if neither is declared, or
/// `InvalidValue` if the declared value is not a number.
pub fn precision_of(target: &dyn TransitionTarget) -> ServoResult<u32> {
    match target.meta().property_as::<u32>(keys::SERVO_PRECISION) {
        Err(ServoError::UnsupportedCapability { .. }) => target
            .controller_meta()
            .property_as::<u32>(keys::CONTROLLER_PRECISION),
        other => other,
    }
}
