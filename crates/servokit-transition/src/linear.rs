//! Fixed-duration linear movement.

use std::time::Duration;

use servokit_errors::{ServoError, ServoResult};

use crate::pattern::{TransitionController, TransitionTarget};
use crate::token::TransitionToken;

/// Interpolates linearly from the actual position to the requested one in
/// `steps` equal increments spread over `duration`.
#[derive(Debug, Clone, Copy)]
pub struct LinearTransitionController {
    duration: Duration,
    steps: u32,
}

impl LinearTransitionController {
    /// Create the pattern.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `steps` is zero.
    pub fn new(duration: Duration, steps: u32) -> ServoResult<Self> {
        if steps == 0 {
            return Err(ServoError::invalid_config(
                "linear transition needs at least one step",
            ));
        }
        Ok(Self { duration, steps })
    }

    /// Total duration of a move.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of increments per move.
    pub fn steps(&self) -> u32 {
        self.steps
    }
}

impl TransitionController for LinearTransitionController {
    fn move_to(
        &self,
        target: &dyn TransitionTarget,
        token: &TransitionToken,
        position: f64,
    ) -> ServoResult<()> {
        let start = target.actual_position();
        let pause = self.duration / self.steps;
        let total = f64::from(self.steps);

        for i in 1..=self.steps {
            let next = if i == self.steps {
                position
            } else {
                start + (position - start) * f64::from(i) / total
            };
            token.supply(next)?;
            if i < self.steps && token.wait_stopped(pause) {
                return Err(ServoError::TransitionOver);
            }
        }
        Ok(())
    }
}
