//! One-step-at-a-time movement.

use servokit_errors::{ServoError, ServoResult};
use servokit_meta::keys;

use crate::pattern::{TransitionController, TransitionTarget, precision_of};
use crate::token::TransitionToken;

/// Moves the servo by the smallest step its precision allows, as fast as
/// the applier consumes positions.
///
/// With precision `n` the step is `1 / (n - 1)`. The final step lands
/// exactly on the requested position, and intermediate positions are
/// clamped to `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlTransitionController;

impl CrawlTransitionController {
    /// Create the pattern.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TransitionController for CrawlTransitionController {
    fn move_to(
        &self,
        target: &dyn TransitionTarget,
        token: &TransitionToken,
        position: f64,
    ) -> ServoResult<()> {
        let precision = precision_of(target)?;
        if precision < 2 {
            return Err(ServoError::invalid_value(
                keys::SERVO_PRECISION,
                precision.to_string(),
                "crawling needs at least two distinct positions",
            ));
        }

        let step = 1.0 / f64::from(precision - 1);
        // Rounding slack for the final step.
        let slack = step * 1e-9;
        let mut current = target.actual_position();
        tracing::trace!(servo = %target.name(), from = current, to = position, step, "crawl started");

        loop {
            let diff = position - current;
            if diff.abs() <= step / 2.0 {
                return Ok(());
            }
            let next = if diff.abs() <= step + slack {
                position
            } else {
                current + step.copysign(diff)
            };
            let next = next.clamp(0.0, 1.0);
            token.supply(next)?;
            current = next;
        }
    }
}
