//! Single-slot blocking handoff with cooperative stop.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use servokit_errors::{ServoError, ServoResult};

#[derive(Debug, Default)]
struct Slot {
    value: Option<f64>,
    stopped: bool,
}

/// Handoff channel between a transition pattern and the position applier.
///
/// The slot is either empty, holds one unconsumed position, or is stopped.
/// Once stopped it never accepts or yields another value: every pending and
/// future `supply`/`consume` fails with `TransitionOver`.
#[derive(Debug, Default)]
pub struct TransitionToken {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl TransitionToken {
    /// Create an empty, running token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand over the next position, waiting while the previous one is unconsumed.
    ///
    /// # Errors
    ///
    /// Returns `TransitionOver` if the token is stopped before or while waiting.
    pub fn supply(&self, position: f64) -> ServoResult<()> {
        let mut slot = self.slot.lock();
        while slot.value.is_some() && !slot.stopped {
            self.changed.wait(&mut slot);
        }
        if slot.stopped {
            return Err(ServoError::TransitionOver);
        }
        slot.value = Some(position);
        self.changed.notify_all();
        Ok(())
    }

    /// Take the next position, waiting while the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns `TransitionOver` if the token is stopped before or while waiting,
    /// even if a value was still pending.
    pub fn consume(&self) -> ServoResult<f64> {
        let mut slot = self.slot.lock();
        loop {
            if slot.stopped {
                return Err(ServoError::TransitionOver);
            }
            if let Some(position) = slot.value.take() {
                self.changed.notify_all();
                return Ok(position);
            }
            self.changed.wait(&mut slot);
        }
    }

    /// Stop the transition. Idempotent; wakes every waiter on both ends.
    pub fn stop(&self) {
        let mut slot = self.slot.lock();
        slot.stopped = true;
        self.changed.notify_all();
    }

    /// Producer-side completion: wait until the last supplied position has
    /// been consumed, then stop.
    ///
    /// # Errors
    ///
    /// Returns `TransitionOver` if the token was stopped by someone else
    /// before the slot drained.
    pub fn finish(&self) -> ServoResult<()> {
        let mut slot = self.slot.lock();
        while slot.value.is_some() && !slot.stopped {
            self.changed.wait(&mut slot);
        }
        if slot.stopped {
            return Err(ServoError::TransitionOver);
        }
        slot.stopped = true;
        self.changed.notify_all();
        Ok(())
    }

    /// Whether the token has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.slot.lock().stopped
    }

    /// Sleep for up to `timeout`, returning early when the token is stopped.
    ///
    /// Returns `true` if the token is stopped. Patterns use this between
    /// steps so cancellation is observed without waiting out the delay.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while !slot.stopped {
            if self.changed.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.stopped
    }
}
