//! Write-once completion record for a positioning request.
//!
//! [`transition_status`] returns a pair. The [`TransitionStatus`] side is
//! cloneable and goes to whoever wants to wait; the [`TransitionCompleter`]
//! side is not cloneable and stays with the code that runs the transition,
//! so nothing else can complete it. A completer dropped without completing
//! records the transition as cancelled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use servokit_errors::{ServoError, ServoResult};

#[derive(Debug, Default)]
struct Shared {
    outcome: Mutex<Option<TransitionOutcome>>,
    done: Condvar,
}

impl Shared {
    fn complete(&self, result: ServoResult<()>) {
        let mut outcome = self.outcome.lock();
        if outcome.is_none() {
            *outcome = Some(TransitionOutcome { result });
            self.done.notify_all();
        }
    }
}

/// Final result of a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    result: ServoResult<()>,
}

impl TransitionOutcome {
    /// Whether the servo reached the requested position.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Why the transition failed, if it did.
    pub fn cause(&self) -> Option<&ServoError> {
        self.result.as_ref().err()
    }

    /// Convert into a plain result.
    ///
    /// # Errors
    ///
    /// Returns the failure cause.
    pub fn into_result(self) -> ServoResult<()> {
        self.result
    }
}

/// Create a linked completer/status pair.
pub fn transition_status() -> (TransitionCompleter, TransitionStatus) {
    let shared = Arc::new(Shared::default());
    (
        TransitionCompleter {
            shared: Some(Arc::clone(&shared)),
        },
        TransitionStatus { shared },
    )
}

/// Handle for awaiting the end of a transition.
#[derive(Debug, Clone)]
pub struct TransitionStatus {
    shared: Arc<Shared>,
}

impl TransitionStatus {
    /// A status that is already complete.
    #[must_use]
    pub fn completed(result: ServoResult<()>) -> Self {
        let shared = Arc::new(Shared::default());
        shared.complete(result);
        Self { shared }
    }

    /// Whether the transition has finished.
    pub fn is_complete(&self) -> bool {
        self.shared.outcome.lock().is_some()
    }

    /// The outcome, if the transition has finished.
    pub fn try_outcome(&self) -> Option<TransitionOutcome> {
        self.shared.outcome.lock().clone()
    }

    /// Block until the transition finishes.
    pub fn wait(&self) -> TransitionOutcome {
        let mut outcome = self.shared.outcome.lock();
        loop {
            if let Some(done) = outcome.as_ref() {
                return done.clone();
            }
            self.shared.done.wait(&mut outcome);
        }
    }

    /// Block until the transition finishes or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the transition is still running after `timeout`.
    /// This is distinct from a transition that finished with a failure,
    /// which is reported inside the returned outcome.
    pub fn wait_timeout(&self, timeout: Duration) -> ServoResult<TransitionOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.shared.outcome.lock();
        loop {
            if let Some(done) = outcome.as_ref() {
                return Ok(done.clone());
            }
            if self
                .shared
                .done
                .wait_until(&mut outcome, deadline)
                .timed_out()
            {
                return outcome
                    .as_ref()
                    .cloned()
                    .ok_or_else(|| ServoError::timeout(timeout));
            }
        }
    }
}

/// Exclusive right to complete a [`TransitionStatus`].
#[derive(Debug)]
#[must_use = "dropping a completer records the transition as cancelled"]
pub struct TransitionCompleter {
    shared: Option<Arc<Shared>>,
}

impl TransitionCompleter {
    /// Record the outcome and wake every waiter.
    pub fn complete(mut self, result: ServoResult<()>) {
        if let Some(shared) = self.shared.take() {
            shared.complete(result);
        }
    }
}

impl Drop for TransitionCompleter {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.complete(Err(ServoError::TransitionCancelled));
        }
    }
}
