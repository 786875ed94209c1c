//! Runs transitions: one pattern thread per transition feeding positions to
//! the servo's worker thread through a [`TransitionToken`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use servokit_errors::{ServoError, ServoResult};
use servokit_events::Event;
use servokit_transition::{TransitionCompleter, TransitionController, TransitionToken};

use crate::servo::Servo;

/// One pending or running transition.
pub(crate) struct TransitionDriver {
    servo: Servo,
    controller: Arc<dyn TransitionController>,
    token: Arc<TransitionToken>,
    position: f64,
    completer: TransitionCompleter,
}

impl TransitionDriver {
    pub(crate) fn new(
        servo: Servo,
        controller: Arc<dyn TransitionController>,
        token: Arc<TransitionToken>,
        position: f64,
        completer: TransitionCompleter,
    ) -> Self {
        Self {
            servo,
            controller,
            token,
            position,
            completer,
        }
    }

    /// Complete without running.
    pub(crate) fn abort(self, error: ServoError) {
        self.token.stop();
        self.servo.release(&self.token);
        tracing::warn!(servo = %self.servo.name(), %error, "transition not started");
        self.completer.complete(Err(error));
    }

    /// Run the transition to completion on the current thread.
    pub(crate) fn run(self) {
        let Self {
            servo,
            controller,
            token,
            position,
            completer,
        } = self;

        let result = if token.is_stopped() {
            Err(ServoError::TransitionCancelled)
        } else {
            tracing::debug!(servo = %servo.name(), position, ?controller, "transition started");
            drive(&servo, controller.as_ref(), &token, position)
        };
        servo.release(&token);

        match &result {
            Ok(()) => tracing::debug!(servo = %servo.name(), position, "transition complete"),
            Err(error) if error.is_cancellation() => {
                tracing::debug!(servo = %servo.name(), position, "transition cancelled");
            }
            Err(error) => {
                tracing::warn!(servo = %servo.name(), position, %error, "transition failed");
                servo.publish(Event::Exception {
                    source: servo.name().to_owned(),
                    error: error.clone(),
                });
            }
        }
        completer.complete(result);
    }
}

fn pattern_panicked() -> ServoError {
    ServoError::transition_failed("transition pattern panicked")
}

fn drive(
    servo: &Servo,
    controller: &dyn TransitionController,
    token: &TransitionToken,
    position: f64,
) -> ServoResult<()> {
    thread::scope(|scope| {
        let pattern = thread::Builder::new()
            .name(format!("transition-{}", servo.name()))
            .spawn_scoped(scope, || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    controller.move_to(servo, token, position)
                }));
                match outcome {
                    Ok(Ok(())) => token.finish(),
                    Ok(Err(error)) => {
                        token.stop();
                        Err(error)
                    }
                    Err(_) => {
                        token.stop();
                        Err(pattern_panicked())
                    }
                }
            });
        let pattern = match pattern {
            Ok(handle) => handle,
            Err(e) => {
                token.stop();
                return Err(ServoError::thread_spawn(format!("transition-{}", servo.name()), e));
            }
        };

        let mut apply_error = None;
        while let Ok(step) = token.consume() {
            if let Err(error) = servo.apply_step(step) {
                let cancelled =
                    token.is_stopped() || matches!(error, ServoError::NotInitialized { .. });
                token.stop();
                if !cancelled {
                    apply_error = Some(error);
                }
                break;
            }
        }

        let produced = pattern.join().unwrap_or_else(|_| Err(pattern_panicked()));
        match (apply_error, produced) {
            (Some(error), _) => Err(error),
            (None, Ok(())) => Ok(()),
            (None, Err(ServoError::TransitionOver)) => Err(ServoError::TransitionCancelled),
            (None, Err(error)) => Err(error),
        }
    })
}

/// Executes a servo's transitions one after another.
pub(crate) struct TransitionWorker {
    name: String,
    sender: Option<Sender<TransitionDriver>>,
    handle: Option<JoinHandle<()>>,
}

impl TransitionWorker {
    pub(crate) fn spawn(servo: &str) -> ServoResult<Self> {
        let name = format!("transitions-{servo}");
        let (sender, receiver) = channel::unbounded::<TransitionDriver>();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for driver in receiver.iter() {
                    driver.run();
                }
            })
            .map_err(|e| ServoError::thread_spawn(name.as_str(), e))?;
        tracing::debug!(worker = %name, "transition worker started");
        Ok(Self {
            name,
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub(crate) fn submit(&self, driver: TransitionDriver) {
        let Some(sender) = self.sender.as_ref() else {
            driver.abort(ServoError::not_initialized(self.name.as_str()));
            return;
        };
        if let Err(rejected) = sender.send(driver) {
            rejected
                .into_inner()
                .abort(ServoError::not_initialized(self.name.as_str()));
        }
    }

    /// Stop accepting work and wait for queued transitions to finish.
    pub(crate) fn shutdown(&mut self) {
        self.sender.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::error!(worker = %self.name, "transition worker panicked");
        }
    }
}

impl Drop for TransitionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
