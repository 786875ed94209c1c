//! Servo handles.
//!
//! A [`Servo`] is either backed by one hardware channel or derived from
//! another servo through a [`CoordinateTransform`]. Both kinds share the
//! same positioning machinery: without a transition controller a position
//! is applied right away on the caller's thread; with one, a
//! [`TransitionDriver`] runs on the servo's own worker thread.
//!
//! Lock order is controller lock, then servo state, then silencer. Nothing
//! takes the controller lock while holding servo state.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use servokit_errors::{ServoError, ServoResult};
use servokit_events::{Event, EventBus, Listener};
use servokit_meta::{Meta, keys};
use servokit_silencer::{SilencerConfig, SilentCommand, SilentTarget, Silencer};
use servokit_transition::{
    TransitionController, TransitionOutcome, TransitionStatus, TransitionTarget, TransitionToken,
    transition_status,
};

use crate::io::ControllerIo;
use crate::mover::{TransitionDriver, TransitionWorker};
use crate::transform::CoordinateTransform;

/// Position a hardware servo is assumed to hold before its first write.
pub const NEUTRAL_POSITION: f64 = 0.5;

/// Coarse state of a servo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoPhase {
    /// Rejects positioning requests.
    Disabled,
    /// Enabled, nothing in flight.
    Idle,
    /// At least one transition is running or queued.
    Transitioning,
}

#[derive(Debug)]
enum Backend {
    Hardware {
        channel: usize,
        meta: Arc<Meta>,
    },
    Transform {
        lower: Servo,
        transform: Box<dyn CoordinateTransform>,
    },
}

#[derive(Debug)]
struct ServoState {
    requested: f64,
    actual: f64,
    enabled: bool,
    controller: Option<Arc<dyn TransitionController>>,
    queue: bool,
    in_flight: Vec<Arc<TransitionToken>>,
    closed: bool,
}

impl ServoState {
    fn new(position: f64) -> Self {
        Self {
            requested: position,
            actual: position,
            enabled: true,
            controller: None,
            queue: false,
            in_flight: Vec::new(),
            closed: false,
        }
    }

    fn cancel_in_flight(&self) {
        for token in &self.in_flight {
            token.stop();
        }
    }
}

struct ServoInner {
    name: String,
    io: Arc<ControllerIo>,
    backend: Backend,
    state: Mutex<ServoState>,
    bus: EventBus,
    silencer: Mutex<Option<Silencer>>,
    worker: Mutex<Option<TransitionWorker>>,
}

/// Handle to one servo. Cheap to clone; clones refer to the same servo.
#[derive(Clone)]
pub struct Servo {
    inner: Arc<ServoInner>,
}

/// Non-owning reference to a servo.
#[derive(Clone)]
pub(crate) struct WeakServo {
    inner: Weak<ServoInner>,
}

impl WeakServo {
    pub(crate) fn upgrade(&self) -> Option<Servo> {
        self.inner.upgrade().map(|inner| Servo { inner })
    }
}

impl Servo {
    pub(crate) fn hardware(
        io: &Arc<ControllerIo>,
        channel: usize,
        meta: Arc<Meta>,
        silent: SilencerConfig,
    ) -> ServoResult<Self> {
        let silent_capable = meta.supports(keys::SERVO_SILENT);
        let servo = Self::build(
            io,
            channel.to_string(),
            Backend::Hardware { channel, meta },
            NEUTRAL_POSITION,
        );
        if silent_capable {
            let target = Arc::new(ServoSilentTarget {
                servo: servo.downgrade(),
            });
            let silencer = Silencer::start(format!("{}-{channel}", io.port()), silent, target)?;
            *servo.inner.silencer.lock() = Some(silencer);
        }
        Ok(servo)
    }

    fn build(io: &Arc<ControllerIo>, name: String, backend: Backend, position: f64) -> Self {
        Self {
            inner: Arc::new(ServoInner {
                name,
                io: Arc::clone(io),
                backend,
                state: Mutex::new(ServoState::new(position)),
                bus: EventBus::new(Arc::clone(io.dispatcher())),
                silencer: Mutex::new(None),
                worker: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakServo {
        WeakServo {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Hardware channel id for hardware servos, `name(lower)` for derived ones.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Last requested position.
    pub fn position(&self) -> f64 {
        self.inner.state.lock().requested
    }

    /// Position last applied to the hardware, in this servo's coordinates.
    pub fn actual_position(&self) -> f64 {
        match &self.inner.backend {
            Backend::Hardware { .. } => self.inner.state.lock().actual,
            Backend::Transform { lower, transform } => {
                transform.from_lower(lower.actual_position())
            }
        }
    }

    /// The servo this one is derived from.
    pub fn lower(&self) -> Option<&Servo> {
        match &self.inner.backend {
            Backend::Hardware { .. } => None,
            Backend::Transform { lower, .. } => Some(lower),
        }
    }

    /// Whether both handles refer to the same servo.
    pub fn same(&self, other: &Servo) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Servo metadata. Derived servos share the metadata of the hardware
    /// servo at the bottom of their stack.
    pub fn meta(&self) -> Arc<Meta> {
        match &self.inner.backend {
            Backend::Hardware { meta, .. } => Arc::clone(meta),
            Backend::Transform { lower, .. } => lower.meta(),
        }
    }

    /// Request a position.
    ///
    /// Without a transition controller the position is written before this
    /// returns and the status is already complete. With one, the status
    /// completes when the transition ends. Exactly one `PositionChanged`
    /// event is published per accepted request.
    ///
    /// # Errors
    ///
    /// Returns `PositionOutOfRange` for positions outside `[0.0, 1.0]` (or
    /// that a transformer maps outside the lower servo's range),
    /// `NotInitialized` if the controller is not open, or `NotEnabled` if
    /// the servo is disabled.
    pub fn set_position(&self, position: f64) -> ServoResult<TransitionStatus> {
        self.check_position(position)?;

        let _lock = self.inner.io.lock();
        self.ensure_usable()?;
        if !self.is_enabled() {
            return Err(ServoError::not_enabled(self.name()));
        }

        let pending = {
            let mut state = self.inner.state.lock();
            state.requested = position;
            state.controller.clone().map(|controller| {
                if !state.queue {
                    state.cancel_in_flight();
                }
                let token = Arc::new(TransitionToken::new());
                state.in_flight.push(Arc::clone(&token));
                (controller, token)
            })
        };

        let status = match pending {
            None => self.apply(position).unwrap_or_else(|error| {
                tracing::warn!(servo = %self.name(), position, %error, "position write failed");
                TransitionStatus::completed(Err(error))
            }),
            Some((controller, token)) => self.start_transition(controller, token, position),
        };

        self.publish(Event::PositionChanged {
            source: self.inner.name.clone(),
            position,
        });
        self.touch();
        Ok(status)
    }

    /// Attach a transition controller, or detach with `None`.
    ///
    /// With `queue` set, transitions requested while another one runs are
    /// executed in order; otherwise a new request cancels the running one.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the controller is not open, or
    /// `StackConflict` if another servo in the same stack already has a
    /// transition controller.
    pub fn attach(
        &self,
        controller: Option<Arc<dyn TransitionController>>,
        queue: bool,
    ) -> ServoResult<()> {
        let _lock = self.inner.io.lock();
        self.ensure_usable()?;
        if controller.is_some()
            && let Some(conflict) = self.stack_conflict()
        {
            return Err(ServoError::stack_conflict(conflict));
        }

        let mut state = self.inner.state.lock();
        if !state.queue {
            state.cancel_in_flight();
        }
        tracing::debug!(
            servo = %self.inner.name,
            controller = ?controller,
            queue,
            "transition controller attached"
        );
        state.controller = controller;
        state.queue = queue;
        Ok(())
    }

    /// The attached transition controller.
    pub fn transition_controller(&self) -> Option<Arc<dyn TransitionController>> {
        self.inner.state.lock().controller.clone()
    }

    /// Whether transitions are queued rather than cancelled.
    pub fn is_queueing(&self) -> bool {
        self.inner.state.lock().queue
    }

    /// Whether requests are accepted. Derived servos report the state of
    /// the hardware servo at the bottom of their stack.
    pub fn is_enabled(&self) -> bool {
        match &self.inner.backend {
            Backend::Hardware { .. } => self.inner.state.lock().enabled,
            Backend::Transform { lower, .. } => lower.is_enabled(),
        }
    }

    /// Coarse state.
    pub fn phase(&self) -> ServoPhase {
        if !self.is_enabled() {
            ServoPhase::Disabled
        } else if self.inner.state.lock().in_flight.is_empty() {
            ServoPhase::Idle
        } else {
            ServoPhase::Transitioning
        }
    }

    /// Enable or disable the servo.
    ///
    /// Disabling cancels running transitions and, if the channel supports
    /// it, stops its control signal. Enabling restores the signal and
    /// re-issues the last requested position.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the controller is not open, or the
    /// driver's error if the control signal cannot be changed.
    pub fn set_enabled(&self, enabled: bool) -> ServoResult<()> {
        let _lock = self.inner.io.lock();
        self.ensure_usable()?;

        let (channel, meta) = match &self.inner.backend {
            Backend::Transform { lower, .. } => {
                if !enabled {
                    self.inner.state.lock().cancel_in_flight();
                }
                return lower.set_enabled(enabled);
            }
            Backend::Hardware { channel, meta } => (*channel, meta),
        };

        let requested = {
            let mut state = self.inner.state.lock();
            if state.enabled == enabled {
                return Ok(());
            }
            state.enabled = enabled;
            if !enabled {
                state.cancel_in_flight();
            }
            state.requested
        };
        tracing::debug!(servo = %self.inner.name, enabled, "servo enable state changed");

        if meta.supports(keys::SERVO_SILENT) {
            self.inner.io.with_hardware(|hardware| {
                if enabled {
                    hardware.driver.wake_servo(channel)
                } else {
                    hardware.driver.sleep_servo(channel)
                }
            })?;
            self.publish(Event::SilentStatusChanged {
                source: self.inner.name.clone(),
                active: enabled,
            });
        }

        if enabled {
            let _status = self.set_position(requested)?;
        }
        Ok(())
    }

    /// Subscribe to this servo's events.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.inner.bus.add_listener(listener);
    }

    /// # Errors
    ///
    /// Returns `NotRegistered` if `listener` was not subscribed.
    pub fn remove_listener(&self, listener: &Arc<dyn Listener>) -> ServoResult<()> {
        self.inner.bus.remove_listener(listener)
    }

    /// Turn silent mode on or off for this servo's channel.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCapability` unless the channel declares
    /// `servo/silent`, or `NotInitialized` if the controller is not open.
    pub fn set_silent_mode(&self, enabled: bool) -> ServoResult<()> {
        self.ensure_usable()?;
        self.with_silencer(|silencer| silencer.set_enabled(enabled))
    }

    /// # Errors
    ///
    /// Same as [`set_silent_mode`](Self::set_silent_mode).
    pub fn silent_mode(&self) -> ServoResult<bool> {
        self.with_silencer(Silencer::is_enabled)
    }

    /// Whether the control signal is currently stopped by silent mode.
    ///
    /// # Errors
    ///
    /// Same as [`set_silent_mode`](Self::set_silent_mode).
    pub fn is_silent_now(&self) -> ServoResult<bool> {
        self.with_silencer(Silencer::is_silent_now)
    }

    /// Change the inactivity timeout and heartbeat period.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for zero durations, otherwise the
    /// same as [`set_silent_mode`](Self::set_silent_mode).
    pub fn set_silent_timeout(&self, timeout: Duration, heartbeat: Duration) -> ServoResult<()> {
        self.with_silencer(|silencer| silencer.set_timeouts(timeout, heartbeat))?
    }

    /// Current `(timeout, heartbeat)` pair.
    ///
    /// # Errors
    ///
    /// Same as [`set_silent_mode`](Self::set_silent_mode).
    pub fn silent_timeouts(&self) -> ServoResult<(Duration, Duration)> {
        self.with_silencer(Silencer::timeouts)
    }

    /// Derive a servo that maps its positions onto this one.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the controller is not open.
    pub fn transformed<T>(&self, transform: T) -> ServoResult<Servo>
    where
        T: CoordinateTransform + 'static,
    {
        let _lock = self.inner.io.lock();
        self.ensure_usable()?;

        let name = format!("{}({})", transform.name(), self.name());
        let position = transform.from_lower(self.position());
        let derived = Self::build(
            &self.inner.io,
            name,
            Backend::Transform {
                lower: self.clone(),
                transform: Box::new(transform),
            },
            position,
        );
        self.inner.io.register_derived(&derived);
        tracing::debug!(servo = %derived.name(), "derived servo created");
        Ok(derived)
    }

    /// Apply one position produced by a transition.
    pub(crate) fn apply_step(&self, position: f64) -> ServoResult<()> {
        self.check_position(position)?;

        let _lock = self.inner.io.lock();
        self.ensure_usable()?;
        if !self.is_enabled() {
            return Err(ServoError::not_enabled(self.name()));
        }
        let status = self.apply(position)?;
        status
            .try_outcome()
            .map_or(Ok(()), TransitionOutcome::into_result)
    }

    /// Drop the token of a finished transition.
    pub(crate) fn release(&self, token: &Arc<TransitionToken>) {
        self.inner
            .state
            .lock()
            .in_flight
            .retain(|running| !Arc::ptr_eq(running, token));
    }

    pub(crate) fn publish(&self, event: Event) {
        self.inner.bus.publish(event);
    }

    /// Cancel everything and stop background threads. Called on controller
    /// close, outside the controller lock.
    pub(crate) fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.cancel_in_flight();
        }
        let worker = self.inner.worker.lock().take();
        if let Some(mut worker) = worker {
            worker.shutdown();
        }
        let silencer = self.inner.silencer.lock().take();
        if let Some(silencer) = silencer {
            silencer.shutdown();
        }
    }

    fn check_position(&self, position: f64) -> ServoResult<()> {
        if !(0.0..=1.0).contains(&position) {
            return Err(ServoError::out_of_range(position));
        }
        if let Backend::Transform { transform, .. } = &self.inner.backend {
            let lower = transform.to_lower(position);
            if !(0.0..=1.0).contains(&lower) {
                return Err(ServoError::out_of_range(lower));
            }
        }
        Ok(())
    }

    fn ensure_usable(&self) -> ServoResult<()> {
        self.inner.io.ensure_open()?;
        if self.inner.state.lock().closed {
            return Err(ServoError::not_initialized(format!(
                "servo {} is shut down",
                self.inner.name
            )));
        }
        Ok(())
    }

    /// Write `position` now. Callers hold the controller lock.
    fn apply(&self, position: f64) -> ServoResult<TransitionStatus> {
        match &self.inner.backend {
            Backend::Hardware { channel, .. } => {
                self.inner.io.write(*channel, position)?;
                self.inner.state.lock().actual = position;
                self.publish(Event::ActualPositionChanged {
                    source: self.inner.name.clone(),
                    position,
                });
                Ok(TransitionStatus::completed(Ok(())))
            }
            Backend::Transform { lower, transform } => {
                let status = lower.set_position(transform.to_lower(position))?;
                if status.try_outcome().is_some_and(|outcome| outcome.is_ok()) {
                    self.publish(Event::ActualPositionChanged {
                        source: self.inner.name.clone(),
                        position,
                    });
                }
                Ok(status)
            }
        }
    }

    fn start_transition(
        &self,
        controller: Arc<dyn TransitionController>,
        token: Arc<TransitionToken>,
        position: f64,
    ) -> TransitionStatus {
        let (completer, status) = transition_status();
        let driver = TransitionDriver::new(self.clone(), controller, token, position, completer);

        let mut worker = self.inner.worker.lock();
        if worker.is_none() {
            match TransitionWorker::spawn(&self.inner.name) {
                Ok(spawned) => *worker = Some(spawned),
                Err(error) => {
                    driver.abort(error);
                    return status;
                }
            }
        }
        match worker.as_ref() {
            Some(worker) => worker.submit(driver),
            None => driver.abort(ServoError::not_initialized(format!(
                "transition worker for {}",
                self.inner.name
            ))),
        }
        status
    }

    fn touch(&self) {
        match &self.inner.backend {
            Backend::Hardware { .. } => {
                if let Some(silencer) = self.inner.silencer.lock().as_ref() {
                    silencer.touch();
                }
            }
            Backend::Transform { lower, .. } => lower.touch(),
        }
    }

    fn with_silencer<R>(&self, f: impl FnOnce(&Silencer) -> R) -> ServoResult<R> {
        match &self.inner.backend {
            Backend::Transform { lower, .. } => lower.with_silencer(f),
            Backend::Hardware { meta, .. } => {
                if !meta.feature(keys::SERVO_SILENT)? {
                    return Err(ServoError::unsupported(keys::SERVO_SILENT));
                }
                self.inner
                    .silencer
                    .lock()
                    .as_ref()
                    .map(f)
                    .ok_or_else(|| ServoError::unsupported(keys::SERVO_SILENT))
            }
        }
    }

    /// Name of a servo in this stack, above or below, that already has a
    /// transition controller.
    fn stack_conflict(&self) -> Option<String> {
        let mut lower = self.lower();
        while let Some(servo) = lower {
            if servo.transition_controller().is_some() {
                return Some(servo.name().to_owned());
            }
            lower = servo.lower();
        }
        self.inner
            .io
            .derived()
            .into_iter()
            .find(|upper| upper.is_above(self) && upper.transition_controller().is_some())
            .map(|upper| upper.name().to_owned())
    }

    fn is_above(&self, other: &Servo) -> bool {
        let mut lower = self.lower();
        while let Some(servo) = lower {
            if servo.same(other) {
                return true;
            }
            lower = servo.lower();
        }
        false
    }

    fn silent_command(&self, command: SilentCommand) {
        let Backend::Hardware { channel, .. } = &self.inner.backend else {
            return;
        };
        let result = {
            let _lock = self.inner.io.lock();
            // A disabled servo stays de-energized until it is enabled again.
            if !self.inner.state.lock().enabled {
                tracing::debug!(servo = %self.inner.name, ?command, "servo disabled, silent command dropped");
                return;
            }
            self.ensure_usable().and_then(|()| {
                self.inner.io.with_hardware(|hardware| match command {
                    SilentCommand::Sleep => hardware.driver.sleep_servo(*channel),
                    SilentCommand::Wake => hardware.driver.wake_servo(*channel),
                })
            })
        };
        match result {
            Ok(()) => self.publish(Event::SilentStatusChanged {
                source: self.inner.name.clone(),
                active: command == SilentCommand::Wake,
            }),
            Err(ServoError::NotInitialized { .. }) => {
                tracing::debug!(servo = %self.inner.name, ?command, "servo shut down, silent command dropped");
            }
            Err(error) => {
                tracing::warn!(servo = %self.inner.name, ?command, %error, "servo silent command failed");
                self.publish(Event::Exception {
                    source: self.inner.name.clone(),
                    error,
                });
            }
        }
    }
}

impl TransitionTarget for Servo {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    fn actual_position(&self) -> f64 {
        Servo::actual_position(self)
    }

    fn meta(&self) -> Arc<Meta> {
        Servo::meta(self)
    }

    fn controller_meta(&self) -> Arc<Meta> {
        self.inner.io.meta()
    }
}

impl fmt::Debug for Servo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Servo")
            .field("name", &self.inner.name)
            .field("requested", &state.requested)
            .field("in_flight", &state.in_flight.len())
            .field("queue", &state.queue)
            .finish_non_exhaustive()
    }
}

struct ServoSilentTarget {
    servo: WeakServo,
}

impl SilentTarget for ServoSilentTarget {
    fn sleep(&self) {
        if let Some(servo) = self.servo.upgrade() {
            servo.silent_command(SilentCommand::Sleep);
        }
    }

    fn wake(&self) {
        if let Some(servo) = self.servo.upgrade() {
            servo.silent_command(SilentCommand::Wake);
        }
    }
}
