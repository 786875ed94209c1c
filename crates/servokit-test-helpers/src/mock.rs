//! Mock drivers, listeners and patterns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use servokit::ControllerDriver;
use servokit_errors::{ServoError, ServoResult};
use servokit_events::{Event, Listener};
use servokit_meta::{Meta, keys};
use servokit_transition::{TransitionController, TransitionTarget, TransitionToken};

#[derive(Debug, Default)]
struct DriverLog {
    inits: usize,
    writes: Vec<(usize, f64)>,
    resets: usize,
    sleeps: usize,
    wakes: usize,
    servo_sleeps: Vec<usize>,
    servo_wakes: Vec<usize>,
    closed: bool,
}

#[derive(Debug, Default)]
struct DriverShared {
    log: Mutex<DriverLog>,
    fail_writes: AtomicBool,
    writing: AtomicUsize,
    max_writing: AtomicUsize,
}

/// Controller driver that records every call.
///
/// Pair it with the [`DriverProbe`] returned by [`RecordingDriver::new`] to
/// inspect what the controller did after the driver has been moved into it.
#[derive(Debug)]
pub struct RecordingDriver {
    channels: usize,
    precision: Option<u32>,
    controller_silent: bool,
    servo_silent: bool,
    fail_init: bool,
    write_delay: Duration,
    shared: Arc<DriverShared>,
}

impl RecordingDriver {
    /// A driver with `channels` channels and controller precision 11, so
    /// a crawl across the full range takes ten steps.
    pub fn new(channels: usize) -> (Self, DriverProbe) {
        let shared = Arc::new(DriverShared::default());
        let driver = Self {
            channels,
            precision: Some(11),
            controller_silent: false,
            servo_silent: false,
            fail_init: false,
            write_delay: Duration::ZERO,
            shared: Arc::clone(&shared),
        };
        (driver, DriverProbe { shared })
    }

    /// Declare `controller/precision`, or nothing with `None`.
    #[must_use]
    pub fn with_precision(mut self, precision: Option<u32>) -> Self {
        self.precision = precision;
        self
    }

    /// Declare `controller/silent`.
    #[must_use]
    pub fn with_controller_silent(mut self) -> Self {
        self.controller_silent = true;
        self
    }

    /// Declare `servo/silent` on every channel.
    #[must_use]
    pub fn with_servo_silent(mut self) -> Self {
        self.servo_silent = true;
        self
    }

    /// Make every write take `delay`.
    #[must_use]
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Make `init` fail.
    #[must_use]
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }
}

impl ControllerDriver for RecordingDriver {
    fn init(&mut self, port: &str) -> ServoResult<()> {
        if self.fail_init {
            return Err(ServoError::hardware_io(port, "no such device"));
        }
        self.shared.log.lock().inits += 1;
        Ok(())
    }

    fn servo_count(&self) -> usize {
        self.channels
    }

    fn meta(&self) -> Meta {
        let mut builder = Meta::builder().property(keys::MANUFACTURER_NAME, "servokit tests");
        if let Some(precision) = self.precision {
            builder = builder.property(keys::CONTROLLER_PRECISION, precision);
        }
        if self.controller_silent {
            builder = builder.feature(keys::CONTROLLER_SILENT, true);
        }
        builder.build()
    }

    fn servo_meta(&self, _channel: usize) -> Meta {
        let builder = Meta::builder();
        if self.servo_silent {
            builder.feature(keys::SERVO_SILENT, true).build()
        } else {
            builder.build()
        }
    }

    fn write_position(&mut self, channel: usize, position: f64) -> ServoResult<()> {
        if self.shared.fail_writes.load(Ordering::Acquire) {
            return Err(ServoError::hardware_io("recording", "write failed"));
        }
        let writing = self.shared.writing.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.max_writing.fetch_max(writing, Ordering::AcqRel);
        if !self.write_delay.is_zero() {
            thread::sleep(self.write_delay);
        }
        self.shared.log.lock().writes.push((channel, position));
        self.shared.writing.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    fn reset(&mut self) -> ServoResult<()> {
        self.shared.log.lock().resets += 1;
        Ok(())
    }

    fn sleep(&mut self) -> ServoResult<()> {
        self.shared.log.lock().sleeps += 1;
        Ok(())
    }

    fn wake(&mut self) -> ServoResult<()> {
        self.shared.log.lock().wakes += 1;
        Ok(())
    }

    fn sleep_servo(&mut self, channel: usize) -> ServoResult<()> {
        self.shared.log.lock().servo_sleeps.push(channel);
        Ok(())
    }

    fn wake_servo(&mut self, channel: usize) -> ServoResult<()> {
        self.shared.log.lock().servo_wakes.push(channel);
        Ok(())
    }

    fn close(&mut self) -> ServoResult<()> {
        self.shared.log.lock().closed = true;
        Ok(())
    }
}

/// Read side of a [`RecordingDriver`].
#[derive(Debug, Clone)]
pub struct DriverProbe {
    shared: Arc<DriverShared>,
}

impl DriverProbe {
    /// Every `(channel, position)` written, in order.
    pub fn writes(&self) -> Vec<(usize, f64)> {
        self.shared.log.lock().writes.clone()
    }

    /// Positions written to one channel, in order.
    pub fn writes_for(&self, channel: usize) -> Vec<f64> {
        self.shared
            .log
            .lock()
            .writes
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, p)| *p)
            .collect()
    }

    /// Last position written to one channel.
    pub fn last_write(&self, channel: usize) -> Option<f64> {
        self.writes_for(channel).last().copied()
    }

    /// Forget recorded writes.
    pub fn clear_writes(&self) {
        self.shared.log.lock().writes.clear();
    }

    /// Make subsequent writes fail with `HardwareIo`.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::Release);
    }

    /// Largest number of writes that were ever in progress at once.
    pub fn max_concurrent_writes(&self) -> usize {
        self.shared.max_writing.load(Ordering::Acquire)
    }

    /// Number of `init` calls.
    pub fn inits(&self) -> usize {
        self.shared.log.lock().inits
    }

    /// Number of `reset` calls.
    pub fn resets(&self) -> usize {
        self.shared.log.lock().resets
    }

    /// Number of controller `sleep` calls.
    pub fn sleeps(&self) -> usize {
        self.shared.log.lock().sleeps
    }

    /// Number of controller `wake` calls.
    pub fn wakes(&self) -> usize {
        self.shared.log.lock().wakes
    }

    /// Channels put to sleep, in order.
    pub fn servo_sleeps(&self) -> Vec<usize> {
        self.shared.log.lock().servo_sleeps.clone()
    }

    /// Channels woken, in order.
    pub fn servo_wakes(&self) -> Vec<usize> {
        self.shared.log.lock().servo_wakes.clone()
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.shared.log.lock().closed
    }

    /// Poll `condition` until it holds or `timeout` elapses.
    pub fn wait_until(&self, timeout: Duration, condition: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if condition(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Listener that forwards every event into a channel.
#[derive(Debug)]
pub struct RecordingListener {
    sender: Sender<Event>,
    receiver: Receiver<Event>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = channel::unbounded();
        Arc::new(Self { sender, receiver })
    }

    /// Next event, waiting up to `timeout`.
    pub fn next(&self, timeout: Duration) -> Option<Event> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// First event matching `predicate`, discarding the others.
    pub fn wait_for(
        &self,
        timeout: Duration,
        predicate: impl Fn(&Event) -> bool,
    ) -> Option<Event> {
        let deadline = Instant::now() + timeout;
        while let Ok(event) = self.receiver.recv_deadline(deadline) {
            if predicate(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Every event that arrives within `window`.
    pub fn collect_for(&self, window: Duration) -> Vec<Event> {
        let deadline = Instant::now() + window;
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.recv_deadline(deadline) {
            events.push(event);
        }
        events
    }

    fn record(&self, event: Event) {
        self.sender.send(event).unwrap_or_default();
    }
}

impl Listener for RecordingListener {
    fn position_changed(&self, source: &str, position: f64) {
        self.record(Event::PositionChanged {
            source: source.to_owned(),
            position,
        });
    }

    fn actual_position_changed(&self, source: &str, position: f64) {
        self.record(Event::ActualPositionChanged {
            source: source.to_owned(),
            position,
        });
    }

    fn silent_status_changed(&self, source: &str, active: bool) {
        self.record(Event::SilentStatusChanged {
            source: source.to_owned(),
            active,
        });
    }

    fn exception(&self, source: &str, error: &ServoError) {
        self.record(Event::Exception {
            source: source.to_owned(),
            error: error.clone(),
        });
    }
}

/// Listener whose every callback panics.
#[derive(Debug, Default)]
pub struct PanickingListener;

impl Listener for PanickingListener {
    fn position_changed(&self, source: &str, _position: f64) {
        panic!("listener failure on {source}");
    }

    fn actual_position_changed(&self, source: &str, _position: f64) {
        panic!("listener failure on {source}");
    }

    fn silent_status_changed(&self, source: &str, _active: bool) {
        panic!("listener failure on {source}");
    }

    fn exception(&self, source: &str, _error: &ServoError) {
        panic!("listener failure on {source}");
    }
}

/// Transition pattern that supplies a fixed script of positions.
#[derive(Debug, Clone, Default)]
pub struct StepPattern {
    steps: Vec<f64>,
    delay: Duration,
    fail_after: Option<usize>,
}

impl StepPattern {
    pub fn new(steps: Vec<f64>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Pause between steps. The pause ends early when the token stops.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail with `TransitionFailed` after supplying `count` steps.
    #[must_use]
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

impl TransitionController for StepPattern {
    fn move_to(
        &self,
        _target: &dyn TransitionTarget,
        token: &TransitionToken,
        _position: f64,
    ) -> ServoResult<()> {
        for (supplied, step) in self.steps.iter().enumerate() {
            if self.fail_after == Some(supplied) {
                return Err(ServoError::transition_failed("scripted failure"));
            }
            if supplied > 0 && !self.delay.is_zero() && token.wait_stopped(self.delay) {
                return Err(ServoError::TransitionOver);
            }
            token.supply(*step)?;
        }
        if self.fail_after == Some(self.steps.len()) {
            return Err(ServoError::transition_failed("scripted failure"));
        }
        Ok(())
    }
}
