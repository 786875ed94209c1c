//! The servo controller: lifecycle, servo registry and controller-wide
//! silent mode.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use servokit_errors::{ServoError, ServoResult};
use servokit_events::{DEFAULT_DISPATCH_WORKERS, Dispatcher, Listener};
use servokit_meta::{Meta, keys};
use servokit_silencer::{SilencerConfig, Silencer};

use crate::hardware::ControllerDriver;
use crate::io::{ControllerIo, ControllerSilentTarget, Lifecycle};
use crate::servo::Servo;

/// Tunables fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Notification threads kept alive while idle. The pool grows past
    /// this when every thread is busy.
    pub dispatch_workers: usize,
    /// Initial timings for controller-wide silent mode.
    pub controller_silence: SilencerConfig,
    /// Initial timings for per-servo silent mode.
    pub servo_silence: SilencerConfig,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            dispatch_workers: DEFAULT_DISPATCH_WORKERS,
            controller_silence: SilencerConfig::default(),
            servo_silence: SilencerConfig::default(),
        }
    }
}

/// A servo controller bound to one port and one driver.
///
/// Create it, [`open`](Self::open) it, hand out servos, and
/// [`close`](Self::close) it when done. Dropping an open controller closes
/// it. Listener registration and [`port`](Self::port) work in any state;
/// everything else needs an open controller.
pub struct ServoController {
    io: Arc<ControllerIo>,
    servos: Mutex<Vec<Option<Servo>>>,
    options: ControllerOptions,
}

impl ServoController {
    /// # Errors
    ///
    /// Returns `ThreadSpawn` if the notification threads cannot be started.
    pub fn new<D>(port: impl Into<String>, driver: D) -> ServoResult<Self>
    where
        D: ControllerDriver + 'static,
    {
        Self::with_options(port, driver, ControllerOptions::default())
    }

    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for invalid options, or `ThreadSpawn`
    /// if the notification threads cannot be started.
    pub fn with_options<D>(
        port: impl Into<String>,
        driver: D,
        options: ControllerOptions,
    ) -> ServoResult<Self>
    where
        D: ControllerDriver + 'static,
    {
        options.controller_silence.validate()?;
        options.servo_silence.validate()?;
        let port = port.into();
        let dispatcher = Arc::new(Dispatcher::new(
            format!("notify-{port}"),
            options.dispatch_workers,
        )?);
        Ok(Self {
            io: Arc::new(ControllerIo::new(port, Box::new(driver), dispatcher)),
            servos: Mutex::new(Vec::new()),
            options,
        })
    }

    /// Port the controller was created for.
    pub fn port(&self) -> &str {
        self.io.port()
    }

    /// Where the controller is in its life.
    pub fn lifecycle(&self) -> Lifecycle {
        self.io.lifecycle()
    }

    /// Connect to the hardware, read its metadata and reset it.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInitialized` if called twice, `NotInitialized` after
    /// [`close`](Self::close), or the driver's error if the hardware cannot
    /// be reached. A failed open may be retried.
    pub fn open(&self) -> ServoResult<()> {
        let _lock = self.io.lock();
        match self.io.lifecycle() {
            Lifecycle::New => {}
            Lifecycle::Open => {
                return Err(ServoError::already_initialized(format!(
                    "controller {}",
                    self.port()
                )));
            }
            Lifecycle::Closed => {
                return Err(ServoError::not_initialized(format!(
                    "controller {} is closed",
                    self.port()
                )));
            }
        }

        let port = self.port().to_owned();
        let (count, meta) = self.io.with_hardware(|hardware| {
            hardware.driver.init(&port)?;
            let count = hardware.driver.servo_count();
            let meta = hardware.driver.meta();
            let precision = meta.property_as::<u32>(keys::CONTROLLER_PRECISION).ok();
            hardware.writes.configure(count, precision);
            Ok((count, meta))
        })?;

        let meta = Arc::new(meta);
        self.io.set_meta(Arc::clone(&meta));
        *self.servos.lock() = vec![None; count];
        self.io.set_lifecycle(Lifecycle::Open);

        if meta.supports(keys::CONTROLLER_SILENT) {
            let silencer = Silencer::start(
                format!("controller-{port}"),
                self.options.controller_silence,
                Arc::new(ControllerSilentTarget::new(&self.io)),
            )?;
            *self.io.silencer().lock() = Some(silencer);
        }

        self.reset()?;
        tracing::info!(port = %port, servos = count, "controller opened");
        Ok(())
    }

    /// Cancel every transition, stop background threads and release the
    /// hardware. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the hardware could not be released.
    /// The controller is closed either way.
    pub fn close(&self) -> ServoResult<()> {
        let previous = {
            let _lock = self.io.lock();
            self.io.set_lifecycle(Lifecycle::Closed)
        };
        if previous == Lifecycle::Closed {
            return Ok(());
        }

        let servos: Vec<Servo> = self.servos.lock().drain(..).flatten().collect();
        for servo in self.io.derived().iter().chain(servos.iter()) {
            servo.shutdown();
        }
        let silencer = self.io.silencer().lock().take();
        if let Some(silencer) = silencer {
            silencer.shutdown();
        }

        let result = if previous == Lifecycle::Open {
            self.io.with_hardware(|hardware| hardware.driver.close())
        } else {
            Ok(())
        };
        self.io.dispatcher().shutdown();

        match &result {
            Ok(()) => tracing::info!(port = %self.port(), "controller closed"),
            Err(error) => tracing::warn!(port = %self.port(), %error, "controller closed with error"),
        }
        result
    }

    /// Controller metadata.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` unless the controller is open.
    pub fn meta(&self) -> ServoResult<Arc<Meta>> {
        self.io.ensure_open()?;
        Ok(self.io.meta())
    }

    /// Number of servo channels.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` unless the controller is open.
    pub fn servo_count(&self) -> ServoResult<usize> {
        self.io.ensure_open()?;
        Ok(self.servos.lock().len())
    }

    /// Servo for a channel id such as `"3"`. Repeated calls return the same
    /// servo.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` unless the controller is open, or
    /// `InvalidServoId` if `id` does not name a channel.
    pub fn servo(&self, id: &str) -> ServoResult<Servo> {
        let _lock = self.io.lock();
        self.io.ensure_open()?;

        let channel: usize = id
            .trim()
            .parse()
            .map_err(|e| ServoError::invalid_servo_id(id, format!("not a channel number: {e}")))?;

        let mut servos = self.servos.lock();
        let count = servos.len();
        let slot = servos.get_mut(channel).ok_or_else(|| {
            ServoError::invalid_servo_id(id, format!("controller has {count} servos"))
        })?;
        if let Some(servo) = slot {
            return Ok(servo.clone());
        }

        let meta = self
            .io
            .with_hardware(|hardware| Ok(hardware.driver.servo_meta(channel)))?;
        let servo = Servo::hardware(&self.io, channel, Arc::new(meta), self.options.servo_silence)?;
        *slot = Some(servo.clone());
        tracing::debug!(port = %self.port(), servo = %servo.name(), "servo created");
        Ok(servo)
    }

    /// Every hardware servo, in channel order.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` unless the controller is open.
    pub fn servos(&self) -> ServoResult<Vec<Servo>> {
        let count = self.servo_count()?;
        (0..count).map(|id| self.servo(&id.to_string())).collect()
    }

    /// Bring the hardware to its power-on state.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` unless the controller is open, or the
    /// driver's error.
    pub fn reset(&self) -> ServoResult<()> {
        let _lock = self.io.lock();
        self.io.ensure_open()?;
        self.io.with_hardware(|hardware| {
            hardware.driver.reset()?;
            hardware.writes.forget();
            Ok(())
        })?;
        self.io.touch();
        tracing::debug!(port = %self.port(), "controller reset");
        Ok(())
    }

    /// Whether the controller is open and its hardware reachable.
    pub fn is_connected(&self) -> bool {
        self.io
            .ensure_open()
            .and_then(|()| {
                self.io
                    .with_hardware(|hardware| Ok(hardware.driver.is_connected()))
            })
            .unwrap_or(false)
    }

    /// Subscribe to controller events.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.io.bus().add_listener(listener);
    }

    /// # Errors
    ///
    /// Returns `NotRegistered` if `listener` was not subscribed.
    pub fn remove_listener(&self, listener: &Arc<dyn Listener>) -> ServoResult<()> {
        self.io.bus().remove_listener(listener)
    }

    /// Skip writes the hardware could not resolve.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` unless the controller is open.
    pub fn set_lazy_mode(&self, lazy: bool) -> ServoResult<()> {
        self.io.ensure_open()?;
        self.io.with_hardware(|hardware| {
            hardware.writes.set_lazy(lazy);
            Ok(())
        })?;
        tracing::debug!(port = %self.port(), lazy, "lazy mode changed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` unless the controller is open.
    pub fn is_lazy(&self) -> ServoResult<bool> {
        self.io.ensure_open()?;
        self.io
            .with_hardware(|hardware| Ok(hardware.writes.is_lazy()))
    }

    /// Turn controller-wide silent mode on or off.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` unless the controller is open, or
    /// `UnsupportedCapability` unless it declares `controller/silent`.
    pub fn set_silent_mode(&self, enabled: bool) -> ServoResult<()> {
        self.with_silencer(|silencer| silencer.set_enabled(enabled))?;
        tracing::info!(port = %self.port(), enabled, "controller silent mode changed");
        Ok(())
    }

    /// # Errors
    ///
    /// Same as [`set_silent_mode`](Self::set_silent_mode).
    pub fn silent_mode(&self) -> ServoResult<bool> {
        self.with_silencer(Silencer::is_enabled)
    }

    /// Whether the controller is currently de-energized by silent mode.
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

    fn with_silencer<R>(&self, f: impl FnOnce(&Silencer) -> R) -> ServoResult<R> {
        self.io.ensure_open()?;
        if !self.io.meta().feature(keys::CONTROLLER_SILENT)? {
            return Err(ServoError::unsupported(keys::CONTROLLER_SILENT));
        }
        self.io
            .silencer()
            .lock()
            .as_ref()
            .map(f)
            .ok_or_else(|| ServoError::unsupported(keys::CONTROLLER_SILENT))
    }
}

impl Drop for ServoController {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::warn!(port = %self.port(), %error, "close on drop failed");
        }
    }
}

impl fmt::Debug for ServoController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServoController")
            .field("io", &self.io)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
