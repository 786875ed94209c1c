//! State shared by a controller and every servo it hands out.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use servokit_errors::{ServoError, ServoResult};
use servokit_events::{Dispatcher, Event, EventBus};
use servokit_meta::Meta;
use servokit_silencer::{SilentCommand, SilentTarget, Silencer};

use crate::hardware::ControllerDriver;
use crate::servo::{Servo, WeakServo};
use crate::write_policy::WritePolicy;

/// Where a controller is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created, not yet opened.
    New,
    /// Opened and usable.
    Open,
    /// Closed for good.
    Closed,
}

#[derive(Debug)]
pub(crate) struct Hardware {
    pub(crate) driver: Box<dyn ControllerDriver>,
    pub(crate) writes: WritePolicy,
}

/// The controller lock guards the driver. It is reentrant because a derived
/// servo positions the servo below it while already holding the lock.
pub(crate) struct ControllerIo {
    port: String,
    hardware: ReentrantMutex<RefCell<Hardware>>,
    lifecycle: Mutex<Lifecycle>,
    meta: RwLock<Arc<Meta>>,
    bus: EventBus,
    silencer: Mutex<Option<Silencer>>,
    derived: Mutex<Vec<WeakServo>>,
}

impl ControllerIo {
    pub(crate) fn new(
        port: String,
        driver: Box<dyn ControllerDriver>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            port,
            hardware: ReentrantMutex::new(RefCell::new(Hardware {
                driver,
                writes: WritePolicy::default(),
            })),
            lifecycle: Mutex::new(Lifecycle::New),
            meta: RwLock::new(Arc::new(Meta::empty())),
            bus: EventBus::new(dispatcher),
            silencer: Mutex::new(None),
            derived: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn port(&self) -> &str {
        &self.port
    }

    /// Take the controller lock.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<Hardware>> {
        self.hardware.lock()
    }

    /// Run `f` against the driver under the controller lock.
    ///
    /// `f` must not call back into anything that needs the driver.
    pub(crate) fn with_hardware<R>(
        &self,
        f: impl FnOnce(&mut Hardware) -> ServoResult<R>,
    ) -> ServoResult<R> {
        let guard = self.hardware.lock();
        let mut hardware = guard.try_borrow_mut().map_err(|e| {
            ServoError::hardware_io(self.port.as_str(), format!("driver re-entered: {e}"))
        })?;
        f(&mut hardware)
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    pub(crate) fn set_lifecycle(&self, lifecycle: Lifecycle) -> Lifecycle {
        std::mem::replace(&mut *self.lifecycle.lock(), lifecycle)
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` unless the controller is open.
    pub(crate) fn ensure_open(&self) -> ServoResult<()> {
        match self.lifecycle() {
            Lifecycle::Open => Ok(()),
            Lifecycle::New => Err(ServoError::not_initialized(format!(
                "controller {} is not open",
                self.port
            ))),
            Lifecycle::Closed => Err(ServoError::not_initialized(format!(
                "controller {} is closed",
                self.port
            ))),
        }
    }

    pub(crate) fn meta(&self) -> Arc<Meta> {
        Arc::clone(&self.meta.read())
    }

    pub(crate) fn set_meta(&self, meta: Arc<Meta>) {
        *self.meta.write() = meta;
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub(crate) fn dispatcher(&self) -> &Arc<Dispatcher> {
        self.bus.dispatcher()
    }

    pub(crate) fn silencer(&self) -> &Mutex<Option<Silencer>> {
        &self.silencer
    }

    /// Send one position to the hardware, honouring lazy mode.
    pub(crate) fn write(&self, channel: usize, position: f64) -> ServoResult<()> {
        self.with_hardware(|hardware| {
            if !hardware.writes.should_write(channel, position) {
                tracing::trace!(port = %self.port, channel, position, "write skipped");
                return Ok(());
            }
            hardware.driver.write_position(channel, position)?;
            hardware.writes.record(channel, position);
            Ok(())
        })?;
        self.touch();
        Ok(())
    }

    /// Record controller activity for silent mode.
    pub(crate) fn touch(&self) {
        if let Some(silencer) = self.silencer.lock().as_ref() {
            silencer.touch();
        }
    }

    pub(crate) fn register_derived(&self, servo: &Servo) {
        let mut derived = self.derived.lock();
        derived.retain(|weak| weak.upgrade().is_some());
        derived.push(servo.downgrade());
    }

    /// Derived servos that are still alive.
    pub(crate) fn derived(&self) -> Vec<Servo> {
        self.derived
            .lock()
            .iter()
            .filter_map(WeakServo::upgrade)
            .collect()
    }

    fn silent_command(&self, command: SilentCommand) {
        let result = {
            let _lock = self.lock();
            self.ensure_open().and_then(|()| {
                self.with_hardware(|hardware| match command {
                    SilentCommand::Sleep => hardware.driver.sleep(),
                    SilentCommand::Wake => hardware.driver.wake(),
                })
            })
        };
        match result {
            Ok(()) => self.bus.publish(Event::SilentStatusChanged {
                source: self.port.clone(),
                active: command == SilentCommand::Wake,
            }),
            Err(ServoError::NotInitialized { .. }) => {
                tracing::debug!(port = %self.port, ?command, "controller closed, silent command dropped");
            }
            Err(error) => {
                tracing::warn!(port = %self.port, ?command, %error, "controller silent command failed");
                self.bus.publish(Event::Exception {
                    source: self.port.clone(),
                    error,
                });
            }
        }
    }
}

impl fmt::Debug for ControllerIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerIo")
            .field("port", &self.port)
            .field("lifecycle", &self.lifecycle())
            .field("listeners", &self.bus.listener_count())
            .finish_non_exhaustive()
    }
}

/// Sleeps and wakes the whole controller on behalf of its silencer.
pub(crate) struct ControllerSilentTarget {
    io: Weak<ControllerIo>,
}

impl ControllerSilentTarget {
    pub(crate) fn new(io: &Arc<ControllerIo>) -> Self {
        Self {
            io: Arc::downgrade(io),
        }
    }
}

impl SilentTarget for ControllerSilentTarget {
    fn sleep(&self) {
        if let Some(io) = self.io.upgrade() {
            io.silent_command(SilentCommand::Sleep);
        }
    }

    fn wake(&self) {
        if let Some(io) = self.io.upgrade() {
            io.silent_command(SilentCommand::Wake);
        }
    }
}
