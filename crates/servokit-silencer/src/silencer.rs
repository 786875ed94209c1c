//! Threaded silencer: timer thread plus single dispatch worker.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use servokit_errors::{ServoError, ServoResult};

use crate::config::SilencerConfig;
use crate::state::{SilencerPhase, SilencerState, SilentCommand};

/// Hardware object that can stop and resume its control signal.
///
/// Called from the silencer's dispatch worker, never from the timer thread.
/// Implementations report their own failures (the silencer only logs
/// panics).
pub trait SilentTarget: Send + Sync {
    /// Stop the control signal.
    fn sleep(&self);

    /// Resume the control signal.
    fn wake(&self);
}

struct Timing {
    machine: SilencerState,
    shutdown: bool,
}

struct Shared {
    name: String,
    timing: Mutex<Timing>,
    changed: Condvar,
    stopped: AtomicBool,
    commands: Mutex<Option<Sender<SilentCommand>>>,
}

impl Shared {
    fn dispatch(&self, command: SilentCommand) {
        if let Some(sender) = self.commands.lock().as_ref()
            && sender.send(command).is_err()
        {
            tracing::debug!(silencer = %self.name, ?command, "dispatch worker gone, command dropped");
        }
    }
}

/// Silent-mode driver for one hardware object.
///
/// Starts disabled. Dropping the silencer shuts it down.
pub struct Silencer {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Silencer {
    /// Start the timer and dispatch threads for `target`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` is invalid, or
    /// `ThreadSpawn` if a thread cannot be started.
    pub fn start(
        name: impl Into<String>,
        config: SilencerConfig,
        target: Arc<dyn SilentTarget>,
    ) -> ServoResult<Self> {
        config.validate()?;
        let name = name.into();
        let (sender, receiver) = channel::unbounded();

        let shared = Arc::new(Shared {
            name: name.clone(),
            timing: Mutex::new(Timing {
                machine: SilencerState::new(config.timeout(), config.heartbeat()),
                shutdown: false,
            }),
            changed: Condvar::new(),
            stopped: AtomicBool::new(false),
            commands: Mutex::new(Some(sender)),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            spawn(format!("silencer-worker-{name}"), move || {
                run_worker(&shared, &receiver, target.as_ref());
            })?
        };

        let timer = {
            let timer_shared = Arc::clone(&shared);
            match spawn(format!("silencer-timer-{name}"), move || {
                run_timer(&timer_shared);
            }) {
                Ok(handle) => handle,
                Err(e) => {
                    shared.stopped.store(true, Ordering::Release);
                    shared.commands.lock().take();
                    join(worker, &name);
                    return Err(e);
                }
            }
        };

        tracing::debug!(silencer = %name, timeout_ms = config.timeout_ms, heartbeat_ms = config.heartbeat_ms, "silencer started");

        Ok(Self {
            shared,
            timer: Mutex::new(Some(timer)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Turn silent mode on or off.
    ///
    /// Turning it off wakes the target right away.
    pub fn set_enabled(&self, enabled: bool) {
        let command = {
            let mut timing = self.shared.timing.lock();
            let command = timing.machine.set_enabled(enabled, Instant::now());
            self.shared.changed.notify_all();
            command
        };
        tracing::debug!(silencer = %self.shared.name, enabled, "silent mode changed");
        if let Some(command) = command {
            self.shared.dispatch(command);
        }
    }

    /// Whether silent mode is on.
    pub fn is_enabled(&self) -> bool {
        self.shared.timing.lock().machine.is_enabled()
    }

    /// Record activity on the target.
    pub fn touch(&self) {
        let mut timing = self.shared.timing.lock();
        timing.machine.touch(Instant::now());
        self.shared.changed.notify_all();
    }

    /// Change the inactivity timeout and heartbeat period.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if either duration is zero.
    pub fn set_timeouts(&self, timeout: Duration, heartbeat: Duration) -> ServoResult<()> {
        if timeout.is_zero() || heartbeat.is_zero() {
            return Err(ServoError::invalid_config(
                "silent timeout and heartbeat must be greater than 0",
            ));
        }
        let mut timing = self.shared.timing.lock();
        timing
            .machine
            .set_timeouts(timeout, heartbeat, Instant::now());
        self.shared.changed.notify_all();
        Ok(())
    }

    /// Current `(timeout, heartbeat)` pair.
    pub fn timeouts(&self) -> (Duration, Duration) {
        let timing = self.shared.timing.lock();
        (timing.machine.timeout(), timing.machine.heartbeat())
    }

    /// Whether the control signal is currently stopped by silent mode.
    pub fn is_silent_now(&self) -> bool {
        self.shared.timing.lock().machine.is_silent_now()
    }

    /// Current phase of the state machine.
    pub fn phase(&self) -> SilencerPhase {
        self.shared.timing.lock().machine.phase()
    }

    /// Whether the threads are still running.
    pub fn is_running(&self) -> bool {
        !self.shared.stopped.load(Ordering::Acquire)
    }

    /// Stop both threads. No command is executed after this returns.
    ///
    /// Idempotent. Safe to call from inside a [`SilentTarget`] callback.
    pub fn shutdown(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let mut timing = self.shared.timing.lock();
            timing.shutdown = true;
            self.shared.changed.notify_all();
        }
        self.shared.commands.lock().take();

        if let Some(timer) = self.timer.lock().take() {
            join(timer, &self.shared.name);
        }
        if let Some(worker) = self.worker.lock().take() {
            join(worker, &self.shared.name);
        }
        tracing::debug!(silencer = %self.shared.name, "silencer stopped");
    }
}

impl Drop for Silencer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Silencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timing = self.shared.timing.lock();
        f.debug_struct("Silencer")
            .field("name", &self.shared.name)
            .field("phase", &timing.machine.phase())
            .field("timeout", &timing.machine.timeout())
            .field("heartbeat", &timing.machine.heartbeat())
            .field("running", &self.is_running())
            .finish()
    }
}

fn spawn<F>(name: String, body: F) -> ServoResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|e| ServoError::thread_spawn(name, e))
}

fn join(handle: JoinHandle<()>, name: &str) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        tracing::error!(silencer = %name, "silencer thread panicked");
    }
}

fn run_timer(shared: &Shared) {
    let mut timing = shared.timing.lock();
    loop {
        if timing.shutdown {
            break;
        }
        if let Some(command) = timing.machine.poll(Instant::now()) {
            tracing::debug!(silencer = %shared.name, ?command, "deadline reached");
            shared.dispatch(command);
            continue;
        }
        match timing.machine.next_deadline() {
            Some(deadline) => {
                let _timed_out = shared.changed.wait_until(&mut timing, deadline);
            }
            None => shared.changed.wait(&mut timing),
        }
    }
}

fn run_worker(shared: &Shared, receiver: &Receiver<SilentCommand>, target: &dyn SilentTarget) {
    for command in receiver.iter() {
        if shared.stopped.load(Ordering::Acquire) {
            break;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match command {
            SilentCommand::Sleep => target.sleep(),
            SilentCommand::Wake => target.wake(),
        }));
        if outcome.is_err() {
            tracing::error!(silencer = %shared.name, ?command, "silent target panicked");
        }
    }
}
