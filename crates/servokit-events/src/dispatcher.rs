//! Worker pool that runs listener callbacks.
//!
//! The pool keeps a few core threads alive and starts another thread
//! whenever a delivery is queued with no idle worker to take it, so a
//! listener that never returns only ties up the thread running it. Extra
//! threads exit after [`IDLE_KEEPALIVE`] without work.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use servokit_errors::{ServoError, ServoResult};

use crate::event::{Event, Listener};

/// Core worker count used by controllers.
pub const DEFAULT_DISPATCH_WORKERS: usize = 2;

/// How long an extra worker waits for work before exiting.
pub const IDLE_KEEPALIVE: Duration = Duration::from_secs(5);

/// How long [`Dispatcher::shutdown`] waits for running callbacks.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

struct Delivery {
    listener: Arc<dyn Listener>,
    event: Arc<Event>,
}

#[derive(Default)]
struct Shared {
    delivered: AtomicU64,
    failed: AtomicU64,
    idle: AtomicUsize,
    spawned: AtomicUsize,
}

/// Delivery statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Callbacks that returned normally
    pub delivered: u64,
    /// Callbacks that panicked
    pub failed: u64,
    /// Worker threads started so far, core workers included
    pub spawned: usize,
}

/// Growable pool of delivery threads fed by an unbounded queue.
///
/// Each (listener, event) pair is one independent job, so a slow, hung or
/// failing listener only affects its own deliveries.
pub struct Dispatcher {
    name: String,
    sender: Mutex<Option<Sender<Delivery>>>,
    receiver: Receiver<Delivery>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Start a dispatcher with `workers` core threads named `<name>-<n>`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `workers` is zero, or `ThreadSpawn`
    /// if a worker thread cannot be started.
    pub fn new(name: impl Into<String>, workers: usize) -> ServoResult<Self> {
        let name = name.into();
        if workers == 0 {
            return Err(ServoError::invalid_config(
                "dispatcher needs at least one worker",
            ));
        }

        let (sender, receiver) = channel::unbounded::<Delivery>();
        let dispatcher = Self {
            name,
            sender: Mutex::new(Some(sender)),
            receiver,
            workers: Mutex::new(Vec::with_capacity(workers)),
            shared: Arc::new(Shared::default()),
        };

        for _ in 0..workers {
            if let Err(error) = dispatcher.spawn_worker(None) {
                dispatcher.shutdown();
                return Err(error);
            }
        }

        tracing::debug!(dispatcher = %dispatcher.name, workers, "event dispatcher started");
        Ok(dispatcher)
    }

    /// Queue one delivery per listener, starting workers if none is idle.
    ///
    /// Events published after [`shutdown`](Self::shutdown) are dropped.
    pub fn dispatch(&self, listeners: &[Arc<dyn Listener>], event: Event) {
        if listeners.is_empty() {
            return;
        }
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            tracing::debug!(dispatcher = %self.name, source = event.source(), "dispatcher stopped, event dropped");
            return;
        };

        let event = Arc::new(event);
        for listener in listeners {
            let delivery = Delivery {
                listener: Arc::clone(listener),
                event: Arc::clone(&event),
            };
            if sender.send(delivery).is_err() {
                tracing::debug!(dispatcher = %self.name, "delivery queue closed");
                return;
            }
        }

        // Read after sending: a worker that retires after this load sees
        // the queued deliveries on its final check.
        let idle = self.shared.idle.load(Ordering::SeqCst);
        let missing = sender.len().saturating_sub(idle);
        for _ in 0..missing {
            if let Err(error) = self.spawn_worker(Some(IDLE_KEEPALIVE)) {
                tracing::warn!(dispatcher = %self.name, %error, "could not grow dispatcher");
                break;
            }
        }
    }

    /// Whether deliveries are still accepted.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Delivery statistics so far.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            spawned: self.shared.spawned.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting events, let the workers drain the queue, and join them.
    ///
    /// Workers still inside a callback after [`SHUTDOWN_GRACE`] are left
    /// detached. Idempotent. Safe to call from a listener callback: the
    /// calling worker is not joined.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handles = std::mem::take(&mut *self.workers.lock());
        join_all(&self.name, handles);
        tracing::debug!(dispatcher = %self.name, "event dispatcher stopped");
    }

    /// `keepalive` is `None` for core workers, which never time out.
    fn spawn_worker(&self, keepalive: Option<Duration>) -> ServoResult<()> {
        let index = self.shared.spawned.fetch_add(1, Ordering::Relaxed);
        let thread_name = format!("{}-{index}", self.name);
        let receiver = self.receiver.clone();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run_worker(&receiver, &shared, keepalive))
            .map_err(|e| ServoError::thread_spawn(thread_name.as_str(), e))?;

        let mut workers = self.workers.lock();
        workers.retain(|worker| !worker.is_finished());
        workers.push(handle);
        if keepalive.is_some() {
            tracing::trace!(dispatcher = %self.name, worker = %thread_name, "extra dispatcher worker started");
        }
        Ok(())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn run_worker(receiver: &Receiver<Delivery>, shared: &Shared, keepalive: Option<Duration>) {
    loop {
        shared.idle.fetch_add(1, Ordering::SeqCst);
        let next = match keepalive {
            None => receiver.recv().ok(),
            Some(keepalive) => receiver.recv_timeout(keepalive).ok(),
        };
        shared.idle.fetch_sub(1, Ordering::SeqCst);

        let Some(delivery) = next.or_else(|| receiver.try_recv().ok()) else {
            return;
        };
        deliver(&delivery, shared);
    }
}

fn deliver(delivery: &Delivery, shared: &Shared) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        delivery.event.deliver(delivery.listener.as_ref());
    }));
    match outcome {
        Ok(()) => {
            shared.delivered.fetch_add(1, Ordering::Relaxed);
        }
        Err(payload) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                source = delivery.event.source(),
                reason = panic_message(payload.as_ref()),
                "listener panicked, delivery skipped"
            );
        }
    }
}

fn join_all(name: &str, handles: Vec<JoinHandle<()>>) {
    let current = thread::current().id();
    let started = Instant::now();
    for handle in handles {
        if handle.thread().id() == current {
            continue;
        }
        while !handle.is_finished() && started.elapsed() < SHUTDOWN_GRACE {
            thread::sleep(Duration::from_millis(1));
        }
        if !handle.is_finished() {
            tracing::warn!(
                dispatcher = %name,
                worker = handle.thread().name().unwrap_or("unnamed"),
                "listener still running at shutdown, worker detached"
            );
            continue;
        }
        if handle.join().is_err() {
            tracing::error!(dispatcher = %name, "event dispatcher worker panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Counting(AtomicU64);

    impl Listener for Counting {
        fn position_changed(&self, _source: &str, _position: f64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            Dispatcher::new("events", 0),
            Err(ServoError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_shutdown_drains_queue() -> ServoResult<()> {
        let dispatcher = Dispatcher::new("events-test", 2)?;
        let counting = Arc::new(Counting(AtomicU64::new(0)));
        let listeners: Vec<Arc<dyn Listener>> = vec![counting.clone() as Arc<dyn Listener>];

        for i in 0..100u32 {
            dispatcher.dispatch(
                &listeners,
                Event::PositionChanged {
                    source: "0".into(),
                    position: f64::from(i) / 100.0,
                },
            );
        }
        dispatcher.shutdown();

        assert_eq!(counting.0.load(Ordering::SeqCst), 100);
        assert_eq!(dispatcher.stats().delivered, 100);
        assert!(!dispatcher.is_running());
        Ok(())
    }

    #[test]
    fn test_dispatch_after_shutdown_is_dropped() -> ServoResult<()> {
        let dispatcher = Dispatcher::new("events-test", 1)?;
        dispatcher.shutdown();

        let counting = Arc::new(Counting(AtomicU64::new(0)));
        let listeners: Vec<Arc<dyn Listener>> = vec![counting.clone() as Arc<dyn Listener>];
        dispatcher.dispatch(
            &listeners,
            Event::PositionChanged {
                source: "0".into(),
                position: 0.5,
            },
        );

        thread::sleep(Duration::from_millis(50));
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);
        Ok(())
    }
}
