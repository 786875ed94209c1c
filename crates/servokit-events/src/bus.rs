//! Listener registration table bound to a dispatcher.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use servokit_errors::{ServoError, ServoResult};

use crate::dispatcher::Dispatcher;
use crate::event::{Event, Listener};

/// Registration table for one publisher.
///
/// Publishing snapshots the table and hands the deliveries to the shared
/// [`Dispatcher`]; registration changes never race with iteration.
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
    dispatcher: Arc<Dispatcher>,
}

impl EventBus {
    /// Create an empty bus delivering through `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            dispatcher,
        }
    }

    /// Register a listener. Adding the same listener twice has no effect.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return;
        }
        listeners.push(listener);
    }

    /// Unregister a listener.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` if the listener is not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn Listener>) -> ServoResult<()> {
        let mut listeners = self.listeners.write();
        let index = listeners
            .iter()
            .position(|l| Arc::ptr_eq(l, listener))
            .ok_or(ServoError::NotRegistered)?;
        listeners.remove(index);
        Ok(())
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `event` to every registered listener asynchronously.
    pub fn publish(&self, event: Event) {
        let snapshot = self.listeners.read().clone();
        self.dispatcher.dispatch(&snapshot, event);
    }

    /// The dispatcher this bus delivers through.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
