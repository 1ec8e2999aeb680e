use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::flights::FlightStatus;

/// Collaborator-facing events. Observers see an event only after the
/// command that produced it has fully applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Event {
    AirlineRegistered {
        airline: Vec<u8>,
    },
    FlightRegistered {
        airline: Vec<u8>,
        flight_code: String,
        timestamp: u64,
    },
    StatusRequestOpened {
        airline: Vec<u8>,
        flight_code: String,
        timestamp: u64,
        index: u8,
    },
    FlightStatusResolved {
        airline: Vec<u8>,
        flight_code: String,
        timestamp: u64,
        status: FlightStatus,
    },
    PassengerCredited {
        passenger: Vec<u8>,
        amount: u64,
    },
}

/// Observer of core state transitions
pub trait EventObserver: Send + Sync {
    /// Called for every emitted event
    fn on_event(&self, event: &Event);

    /// Get the name of this observer
    fn name(&self) -> &str;
}

/// Event observer registry
pub struct EventDispatcher {
    // Observers keyed by name; registering under an existing name replaces it
    observers: RwLock<HashMap<String, Arc<dyn EventObserver>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        EventDispatcher {
            observers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new observer
    pub fn register_observer(&self, observer: Arc<dyn EventObserver>) {
        let mut observers = self.observers.write();
        observers.insert(observer.name().to_string(), observer);
    }

    /// Remove an observer by name
    pub fn remove_observer(&self, name: &str) -> bool {
        let mut observers = self.observers.write();
        observers.remove(name).is_some()
    }

    /// Notify all observers of an event
    pub fn notify(&self, event: &Event) {
        let observers = self.observers.read();
        for observer in observers.values() {
            observer.on_event(event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        EventDispatcher::new()
    }
}

/// Observer adapter that forwards events into an mpsc channel, for
/// consumers running on their own thread. A disconnected receiver is
/// tolerated; the send result is discarded.
pub struct ChannelObserver {
    name: String,
    sender: Mutex<mpsc::Sender<Event>>,
}

impl ChannelObserver {
    /// Create an observer plus the receiving end of its channel
    pub fn channel(name: &str) -> (Arc<ChannelObserver>, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel();
        let observer = Arc::new(ChannelObserver {
            name: name.to_string(),
            sender: Mutex::new(sender),
        });
        (observer, receiver)
    }
}

impl EventObserver for ChannelObserver {
    fn on_event(&self, event: &Event) {
        let _ = self.sender.lock().send(event.clone());
    }

    fn name(&self) -> &str {
        &self.name
    }
}
