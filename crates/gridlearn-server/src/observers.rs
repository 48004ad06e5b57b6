//! Registry of live observers

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::LiveEvent;

pub type ObserverId = u64;

type Sink = mpsc::UnboundedSender<LiveEvent>;

/// Receiving end handed to a newly attached observer
#[derive(Debug)]
pub struct Observer {
    pub id: ObserverId,
    pub events: mpsc::UnboundedReceiver<LiveEvent>,
}

/// Fan-out of live events to any number of observers.
///
/// Sends never block; a sink whose receiver is gone is dropped on the next
/// broadcast.
#[derive(Debug, Default)]
pub struct ObserverHub {
    sinks: Mutex<HashMap<ObserverId, Sink>>,
    next_id: AtomicU64,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self) -> Observer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        debug!(id, "Observer attached");
        Observer { id, events: rx }
    }

    pub fn detach(&self, id: ObserverId) {
        if self.lock().remove(&id).is_some() {
            debug!(id, "Observer detached");
        }
    }

    /// Send to every observer; returns how many received it
    pub fn broadcast(&self, event: &LiveEvent) -> usize {
        let mut sinks = self.lock();
        let mut delivered = 0;
        sinks.retain(|id, tx| match tx.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                warn!(id = *id, "Dropping closed observer");
                false
            }
        });
        delivered
    }

    /// Send to one observer; false if it is gone
    pub fn send_to(&self, id: ObserverId, event: LiveEvent) -> bool {
        self.lock()
            .get(&id)
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ObserverId, Sink>> {
        self.sinks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
