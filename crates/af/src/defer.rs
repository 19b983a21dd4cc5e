//! Per-object holding area for deferred events.
//!
//! An active object that cannot process an event in its current state parks
//! it here and recalls it later, typically on entry to the state that can
//! handle it. Deferral keeps a reference on the event so the pool cannot
//! reclaim it while parked; recall transfers that reference back to the main
//! queue.

use crate::event::Event;
use crate::queue::EventQueue;

/// Bounded FIFO of parked events, recalled in the order they were deferred.
pub struct DeferQueue {
    queue: EventQueue,
}

impl DeferQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: EventQueue::new(capacity),
        }
    }

    /// Parks an event; returns it on overflow.
    pub fn push(&self, evt: Event) -> Result<(), Event> {
        self.queue.push_back(evt)
    }

    /// Takes the oldest parked event.
    pub fn pop(&self) -> Option<Event> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
