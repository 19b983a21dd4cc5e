//! Bounded per-object event queues.
//!
//! Capacity is fixed at construction. A full queue hands the event back to
//! the caller instead of dropping it silently, so the executive can undo the
//! retain it took and report the condition to the producer.

use std::collections::VecDeque;

use crate::event::Event;
use crate::sync::Mutex;

/// A bounded FIFO of event envelopes.
pub struct EventQueue {
    items: Mutex<VecDeque<Event>>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends at the back; returns the event on a full queue.
    pub fn push_back(&self, evt: Event) -> Result<(), Event> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(evt);
        }
        items.push_back(evt);
        Ok(())
    }

    /// Inserts at the front, ahead of everything already queued. Used when
    /// recalling deferred events so they are seen before newer traffic.
    pub fn push_front(&self, evt: Event) -> Result<(), Event> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(evt);
        }
        items.push_front(evt);
        Ok(())
    }

    pub fn pop(&self) -> Option<Event> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
