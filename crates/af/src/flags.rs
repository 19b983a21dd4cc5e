//! Event-flag registers: level-style conditions bridged into the event
//! queue.
//!
//! A flag register collects named condition bits from any number of
//! producers. Its owning active object arms a wait (any-of or all-of a
//! mask); the moment an update satisfies the condition, the register posts
//! its notify event to the owner, which then consumes the accumulated bits
//! with [`EventFlags::check`] while handling that event. One notification
//! per satisfied condition: further updates stay silent until the owner has
//! checked.

use hsm::Signal;

use crate::event::Event;
use crate::exec::Executive;
use crate::fault::FaultCode;
use crate::sched::AoId;
use crate::sync::{Arc, Mutex};
use crate::trace::TraceRecord;
use crate::AfError;

/// How an armed mask is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// Any bit of the mask set satisfies the wait.
    AnySet,
    /// Every bit of the mask must be set.
    AllSet,
}

struct FlagState {
    flags: u32,
    mask: u32,
    kind: WaitKind,
    /// Condition satisfied and notification posted, awaiting `check`.
    pend: bool,
}

/// A flag register bound to one owning active object and one notify signal.
pub struct EventFlags {
    exec: Arc<Executive>,
    target: AoId,
    signal: Signal,
    state: Mutex<FlagState>,
}

impl EventFlags {
    pub fn new(exec: Arc<Executive>, target: AoId, signal: Signal) -> Arc<Self> {
        Arc::new(Self {
            exec,
            target,
            signal,
            state: Mutex::new(FlagState {
                flags: 0,
                mask: 0,
                kind: WaitKind::AnySet,
                pend: false,
            }),
        })
    }

    /// Arms the condition, discarding any accumulated bits and any pending
    /// notification. An empty mask can never be satisfied and is a fault.
    pub fn wait_for(&self, kind: WaitKind, mask: u32) -> Result<(), AfError> {
        if mask == 0 {
            self.exec.raise_fault(FaultCode::FlagWaitEmptyMask);
            return Err(AfError::Fault(FaultCode::FlagWaitEmptyMask));
        }
        let mut state = self.state.lock();
        state.flags = 0;
        state.pend = false;
        state.kind = kind;
        state.mask = mask;
        Ok(())
    }

    /// Raises the given bits.
    pub fn set(&self, bits: u32) {
        self.update(bits, true);
    }

    /// Lowers the given bits.
    pub fn clear(&self, bits: u32) {
        self.update(bits, false);
    }

    fn update(&self, bits: u32, raise: bool) {
        let notify = {
            let mut state = self.state.lock();
            if raise {
                state.flags |= bits;
            } else {
                state.flags &= !bits;
            }
            let ready = state.mask & state.flags;
            let satisfied = state.mask != 0
                && match state.kind {
                    WaitKind::AnySet => ready != 0,
                    WaitKind::AllSet => ready == state.mask,
                };
            if satisfied && !state.pend {
                state.pend = true;
                true
            } else {
                false
            }
        };
        if notify {
            match self.exec.post(self.target, &Event::of(self.signal)) {
                Ok(()) => self.exec.trace(&TraceRecord::FlagsSatisfied {
                    ao: self.target,
                    signal: self.signal,
                }),
                Err(err) => {
                    log::warn!(target: "af", "flag notification not delivered: {err}");
                }
            }
        }
    }

    /// Consuming check: if a satisfied condition is pending, returns the
    /// accumulated bits and resets the register for the next round.
    /// Typically called by the owner while handling the notify event.
    pub fn check(&self) -> Option<u32> {
        let mut state = self.state.lock();
        if !state.pend {
            return None;
        }
        let flags = state.flags;
        state.pend = false;
        state.flags = 0;
        Some(flags)
    }

    /// Non-consuming read of the current bits.
    pub fn flags(&self) -> u32 {
        self.state.lock().flags
    }
}
