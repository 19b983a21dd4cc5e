//! Event envelopes delivered to active objects.
//!
//! An event is a signal plus an optional type-erased payload. Storage comes
//! in two kinds: *static* events are shared, immutable values that are never
//! reclaimed; *dynamic* events are drawn from the fixed-size pools in
//! [`crate::pool`] and reference-counted there. The envelope itself is a
//! small value; payloads are shared through an `Arc` so duplicating an
//! event onto a second queue never copies application data.

use core::any::Any;
use core::fmt;

use hsm::{Signal, SmEvent};

use crate::sync::Arc;

/// Type-erased payload shared between all holders of an event.
pub type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Static,
    Dynamic { pool: u8, slot: u16 },
}

/// An event envelope.
///
/// Not `Clone`: duplication is reserved to the framework, which pairs every
/// duplicate with a reference-count retain in the pool manager.
pub struct Event {
    signal: Signal,
    origin: Origin,
    payload: Option<Payload>,
}

impl Event {
    /// A static, payload-free event. Retain/release are no-ops for it.
    pub const fn of(signal: Signal) -> Self {
        Self {
            signal,
            origin: Origin::Static,
            payload: None,
        }
    }

    /// A static event carrying a shared payload.
    pub fn with_payload(signal: Signal, payload: Payload) -> Self {
        Self {
            signal,
            origin: Origin::Static,
            payload: Some(payload),
        }
    }

    pub(crate) fn dynamic(signal: Signal, pool: u8, slot: u16, payload: Option<Payload>) -> Self {
        Self {
            signal,
            origin: Origin::Dynamic { pool, slot },
            payload,
        }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.origin, Origin::Dynamic { .. })
    }

    /// Typed view of the payload, if one is attached and of type `T`.
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref()
    }

    pub(crate) fn origin(&self) -> Origin {
        self.origin
    }

    /// Framework-internal duplication; every call site pairs this with a
    /// pool retain (or transfers an existing reference).
    pub(crate) fn dup(&self) -> Event {
        Event {
            signal: self.signal,
            origin: self.origin,
            payload: self.payload.clone(),
        }
    }
}

impl SmEvent for Event {
    fn signal(&self) -> Signal {
        self.signal
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("signal", &self.signal)
            .field("origin", &self.origin)
            .field("payload", &self.payload.as_ref().map(|_| ".."))
            .finish()
    }
}
