//! # af
//!
//! Active-object framework: run-to-completion execution of hierarchical
//! state machines behind bounded event queues.
//!
//! The building blocks:
//! - [`Active`] pairs a machine from the [`hsm`] crate with an application
//!   context and a bounded event queue; the only way to affect it is an
//!   event.
//! - [`Executive`] owns the event pools, the priority ready set and the
//!   registry of active objects, and schedules them cooperatively: always
//!   the highest-priority object with pending events, one event at a time.
//! - [`Event`]s are signals with optional shared payloads. Dynamic events
//!   come from fixed-size pools and are reference counted; they are
//!   reclaimed eagerly the moment the last holder lets go.
//! - [`Timer`]s post events after a tick delay, one-shot or periodic.
//! - [`EventFlags`] registers collect condition bits from any producer and
//!   post a notify event to their owner when an armed any-of/all-of mask is
//!   satisfied.
//! - Deferral parks events an object cannot handle yet; recall feeds them
//!   back ahead of newer traffic.
//!
//! Violated invariants (double registration, queue misconfiguration, stale
//! events) are fatal: the executive reports a [`FaultCode`] through the
//! installed hook and halts. Recoverable conditions (a full queue, an
//! exhausted pool) come back as [`AfError`] values instead.
//!
//! ```no_run
//! use af::{Active, AoId, Event, ExecConfig, Executive, PoolCfg, Priority};
//! use hsm::{MachineBuilder, Signal, StateCfg, StateId, TransitionCfg};
//!
//! const SIG_GO: Signal = Signal(1);
//! const TOP: StateId = StateId(0);
//! const IDLE: StateId = StateId(1);
//! const BUSY: StateId = StateId(2);
//!
//! let def = MachineBuilder::new()
//!     .state(StateCfg::root(TOP).initial(IDLE))
//!     .state(StateCfg::child(IDLE, TOP).transition(TransitionCfg::external(SIG_GO, BUSY)))
//!     .state(StateCfg::child(BUSY, TOP))
//!     .build()
//!     .map(std::sync::Arc::new)?;
//!
//! let exec = Executive::new(
//!     ExecConfig::builder()
//!         .pool(PoolCfg::new(16, 8))
//!         .build(),
//! );
//! let worker = Active::new("worker", AoId(1), Priority::new(1)?, def, ());
//! exec.register(worker.clone())?;
//! exec.start();
//!
//! exec.post(AoId(1), &Event::of(SIG_GO))?;
//! exec.run_until_idle();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod active;
mod defer;
mod event;
mod exec;
mod fault;
mod flags;
mod pool;
mod queue;
mod sched;
pub mod sync;
mod timer;
mod trace;

pub use active::{Active, Runnable};
pub use event::{Event, Payload};
pub use exec::{ExecConfig, ExecConfigBuilder, Executive};
pub use fault::{FaultCode, FaultHook};
pub use flags::{EventFlags, WaitKind};
pub use pool::{AllocError, PoolCfg, PoolStats};
pub use sched::{AoId, Priority, PriorityRange, ReadySet};
pub use timer::{Timer, TimerService};
pub use trace::{LogSink, TraceRecord, TraceSink};

use thiserror::Error;

#[cfg(test)]
mod tests;

/// Recoverable errors returned by executive operations.
///
/// Everything here leaves the framework in a consistent state; the producer
/// decides whether to retry, drop or escalate. Fatal conditions go through
/// the fault channel instead and surface as [`AfError::Fault`] after the
/// executive has already halted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AfError {
    /// The target's event queue is full; the event was reclaimed.
    #[error("event queue full, event not delivered")]
    QueueFull,
    /// Every suitable event pool is exhausted.
    #[error("event pools exhausted")]
    OutOfMemory,
    /// No active object is registered under this id.
    #[error("no active object registered as {0:?}")]
    UnknownTarget(AoId),
    /// The executive has halted after a fault; no further work is accepted.
    #[error("executive halted")]
    Halted,
    /// The operation itself raised this fault.
    #[error("fault: {0}")]
    Fault(#[from] FaultCode),
}
