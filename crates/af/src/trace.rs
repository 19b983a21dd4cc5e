//! Structured trace records emitted by the executive.
//!
//! Tracing is pull-free: the executive calls the installed [`TraceSink`]
//! synchronously at each instrumentation point. Sinks should be cheap; the
//! provided [`LogSink`] just forwards to the `log` facade at trace level.

use hsm::{Signal, StateId};

use crate::sched::AoId;

/// One instrumentation point in the life of the executive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceRecord {
    /// An active object began run-to-completion processing of an event.
    DispatchStart { ao: AoId, signal: Signal },
    /// A state's entry action ran.
    StateEntered { ao: AoId, state: StateId },
    /// A state's exit action ran.
    StateExited { ao: AoId, state: StateId },
    /// A state transition completed.
    TransitionTaken { ao: AoId, from: StateId, to: StateId },
    /// An event bubbled to the root without being consumed.
    EventUnhandled { ao: AoId, signal: Signal },
    /// A best-effort delivery was dropped on a full queue.
    EventDiscarded { ao: AoId, signal: Signal },
    /// A timer expired and posted its event.
    TimerFired { ao: AoId, signal: Signal },
    /// An armed event-flag condition was satisfied and its notification
    /// posted.
    FlagsSatisfied { ao: AoId, signal: Signal },
    /// All event queues drained; the executive is about to idle.
    SchedulerIdle,
}

/// Receiver for trace records.
pub trait TraceSink: Send + Sync {
    fn record(&self, rec: &TraceRecord);
}

/// Sink that forwards every record to the `log` facade.
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&self, rec: &TraceRecord) {
        log::trace!(target: "af", "{rec:?}");
    }
}
