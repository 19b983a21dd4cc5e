//! The fatal-assertion channel.
//!
//! Faults are violated invariants, programming or configuration errors
//! rather than runtime conditions. The contract is report-then-halt: the executive logs
//! the code, invokes the installed hook once and stops scheduling. Recovery
//! (reset, restart) is a platform decision outside the core.

use thiserror::Error;

use crate::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Closed set of fatal error codes, one per failure site, grouped by
/// subsystem.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    // --- active object lifecycle ---
    /// Two active objects registered at the same priority.
    #[error("priority already registered with the executive")]
    PriorityConflict,
    /// An active object was started a second time.
    #[error("active object started twice")]
    StartedTwice,

    // --- event pool ---
    /// Allocation request larger than the largest configured pool block.
    #[error("event larger than any configured pool block")]
    EventOversize,
    /// Release of an event whose pool slot was already reclaimed.
    #[error("event released after reclamation")]
    EventStale,

    // --- queues ---
    /// A deferred-event queue overflowed.
    #[error("deferred event queue overflow")]
    DeferOverflow,
    /// Recalling a deferred event found no room at the front of the queue.
    #[error("recalled event does not fit in the event queue")]
    RecallOverflow,

    // --- timer ---
    /// A timer was armed with a zero delay.
    #[error("timer armed with zero delay")]
    TimerZeroDelay,

    // --- event flags ---
    /// An event-flag wait was armed with an empty mask and can never be
    /// satisfied.
    #[error("event-flag wait armed with an empty mask")]
    FlagWaitEmptyMask,

    // --- dispatch engine ---
    /// An event reached a state machine whose initial transition never ran.
    #[error("dispatch into a machine that was never started")]
    MachineNotStarted,
}

/// Callback receiving the fault code before the executive halts.
pub type FaultHook = Arc<dyn Fn(FaultCode) + Send + Sync>;
