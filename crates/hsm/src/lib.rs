//! # hsm
//!
//! Hierarchical state machine engine with data-driven transition tables.
//!
//! A machine is described declaratively: every state names its parent, its
//! optional entry/exit actions, its initial substate (for composites) and an
//! ordered list of transitions. [`MachineBuilder`] validates the description
//! once and freezes it into an immutable [`MachineDef`], an arena of states
//! addressed by index with the root-to-state ancestor chain of every state
//! precomputed. [`StateMachine`] instances share a definition through an
//! `Arc` and carry only the current leaf state.
//!
//! Dispatch resolves at most one transition per event:
//! - the ancestor chain of the current leaf is searched bottom-up for an
//!   enabled transition (guards evaluated in declaration order),
//! - internal transitions run their actions without an exit/entry sequence,
//! - external transitions exit up to (but not including) the least common
//!   ancestor of source and target, run the transition actions, enter down
//!   to the target and then follow initial transitions to a leaf,
//! - an event no ancestor handles is reported as [`Disposition::Unhandled`].
//!
//! The engine is agnostic of event representation: anything implementing
//! [`SmEvent`] can be dispatched, and the context type `C` is whatever the
//! application wants its actions to mutate.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod def;
mod machine;

pub use def::{
    Action, DefError, Guard, MachineBuilder, MachineDef, StateCfg, TransitionCfg, TransitionKind,
};
pub use machine::{Disposition, SmTrace, StateMachine};


/// Identifier for an event signal.
///
/// Signals are small numeric identifiers; the domain's alphabet is closed and
/// known when the machine is configured.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signal(pub u16);

impl From<u16> for Signal {
    #[inline]
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG({:#06x})", self.0)
    }
}

/// Application-chosen identifier for a state in a machine description.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u16);

impl From<u16> for StateId {
    #[inline]
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STATE({})", self.0)
    }
}

/// Minimal interface events must expose to be dispatched.
pub trait SmEvent {
    /// The signal identifying the kind of this event.
    fn signal(&self) -> Signal;
}

/// Bare signals are dispatchable events; convenient for tests and for
/// machines that never carry payloads.
impl SmEvent for Signal {
    fn signal(&self) -> Signal {
        *self
    }
}
