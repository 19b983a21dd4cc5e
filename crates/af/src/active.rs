//! Active objects: a state machine, a context and a bounded event queue.
//!
//! Each active object owns its state exclusively; the only way in is an
//! event through its queue. The executive schedules objects, so everything
//! it needs (queue access, priority, the dispatch step) lives behind the
//! object-safe [`Runnable`] trait, while [`Active`] keeps the application's
//! context and machine definition strongly typed.

use hsm::{MachineDef, Signal, SmTrace, StateMachine};

use crate::defer::DeferQueue;
use crate::event::Event;
use crate::exec::Executive;
use crate::fault::FaultCode;
use crate::queue::EventQueue;
use crate::sched::{AoId, Priority};
use crate::sync::{Arc, Mutex};
use crate::trace::TraceRecord;

const DEFAULT_QUEUE_CAPACITY: usize = 16;
const DEFAULT_DEFER_CAPACITY: usize = 8;

/// Synthetic event handed to entry actions during the initial transition.
const START_EVT: Event = Event::of(Signal(0));

/// The executive's view of an active object.
///
/// Implemented by [`Active`]; applications normally never implement this
/// themselves.
pub trait Runnable: Send + Sync {
    fn id(&self) -> AoId;
    fn priority(&self) -> Priority;
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Runs the machine's initial transition. A second call is a
    /// [`FaultCode::StartedTwice`] fault.
    fn start(&self, exec: &Executive);

    /// Pops and processes one event to completion. Returns `false` when the
    /// queue was empty.
    fn dispatch_one(&self, exec: &Executive) -> bool;

    fn enqueue(&self, evt: Event) -> Result<(), Event>;
    fn enqueue_front(&self, evt: Event) -> Result<(), Event>;
    fn has_events(&self) -> bool;
    fn queue_len(&self) -> usize;

    fn defer_enqueue(&self, evt: Event) -> Result<(), Event>;
    fn defer_pop(&self) -> Option<Event>;
    fn deferred_len(&self) -> usize;
}

struct Inner<C> {
    sm: StateMachine<C, Event>,
    ctx: C,
}

/// An active object with context type `C`.
///
/// The machine and context sit behind one lock so actions observe a
/// consistent view; queues have their own locks and can be filled from any
/// thread while a dispatch is in progress.
pub struct Active<C> {
    name: &'static str,
    id: AoId,
    prio: Priority,
    queue: EventQueue,
    deferred: DeferQueue,
    inner: Mutex<Inner<C>>,
}

impl<C: Send + 'static> Active<C> {
    pub fn new(
        name: &'static str,
        id: AoId,
        prio: Priority,
        def: Arc<MachineDef<C, Event>>,
        ctx: C,
    ) -> Arc<Self> {
        Self::with_capacities(
            name,
            id,
            prio,
            def,
            ctx,
            DEFAULT_QUEUE_CAPACITY,
            DEFAULT_DEFER_CAPACITY,
        )
    }

    pub fn with_capacities(
        name: &'static str,
        id: AoId,
        prio: Priority,
        def: Arc<MachineDef<C, Event>>,
        ctx: C,
        queue_capacity: usize,
        defer_capacity: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            id,
            prio,
            queue: EventQueue::new(queue_capacity),
            deferred: DeferQueue::new(defer_capacity),
            inner: Mutex::new(Inner {
                sm: StateMachine::new(def),
                ctx,
            }),
        })
    }

    /// Reads the context under the object's lock. Not callable from inside
    /// this object's own actions.
    pub fn with_ctx<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.inner.lock().ctx)
    }

    /// Current leaf state of the machine.
    pub fn current_state(&self) -> hsm::StateId {
        self.inner.lock().sm.current()
    }
}

fn step_record(ao: AoId, step: SmTrace) -> TraceRecord {
    match step {
        SmTrace::Dispatch { signal, .. } => TraceRecord::DispatchStart { ao, signal },
        SmTrace::Entered(state) => TraceRecord::StateEntered { ao, state },
        SmTrace::Exited(state) => TraceRecord::StateExited { ao, state },
        SmTrace::Transition { from, to } => TraceRecord::TransitionTaken { ao, from, to },
        SmTrace::Unhandled { signal } => TraceRecord::EventUnhandled { ao, signal },
    }
}

impl<C: Send + 'static> Runnable for Active<C> {
    fn id(&self) -> AoId {
        self.id
    }

    fn priority(&self) -> Priority {
        self.prio
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn start(&self, exec: &Executive) {
        let mut inner = self.inner.lock();
        if inner.sm.is_started() {
            drop(inner);
            exec.raise_fault(FaultCode::StartedTwice);
            return;
        }
        log::debug!(target: "af", "{}: starting at priority {}", self.name, self.prio.get());
        let id = self.id;
        let Inner { sm, ctx } = &mut *inner;
        sm.start_observed(ctx, &START_EVT, &mut |step| {
            exec.trace(&step_record(id, step));
        });
    }

    fn dispatch_one(&self, exec: &Executive) -> bool {
        let Some(evt) = self.queue.pop() else {
            return false;
        };
        {
            let mut inner = self.inner.lock();
            if !inner.sm.is_started() {
                drop(inner);
                exec.raise_fault(FaultCode::MachineNotStarted);
            } else {
                let id = self.id;
                let Inner { sm, ctx } = &mut *inner;
                sm.dispatch_observed(ctx, &evt, &mut |step| {
                    exec.trace(&step_record(id, step));
                });
            }
        }
        // The queue's reference is dropped only after the run-to-completion
        // step, so the payload stays valid throughout.
        exec.release(&evt);
        true
    }

    fn enqueue(&self, evt: Event) -> Result<(), Event> {
        self.queue.push_back(evt)
    }

    fn enqueue_front(&self, evt: Event) -> Result<(), Event> {
        self.queue.push_front(evt)
    }

    fn has_events(&self) -> bool {
        !self.queue.is_empty()
    }

    fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn defer_enqueue(&self, evt: Event) -> Result<(), Event> {
        self.deferred.push(evt)
    }

    fn defer_pop(&self) -> Option<Event> {
        self.deferred.pop()
    }

    fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}
