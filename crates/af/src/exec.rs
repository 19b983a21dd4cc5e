//! The executive: registry, event delivery and the cooperative scheduler.
//!
//! One [`Executive`] owns the event pools, the ready set and the registry of
//! active objects. Scheduling is run-to-completion: [`Executive::dispatch_once`]
//! picks the highest-priority object with pending events and lets it process
//! exactly one. Posting is safe from any thread, including from actions that
//! run inside a dispatch; nothing here ever takes an active object's own
//! state lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use core::any::Any;
use core::mem;

use hsm::Signal;

use crate::active::Runnable;
use crate::event::Event;
use crate::fault::{FaultCode, FaultHook};
use crate::pool::{AllocError, EventPools, PoolCfg, PoolStats};
use crate::sched::{AoId, ReadySet};
use crate::sync::{Arc, Mutex};
use crate::trace::{TraceRecord, TraceSink};
use crate::AfError;

/// Static configuration of an executive.
#[derive(Clone)]
pub struct ExecConfig {
    name: &'static str,
    pools: Vec<PoolCfg>,
    idle_callback: Option<fn()>,
}

impl ExecConfig {
    pub fn builder() -> ExecConfigBuilder {
        ExecConfigBuilder {
            cfg: ExecConfig {
                name: "exec",
                pools: Vec::new(),
                idle_callback: None,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

pub struct ExecConfigBuilder {
    cfg: ExecConfig,
}

impl ExecConfigBuilder {
    pub fn name(mut self, name: &'static str) -> Self {
        self.cfg.name = name;
        self
    }

    /// Adds one event pool. Pools may be given in any order; they are kept
    /// sorted by block size.
    pub fn pool(mut self, cfg: PoolCfg) -> Self {
        self.cfg.pools.push(cfg);
        self
    }

    /// Called once each time the scheduler runs out of work.
    pub fn idle_callback(mut self, callback: fn()) -> Self {
        self.cfg.idle_callback = Some(callback);
        self
    }

    pub fn build(self) -> ExecConfig {
        self.cfg
    }
}

struct Registry {
    by_prio: Vec<Option<Arc<dyn Runnable>>>,
    by_id: BTreeMap<AoId, Arc<dyn Runnable>>,
}

/// The framework executive.
pub struct Executive {
    cfg: ExecConfig,
    pools: EventPools,
    registry: Mutex<Registry>,
    ready: Mutex<ReadySet>,
    halted: AtomicBool,
    fault_hook: Mutex<Option<FaultHook>>,
    trace: Mutex<Option<Arc<dyn TraceSink>>>,
}

impl Executive {
    pub fn new(cfg: ExecConfig) -> Arc<Self> {
        let pools = EventPools::new(&cfg.pools);
        Arc::new(Self {
            cfg,
            pools,
            registry: Mutex::new(Registry {
                by_prio: vec![None; 64],
                by_id: BTreeMap::new(),
            }),
            ready: Mutex::new(ReadySet::new()),
            halted: AtomicBool::new(false),
            fault_hook: Mutex::new(None),
            trace: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ExecConfig {
        &self.cfg
    }

    /// Installs the callback invoked on the first fault. Replaces any
    /// previous hook.
    pub fn set_fault_hook(&self, hook: FaultHook) {
        *self.fault_hook.lock() = Some(hook);
    }

    /// Installs a trace sink; records flow from the next instrumentation
    /// point on.
    pub fn set_trace_sink(&self, sink: Arc<dyn TraceSink>) {
        *self.trace.lock() = Some(sink);
    }

    // --- registry ---

    /// Registers an active object. Its priority and id must both be unique;
    /// a priority collision is a fault.
    pub fn register(&self, ao: Arc<dyn Runnable>) -> Result<(), AfError> {
        let prio = ao.priority();
        let mut reg = self.registry.lock();
        let slot = &mut reg.by_prio[prio.get() as usize];
        if slot.is_some() {
            drop(reg);
            self.raise_fault(FaultCode::PriorityConflict);
            return Err(AfError::Fault(FaultCode::PriorityConflict));
        }
        *slot = Some(Arc::clone(&ao));
        reg.by_id.insert(ao.id(), ao);
        Ok(())
    }

    /// Starts every registered object in ascending priority order, running
    /// each machine's initial transition.
    pub fn start(&self) {
        let objects: Vec<Arc<dyn Runnable>> = {
            let reg = self.registry.lock();
            reg.by_prio.iter().flatten().cloned().collect()
        };
        log::info!(target: "af", "{}: starting {} active objects", self.cfg.name, objects.len());
        for ao in objects {
            ao.start(self);
        }
    }

    fn lookup(&self, id: AoId) -> Option<Arc<dyn Runnable>> {
        self.registry.lock().by_id.get(&id).cloned()
    }

    // --- event allocation and delivery ---

    /// Allocates a dynamic event carrying `payload`, drawn from the
    /// smallest pool whose block size covers the payload type.
    pub fn allocate<T: Any + Send + Sync>(
        &self,
        signal: Signal,
        payload: T,
    ) -> Result<Event, AfError> {
        self.alloc(signal, Some(Arc::new(payload)), mem::size_of::<T>())
    }

    /// Allocates a payload-free dynamic event.
    pub fn allocate_signal(&self, signal: Signal) -> Result<Event, AfError> {
        self.alloc(signal, None, 0)
    }

    fn alloc(
        &self,
        signal: Signal,
        payload: Option<crate::event::Payload>,
        size: usize,
    ) -> Result<Event, AfError> {
        match self.pools.allocate(signal, payload, size) {
            Ok(evt) => Ok(evt),
            Err(AllocError::Exhausted) => Err(AfError::OutOfMemory),
            Err(AllocError::Oversize) => {
                self.raise_fault(FaultCode::EventOversize);
                Err(AfError::Fault(FaultCode::EventOversize))
            }
        }
    }

    /// Posts an event to the back of `target`'s queue.
    ///
    /// On success the queue holds a reference of its own; a dynamic event
    /// that is never posted again is reclaimed automatically after the
    /// target processes it. On a full queue the event is reclaimed and
    /// [`AfError::QueueFull`] tells the producer delivery failed.
    pub fn post(&self, target: AoId, evt: &Event) -> Result<(), AfError> {
        if self.is_halted() {
            return Err(AfError::Halted);
        }
        let ao = self.lookup(target).ok_or(AfError::UnknownTarget(target))?;
        self.pools.retain(evt);
        match ao.enqueue(evt.dup()) {
            Ok(()) => {
                self.ready.lock().insert(ao.priority());
                Ok(())
            }
            Err(returned) => {
                self.release(&returned);
                self.trace(&TraceRecord::EventDiscarded {
                    ao: target,
                    signal: evt.signal(),
                });
                log::warn!(
                    target: "af",
                    "{}: queue of {} full, {} not delivered",
                    self.cfg.name,
                    ao.name(),
                    evt.signal()
                );
                Err(AfError::QueueFull)
            }
        }
    }

    /// Delivers the event to every registered object, best effort: a full
    /// queue skips that subscriber instead of failing the publish. Consumes
    /// the producer's reference. Returns the number of deliveries.
    pub fn publish(&self, evt: Event) -> usize {
        let targets: Vec<AoId> = {
            let reg = self.registry.lock();
            reg.by_prio.iter().flatten().map(|ao| ao.id()).collect()
        };
        // Guard reference for the duration of the fan-out, so a full queue
        // on an early subscriber cannot reclaim the event out from under the
        // remaining posts.
        self.pools.retain(&evt);
        let mut delivered = 0;
        for target in targets {
            match self.post(target, &evt) {
                Ok(()) => delivered += 1,
                Err(AfError::QueueFull) => {}
                Err(_) => break,
            }
        }
        // Drop the guard; each accepting queue holds its own reference, and
        // a publish nobody accepted reclaims the event here.
        self.release(&evt);
        delivered
    }

    // --- deferral ---

    /// Parks the event on `ao`'s deferred queue, keeping a reference so the
    /// pool cannot reclaim it. Overflow of the deferred queue is a fault.
    pub fn defer(&self, ao: AoId, evt: &Event) -> Result<(), AfError> {
        let obj = self.lookup(ao).ok_or(AfError::UnknownTarget(ao))?;
        self.pools.retain(evt);
        match obj.defer_enqueue(evt.dup()) {
            Ok(()) => Ok(()),
            Err(returned) => {
                self.release(&returned);
                self.raise_fault(FaultCode::DeferOverflow);
                Err(AfError::Fault(FaultCode::DeferOverflow))
            }
        }
    }

    /// Moves the oldest deferred event, if any, to the *front* of `ao`'s
    /// event queue so it is processed before newer traffic. The parked
    /// reference transfers to the queue. One event per call; state entry
    /// actions typically call this until it reports `false`.
    pub fn recall(&self, ao: AoId) -> Result<bool, AfError> {
        let obj = self.lookup(ao).ok_or(AfError::UnknownTarget(ao))?;
        let Some(evt) = obj.defer_pop() else {
            return Ok(false);
        };
        match obj.enqueue_front(evt) {
            Ok(()) => {
                self.ready.lock().insert(obj.priority());
                Ok(true)
            }
            Err(returned) => {
                self.release(&returned);
                self.raise_fault(FaultCode::RecallOverflow);
                Err(AfError::Fault(FaultCode::RecallOverflow))
            }
        }
    }

    // --- scheduling ---

    /// Runs one run-to-completion step of the highest-priority ready
    /// object. Returns `false` when nothing is ready or the executive is
    /// halted.
    pub fn dispatch_once(&self) -> bool {
        if self.is_halted() {
            return false;
        }
        let Some(prio) = self.ready.lock().max() else {
            return false;
        };
        let Some(ao) = self.registry.lock().by_prio[prio.get() as usize].clone() else {
            return false;
        };
        let worked = ao.dispatch_one(self);
        let mut ready = self.ready.lock();
        if !ao.has_events() {
            ready.remove(prio);
        }
        worked
    }

    /// Dispatches until every queue is drained, then reports idle and runs
    /// the configured idle callback. Returns the number of events
    /// processed.
    pub fn run_until_idle(&self) -> usize {
        let mut processed = 0;
        while self.dispatch_once() {
            processed += 1;
        }
        self.trace(&TraceRecord::SchedulerIdle);
        if let Some(idle) = self.cfg.idle_callback {
            idle();
        }
        processed
    }

    // --- faults and reclamation ---

    /// Reports a fatal condition and halts scheduling. Only the first
    /// fault reaches the log and the hook.
    pub fn raise_fault(&self, code: FaultCode) {
        if self.halted.swap(true, Ordering::SeqCst) {
            return;
        }
        log::error!(target: "af", "{}: fault: {}", self.cfg.name, code);
        let hook = self.fault_hook.lock().clone();
        if let Some(hook) = hook {
            hook(code);
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Drops one reference to a dynamic event, reclaiming the pool block
    /// when no holder remains. No-op for static events.
    pub fn release(&self, evt: &Event) {
        if self.pools.release(evt).is_err() {
            self.raise_fault(FaultCode::EventStale);
        }
    }

    pub(crate) fn trace(&self, rec: &TraceRecord) {
        let sink = self.trace.lock().clone();
        if let Some(sink) = sink {
            sink.record(rec);
        }
    }

    // --- diagnostics ---

    pub fn pool_stats(&self, pool: usize) -> Option<PoolStats> {
        self.pools.stats(pool)
    }

    /// True when every pool block is free; the quiescent condition after a
    /// drained scenario with no events parked anywhere.
    pub fn pools_quiescent(&self) -> bool {
        self.pools.all_free()
    }

    /// Reference count of a dynamic event, for tests and trace tooling.
    pub fn event_refs(&self, evt: &Event) -> u16 {
        self.pools.ref_count(evt)
    }
}
