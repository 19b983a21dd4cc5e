//! Fixed-size event pools with deterministic, eager reclamation.
//!
//! Dynamic events draw a slot from the smallest pool whose block size covers
//! the payload. The pool manager owns the reference counts: a fresh event
//! starts at zero (producer-owned), every queue insertion retains, and the
//! single engine-owned [`EventPools::release`] decrements and reclaims the
//! slot at zero. There is no sweeping collector; release runs immediately
//! after every dispatch and after every failed or abandoned insertion.

use hsm::Signal;
use thiserror::Error;

use crate::event::{Event, Origin, Payload};
use crate::sync::Mutex;

/// Configuration of one pool: `capacity` blocks of `block_size` bytes.
#[derive(Debug, Clone, Copy)]
pub struct PoolCfg {
    pub block_size: usize,
    pub capacity: u16,
}

impl PoolCfg {
    pub const fn new(block_size: usize, capacity: u16) -> Self {
        Self {
            block_size,
            capacity,
        }
    }
}

/// Occupancy snapshot of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub block_size: usize,
    pub capacity: u16,
    pub used: u16,
    /// Lowest number of free blocks ever observed; headroom indicator.
    pub min_free: u16,
}

/// Why an allocation could not be served.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Every pool whose block size covers the request is exhausted.
    /// Recoverable; nothing was corrupted.
    #[error("all matching event pools are exhausted")]
    Exhausted,
    /// The request exceeds the largest configured block size. This is a
    /// configuration error; the executive escalates it to a fault.
    #[error("request exceeds the largest pool block size")]
    Oversize,
}

/// Release of an event whose slot was already reclaimed. Escalated to
/// [`crate::FaultCode::EventStale`] by the executive.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("event released after its pool slot was reclaimed")]
pub struct StaleEvent;

struct PoolState {
    free: Vec<u16>,
    refs: Vec<u16>,
    live: Vec<bool>,
    used: u16,
    min_free: u16,
}

struct Pool {
    block_size: usize,
    capacity: u16,
    state: Mutex<PoolState>,
}

impl Pool {
    fn new(cfg: PoolCfg) -> Self {
        let n = cfg.capacity as usize;
        Self {
            block_size: cfg.block_size,
            capacity: cfg.capacity,
            state: Mutex::new(PoolState {
                // Hand out low slot numbers first.
                free: (0..cfg.capacity).rev().collect(),
                refs: vec![0; n],
                live: vec![false; n],
                used: 0,
                min_free: cfg.capacity,
            }),
        }
    }
}

/// The set of event pools, ordered by ascending block size.
pub struct EventPools {
    pools: Vec<Pool>,
}

impl EventPools {
    pub fn new(cfgs: &[PoolCfg]) -> Self {
        let mut cfgs = cfgs.to_vec();
        cfgs.sort_by_key(|cfg| cfg.block_size);
        Self {
            pools: cfgs.into_iter().map(Pool::new).collect(),
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn stats(&self, pool: usize) -> Option<PoolStats> {
        let p = self.pools.get(pool)?;
        let state = p.state.lock();
        Some(PoolStats {
            block_size: p.block_size,
            capacity: p.capacity,
            used: state.used,
            min_free: state.min_free,
        })
    }

    /// Draws a block from the smallest pool with `block_size >= size`.
    ///
    /// When that pool is empty the search continues into larger pools
    /// before giving up with [`AllocError::Exhausted`].
    pub fn allocate(
        &self,
        signal: Signal,
        payload: Option<Payload>,
        size: usize,
    ) -> Result<Event, AllocError> {
        let first = self
            .pools
            .iter()
            .position(|p| p.block_size >= size)
            .ok_or(AllocError::Oversize)?;

        for (ix, pool) in self.pools.iter().enumerate().skip(first) {
            let mut state = pool.state.lock();
            if let Some(slot) = state.free.pop() {
                state.refs[slot as usize] = 0;
                state.live[slot as usize] = true;
                state.used += 1;
                let free = pool.capacity - state.used;
                if free < state.min_free {
                    state.min_free = free;
                }
                return Ok(Event::dynamic(signal, ix as u8, slot, payload));
            }
        }
        Err(AllocError::Exhausted)
    }

    /// Adds one reference; called whenever an event is inserted into a
    /// queue or duplicated onto a second one. No-op for static events.
    pub fn retain(&self, evt: &Event) {
        if let Origin::Dynamic { pool, slot } = evt.origin() {
            let mut state = self.pools[pool as usize].state.lock();
            debug_assert!(state.live[slot as usize]);
            state.refs[slot as usize] += 1;
        }
    }

    /// Drops one reference; reclaims the slot when no holder remains.
    ///
    /// A zero-count event (allocated but never queued) is reclaimed
    /// immediately, which is how producers discard an event a failed post
    /// handed back to them. Static events ignore this.
    pub fn release(&self, evt: &Event) -> Result<(), StaleEvent> {
        let Origin::Dynamic { pool, slot } = evt.origin() else {
            return Ok(());
        };
        let mut state = self.pools[pool as usize].state.lock();
        let slot = slot as usize;
        if !state.live[slot] {
            return Err(StaleEvent);
        }
        if state.refs[slot] > 1 {
            state.refs[slot] -= 1;
        } else {
            state.refs[slot] = 0;
            state.live[slot] = false;
            state.free.push(slot as u16);
            state.used -= 1;
        }
        Ok(())
    }

    /// Current reference count of a dynamic event; zero for static ones.
    /// Diagnostic accessor, used by tests and trace sinks.
    pub fn ref_count(&self, evt: &Event) -> u16 {
        match evt.origin() {
            Origin::Static => 0,
            Origin::Dynamic { pool, slot } => {
                self.pools[pool as usize].state.lock().refs[slot as usize]
            }
        }
    }

    /// True when every pool has all blocks free; the quiescent condition
    /// tests assert after draining a scenario.
    pub fn all_free(&self) -> bool {
        self.pools.iter().all(|p| p.state.lock().used == 0)
    }
}
