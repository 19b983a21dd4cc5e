//! Tick-driven timers that post events on expiry.
//!
//! Time is counted in ticks of an application-chosen period; the platform
//! calls [`TimerService::tick`] from its timebase (a timer interrupt, a
//! thread, a test loop) and the service decrements every armed timer,
//! posting the timer's event when one reaches zero. One-shot timers disarm
//! on expiry; periodic timers reload. Timer events are static so a periodic
//! timer can post the same event indefinitely.

use hsm::Signal;

use crate::event::{Event, Payload};
use crate::exec::Executive;
use crate::fault::FaultCode;
use crate::sched::AoId;
use crate::sync::{Arc, Mutex};
use crate::trace::TraceRecord;
use crate::AfError;

struct TimerState {
    remaining: u32,
    period: u32,
    armed: bool,
}

/// A software timer bound to one target object and one signal.
pub struct Timer {
    target: AoId,
    event: Event,
    state: Mutex<TimerState>,
}

impl Timer {
    pub fn new(target: AoId, signal: Signal) -> Arc<Self> {
        Self::from_event(target, Event::of(signal))
    }

    /// A timer whose event carries a shared payload.
    pub fn with_payload(target: AoId, signal: Signal, payload: Payload) -> Arc<Self> {
        Self::from_event(target, Event::with_payload(signal, payload))
    }

    fn from_event(target: AoId, event: Event) -> Arc<Self> {
        Arc::new(Self {
            target,
            event,
            state: Mutex::new(TimerState {
                remaining: 0,
                period: 0,
                armed: false,
            }),
        })
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    /// Disarms the timer. Returns whether it was armed; stopping an idle
    /// timer is not an error, so expiry racing a stop is benign.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        let was_armed = state.armed;
        state.armed = false;
        was_armed
    }

    /// Advances one tick; true when the timer fired on this tick.
    fn poll(&self) -> bool {
        let mut state = self.state.lock();
        if !state.armed {
            return false;
        }
        state.remaining -= 1;
        if state.remaining > 0 {
            return false;
        }
        if state.period > 0 {
            state.remaining = state.period;
        } else {
            state.armed = false;
        }
        true
    }
}

/// Registry and tick pump for [`Timer`]s.
pub struct TimerService {
    exec: Arc<Executive>,
    timers: Mutex<Vec<Arc<Timer>>>,
}

impl TimerService {
    pub fn new(exec: Arc<Executive>) -> Self {
        Self {
            exec,
            timers: Mutex::new(Vec::new()),
        }
    }

    /// Arms `timer` to fire after `delay` ticks and then every `period`
    /// ticks; `period == 0` makes it one-shot. A zero delay can never fire
    /// and is a fault. Re-arming an armed timer restarts it.
    pub fn start(&self, timer: &Arc<Timer>, delay: u32, period: u32) -> Result<(), AfError> {
        if delay == 0 {
            self.exec.raise_fault(FaultCode::TimerZeroDelay);
            return Err(AfError::Fault(FaultCode::TimerZeroDelay));
        }
        {
            let mut state = timer.state.lock();
            state.remaining = delay;
            state.period = period;
            state.armed = true;
        }
        let mut timers = self.timers.lock();
        if !timers.iter().any(|t| Arc::ptr_eq(t, timer)) {
            timers.push(Arc::clone(timer));
        }
        Ok(())
    }

    /// Advances every armed timer one tick and posts the events of those
    /// that fired. A full target queue drops that delivery (the post path
    /// already reports it); the timer stays armed. Timers that ended this
    /// tick disarmed (stopped, or one-shots that just fired) leave the
    /// registry; re-arming through [`start`](Self::start) registers them
    /// again.
    pub fn tick(&self) {
        let mut fired = Vec::new();
        {
            let mut timers = self.timers.lock();
            timers.retain(|timer| {
                if timer.poll() {
                    fired.push(Arc::clone(timer));
                }
                timer.is_armed()
            });
        }
        for timer in fired {
            match self.exec.post(timer.target, &timer.event) {
                Ok(()) => {
                    self.exec.trace(&TraceRecord::TimerFired {
                        ao: timer.target,
                        signal: timer.event.signal(),
                    });
                }
                Err(AfError::QueueFull) => {}
                Err(err) => {
                    log::warn!(target: "af", "timer post failed: {err}");
                }
            }
        }
    }

    /// Number of currently armed timers.
    pub fn armed_count(&self) -> usize {
        self.timers.lock().iter().filter(|t| t.is_armed()).count()
    }
}
