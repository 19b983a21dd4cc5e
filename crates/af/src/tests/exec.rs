use std::sync::atomic::{AtomicUsize, Ordering};

use super::{recorder_def, Rec, SIG_PING, SIG_PONG};
use crate::active::Active;
use crate::event::Event;
use crate::exec::{ExecConfig, Executive};
use crate::fault::FaultCode;
use crate::pool::PoolCfg;
use crate::sched::{AoId, Priority};
use crate::sync::{Arc, Mutex};
use crate::AfError;

fn exec() -> Arc<Executive> {
    Executive::new(
        ExecConfig::builder()
            .name("test")
            .pool(PoolCfg::new(16, 4))
            .build(),
    )
}

fn recorder(
    tag: &'static str,
    id: u8,
    prio: u8,
    log: &Arc<Mutex<Vec<String>>>,
) -> Arc<Active<Rec>> {
    Active::new(
        tag,
        AoId(id),
        Priority::new(prio).unwrap(),
        recorder_def(),
        Rec {
            tag,
            log: Arc::clone(log),
        },
    )
}

#[test]
fn higher_priority_object_runs_first() {
    let exec = exec();
    let log = Arc::new(Mutex::new(Vec::new()));
    let low = recorder("low", 1, 1, &log);
    let high = recorder("high", 2, 40, &log);
    exec.register(low).unwrap();
    exec.register(high).unwrap();
    exec.start();

    exec.post(AoId(1), &Event::of(SIG_PING)).unwrap();
    exec.post(AoId(2), &Event::of(SIG_PING)).unwrap();
    let processed = exec.run_until_idle();

    assert_eq!(processed, 2);
    assert_eq!(*log.lock(), ["high:ping", "low:ping"]);
}

#[test]
fn events_to_one_object_are_processed_in_fifo_order() {
    let exec = exec();
    let log = Arc::new(Mutex::new(Vec::new()));
    let ao = recorder("ao", 1, 5, &log);
    exec.register(ao).unwrap();
    exec.start();

    exec.post(AoId(1), &Event::of(SIG_PING)).unwrap();
    exec.post(AoId(1), &Event::of(SIG_PONG)).unwrap();
    exec.run_until_idle();

    assert_eq!(*log.lock(), ["ao:ping", "ao:pong"]);
}

#[test]
fn full_queue_rejects_the_post_and_reclaims_the_event() {
    let exec = exec();
    let log = Arc::new(Mutex::new(Vec::new()));
    let ao = Active::with_capacities(
        "tiny",
        AoId(1),
        Priority::new(1).unwrap(),
        recorder_def(),
        Rec {
            tag: "tiny",
            log: Arc::clone(&log),
        },
        1,
        1,
    );
    exec.register(ao).unwrap();
    exec.start();

    let first = exec.allocate_signal(SIG_PING).unwrap();
    exec.post(AoId(1), &first).unwrap();

    let second = exec.allocate_signal(SIG_PING).unwrap();
    assert_eq!(exec.post(AoId(1), &second), Err(AfError::QueueFull));
    assert!(!exec.is_halted());

    exec.run_until_idle();
    assert_eq!(*log.lock(), ["tiny:ping"]);
    assert!(exec.pools_quiescent());
}

#[test]
fn post_to_unregistered_object_fails() {
    let exec = exec();
    let evt = Event::of(SIG_PING);
    assert_eq!(
        exec.post(AoId(9), &evt),
        Err(AfError::UnknownTarget(AoId(9)))
    );
}

#[test]
fn priority_conflict_is_fatal() {
    let exec = exec();
    let log = Arc::new(Mutex::new(Vec::new()));
    let faults: Arc<Mutex<Vec<FaultCode>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let faults = Arc::clone(&faults);
        exec.set_fault_hook(Arc::new(move |code| faults.lock().push(code)));
    }

    exec.register(recorder("a", 1, 7, &log)).unwrap();
    let err = exec.register(recorder("b", 2, 7, &log)).unwrap_err();

    assert_eq!(err, AfError::Fault(FaultCode::PriorityConflict));
    assert!(exec.is_halted());
    assert_eq!(*faults.lock(), [FaultCode::PriorityConflict]);

    // A halted executive accepts no further work.
    assert_eq!(
        exec.post(AoId(1), &Event::of(SIG_PING)),
        Err(AfError::Halted)
    );
    assert!(!exec.dispatch_once());
}

#[test]
fn only_the_first_fault_reaches_the_hook() {
    let exec = exec();
    let faults: Arc<Mutex<Vec<FaultCode>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let faults = Arc::clone(&faults);
        exec.set_fault_hook(Arc::new(move |code| faults.lock().push(code)));
    }

    exec.raise_fault(FaultCode::TimerZeroDelay);
    exec.raise_fault(FaultCode::DeferOverflow);

    assert_eq!(*faults.lock(), [FaultCode::TimerZeroDelay]);
}

static IDLE_HITS: AtomicUsize = AtomicUsize::new(0);

fn count_idle() {
    IDLE_HITS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn idle_callback_runs_when_queues_drain() {
    let exec = Executive::new(
        ExecConfig::builder()
            .pool(PoolCfg::new(16, 4))
            .idle_callback(count_idle)
            .build(),
    );
    let before = IDLE_HITS.load(Ordering::SeqCst);
    exec.run_until_idle();
    assert_eq!(IDLE_HITS.load(Ordering::SeqCst), before + 1);
}

#[test]
fn dynamic_event_payload_reaches_the_consumer() {
    let exec = exec();
    let evt = exec.allocate(SIG_PING, 1234u32).unwrap();
    assert!(evt.is_dynamic());
    assert_eq!(evt.payload::<u32>(), Some(&1234));
    assert_eq!(evt.payload::<u8>(), None);
    exec.release(&evt);
    assert!(exec.pools_quiescent());
}

#[test]
fn multicast_event_is_reclaimed_after_the_last_consumer() {
    let exec = exec();
    let log = Arc::new(Mutex::new(Vec::new()));
    exec.register(recorder("a", 1, 3, &log)).unwrap();
    exec.register(recorder("b", 2, 4, &log)).unwrap();
    exec.start();

    let evt = exec.allocate_signal(SIG_PONG).unwrap();
    exec.post(AoId(1), &evt).unwrap();
    exec.post(AoId(2), &evt).unwrap();
    assert_eq!(exec.event_refs(&evt), 2);

    exec.run_until_idle();
    assert_eq!(*log.lock(), ["b:pong", "a:pong"]);
    assert!(!exec.is_halted());
    assert!(exec.pools_quiescent());
}

#[test]
fn publish_reaches_every_object_best_effort() {
    let exec = exec();
    let log = Arc::new(Mutex::new(Vec::new()));
    exec.register(recorder("a", 1, 3, &log)).unwrap();
    exec.register(recorder("b", 2, 4, &log)).unwrap();
    exec.start();

    let evt = exec.allocate_signal(SIG_PING).unwrap();
    let delivered = exec.publish(evt);
    assert_eq!(delivered, 2);

    exec.run_until_idle();
    let mut seen = log.lock().clone();
    seen.sort();
    assert_eq!(seen, ["a:ping", "b:ping"]);

    // The subscribers' releases balance the publish retains exactly; the
    // executive stays healthy and the block comes back to its pool.
    assert!(!exec.is_halted());
    assert!(exec.pools_quiescent());
}

#[test]
fn publish_survives_a_full_subscriber_queue() {
    let exec = exec();
    let log = Arc::new(Mutex::new(Vec::new()));
    let tiny = Active::with_capacities(
        "tiny",
        AoId(1),
        Priority::new(1).unwrap(),
        recorder_def(),
        Rec {
            tag: "tiny",
            log: Arc::clone(&log),
        },
        1,
        1,
    );
    exec.register(tiny).unwrap();
    exec.register(recorder("b", 2, 4, &log)).unwrap();
    exec.start();

    // The lowest-priority subscriber is visited first and its queue is
    // already full; the event must still reach the second subscriber.
    exec.post(AoId(1), &Event::of(SIG_PONG)).unwrap();
    let evt = exec.allocate_signal(SIG_PING).unwrap();
    let delivered = exec.publish(evt);
    assert_eq!(delivered, 1);
    assert!(!exec.is_halted());

    exec.run_until_idle();
    let mut seen = log.lock().clone();
    seen.sort();
    assert_eq!(seen, ["b:ping", "tiny:pong"]);
    assert!(exec.pools_quiescent());
}

#[test]
fn publish_without_subscribers_reclaims_the_event() {
    let exec = exec();
    let evt = exec.allocate_signal(SIG_PING).unwrap();
    assert_eq!(exec.publish(evt), 0);
    assert!(!exec.is_halted());
    assert!(exec.pools_quiescent());
}

#[test]
fn pool_exhaustion_is_recoverable() {
    let exec = Executive::new(
        ExecConfig::builder().pool(PoolCfg::new(16, 1)).build(),
    );
    let held = exec.allocate_signal(SIG_PING).unwrap();
    assert_eq!(
        exec.allocate_signal(SIG_PING).unwrap_err(),
        AfError::OutOfMemory
    );
    assert!(!exec.is_halted());

    exec.release(&held);
    assert!(exec.allocate_signal(SIG_PING).is_ok());
}

#[test]
fn oversize_allocation_is_a_fault() {
    let exec = Executive::new(
        ExecConfig::builder().pool(PoolCfg::new(4, 4)).build(),
    );
    let err = exec.allocate(SIG_PING, [0u8; 64]).unwrap_err();
    assert_eq!(err, AfError::Fault(FaultCode::EventOversize));
    assert!(exec.is_halted());
}
