use super::{recorder_def, Rec, SIG_PING, SIG_PONG};
use crate::active::Active;
use crate::event::Event;
use crate::exec::{ExecConfig, Executive};
use crate::fault::FaultCode;
use crate::pool::PoolCfg;
use crate::sched::{AoId, Priority};
use crate::sync::{Arc, Mutex};
use crate::AfError;

fn setup(defer_capacity: usize) -> (Arc<Executive>, Arc<Mutex<Vec<String>>>) {
    let exec = Executive::new(
        ExecConfig::builder().pool(PoolCfg::new(16, 4)).build(),
    );
    let log = Arc::new(Mutex::new(Vec::new()));
    let ao = Active::with_capacities(
        "ao",
        AoId(1),
        Priority::new(1).unwrap(),
        recorder_def(),
        Rec {
            tag: "ao",
            log: Arc::clone(&log),
        },
        4,
        defer_capacity,
    );
    exec.register(ao).unwrap();
    exec.start();
    (exec, log)
}

#[test]
fn deferral_keeps_the_event_alive_until_recalled() {
    let (exec, log) = setup(4);

    let evt = exec.allocate_signal(SIG_PING).unwrap();
    exec.defer(AoId(1), &evt).unwrap();
    assert_eq!(exec.event_refs(&evt), 1);
    assert!(!exec.pools_quiescent());

    // Nothing to schedule while the event is parked.
    assert_eq!(exec.run_until_idle(), 0);
    assert!(log.lock().is_empty());

    assert_eq!(exec.recall(AoId(1)), Ok(true));
    exec.run_until_idle();
    assert_eq!(*log.lock(), ["ao:ping"]);
    assert!(exec.pools_quiescent());
}

#[test]
fn recall_on_empty_defer_queue_reports_false() {
    let (exec, _log) = setup(4);
    assert_eq!(exec.recall(AoId(1)), Ok(false));
}

#[test]
fn recalled_event_jumps_ahead_of_newer_traffic() {
    let (exec, log) = setup(4);

    let parked = exec.allocate_signal(SIG_PONG).unwrap();
    exec.defer(AoId(1), &parked).unwrap();

    exec.post(AoId(1), &Event::of(SIG_PING)).unwrap();
    exec.recall(AoId(1)).unwrap();
    exec.run_until_idle();

    // The recalled pong is seen before the ping posted after it was parked.
    assert_eq!(*log.lock(), ["ao:pong", "ao:ping"]);
    assert!(exec.pools_quiescent());
}

#[test]
fn deferred_events_are_recalled_in_order() {
    let (exec, log) = setup(4);

    let a = exec.allocate_signal(SIG_PING).unwrap();
    let b = exec.allocate_signal(SIG_PONG).unwrap();
    exec.defer(AoId(1), &a).unwrap();
    exec.defer(AoId(1), &b).unwrap();

    assert_eq!(exec.recall(AoId(1)), Ok(true));
    exec.run_until_idle();
    assert_eq!(exec.recall(AoId(1)), Ok(true));
    exec.run_until_idle();

    assert_eq!(*log.lock(), ["ao:ping", "ao:pong"]);
    assert_eq!(exec.recall(AoId(1)), Ok(false));
    assert!(exec.pools_quiescent());
}

#[test]
fn defer_queue_overflow_is_fatal() {
    let (exec, _log) = setup(1);

    let a = exec.allocate_signal(SIG_PING).unwrap();
    exec.defer(AoId(1), &a).unwrap();

    let b = exec.allocate_signal(SIG_PING).unwrap();
    assert_eq!(
        exec.defer(AoId(1), &b),
        Err(AfError::Fault(FaultCode::DeferOverflow))
    );
    assert!(exec.is_halted());
}

#[test]
fn recall_into_a_full_queue_is_fatal() {
    let exec = Executive::new(
        ExecConfig::builder().pool(PoolCfg::new(16, 4)).build(),
    );
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
        2,
    );
    exec.register(ao).unwrap();
    exec.start();

    let parked = exec.allocate_signal(SIG_PING).unwrap();
    exec.defer(AoId(1), &parked).unwrap();
    exec.post(AoId(1), &Event::of(SIG_PONG)).unwrap();

    assert_eq!(
        exec.recall(AoId(1)),
        Err(AfError::Fault(FaultCode::RecallOverflow))
    );
    assert!(exec.is_halted());
}
