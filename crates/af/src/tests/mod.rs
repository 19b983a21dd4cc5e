mod defer;
mod exec;

use hsm::{MachineBuilder, MachineDef, Signal, StateCfg, StateId, TransitionCfg};

use crate::event::Event;
use crate::sync::{Arc, Mutex};

pub(crate) const SIG_PING: Signal = Signal(10);
pub(crate) const SIG_PONG: Signal = Signal(11);

pub(crate) const TOP: StateId = StateId(0);
pub(crate) const LEAF: StateId = StateId(1);

/// Context shared by the recorder fixture: every handled event appends
/// "tag:signal" to the shared log.
pub(crate) struct Rec {
    pub tag: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
}

fn note_ping(ctx: &mut Rec, _evt: &Event) {
    ctx.log.lock().push(format!("{}:ping", ctx.tag));
}

fn note_pong(ctx: &mut Rec, _evt: &Event) {
    ctx.log.lock().push(format!("{}:pong", ctx.tag));
}

/// A two-state machine that records every ping and pong it handles.
pub(crate) fn recorder_def() -> Arc<MachineDef<Rec, Event>> {
    let def = MachineBuilder::new()
        .state(StateCfg::root(TOP).initial(LEAF))
        .state(
            StateCfg::child(LEAF, TOP)
                .transition(TransitionCfg::internal(SIG_PING).action(note_ping))
                .transition(TransitionCfg::internal(SIG_PONG).action(note_pong)),
        )
        .build()
        .unwrap();
    Arc::new(def)
}
