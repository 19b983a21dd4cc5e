//! State machine instances and the run-to-completion dispatch algorithm.

use std::sync::Arc;

use crate::def::MachineDef;
use crate::{Signal, SmEvent, StateId};

/// Outcome of dispatching one event. Exactly one of these occurs per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// An internal transition ran its actions; the state is unchanged.
    Internal,
    /// An external transition completed; `to` is the leaf finally entered.
    Transition { from: StateId, to: StateId },
    /// No state in the ancestor chain handles the signal. Not an error.
    Unhandled,
}

/// Step-level observations emitted during dispatch, for trace sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmTrace {
    Dispatch { signal: Signal, state: StateId },
    Entered(StateId),
    Exited(StateId),
    Transition { from: StateId, to: StateId },
    Unhandled { signal: Signal },
}

/// A running instance of a machine definition.
///
/// The definition is shared; the instance carries only the current leaf
/// state. `current` is committed after all exit, transition and entry
/// actions of a dispatch have run, never in between.
pub struct StateMachine<C, E> {
    def: Arc<MachineDef<C, E>>,
    current: usize,
    started: bool,
}

impl<C, E: SmEvent> StateMachine<C, E> {
    pub fn new(def: Arc<MachineDef<C, E>>) -> Self {
        let current = def.root;
        Self {
            def,
            current,
            started: false,
        }
    }

    pub fn def(&self) -> &Arc<MachineDef<C, E>> {
        &self.def
    }

    /// The current leaf state. Meaningful only after [`start`](Self::start).
    pub fn current(&self) -> StateId {
        self.def.states[self.current].id
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Runs the initial transition chain: enters the root and drills down
    /// through initial transitions to a leaf, executing entry actions
    /// top-down. Must happen before the first dispatch. Idempotent.
    pub fn start(&mut self, ctx: &mut C, evt: &E) {
        self.start_observed(ctx, evt, &mut |_| {});
    }

    pub fn start_observed(&mut self, ctx: &mut C, evt: &E, obs: &mut dyn FnMut(SmTrace)) {
        if self.started {
            return;
        }
        let mut leaf = self.def.root;
        self.enter(leaf, ctx, evt, obs);
        while let Some(initial) = self.def.states[leaf].initial {
            self.enter(initial, ctx, evt, obs);
            leaf = initial;
        }
        self.current = leaf;
        self.started = true;
    }

    /// Dispatches one event, resolving at most one transition.
    pub fn dispatch(&mut self, ctx: &mut C, evt: &E) -> Disposition {
        self.dispatch_observed(ctx, evt, &mut |_| {})
    }

    /// As [`dispatch`](Self::dispatch), reporting each step to `obs`.
    pub fn dispatch_observed(
        &mut self,
        ctx: &mut C,
        evt: &E,
        obs: &mut dyn FnMut(SmTrace),
    ) -> Disposition {
        let signal = evt.signal();
        obs(SmTrace::Dispatch {
            signal,
            state: self.current(),
        });

        // Bubble up the ancestor chain looking for an enabled transition.
        // Within one state, rows matching the signal are tried in
        // declaration order; the first one whose guard passes wins.
        let mut search = Some(self.current);
        while let Some(ix) = search {
            let node = &self.def.states[ix];
            for t in 0..node.transitions.len() {
                let trn = &self.def.states[ix].transitions[t];
                if trn.signal != signal {
                    continue;
                }
                if let Some(guard) = trn.guard {
                    if !guard(ctx, evt) {
                        continue;
                    }
                }
                return match trn.target {
                    None => {
                        self.run_actions(ix, t, ctx, evt);
                        Disposition::Internal
                    }
                    Some(target) => self.take_transition(ix, t, target, ctx, evt, obs),
                };
            }
            search = self.def.states[ix].chain.len().checked_sub(2).map(|depth| {
                self.def.states[ix].chain[depth]
            });
        }

        obs(SmTrace::Unhandled { signal });
        Disposition::Unhandled
    }

    fn take_transition(
        &mut self,
        owner: usize,
        row: usize,
        target: usize,
        ctx: &mut C,
        evt: &E,
        obs: &mut dyn FnMut(SmTrace),
    ) -> Disposition {
        let source = self.current;
        let from = self.def.states[source].id;
        let lca = self.def.lca_depth(source, target);

        // Exit from the current leaf up to, but not including, the LCA.
        let exit_len = self.def.states[source].chain.len();
        for depth in (lca + 1..exit_len).rev() {
            let ix = self.def.states[source].chain[depth];
            self.exit(ix, ctx, evt, obs);
        }

        self.run_actions(owner, row, ctx, evt);

        // Enter from below the LCA down to the target, then follow initial
        // transitions to a leaf.
        let entry_len = self.def.states[target].chain.len();
        for depth in lca + 1..entry_len {
            let ix = self.def.states[target].chain[depth];
            self.enter(ix, ctx, evt, obs);
        }
        let mut leaf = target;
        while let Some(initial) = self.def.states[leaf].initial {
            self.enter(initial, ctx, evt, obs);
            leaf = initial;
        }

        self.current = leaf;
        let to = self.def.states[leaf].id;
        obs(SmTrace::Transition { from, to });
        Disposition::Transition { from, to }
    }

    fn run_actions(&self, state: usize, row: usize, ctx: &mut C, evt: &E) {
        for action in &self.def.states[state].transitions[row].actions {
            action(ctx, evt);
        }
    }

    fn enter(&self, state: usize, ctx: &mut C, evt: &E, obs: &mut dyn FnMut(SmTrace)) {
        if let Some(entry) = self.def.states[state].entry {
            entry(ctx, evt);
        }
        obs(SmTrace::Entered(self.def.states[state].id));
    }

    fn exit(&self, state: usize, ctx: &mut C, evt: &E, obs: &mut dyn FnMut(SmTrace)) {
        if let Some(exit) = self.def.states[state].exit {
            exit(ctx, evt);
        }
        obs(SmTrace::Exited(self.def.states[state].id));
    }
}
