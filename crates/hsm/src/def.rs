//! Declarative machine descriptions and their validated, frozen form.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{Signal, StateId};

/// Guard predicate evaluated before a transition is taken.
pub type Guard<C, E> = fn(&C, &E) -> bool;

/// Action executed on entry, exit or while taking a transition.
pub type Action<C, E> = fn(&mut C, &E);

/// Whether a transition changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Runs its actions in place; no exit/entry, no state change.
    Internal,
    /// Full external transition through the least common ancestor.
    External,
}

/// One row of a state's transition table.
pub struct TransitionCfg<C, E> {
    pub signal: Signal,
    pub guard: Option<Guard<C, E>>,
    pub actions: Vec<Action<C, E>>,
    pub target: Option<StateId>,
    pub kind: TransitionKind,
}

impl<C, E> TransitionCfg<C, E> {
    /// An external transition to `target`, unconditional until a guard is
    /// attached.
    pub fn external(signal: impl Into<Signal>, target: impl Into<StateId>) -> Self {
        Self {
            signal: signal.into(),
            guard: None,
            actions: Vec::new(),
            target: Some(target.into()),
            kind: TransitionKind::External,
        }
    }

    /// An internal transition: actions only, state untouched.
    pub fn internal(signal: impl Into<Signal>) -> Self {
        Self {
            signal: signal.into(),
            guard: None,
            actions: Vec::new(),
            target: None,
            kind: TransitionKind::Internal,
        }
    }

    pub fn guard(mut self, guard: Guard<C, E>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn action(mut self, action: Action<C, E>) -> Self {
        self.actions.push(action);
        self
    }
}

/// Declarative description of one state.
pub struct StateCfg<C, E> {
    id: StateId,
    parent: Option<StateId>,
    entry: Option<Action<C, E>>,
    exit: Option<Action<C, E>>,
    initial: Option<StateId>,
    transitions: Vec<TransitionCfg<C, E>>,
}

impl<C, E> StateCfg<C, E> {
    /// A root state: no parent.
    pub fn root(id: impl Into<StateId>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            entry: None,
            exit: None,
            initial: None,
            transitions: Vec::new(),
        }
    }

    /// A state nested under `parent`.
    pub fn child(id: impl Into<StateId>, parent: impl Into<StateId>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::root(id)
        }
    }

    pub fn on_entry(mut self, action: Action<C, E>) -> Self {
        self.entry = Some(action);
        self
    }

    pub fn on_exit(mut self, action: Action<C, E>) -> Self {
        self.exit = Some(action);
        self
    }

    /// Initial substate entered when this composite becomes active.
    pub fn initial(mut self, target: impl Into<StateId>) -> Self {
        self.initial = Some(target.into());
        self
    }

    pub fn transition(mut self, cfg: TransitionCfg<C, E>) -> Self {
        self.transitions.push(cfg);
        self
    }
}

/// Errors detected while validating a machine description.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DefError {
    #[error("machine has no states")]
    Empty,
    #[error("state {0} declared more than once")]
    DuplicateState(StateId),
    #[error("machine must have exactly one root state")]
    RootCount,
    #[error("state {0} names unknown parent {1}")]
    UnknownParent(StateId, StateId),
    #[error("parent chain of state {0} contains a cycle")]
    ParentCycle(StateId),
    #[error("composite state {0} has no initial transition")]
    MissingInitial(StateId),
    #[error("initial transition of {0} must target a direct child, got {1}")]
    InitialNotChild(StateId, StateId),
    #[error("leaf state {0} declares an initial transition")]
    InitialOnLeaf(StateId),
    #[error("transition on {1} in state {0} names unknown target {2}")]
    UnknownTarget(StateId, Signal, StateId),
    #[error("internal transition on {1} in state {0} must not name a target")]
    InternalWithTarget(StateId, Signal),
}

pub(crate) struct Transition<C, E> {
    pub(crate) signal: Signal,
    pub(crate) guard: Option<Guard<C, E>>,
    pub(crate) actions: Vec<Action<C, E>>,
    /// `None` for internal transitions, resolved arena index otherwise.
    pub(crate) target: Option<usize>,
}

pub(crate) struct StateNode<C, E> {
    pub(crate) id: StateId,
    pub(crate) entry: Option<Action<C, E>>,
    pub(crate) exit: Option<Action<C, E>>,
    pub(crate) initial: Option<usize>,
    /// Ancestor chain from the root down to (and including) this state.
    pub(crate) chain: Vec<usize>,
    pub(crate) transitions: Vec<Transition<C, E>>,
}

/// Immutable, validated state arena shared by all instances of a machine.
pub struct MachineDef<C, E> {
    pub(crate) states: Vec<StateNode<C, E>>,
    pub(crate) root: usize,
}

impl<C, E> MachineDef<C, E> {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Index of the first state common to both chains, comparing from the
    /// root down. The root is shared by construction, so this always
    /// succeeds.
    pub(crate) fn lca_depth(&self, a: usize, b: usize) -> usize {
        let ca = &self.states[a].chain;
        let cb = &self.states[b].chain;
        let mut depth = 0;
        while depth < ca.len() && depth < cb.len() && ca[depth] == cb[depth] {
            depth += 1;
        }
        depth - 1
    }
}

/// Collects state descriptions and validates them into a [`MachineDef`].
pub struct MachineBuilder<C, E> {
    states: Vec<StateCfg<C, E>>,
}

impl<C, E> Default for MachineBuilder<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, E> MachineBuilder<C, E> {
    pub fn new() -> Self {
        Self { states: Vec::new() }
    }

    pub fn state(mut self, cfg: StateCfg<C, E>) -> Self {
        self.states.push(cfg);
        self
    }

    /// Validates the description and freezes it.
    pub fn build(self) -> Result<MachineDef<C, E>, DefError> {
        if self.states.is_empty() {
            return Err(DefError::Empty);
        }

        let mut index: BTreeMap<StateId, usize> = BTreeMap::new();
        for (ix, cfg) in self.states.iter().enumerate() {
            if index.insert(cfg.id, ix).is_some() {
                return Err(DefError::DuplicateState(cfg.id));
            }
        }

        let mut root = None;
        for (ix, cfg) in self.states.iter().enumerate() {
            match cfg.parent {
                None if root.is_some() => return Err(DefError::RootCount),
                None => root = Some(ix),
                Some(parent) => {
                    if !index.contains_key(&parent) {
                        return Err(DefError::UnknownParent(cfg.id, parent));
                    }
                }
            }
        }
        let root = root.ok_or(DefError::RootCount)?;

        // Ancestor chains, detecting parent cycles by bounding the walk.
        let parent_ix: Vec<Option<usize>> = self
            .states
            .iter()
            .map(|cfg| cfg.parent.map(|p| index[&p]))
            .collect();
        let mut chains: Vec<Vec<usize>> = Vec::with_capacity(self.states.len());
        for (ix, cfg) in self.states.iter().enumerate() {
            let mut chain = vec![ix];
            let mut cursor = parent_ix[ix];
            while let Some(up) = cursor {
                if chain.len() > self.states.len() {
                    return Err(DefError::ParentCycle(cfg.id));
                }
                chain.push(up);
                cursor = parent_ix[up];
            }
            chain.reverse();
            chains.push(chain);
        }

        let mut is_composite = vec![false; self.states.len()];
        for parent in parent_ix.iter().flatten() {
            is_composite[*parent] = true;
        }

        let mut states = Vec::with_capacity(self.states.len());
        for (ix, cfg) in self.states.into_iter().enumerate() {
            let initial = match cfg.initial {
                Some(target) => {
                    if !is_composite[ix] {
                        return Err(DefError::InitialOnLeaf(cfg.id));
                    }
                    let target_ix = *index
                        .get(&target)
                        .ok_or(DefError::InitialNotChild(cfg.id, target))?;
                    if parent_ix[target_ix] != Some(ix) {
                        return Err(DefError::InitialNotChild(cfg.id, target));
                    }
                    Some(target_ix)
                }
                None if is_composite[ix] => return Err(DefError::MissingInitial(cfg.id)),
                None => None,
            };

            let mut transitions = Vec::with_capacity(cfg.transitions.len());
            for trn in cfg.transitions {
                let target = match (trn.kind, trn.target) {
                    (TransitionKind::Internal, None) => None,
                    (TransitionKind::Internal, Some(_)) => {
                        return Err(DefError::InternalWithTarget(cfg.id, trn.signal));
                    }
                    (TransitionKind::External, target) => {
                        let target = target.unwrap_or(cfg.id);
                        let target_ix = *index
                            .get(&target)
                            .ok_or(DefError::UnknownTarget(cfg.id, trn.signal, target))?;
                        Some(target_ix)
                    }
                };
                transitions.push(Transition {
                    signal: trn.signal,
                    guard: trn.guard,
                    actions: trn.actions,
                    target,
                });
            }

            states.push(StateNode {
                id: cfg.id,
                entry: cfg.entry,
                exit: cfg.exit,
                initial,
                chain: chains[ix].clone(),
                transitions,
            });
        }

        Ok(MachineDef { states, root })
    }
}
