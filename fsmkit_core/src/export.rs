//! The finished automaton as handed to code generators.
//!
//! States are renumbered densely and condition-transitions are resolved into
//! the flat key space, so a consumer never deals with condition spaces.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::Serialize;

use crate::action::{ActionId, ActionTable};
use crate::cond::CondSpaceId;
use crate::ctx::FsmCtx;
use crate::graph::{EntryId, FsmGraph, StateId};
use crate::key::Key;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinishedTrans {
    pub low: Key,
    pub high: Key,
    pub target: Option<usize>,
    pub actions: Vec<ActionId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinishedNfaTrans {
    pub target: usize,
    pub order: i32,
    pub push_actions: Vec<ActionId>,
    pub restore_actions: Vec<ActionId>,
    pub pop_test: Vec<ActionId>,
    pub pop_actions: Vec<ActionId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinishedState {
    pub id: usize,
    pub is_final: bool,
    pub trans: Vec<FinishedTrans>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nfa: Vec<FinishedNfaTrans>,
    pub to_state_actions: Vec<ActionId>,
    pub from_state_actions: Vec<ActionId>,
    pub eof_actions: Vec<ActionId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinishedCondSpace {
    pub id: CondSpaceId,
    pub base_key: Key,
    pub actions: Vec<ActionId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FinishedMachine {
    pub start: Option<usize>,
    pub finals: Vec<usize>,
    pub entry_points: BTreeMap<EntryId, Vec<usize>>,
    pub cond_spaces: Vec<FinishedCondSpace>,
    pub states: Vec<FinishedState>,
}

/// Size figures of a machine, for logging and the driver's statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MachineStats {
    pub states: usize,
    pub finals: usize,
    pub transitions: usize,
    pub nfa_transitions: usize,
    pub entry_points: usize,
    pub cond_spaces: usize,
    pub nondeterministic: usize,
}

fn action_list(table: &ActionTable) -> Vec<ActionId> {
    table.actions().collect()
}

impl FsmGraph {
    /// Breadth-first numbering from the start state, then from the entry
    /// points, then whatever is left in arena order.
    fn number_states(&self) -> (Vec<StateId>, HashMap<StateId, usize>) {
        let mut order = Vec::with_capacity(self.state_count());
        let mut numbers = HashMap::with_capacity(self.state_count());
        let roots = self.start.into_iter()
            .chain(self.entry_points.values().flatten().copied())
            .chain(self.state_ids());

        for root in roots {
            if numbers.contains_key(&root) {
                continue;
            }
            numbers.insert(root, order.len());
            order.push(root);
            let mut queue = VecDeque::from([root]);
            while let Some(id) = queue.pop_front() {
                for to in self[id].successors() {
                    if !numbers.contains_key(&to) {
                        numbers.insert(to, order.len());
                        order.push(to);
                        queue.push_back(to);
                    }
                }
            }
        }
        (order, numbers)
    }

    /// Flattens the machine for code generation.
    pub fn finish(&self, ctx: &FsmCtx) -> FinishedMachine {
        let (order, numbers) = self.number_states();
        let key_ops = &ctx.key_ops;

        let states = order.iter()
            .enumerate()
            .map(|(index, id)| {
                let state = &self[*id];
                let mut trans = Vec::new();
                for t in state.out_list.iter() {
                    match t.cond_space {
                        None => {
                            for cond in t.conds.iter() {
                                trans.push(FinishedTrans {
                                    low: t.low,
                                    high: t.high,
                                    target: cond.to.map(|to| numbers[&to]),
                                    actions: action_list(&cond.actions),
                                });
                            }
                        }
                        Some(space) => {
                            let space = ctx.cond_keys.space(space);
                            for cond in t.conds.iter() {
                                trans.push(FinishedTrans {
                                    low: space.flat_key(key_ops, cond.key, t.low),
                                    high: space.flat_key(key_ops, cond.key, t.high),
                                    target: cond.to.map(|to| numbers[&to]),
                                    actions: action_list(&cond.actions),
                                });
                            }
                        }
                    }
                }
                trans.sort_by_key(|t| t.low);

                let nfa = state.nfa_out.iter()
                    .map(|n| FinishedNfaTrans {
                        target: numbers[&n.to],
                        order: n.order,
                        push_actions: action_list(&n.push_actions),
                        restore_actions: action_list(&n.restore_actions),
                        pop_test: action_list(&n.pop_test),
                        pop_actions: action_list(&n.pop_actions),
                    })
                    .collect();

                FinishedState {
                    id: index,
                    is_final: state.is_final(),
                    trans,
                    nfa,
                    to_state_actions: action_list(&state.to_state_actions),
                    from_state_actions: action_list(&state.from_state_actions),
                    eof_actions: action_list(&state.eof_actions),
                }
            })
            .collect();

        let mut finals: Vec<usize> = self.finals.iter().map(|f| numbers[f]).collect();
        finals.sort_unstable();

        let entry_points = self.entry_points.iter()
            .map(|(entry, targets)| {
                let mut ids: Vec<usize> = targets.iter().map(|t| numbers[t]).collect();
                ids.sort_unstable();
                (*entry, ids)
            })
            .collect();

        let cond_spaces = ctx.cond_keys.spaces()
            .map(|space| FinishedCondSpace {
                id: space.id,
                base_key: space.base_key,
                actions: space.set.iter().copied().collect(),
            })
            .collect();

        FinishedMachine {
            start: self.start.map(|s| numbers[&s]),
            finals,
            entry_points,
            cond_spaces,
            states,
        }
    }

    pub fn stats(&self) -> MachineStats {
        let mut transitions = 0;
        let mut nfa_transitions = 0;
        for (_, state) in self.states() {
            transitions += state.out_list.iter().map(|t| t.conds.len()).sum::<usize>();
            nfa_transitions += state.nfa_out.len();
        }
        MachineStats {
            states: self.state_count(),
            finals: self.finals.len(),
            transitions,
            nfa_transitions,
            entry_points: self.entry_points.len(),
            cond_spaces: self.states()
                .flat_map(|(_, s)| s.out_list.iter().filter_map(|t| t.cond_space))
                .collect::<std::collections::BTreeSet<_>>()
                .len(),
            nondeterministic: self.nondeterministic_count(),
        }
    }
}
