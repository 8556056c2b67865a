//! Pruning and minimization of finished or intermediate machines.

use std::collections::BTreeSet;

use tracing::debug;

use crate::ctx::{FsmCtx, MinimizeLevel};
use crate::graph::{FsmGraph, StateId};

mod minimize;
mod reach;

impl FsmGraph {
    /// Closing step of every operator. Misfit accounting cannot see cycles of
    /// states that only reach each other, those are swept here. Minimizes
    /// when the context asks for it.
    pub fn after_op_minimize(&mut self, ctx: &FsmCtx) {
        self.remove_unreachable_states();
        if ctx.minimize == MinimizeLevel::EveryOp {
            self.minimize_partition();
        }
    }

    /// Deletes a set of states in bulk.
    ///
    /// Edges from surviving states into the doomed ones are cut: the
    /// condition-transition loses its target and disappears unless it still
    /// carries actions or priorities, a transition left without any
    /// condition-transition disappears too. Counters are rebuilt afterwards.
    pub(crate) fn remove_states(&mut self, doomed: &BTreeSet<StateId>) {
        if doomed.is_empty() {
            return;
        }
        for id in self.state_ids() {
            if doomed.contains(&id) {
                continue;
            }
            let state = &mut self[id];
            for trans in state.out_list.iter_mut() {
                for cond in trans.conds.iter_mut() {
                    if cond.to.map_or(false, |to| doomed.contains(&to)) {
                        cond.to = None;
                    }
                }
                trans.conds.retain(|c| c.to.is_some() || !c.actions.is_empty() || !c.priors.is_empty());
            }
            state.out_list.retain(|t| !t.conds.is_empty());
            state.nfa_out.retain(|n| !doomed.contains(&n.to));
        }

        for id in doomed.iter() {
            for entry in self[*id].entry_ids.clone() {
                let mut emptied = false;
                if let Some(set) = self.entry_points.get_mut(&entry) {
                    set.remove(id);
                    emptied = set.is_empty();
                }
                if emptied {
                    self.entry_points.remove(&entry);
                }
            }
            self.finals.remove(id);
            if self.start == Some(*id) {
                self.start = None;
            }
            self.free_state(*id);
        }
        self.recount_references();
        debug!(removed = doomed.len(), states = self.state_count(), "removed states");
    }
}
