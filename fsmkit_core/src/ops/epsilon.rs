use std::collections::HashMap;

use tracing::debug;

use crate::ctx::FsmCtx;
use crate::error::Result;
use crate::graph::{EntryId, FsmGraph, StateId};
use crate::merge::MergeData;

/// Epsilon closure of a state: every state reachable through epsilon
/// transitions, flagged when reaching it leaves the owning machine.
type EptVect = Vec<(StateId, bool)>;

impl FsmGraph {
    /// Resolves all pending epsilon transitions of the machine.
    pub fn epsilon_op(&mut self, ctx: &mut FsmCtx) -> Result<()> {
        let mut md = MergeData::new();
        self.set_misfit_accounting(true);
        for state in self.state_ids() {
            self[state].owning_graph = 0;
        }
        self.resolve_epsilon_trans(ctx, &mut md)?;
        self.fill_in_states(ctx, &mut md)?;
        self.remove_misfits();
        self.set_misfit_accounting(false);
        debug!(states = self.state_count(), "epsilon");
        self.after_op_minimize(ctx);
        Ok(())
    }

    fn epsilon_fill_ept_vect_from(&self, root: StateId, from: StateId, parent_leaving: bool, vect: &mut EptVect) {
        for entry in self[from].epsilon_trans.iter() {
            let Some(targets) = self.entry_points.get(entry) else { continue };
            for targ in targets.iter().copied() {
                if targ == from || vect.iter().any(|(t, _)| *t == targ) {
                    continue;
                }
                let leaving = parent_leaving || self[root].owning_graph != self[targ].owning_graph;
                vect.push((targ, leaving));
                self.epsilon_fill_ept_vect_from(root, targ, leaving, vect);
            }
        }
    }

    /// Merges into every state the targets of its epsilon closure.
    ///
    /// Targets that have a closure of their own are replaced by a shadow copy
    /// taken before any merging, so their closure is not applied twice.
    pub(crate) fn resolve_epsilon_trans(&mut self, ctx: &mut FsmCtx, md: &mut MergeData) -> Result<()> {
        let mut epts: HashMap<StateId, EptVect> = HashMap::new();
        let mut roots = Vec::new();
        for state in self.state_ids() {
            let mut vect = EptVect::new();
            self.epsilon_fill_ept_vect_from(state, state, false, &mut vect);
            if !vect.is_empty() {
                epts.insert(state, vect);
                roots.push(state);
            }
        }

        let mut shadows: HashMap<StateId, StateId> = HashMap::new();
        for root in roots.iter() {
            let mut vect = epts.get(root).cloned().unwrap_or_default();
            for item in vect.iter_mut() {
                if !epts.contains_key(&item.0) {
                    continue;
                }
                let shadow = match shadows.get(&item.0) {
                    Some(shadow) => *shadow,
                    None => {
                        let shadow = self.add_state();
                        self.merge_states(ctx, md, shadow, item.0, false)?;
                        shadows.insert(item.0, shadow);
                        shadow
                    }
                };
                item.0 = shadow;
            }
            epts.insert(*root, vect);
        }

        for root in roots {
            let vect = epts.remove(&root).unwrap_or_default();
            for (targ, leaving) in vect {
                if leaving {
                    self.merge_states_leaving(ctx, md, root, targ)?;
                } else {
                    self.merge_states(ctx, md, root, targ, false)?;
                }
            }
        }

        for state in self.state_ids() {
            self[state].epsilon_trans.clear();
        }
        Ok(())
    }

    /// Joins machines through their entry points.
    ///
    /// The result starts where entry point `start_id` points and, when
    /// `final_id` is given, accepts only by reaching a fresh final state
    /// entered through it. Epsilon transitions between the machines are
    /// resolved. Unreachable states are dropped by a full sweep instead of
    /// misfit accounting.
    pub fn join_op(&mut self, ctx: &mut FsmCtx, start_id: EntryId, final_id: Option<EntryId>,
                   others: Vec<FsmGraph>) -> Result<()> {
        for state in self.state_ids() {
            self[state].owning_graph = 1;
        }
        self.unset_start_state();
        for (index, mut other) in others.into_iter().enumerate() {
            for state in other.state_ids() {
                other[state].owning_graph = 2 + index as u32;
            }
            self.absorb(other);
        }

        let mut md = MergeData::new();
        let start = self.add_state();
        self.set_start_state(start);
        if let Some(targets) = self.entry_points.get(&start_id) {
            let targets: Vec<StateId> = targets.iter().copied().collect();
            self.merge_state_list(ctx, &mut md, start, &targets)?;
        }

        let fin_copy: Vec<StateId> = self.finals.iter().copied().collect();
        self.unset_all_fin_states();
        if let Some(final_id) = final_id {
            let fin = self.add_state();
            self.set_fin_state(fin);
            self.set_entry(final_id, fin);
        }

        self.resolve_epsilon_trans(ctx, &mut md)?;
        for state in fin_copy {
            if self.contains(state) && !self.is_final(state) {
                self.clear_out_data(state);
            }
        }
        self.fill_in_states(ctx, &mut md)?;
        debug!(states = self.state_count(), "join");
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// Collects other machines into this one without connecting them. Their
    /// start states lose their status, entry points and final states remain.
    pub fn glob_op(&mut self, others: Vec<FsmGraph>) {
        for other in others {
            self.absorb(other);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ctx::FsmCtx;
    use crate::graph::FsmGraph;
    use crate::key::Key;

    #[test]
    fn epsilon_to_entry() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::from_text(b"ab");
        let mut tail = FsmGraph::from_text(b"cd");
        let tail_start = tail.start().unwrap();
        tail.set_entry(3, tail_start);
        fsm.epsilon_trans(3);
        fsm.glob_op(vec![tail]);

        fsm.epsilon_op(&mut ctx).unwrap();
        assert!(fsm.accepts(&ctx, b"abcd"));
        assert!(fsm.accepts(&ctx, b"ab"));
        assert!(!fsm.accepts(&ctx, b"abc"));
        assert!(!fsm.accepts(&ctx, b"cd"));
    }

    #[test]
    fn chained_epsilons() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::from_text(b"a");
        let mut mid = FsmGraph::lambda_fsm();
        let mut last = FsmGraph::from_text(b"z");
        let mid_start = mid.start().unwrap();
        mid.set_entry(1, mid_start);
        mid.epsilon_trans(2);
        let last_start = last.start().unwrap();
        last.set_entry(2, last_start);
        fsm.epsilon_trans(1);
        fsm.glob_op(vec![mid, last]);

        fsm.epsilon_op(&mut ctx).unwrap();
        assert!(fsm.accepts(&ctx, b"a"));
        assert!(fsm.accepts(&ctx, b"az"));
        assert!(!fsm.accepts(&ctx, b"z"));
    }

    #[test]
    fn join_through_entries() {
        let mut ctx = FsmCtx::default();
        // main: enters "x" then jumps to the final entry.
        let mut main = FsmGraph::from_text(b"x");
        let main_start = main.start().unwrap();
        main.set_entry(0, main_start);
        main.epsilon_trans(9);

        let other = FsmGraph::from_text(b"y");
        main.join_op(&mut ctx, 0, Some(9), vec![other]).unwrap();

        assert!(main.accepts(&ctx, b"x"));
        assert!(!main.accepts(&ctx, b"y"));
        assert!(!main.accepts(&ctx, b""));
        // The unrelated machine is unreachable and dropped.
        assert!(main.states().all(|(_, s)| s.out_list().iter().all(|t| t.low != Key::from(b'y'))));
    }
}
