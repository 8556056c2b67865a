use std::collections::VecDeque;

use indexmap::IndexMap;
use tracing::trace;

use crate::cond::expand_cond_keys;
use crate::ctx::FsmCtx;
use crate::error::Result;
use crate::graph::{FsmGraph, StateBits, StateId};
use crate::util::StateSet;

mod cross;
mod pair_iter;

pub(crate) use cross::add_in_trans;

/// Per-operator bookkeeping of combination states.
///
/// `dict` maps every state set already represented to its combination state,
/// `fill` queues the combinations whose transitions are still to be merged in.
#[derive(Debug, Default)]
pub struct MergeData {
    pub(crate) dict: IndexMap<StateSet, StateId>,
    pub(crate) fill: VecDeque<StateId>,
}

impl MergeData {
    pub fn new() -> Self {
        MergeData::default()
    }

    pub fn pending(&self) -> usize {
        self.fill.len()
    }
}

impl FsmGraph {
    /// Makes `dest` behave like the union of itself and `src`.
    ///
    /// `leaving` is set when `src` is entered by leaving `dest`'s machine, out
    /// conditions are then intersected instead of united.
    pub fn merge_states(&mut self, ctx: &mut FsmCtx, md: &mut MergeData,
                        dest: StateId, src: StateId, leaving: bool) -> Result<()> {
        trace!(dest = %dest, src = %src, leaving, "merge states");
        let src_list = self[src].out_list.clone();
        self.out_trans_copy(ctx, md, dest, &src_list)?;
        self.merge_state_properties(dest, src);
        self.merge_out_conds(ctx, dest, src, leaving)?;
        self.merge_state_bits(dest, src);
        self.merge_nfa_transitions(dest, src);
        Ok(())
    }

    fn merge_state_properties(&mut self, dest: StateId, src: StateId) {
        // Merging a state into itself: every table already holds its own entries.
        let Some((dest, src)) = self.pair_mut(dest, src) else {
            return;
        };
        for entry in src.epsilon_trans.iter() {
            if !dest.epsilon_trans.contains(entry) {
                dest.epsilon_trans.push(*entry);
            }
        }
        dest.to_state_actions.set_actions(&src.to_state_actions);
        dest.from_state_actions.set_actions(&src.from_state_actions);
        dest.out_actions.set_actions(&src.out_actions);
        dest.eof_actions.set_actions(&src.eof_actions);
        dest.out_priors.set_priors(&src.out_priors);
    }

    /// Combines the out-condition spaces of both states. Out conditions of two
    /// final states are united, leaving merges keep only the combinations both
    /// sides allow.
    fn merge_out_conds(&mut self, ctx: &mut FsmCtx, dest: StateId, src: StateId, leaving: bool) -> Result<()> {
        if dest == src {
            return Ok(());
        }
        let both_final = self[dest].is_final() && self[src].is_final();
        let dest_space = self[dest].out_cond_space;
        let src_space = self[src].out_cond_space;
        if dest_space.is_none() && src_space.is_none() {
            return Ok(());
        }

        let dest_set = ctx.cond_keys.set_of(dest_space);
        let src_set = ctx.cond_keys.set_of(src_space);
        let merged = dest_set.union(&src_set);
        let merged_id = ctx.cond_keys.add_cond_space(&merged)?;

        let mut src_keys = self[src].out_cond_keys.clone();
        if src_space.is_none() {
            src_keys.insert(0);
        }
        if src_space != Some(merged_id) {
            src_keys = expand_cond_keys(&src_keys, &src_set, &merged);
        }

        let state = &mut self[dest];
        if dest_space.is_none() {
            state.out_cond_keys.insert(0);
        }
        if dest_space != Some(merged_id) {
            state.out_cond_keys = expand_cond_keys(&state.out_cond_keys, &dest_set, &merged);
        }
        state.out_cond_space = Some(merged_id);

        if !leaving && both_final {
            state.out_cond_keys.extend(src_keys);
        } else {
            state.out_cond_keys.retain(|k| src_keys.contains(k));
        }
        Ok(())
    }

    fn merge_state_bits(&mut self, dest: StateId, src: StateId) {
        let src_bits = self[src].bits;
        self[dest].bits.insert(src_bits & !StateBits::ISFINAL);
        if src_bits.contains(StateBits::ISFINAL) {
            self.set_fin_state(dest);
        }
    }

    fn merge_nfa_transitions(&mut self, dest: StateId, src: StateId) {
        let nfa_out = self[src].nfa_out.clone();
        for nfa in nfa_out {
            if !self[dest].nfa_out.contains(&nfa) {
                self.attach_new_nfa(dest, nfa);
            }
        }
    }

    /// Merges `src` into `dest` where `src` is reached by leaving `dest`.
    ///
    /// Pending out data of `dest` belongs on the transitions that leave it, so
    /// `src` is first copied into a scratch state that receives that data.
    pub fn merge_states_leaving(&mut self, ctx: &mut FsmCtx, md: &mut MergeData,
                                dest: StateId, src: StateId) -> Result<()> {
        if !self.has_out_data(dest) {
            return self.merge_states(ctx, md, dest, src, true);
        }

        let scratch = self.add_state();
        self.merge_states(ctx, md, scratch, src, false)?;
        self.transfer_out_data(scratch, dest);

        if let Some(space) = self[dest].out_cond_space {
            let set = ctx.cond_keys.space(space).set.clone();
            let keys = self[dest].out_cond_keys.clone();
            self.restrict_cond_set(ctx, scratch, &set, &keys)?;
        }

        self.merge_states(ctx, md, dest, scratch, true)
    }

    pub fn merge_state_list(&mut self, ctx: &mut FsmCtx, md: &mut MergeData,
                            dest: StateId, srcs: &[StateId]) -> Result<()> {
        for src in srcs {
            self.merge_states(ctx, md, dest, *src, false)?;
        }
        Ok(())
    }

    /// Merges every queued combination state with its members until the queue
    /// runs dry, then forgets the state sets.
    pub fn fill_in_states(&mut self, ctx: &mut FsmCtx, md: &mut MergeData) -> Result<()> {
        while let Some(state) = md.fill.pop_front() {
            self.fill_state(ctx, md, state)?;
        }
        self.clear_state_dict(md);
        Ok(())
    }

    pub(crate) fn fill_state(&mut self, ctx: &mut FsmCtx, md: &mut MergeData, state: StateId) -> Result<()> {
        let set = match self.get(state).and_then(|s| s.dict_set.clone()) {
            Some(set) => set,
            None => return Ok(()),
        };
        for member in set.iter() {
            self.merge_states(ctx, md, state, *member, false)?;
        }
        self.release_state_dict(state);
        Ok(())
    }

    /// Drops the references a combination state holds on its members, the set
    /// itself stays for later lookups.
    pub(crate) fn release_state_dict(&mut self, state: StateId) {
        if !self[state].dict_refs {
            return;
        }
        self[state].dict_refs = false;
        if let Some(set) = self[state].dict_set.clone() {
            for member in set.iter() {
                self.detach_state_dict(state, *member);
            }
        }
    }

    pub(crate) fn clear_state_dict(&mut self, md: &mut MergeData) {
        md.dict.clear();
        for id in self.state_ids() {
            if self[id].dict_set.is_some() {
                self.release_state_dict(id);
                self[id].dict_set = None;
            }
        }
    }

    /// A fresh state with the behaviour of the start state.
    pub fn dup_start_state(&mut self, ctx: &mut FsmCtx, md: &mut MergeData) -> Result<StateId> {
        let start = self.ensure_start();
        let dup = self.add_state();
        self.merge_states(ctx, md, dup, start, false)?;
        Ok(dup)
    }
}
