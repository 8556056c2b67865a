use std::mem;

use tracing::trace;

use crate::key::Key;

use super::{FsmGraph, StateId, Trans};

// Reference bookkeeping. `foreign_in` counts every reference that keeps a state
// alive from the outside, `in_trans` counts edges ending in it, self loops
// included.
impl FsmGraph {
    pub(crate) fn inc_foreign(&mut self, to: StateId) {
        let state = &mut self[to];
        state.foreign_in += 1;
        if state.foreign_in == 1 {
            state.misfit = false;
        }
    }

    pub(crate) fn dec_foreign(&mut self, to: StateId) {
        let accounting = self.misfit_accounting;
        let state = &mut self[to];
        debug_assert!(state.foreign_in > 0, "foreign reference count underflow on {}", to);
        state.foreign_in = state.foreign_in.saturating_sub(1);
        if state.foreign_in == 0 && accounting && !state.misfit {
            state.misfit = true;
            self.misfit_queue.push(to);
        }
    }

    pub(crate) fn attach_target(&mut self, from: StateId, to: StateId) {
        self[to].in_trans += 1;
        if from != to {
            self.inc_foreign(to);
        }
    }

    pub(crate) fn detach_target(&mut self, from: StateId, to: StateId) {
        let state = &mut self[to];
        state.in_trans = state.in_trans.saturating_sub(1);
        if from != to {
            self.dec_foreign(to);
        }
    }

    /// Registers every target of a transition that `from` is about to own.
    pub(crate) fn attach_trans(&mut self, from: StateId, trans: &Trans) {
        for to in trans.targets() {
            self.attach_target(from, to);
        }
    }

    pub(crate) fn detach_trans(&mut self, from: StateId, trans: &Trans) {
        for to in trans.targets() {
            self.detach_target(from, to);
        }
    }

    pub(crate) fn attach_state_dict(&mut self, from: StateId, to: StateId) {
        if from != to {
            self.inc_foreign(to);
        }
    }

    pub(crate) fn detach_state_dict(&mut self, from: StateId, to: StateId) {
        if from != to {
            self.dec_foreign(to);
        }
    }

    /// With accounting on, states losing their last foreign reference are
    /// queued for [`FsmGraph::remove_misfits`].
    pub fn set_misfit_accounting(&mut self, on: bool) {
        self.misfit_accounting = on;
    }

    /// Deletes every state that ended up without foreign references.
    ///
    /// Deleting a misfit releases its own references, so the removal cascades
    /// through chains of states only reachable from misfits.
    pub fn remove_misfits(&mut self) -> usize {
        let mut removed = 0;
        while let Some(id) = self.misfit_queue.pop() {
            if self.get(id).map_or(false, |s| s.misfit) {
                self.detach_state(id);
                self.free_state(id);
                removed += 1;
            }
        }
        if removed > 0 {
            trace!(removed, "removed misfits");
        }
        removed
    }

    /// Drops every reference held by or pointing at `id`, leaving it ready to
    /// be freed.
    pub(crate) fn detach_state(&mut self, id: StateId) {
        let state = &mut self[id];
        let entries = mem::take(&mut state.entry_ids);
        let out_list = mem::take(&mut state.out_list);
        let nfa_out = mem::take(&mut state.nfa_out);
        let dict = if state.dict_refs { state.dict_set.take() } else { None };
        state.dict_refs = false;

        for entry in entries {
            self.unset_entry_raw(entry, id);
        }
        for trans in out_list.iter() {
            self.detach_trans(id, trans);
        }
        for nfa in nfa_out.iter() {
            self.detach_target(id, nfa.to);
        }
        if let Some(set) = dict {
            for member in set.iter() {
                self.detach_state_dict(id, *member);
            }
        }
        if self.start == Some(id) {
            self.start = None;
        }
        self.finals.remove(&id);
    }

    fn unset_entry_raw(&mut self, entry: u32, id: StateId) {
        let mut emptied = false;
        if let Some(set) = self.entry_points.get_mut(&entry) {
            set.remove(&id);
            emptied = set.is_empty();
        }
        if emptied {
            self.entry_points.remove(&entry);
        }
    }

    /// Adds a plain transition over `low..=high`. The range must not overlap
    /// the transitions `from` already has.
    pub fn attach_new_trans(&mut self, from: StateId, to: StateId, low: Key, high: Key) {
        self.attach_target(from, to);
        let list = &mut self[from].out_list;
        let pos = list.partition_point(|t| t.low < low);
        list.insert(pos, Trans::new(low, high, Some(to)));
    }

    pub(crate) fn attach_new_nfa(&mut self, from: StateId, nfa: super::NfaTrans) {
        self.attach_target(from, nfa.to);
        self[from].nfa_out.push(nfa);
    }

    /// Redirects every edge, the start designation and the entry points of
    /// `src` onto `dest`.
    pub fn move_inward_trans(&mut self, dest: StateId, src: StateId) {
        if dest == src {
            return;
        }
        for from in self.state_ids() {
            let state = &mut self[from];
            let mut moved = 0;
            for trans in state.out_list.iter_mut() {
                for cond in trans.conds.iter_mut() {
                    if cond.to == Some(src) {
                        cond.to = Some(dest);
                        moved += 1;
                    }
                }
            }
            for nfa in state.nfa_out.iter_mut() {
                if nfa.to == src {
                    nfa.to = dest;
                    moved += 1;
                }
            }
            for _ in 0..moved {
                self.attach_target(from, dest);
                self.detach_target(from, src);
            }
        }

        if self.start == Some(src) {
            self.set_start_state(dest);
        }
        for entry in self[src].entry_ids.clone() {
            self.change_entry(entry, dest, src);
        }
    }

    /// The start state has no incoming edges and no entry points.
    pub fn is_start_state_isolated(&self) -> bool {
        match self.start {
            Some(start) => self[start].in_trans == 0 && self[start].entry_ids.is_empty(),
            None => true,
        }
    }

    pub fn has_out_data(&self, state: StateId) -> bool {
        self[state].has_out_data()
    }

    pub fn clear_out_data(&mut self, state: StateId) {
        let state = &mut self[state];
        state.out_actions.clear();
        state.out_priors.clear();
        state.out_cond_space = None;
        state.out_cond_keys.clear();
    }

    /// Applies the pending out actions and priorities of `src` to every
    /// transition and NFA edge leaving `dest`.
    pub fn transfer_out_data(&mut self, dest: StateId, src: StateId) {
        let actions = self[src].out_actions.clone();
        let priors = self[src].out_priors.clone();
        let state = &mut self[dest];
        for trans in state.out_list.iter_mut() {
            for cond in trans.conds.iter_mut().filter(|c| c.to.is_some()) {
                cond.actions.set_actions(&actions);
                cond.priors.set_priors(&priors);
            }
        }
        for nfa in state.nfa_out.iter_mut() {
            nfa.pop_actions.set_actions(&actions);
            nfa.priors.set_priors(&priors);
        }
    }

    /// Recomputes every reference counter from scratch and clears misfit tags.
    pub(crate) fn recount_references(&mut self) {
        let ids = self.state_ids();
        for id in ids.iter() {
            let state = &mut self[*id];
            state.foreign_in = 0;
            state.in_trans = 0;
            state.misfit = false;
        }
        self.misfit_queue.clear();

        let mut edges = Vec::new();
        for (from, state) in self.states() {
            edges.extend(state.successors().map(|to| (from, to, true)));
            if state.dict_refs {
                if let Some(set) = &state.dict_set {
                    edges.extend(set.iter().map(|to| (from, *to, false)));
                }
            }
        }
        for (from, to, is_edge) in edges {
            let state = &mut self[to];
            if is_edge {
                state.in_trans += 1;
            }
            if from != to {
                state.foreign_in += 1;
            }
        }
        if let Some(start) = self.start {
            self[start].foreign_in += 1;
        }
        let entries: Vec<StateId> = self.entry_points.values().flatten().copied().collect();
        for state in entries {
            self[state].foreign_in += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{FsmGraph, StateBits};
    use crate::key::Key;

    #[test]
    fn counters_follow_edges() {
        let mut g = FsmGraph::new();
        let a = g.add_state();
        let b = g.add_state();
        g.set_start_state(a);
        g.attach_new_trans(a, b, Key::from(b'x'), Key::from(b'x'));
        g.attach_new_trans(b, b, Key::from(b'y'), Key::from(b'y'));
        assert_eq!(g[a].foreign_in(), 1);
        assert_eq!(g[b].foreign_in(), 1);
        assert_eq!(g[b].in_trans(), 2);

        g.set_entry(7, b);
        assert_eq!(g[b].foreign_in(), 2);
        g.unset_entry(7, b);
        assert_eq!(g[b].foreign_in(), 1);
        assert!(g.find_entry(7).is_none());
    }

    #[test]
    fn misfits_cascade() {
        let mut g = FsmGraph::new();
        let a = g.add_state();
        let b = g.add_state();
        let c = g.add_state();
        g.set_start_state(a);
        g.attach_new_trans(a, b, Key::from(b'x'), Key::from(b'x'));
        g.attach_new_trans(b, c, Key::from(b'y'), Key::from(b'y'));
        g.set_fin_state(c);

        g.set_misfit_accounting(true);
        let fresh = g.add_state();
        g.set_start_state(fresh);
        assert!(g[a].is_misfit());
        assert_eq!(g.remove_misfits(), 3);
        g.set_misfit_accounting(false);

        assert_eq!(g.state_count(), 1);
        assert!(!g.contains(a));
        assert!(g.finals().is_empty());
        assert!(g.contains(fresh));
    }

    #[test]
    fn stale_ids_are_detected() {
        let mut g = FsmGraph::new();
        g.set_misfit_accounting(true);
        let a = g.add_state();
        g.remove_misfits();
        let b = g.add_state();
        assert_eq!(a.index(), b.index());
        assert!(!g.contains(a));
        assert!(g.contains(b));
    }

    #[test]
    fn move_inward() {
        let mut g = FsmGraph::new();
        let a = g.add_state();
        let b = g.add_state();
        let c = g.add_state();
        g.set_start_state(a);
        g.attach_new_trans(a, b, Key::from(b'x'), Key::from(b'x'));
        g.set_entry(1, b);
        g.move_inward_trans(c, b);
        assert_eq!(g[b].foreign_in(), 0);
        assert_eq!(g[c].foreign_in(), 2);
        assert_eq!(g[a].out_list()[0].conds[0].to, Some(c));
        assert!(g.find_entry(1).map_or(false, |s| s.contains(&c)));
    }

    #[test]
    fn fin_bits() {
        let mut g = FsmGraph::new();
        let a = g.add_state();
        g.set_fin_state(a);
        g.set_fin_bits(StateBits::GRAPH1);
        assert!(g[a].bits().contains(StateBits::GRAPH1 | StateBits::ISFINAL));
        g.unset_fin_bits(StateBits::BOTH);
        assert!(!g[a].bits().intersects(StateBits::BOTH));
        g.unset_all_fin_states();
        assert!(!g[a].is_final());
    }
}
