use std::collections::BTreeSet;

use fixedbitset::FixedBitSet;

use crate::graph::{FsmGraph, StateId};

impl FsmGraph {
    fn mark_from(&self, roots: impl IntoIterator<Item = StateId>, marked: &mut FixedBitSet) {
        let mut stack: Vec<StateId> = roots.into_iter().collect();
        while let Some(id) = stack.pop() {
            if marked.put(id.index()) {
                continue;
            }
            let state = &self[id];
            stack.extend(state.successors().filter(|to| !marked.contains(to.index())));
            if state.dict_refs {
                if let Some(set) = &state.dict_set {
                    stack.extend(set.iter().copied());
                }
            }
        }
    }

    /// Deletes every state that neither the start state nor an entry point
    /// leads to. Pending combination states keep their members alive.
    pub fn remove_unreachable_states(&mut self) -> usize {
        let mut marked = FixedBitSet::with_capacity(self.slot_count());
        let roots = self.start.into_iter()
            .chain(self.entry_points.values().flatten().copied());
        self.mark_from(roots, &mut marked);

        let doomed: BTreeSet<StateId> = self.states()
            .filter(|(id, _)| !marked.contains(id.index()))
            .map(|(id, _)| id)
            .collect();
        self.remove_states(&doomed);
        doomed.len()
    }

    /// Deletes every state from which no final state can be reached. The
    /// start state always survives so that a machine accepting nothing keeps
    /// its start.
    pub fn remove_dead_end_states(&mut self) -> usize {
        let mut preds: Vec<Vec<StateId>> = vec![Vec::new(); self.slot_count()];
        for (from, state) in self.states() {
            for to in state.successors() {
                preds[to.index()].push(from);
            }
        }

        let mut marked = FixedBitSet::with_capacity(self.slot_count());
        let mut stack: Vec<StateId> = self.finals.iter().copied().collect();
        while let Some(id) = stack.pop() {
            if marked.put(id.index()) {
                continue;
            }
            stack.extend(preds[id.index()].iter().copied());
        }
        if let Some(start) = self.start {
            marked.insert(start.index());
        }

        let doomed: BTreeSet<StateId> = self.states()
            .filter(|(id, _)| !marked.contains(id.index()))
            .map(|(id, _)| id)
            .collect();
        self.remove_states(&doomed);
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::ctx::FsmCtx;
    use crate::graph::FsmGraph;
    use crate::key::Key;

    #[test]
    fn unreachable_dropped() {
        let mut fsm = FsmGraph::from_text(b"ab");
        let stray = fsm.add_state();
        let other = fsm.add_state();
        fsm.attach_new_trans(stray, other, Key::from(b'x'), Key::from(b'x'));

        assert_eq!(fsm.remove_unreachable_states(), 2);
        assert_eq!(fsm.state_count(), 3);
        assert!(!fsm.contains(stray));
    }

    #[test]
    fn entries_keep_states() {
        let mut fsm = FsmGraph::from_text(b"a");
        let kept = fsm.add_state();
        fsm.set_entry(4, kept);

        assert_eq!(fsm.remove_unreachable_states(), 0);
        assert!(fsm.contains(kept));
    }

    #[test]
    fn dead_ends_cut() {
        let ctx = FsmCtx::default();
        let mut fsm = FsmGraph::from_text(b"ab");
        let start = fsm.start().unwrap();
        let dead = fsm.add_state();
        fsm.attach_new_trans(start, dead, Key::from(b'z'), Key::from(b'z'));

        assert_eq!(fsm.remove_dead_end_states(), 1);
        assert_eq!(fsm[start].out_list().len(), 1);
        assert_eq!(fsm[start].foreign_in(), 1);
        assert!(fsm.accepts(&ctx, b"ab"));
        assert!(!fsm.accepts(&ctx, b"z"));
    }

    #[test]
    fn empty_language_keeps_start() {
        let mut fsm = FsmGraph::from_text(b"ab");
        fsm.unset_all_fin_states();

        assert_eq!(fsm.remove_dead_end_states(), 2);
        assert_eq!(fsm.state_count(), 1);
        assert!(fsm.start().is_some());
        assert!(fsm[fsm.start().unwrap()].out_list().is_empty());
    }
}
