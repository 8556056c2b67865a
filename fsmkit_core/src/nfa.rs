//! Nondeterministic repetition and depth-bounded determinization.
//!
//! An NFA transition is an edge without a key, taken by the generated scanner
//! through a backtracking stack: `push_actions` run when it is taken,
//! `restore_actions` and `pop_test` when the scanner comes back to try the
//! next alternative. Alternatives are tried by ascending `order`.
//!
//! [`FsmGraph::nfa_union_op`] unions machines without paying for a complete
//! subset construction. Combination states are filled in for a bounded
//! number of rounds, whatever is still pending afterwards keeps its members
//! as NFA transitions.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::action::{ActionId, ORD_PUSH, ORD_RESTORE, ORD_TEST};
use crate::ctx::FsmCtx;
use crate::error::Result;
use crate::graph::{FsmGraph, NfaTrans, StateBits, StateId};
use crate::key::Key;
use crate::merge::MergeData;
use crate::util::StateSet;

/// Actions of a nondeterministic repetition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NfaRepeatActions {
    pub push: ActionId,
    pub pop: ActionId,
    /// Tested when entering the repetition.
    pub init: ActionId,
    /// Tested to stay on the current iteration's final state.
    pub stay: ActionId,
    /// Tested to start another iteration.
    pub repeat: ActionId,
    /// Tested to leave the repetition.
    pub exit: ActionId,
}

/// One round of a multi-round union: machines are unioned in groups of
/// `groups` at determinization depth `depth`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NfaRound {
    pub depth: u32,
    pub groups: usize,
}

impl NfaRound {
    pub fn new(depth: u32, groups: usize) -> Self {
        NfaRound { depth, groups }
    }
}

fn repeat_edge(to: StateId, order: i32, push: ActionId, pop: ActionId, test: ActionId) -> NfaTrans {
    let mut trans = NfaTrans::new(to, order);
    trans.push_actions.set_action(ORD_PUSH, push);
    trans.restore_actions.set_action(ORD_RESTORE, pop);
    trans.pop_test.set_action(ORD_TEST, test);
    trans
}

impl FsmGraph {
    /// Repetition whose iteration count is decided at run time by the test
    /// actions.
    ///
    /// Every final state is replaced by a branching state with three NFA
    /// transitions: back onto the final state (stay, order 3), to a copy of
    /// the start state (repeat, order 2) and to a fresh final state (exit,
    /// order 1). The fresh start enters the machine through a single NFA
    /// transition testing `init`.
    pub fn nfa_repeat_op(&mut self, ctx: &mut FsmCtx, actions: NfaRepeatActions) -> Result<()> {
        let NfaRepeatActions { push, pop, init, stay, repeat, exit } = actions;
        let orig_finals: Vec<StateId> = self.finals.iter().copied().collect();

        let orig_start = self.ensure_start();
        let mut md = MergeData::new();
        let rep_start = self.dup_start_state(ctx, &mut md)?;
        self.fill_in_states(ctx, &mut md)?;

        let new_start = self.add_state();
        self.attach_new_nfa(new_start, repeat_edge(orig_start, 1, push, pop, init));

        let new_final = self.add_state();
        for orig in orig_finals {
            self.unset_fin_state(orig);

            let repl = self.add_state();
            self.move_inward_trans(repl, orig);

            self.attach_new_nfa(repl, repeat_edge(orig, 3, push, pop, stay));
            self.attach_new_nfa(repl, repeat_edge(rep_start, 2, push, pop, repeat));
            self.attach_new_nfa(repl, repeat_edge(new_final, 1, push, pop, exit));
        }

        self.set_start_state(new_start);
        self.set_fin_state(new_final);
        debug!(states = self.state_count(), "nfa repeat");
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// Unions `others` into this machine, determinizing for at most `depth`
    /// rounds.
    ///
    /// With a depth of zero the fresh start state reaches every original start
    /// through an NFA transition. Otherwise the start states are merged and
    /// the resulting combination states filled in round after round; states
    /// that existed with NFA transitions beforehand are marked `NFA_REP` and
    /// kept as they are.
    pub fn nfa_union_op(&mut self, ctx: &mut FsmCtx, others: Vec<FsmGraph>, depth: u32) -> Result<()> {
        self.mark_nfa_rep();

        let mut start_set = StateSet::create_empty();
        start_set.insert(self.ensure_start());
        self.unset_start_state();
        for mut other in others {
            other.mark_nfa_rep();
            let other_start = other.ensure_start();
            let map = self.absorb(other);
            start_set.insert(map[&other_start]);
        }

        let start = self.add_state();
        self.set_start_state(start);

        if depth == 0 {
            for member in start_set.iter() {
                self.attach_new_nfa(start, NfaTrans::new(*member, 0));
            }
            debug!(states = self.state_count(), "nfa union");
            return Ok(());
        }

        let mut md = MergeData::new();
        info!(nfa_fill_round = 0);
        self.merge_state_list(ctx, &mut md, start, &start_set.to_vec())?;
        let removed = self.remove_unreachable_states();
        self.prune_merge_data(&mut md);
        info!(round_unreachable = removed);

        for round in 1..depth {
            info!(nfa_fill_round = round);
            if md.fill.is_empty() {
                break;
            }
            self.nfa_fill_in_states(ctx, &mut md)?;
            let removed = self.remove_unreachable_states();
            self.prune_merge_data(&mut md);
            info!(round_unreachable = removed);
        }

        self.finalize_nfa_round(&mut md);
        self.log_nfa_stats(&md);

        self.remove_unreachable_states();
        info!(post_unreachable = self.state_count());
        self.minimize_partition();
        info!(post_min = self.state_count());
        Ok(())
    }

    /// Determinizes for up to `depth` more rounds the NFA transitions left by
    /// an earlier bounded union.
    pub fn continue_nfa_rounds(&mut self, ctx: &mut FsmCtx, depth: u32) -> Result<()> {
        let mut md = MergeData::new();
        self.prepare_nfa_round(&mut md);

        for round in 0..depth {
            info!(nfa_fill_round = round);
            if md.fill.is_empty() {
                break;
            }
            self.nfa_fill_in_states(ctx, &mut md)?;
            let removed = self.remove_unreachable_states();
            self.prune_merge_data(&mut md);
            info!(round_unreachable = removed);
        }

        self.finalize_nfa_round(&mut md);
        self.log_nfa_stats(&md);

        self.remove_unreachable_states();
        info!(post_unreachable = self.state_count());
        self.minimize_partition();
        info!(post_min = self.state_count());
        Ok(())
    }

    /// Unions all `machines` following the round plan of the context.
    ///
    /// Each round unions groups of machines at the round's depth and passes
    /// the results on to the next round. Machines still apart after the last
    /// round are unioned at that round's depth. An empty plan unions
    /// everything at once, fully determinized.
    pub fn nfa_union(ctx: &mut FsmCtx, machines: Vec<FsmGraph>) -> Result<FsmGraph> {
        let mut machines = machines;
        for machine in machines.iter_mut() {
            machine.remove_unreachable_states();
            machine.minimize_partition();
        }

        let rounds = if ctx.nfa_rounds.is_empty() {
            vec![NfaRound::new(u32::MAX, machines.len())]
        } else {
            ctx.nfa_rounds.clone()
        };
        let mut last_depth = u32::MAX;
        for round in rounds {
            if machines.len() <= 1 {
                break;
            }
            last_depth = round.depth;
            let groups = round.groups.max(2);
            let mut next = Vec::with_capacity(machines.len() / groups + 1);
            let mut iter = machines.into_iter();
            while let Some(mut head) = iter.next() {
                let rest: Vec<FsmGraph> = iter.by_ref().take(groups - 1).collect();
                if !rest.is_empty() {
                    head.nfa_union_op(ctx, rest, round.depth)?;
                }
                next.push(head);
            }
            debug!(depth = round.depth, groups, machines = next.len(), "nfa union round");
            machines = next;
        }

        let mut iter = machines.into_iter();
        let Some(mut res) = iter.next() else {
            return Ok(FsmGraph::empty_fsm());
        };
        let rest: Vec<FsmGraph> = iter.collect();
        if !rest.is_empty() {
            res.nfa_union_op(ctx, rest, last_depth)?;
        }
        Ok(res)
    }

    fn mark_nfa_rep(&mut self) {
        for id in self.state_ids() {
            if !self[id].nfa_out.is_empty() {
                self[id].bits.insert(StateBits::NFA_REP);
            }
        }
    }

    /// Fills the combination states queued when the round started. States
    /// queued by this round wait for the next one.
    pub(crate) fn nfa_fill_in_states(&mut self, ctx: &mut FsmCtx, md: &mut MergeData) -> Result<()> {
        let mut count = md.fill.len();
        while count > 0 {
            let Some(state) = md.fill.pop_front() else { break };
            count -= 1;
            if self.contains(state) {
                self.fill_state(ctx, md, state)?;
            }
        }
        Ok(())
    }

    /// Turns the NFA fan-out of every state not marked `NFA_REP` back into a
    /// pending combination state.
    pub(crate) fn prepare_nfa_round(&mut self, md: &mut MergeData) {
        for id in self.state_ids() {
            let state = &self[id];
            if state.nfa_out.is_empty() || state.bits.contains(StateBits::NFA_REP) {
                continue;
            }
            let nfa_out = std::mem::take(&mut self[id].nfa_out);
            let set: StateSet = nfa_out.iter().map(|n| n.to).collect();
            for member in set.iter() {
                self.attach_state_dict(id, *member);
            }
            for nfa in nfa_out.iter() {
                self.detach_target(id, nfa.to);
            }

            md.dict.entry(set.clone()).or_insert(id);
            let state = &mut self[id];
            state.dict_set = Some(set);
            state.dict_refs = true;
            md.fill.push_back(id);
        }
    }

    /// Gives every combination state still pending an NFA transition to each
    /// of its members and forgets all state sets.
    pub(crate) fn finalize_nfa_round(&mut self, md: &mut MergeData) {
        while let Some(id) = md.fill.pop_front() {
            if !self.contains(id) {
                continue;
            }
            let Some(set) = self[id].dict_set.clone() else { continue };
            for member in set.iter() {
                self.attach_new_nfa(id, NfaTrans::new(*member, 1));
            }
            self.release_state_dict(id);
            self[id].dict_set = None;
        }
        self.clear_state_dict(md);
    }

    fn prune_merge_data(&self, md: &mut MergeData) {
        md.fill.retain(|id| self.contains(*id));
        md.dict.retain(|_, id| self.contains(*id));
    }

    fn log_nfa_stats(&self, md: &MergeData) {
        let mut count = 0;
        let mut max_state_set = 0;
        for (_, state) in self.states() {
            if !state.nfa_out.is_empty() {
                count += 1;
                max_state_set = max_state_set.max(state.nfa_out.len());
            }
        }
        info!(fill_list = count, state_dict = md.dict.len(), states = self.state_count(), max_state_set);
    }

    /// Counts the (state, key range) pairs on which the machine, following
    /// NFA transitions for free, can still move to more than one state.
    pub fn nondeterministic_count(&self) -> usize {
        let mut count = 0;
        for (id, state) in self.states() {
            if state.nfa_out.is_empty() {
                continue;
            }
            let mut closure = BTreeSet::new();
            closure.insert(id);
            let mut stack = vec![id];
            while let Some(cur) = stack.pop() {
                for nfa in self[cur].nfa_out.iter() {
                    if closure.insert(nfa.to) {
                        stack.push(nfa.to);
                    }
                }
            }

            let ranges: Vec<(Key, Key, Vec<StateId>)> = closure.iter()
                .flat_map(|s| self[*s].out_list.iter())
                .map(|t| (t.low, t.high, t.targets().collect()))
                .collect();
            // Segment bounds in i128, a range may end on the largest key.
            let mut bounds: Vec<i128> = ranges.iter()
                .flat_map(|(low, high, _)| [low.get() as i128, high.get() as i128 + 1])
                .collect();
            bounds.sort();
            bounds.dedup();

            for pair in bounds.windows(2) {
                let (low, last) = (pair[0], pair[1] - 1);
                let targets: BTreeSet<StateId> = ranges.iter()
                    .filter(|(l, h, _)| l.get() as i128 <= low && last <= h.get() as i128)
                    .flat_map(|(_, _, t)| t.iter().copied())
                    .collect();
                if targets.len() > 1 {
                    count += 1;
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use fsmkit_util::HostType;

    use crate::action::{ActionId, ORD_PUSH, ORD_TEST};
    use crate::ctx::FsmCtx;
    use crate::graph::FsmGraph;
    use crate::key::Key;

    use super::{NfaRepeatActions, NfaRound};

    fn literals(words: &[&[u8]]) -> Vec<FsmGraph> {
        words.iter().map(|w| FsmGraph::from_text(w)).collect()
    }

    const REPEAT: NfaRepeatActions = NfaRepeatActions {
        push: ActionId(1),
        pop: ActionId(2),
        init: ActionId(3),
        stay: ActionId(4),
        repeat: ActionId(5),
        exit: ActionId(6),
    };

    #[test]
    fn repeat_structure() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::from_text(b"ab");
        fsm.nfa_repeat_op(&mut ctx, REPEAT).unwrap();

        let start = fsm.start().unwrap();
        let nfa = fsm[start].nfa_out();
        assert_eq!(nfa.len(), 1);
        assert_eq!(nfa[0].order, 1);
        assert!(nfa[0].push_actions.iter().any(|&(o, a)| o == ORD_PUSH && a == ActionId(1)));
        assert!(nfa[0].pop_test.iter().any(|&(o, a)| o == ORD_TEST && a == ActionId(3)));

        let branching: Vec<_> = fsm.states().filter(|(_, s)| s.nfa_out().len() == 3).collect();
        assert_eq!(branching.len(), 1);
        let orders: Vec<i32> = branching[0].1.nfa_out().iter().map(|n| n.order).collect();
        assert_eq!(orders, vec![3, 2, 1]);

        assert_eq!(fsm.finals().len(), 1);
        assert!(!fsm.accepts(&ctx, b""));
        assert!(fsm.accepts(&ctx, b"ab"));
        assert!(fsm.accepts(&ctx, b"abab"));
        assert!(!fsm.accepts(&ctx, b"aba"));
    }

    #[test]
    fn repeat_without_finals_keeps_only_reachable() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::empty_fsm();
        fsm.nfa_repeat_op(&mut ctx, REPEAT).unwrap();

        // Only the new start and the original start survive.
        assert_eq!(fsm.state_count(), 2);
        assert!(fsm.finals().is_empty());
    }

    #[test]
    fn counts_ranges_up_to_the_largest_key() {
        let mut ctx = FsmCtx::new(HostType::Long);
        let full = || FsmGraph::range_fsm(Key::new(0), Key::new(i64::MAX));
        let mut fsm = full();
        fsm.nfa_union_op(&mut ctx, vec![full()], 0).unwrap();
        assert_eq!(fsm.nondeterministic_count(), 1);
    }

    #[test]
    fn depth_zero_fans_out() {
        let mut ctx = FsmCtx::default();
        let mut machines = literals(&[b"ab", b"ac", b"b"]).into_iter();
        let mut fsm = machines.next().unwrap();
        fsm.nfa_union_op(&mut ctx, machines.collect(), 0).unwrap();

        let start = fsm.start().unwrap();
        assert_eq!(fsm[start].nfa_out().len(), 3);
        assert!(fsm[start].nfa_out().iter().all(|n| n.order == 0));
        for word in [&b"ab"[..], &b"ac"[..], &b"b"[..]] {
            assert!(fsm.accepts(&ctx, word));
        }
        assert!(!fsm.accepts(&ctx, b"a"));
    }

    #[test]
    fn bounded_depth_leaves_fan_out() {
        let mut ctx = FsmCtx::default();
        let mut shallow = FsmGraph::from_text(b"abc");
        shallow.nfa_union_op(&mut ctx, literals(&[b"abd"]), 1).unwrap();
        assert!(shallow.nondeterministic_count() > 0);

        let mut deep = FsmGraph::from_text(b"abc");
        deep.nfa_union_op(&mut ctx, literals(&[b"abd"]), 10).unwrap();
        assert_eq!(deep.nondeterministic_count(), 0);
        assert!(deep.states().all(|(_, s)| s.nfa_out().is_empty()));
        assert_eq!(deep.state_count(), 4);

        for fsm in [&shallow, &deep] {
            assert!(fsm.accepts(&ctx, b"abc"));
            assert!(fsm.accepts(&ctx, b"abd"));
            assert!(!fsm.accepts(&ctx, b"ab"));
            assert!(!fsm.accepts(&ctx, b"abe"));
        }
    }

    #[test]
    fn continued_rounds_finish_the_job() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::from_text(b"abc");
        fsm.nfa_union_op(&mut ctx, literals(&[b"abd"]), 1).unwrap();
        fsm.continue_nfa_rounds(&mut ctx, 10).unwrap();

        assert_eq!(fsm.nondeterministic_count(), 0);
        assert!(fsm.accepts(&ctx, b"abc"));
        assert!(fsm.accepts(&ctx, b"abd"));
        assert!(!fsm.accepts(&ctx, b"abe"));
    }

    #[test]
    fn multi_round_union() {
        let words: [&[u8]; 6] = [b"if", b"in", b"int", b"for", b"fork", b"do"];
        let mut ctx = FsmCtx::default()
            .with_nfa_rounds(vec![NfaRound::new(2, 2), NfaRound::new(0, 2)]);
        let fsm = FsmGraph::nfa_union(&mut ctx, literals(&words)).unwrap();

        for word in words {
            assert!(fsm.accepts(&ctx, word));
        }
        assert!(!fsm.accepts(&ctx, b"fo"));
        assert!(!fsm.accepts(&ctx, b"i"));
        assert!(!fsm.accepts(&ctx, b"dot"));
    }

    #[test]
    fn full_union_by_default() {
        let mut ctx = FsmCtx::default();
        let fsm = FsmGraph::nfa_union(&mut ctx, literals(&[b"ab", b"ac", b"abc"])).unwrap();
        assert_eq!(fsm.nondeterministic_count(), 0);
        assert!(fsm.accepts(&ctx, b"abc"));
        assert!(!fsm.accepts(&ctx, b"a"));
    }
}
