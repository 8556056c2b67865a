//! Direct simulation of a machine over an input, following every
//! alternative at once.

use std::collections::BTreeSet;

use crate::action::ActionId;
use crate::cond::CondKey;
use crate::ctx::FsmCtx;
use crate::graph::{FsmGraph, StateId, Trans};
use crate::key::Key;

impl FsmGraph {
    /// Adds to `set` every state reachable through NFA transitions.
    fn nfa_closure(&self, set: &mut BTreeSet<StateId>) {
        let mut stack: Vec<StateId> = set.iter().copied().collect();
        while let Some(id) = stack.pop() {
            for nfa in self[id].nfa_out.iter() {
                if set.insert(nfa.to) {
                    stack.push(nfa.to);
                }
            }
        }
    }

    fn cond_key_of(ctx: &FsmCtx, trans: &Trans, cond: &impl Fn(ActionId) -> bool) -> CondKey {
        let Some(space) = trans.cond_space else { return 0 };
        ctx.cond_keys.space(space).set.iter()
            .enumerate()
            .filter(|(_, action)| cond(**action))
            .fold(0, |key, (pos, _)| key | ((1 as CondKey) << pos))
    }

    /// Runs `keys` from the start state and returns the states reached.
    ///
    /// NFA transitions are taken as free alternatives. On a conditional
    /// transition `cond` decides the value of every condition of its space.
    pub fn run_keys(&self, ctx: &FsmCtx, keys: &[Key], cond: impl Fn(ActionId) -> bool) -> BTreeSet<StateId> {
        let mut current: BTreeSet<StateId> = self.start.into_iter().collect();
        self.nfa_closure(&mut current);

        for key in keys {
            let mut next = BTreeSet::new();
            for id in current.iter() {
                let Some(trans) = self[*id].find_trans(*key) else { continue };
                let cond_key = FsmGraph::cond_key_of(ctx, trans, &cond);
                if let Some(to) = trans.find_cond(cond_key).and_then(|c| c.to) {
                    next.insert(to);
                }
            }
            if next.is_empty() {
                return next;
            }
            self.nfa_closure(&mut next);
            current = next;
        }
        current
    }

    /// Whether the machine accepts `input` with every condition false.
    pub fn accepts(&self, ctx: &FsmCtx, input: &[u8]) -> bool {
        self.accepts_with(ctx, input, |_| false)
    }

    pub fn accepts_with(&self, ctx: &FsmCtx, input: &[u8], cond: impl Fn(ActionId) -> bool) -> bool {
        let keys: Vec<Key> = input.iter().map(|b| Key::from(*b)).collect();
        self.run_keys(ctx, &keys, cond)
            .iter()
            .any(|id| self.is_final(*id))
    }
}
