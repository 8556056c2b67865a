use std::cmp::Ordering;
use std::mem;

use tracing::trace;

use crate::action::compare_prior;
use crate::cond::CondKey;
use crate::ctx::FsmCtx;
use crate::error::Result;
use crate::graph::{CondTrans, FsmGraph, StateId, Trans};
use crate::key::Key;
use crate::util::StateSet;

use super::pair_iter::{range_pairs, val_pairs, RangePair, ValPair};
use super::MergeData;

impl FsmGraph {
    /// Copies `src_list` into the transitions of `dest`.
    ///
    /// Ranges only one side covers are taken as they are, overlapping ranges
    /// are crossed. New edges are attached before the replaced ones are
    /// released so targets shared by both lists never drop to zero references.
    pub(crate) fn out_trans_copy(&mut self, ctx: &mut FsmCtx, md: &mut MergeData, dest: StateId, src_list: &[Trans]) -> Result<()> {
        let old = mem::take(&mut self[dest].out_list);
        let dest_ranges: Vec<(Key, Key)> = old.iter().map(|t| (t.low, t.high)).collect();
        let src_ranges: Vec<(Key, Key)> = src_list.iter().map(|t| (t.low, t.high)).collect();

        let mut new_list = Vec::with_capacity(old.len().max(src_list.len()));
        for pair in range_pairs(&dest_ranges, &src_ranges) {
            match pair {
                RangePair::InFirst { index, low, high } => {
                    let trans = old[index].with_keys(low, high);
                    self.attach_trans(dest, &trans);
                    new_list.push(trans);
                }
                RangePair::InSecond { index, low, high } => {
                    let trans = src_list[index].with_keys(low, high);
                    self.attach_trans(dest, &trans);
                    new_list.push(trans);
                }
                RangePair::Overlap { first, second, low, high } => {
                    let mut trans = old[first].with_keys(low, high);
                    self.attach_trans(dest, &trans);
                    self.cross_transitions(ctx, md, dest, &mut trans, &src_list[second])?;
                    new_list.push(trans);
                }
            }
        }

        for trans in old.iter() {
            self.detach_trans(dest, trans);
        }
        self[dest].out_list = new_list;
        Ok(())
    }

    /// Merges `src` into `dest`, two transitions of `from` over the same range.
    ///
    /// Transitions living in different condition spaces are first expanded into
    /// the union of both spaces, then combined condition by condition.
    pub(crate) fn cross_transitions(&mut self, ctx: &mut FsmCtx, md: &mut MergeData, from: StateId,
                                    dest: &mut Trans, src: &Trans) -> Result<()> {
        let expanded;
        let src = if dest.cond_space != src.cond_space {
            let mut copy = src.clone();
            self.expand_cond_transitions(ctx, from, dest, &mut copy)?;
            expanded = copy;
            &expanded
        } else {
            src
        };

        let dest_keys: Vec<CondKey> = dest.conds.iter().map(|c| c.key).collect();
        let src_keys: Vec<CondKey> = src.conds.iter().map(|c| c.key).collect();
        let mut old: Vec<Option<CondTrans>> = mem::take(&mut dest.conds).into_iter().map(Some).collect();

        let mut conds = Vec::with_capacity(dest_keys.len().max(src_keys.len()));
        for pair in val_pairs(&dest_keys, &src_keys) {
            match pair {
                ValPair::InFirst(i) => {
                    if let Some(cond) = old[i].take() {
                        conds.push(cond);
                    }
                }
                ValPair::InSecond(j) => {
                    let cond = src.conds[j].clone();
                    if let Some(to) = cond.to {
                        self.attach_target(from, to);
                    }
                    conds.push(cond);
                }
                ValPair::Both(i, j) => {
                    if let Some(cond) = old[i].take() {
                        conds.push(self.cross_cond_transitions(md, from, cond, &src.conds[j]));
                    }
                }
            }
        }
        dest.conds = conds;
        Ok(())
    }

    /// Resolves two condition transitions for the same combination: the one
    /// with the higher priority replaces the other, equal ones are merged.
    pub(crate) fn cross_cond_transitions(&mut self, md: &mut MergeData, from: StateId,
                                         dest: CondTrans, src: &CondTrans) -> CondTrans {
        match compare_prior(&dest.priors, &src.priors) {
            Ordering::Less => {
                let mut res = src.clone();
                res.key = dest.key;
                if let Some(to) = res.to {
                    self.attach_target(from, to);
                }
                if let Some(to) = dest.to {
                    self.detach_target(from, to);
                }
                res
            }
            Ordering::Greater => dest,
            Ordering::Equal => self.merge_trans(md, from, dest, src),
        }
    }

    /// Unions the targets, actions and priorities of `src` into `dest`.
    ///
    /// Two distinct targets are replaced by the combination state standing for
    /// both of them, created on first use.
    pub(crate) fn merge_trans(&mut self, md: &mut MergeData, from: StateId,
                              mut dest: CondTrans, src: &CondTrans) -> CondTrans {
        match (dest.to, src.to) {
            (None, Some(to)) => {
                self.attach_target(from, to);
                dest.to = Some(to);
            }
            (Some(a), Some(b)) if a != b => {
                let mut set = self.state_set_of(a);
                set.union_with(&self.state_set_of(b));
                let combo = self.attach_state_set(md, set);
                self.attach_target(from, combo);
                self.detach_target(from, a);
                dest.to = Some(combo);
            }
            _ => {}
        }
        add_in_trans(&mut dest, src);
        dest
    }

    /// The original states `state` stands for.
    pub(crate) fn state_set_of(&self, state: StateId) -> StateSet {
        self[state].dict_set.clone().unwrap_or_else(|| StateSet::singleton(state))
    }

    /// Finds the combination state for `set`, creating and queueing it for
    /// filling when it does not exist yet.
    pub(crate) fn attach_state_set(&mut self, md: &mut MergeData, set: StateSet) -> StateId {
        if let Some(&existing) = md.dict.get(&set) {
            if self.contains(existing) {
                return existing;
            }
        }

        let combo = self.add_state();
        for member in set.iter() {
            self.attach_state_dict(combo, *member);
        }
        trace!(state = %combo, set = %set, "new combination state");
        let state = &mut self[combo];
        state.dict_set = Some(set.clone());
        state.dict_refs = true;
        md.dict.insert(set, combo);
        md.fill.push_back(combo);
        combo
    }
}

/// Carries the actions and priorities of `src` over to `dest`.
pub(crate) fn add_in_trans(dest: &mut CondTrans, src: &CondTrans) {
    dest.actions.set_actions(&src.actions);
    dest.priors.set_priors(&src.priors);
}
