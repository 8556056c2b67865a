use std::collections::BTreeSet;
use std::mem;

use crate::action::ActionId;
use crate::cond::{remap_cond_key, CondKey, CondSet};
use crate::ctx::FsmCtx;
use crate::error::Result;
use crate::graph::{CondTrans, FsmGraph, StateId, Trans};

/// Re-expresses `conds` in the bit layout of `merged` and doubles the list for
/// every condition `from` lacks, the copy taking the condition as true.
///
/// Returns the targets of the added copies.
fn expand_cond_list(conds: &mut Vec<CondTrans>, from: &CondSet, merged: &CondSet) -> Vec<StateId> {
    for cond in conds.iter_mut() {
        cond.key = remap_cond_key(cond.key, from, merged);
    }
    let mut added = Vec::new();
    for (pos, action) in merged.iter().enumerate() {
        if from.contains(*action) {
            continue;
        }
        let copies: Vec<CondTrans> = conds.iter()
            .map(|c| CondTrans { key: c.key | (1 << pos), ..c.clone() })
            .collect();
        added.extend(copies.iter().filter_map(|c| c.to));
        conds.extend(copies);
        conds.sort_by_key(|c| c.key);
    }
    added
}

/// Adds `action` to the condition space of every transition in `list`,
/// requiring it to evaluate to `sense`. Returns the targets of dropped
/// combinations.
fn embed_in_list(ctx: &mut FsmCtx, list: &mut Vec<Trans>, action: ActionId, sense: bool) -> Result<Vec<StateId>> {
    let mut dropped = Vec::new();
    for trans in list.iter_mut() {
        let orig = ctx.cond_keys.set_of(trans.cond_space);
        let mut merged = orig.clone();
        merged.insert(action);
        let id = ctx.cond_keys.add_cond_space(&merged)?;
        let bit: CondKey = merged.pos(action).map_or(0, |p| 1 << p);

        if orig.contains(action) {
            let conds = mem::take(&mut trans.conds);
            for cond in conds {
                if (cond.key & bit != 0) == sense {
                    trans.conds.push(cond);
                } else if let Some(to) = cond.to {
                    dropped.push(to);
                }
            }
        } else {
            for cond in trans.conds.iter_mut() {
                cond.key = remap_cond_key(cond.key, &orig, &merged);
                if sense {
                    cond.key |= bit;
                }
            }
        }
        trans.cond_space = Some(id);
    }
    list.retain(|t| !t.conds.is_empty());
    Ok(dropped)
}

/// Restricts every transition of `list` to the combinations of `set` listed
/// in `keys`. Returns the targets gained by expansion and those dropped.
fn restrict_list(ctx: &mut FsmCtx, list: &mut Vec<Trans>, set: &CondSet, keys: &BTreeSet<CondKey>)
                 -> Result<(Vec<StateId>, Vec<StateId>)> {
    let mut added = Vec::new();
    let mut dropped = Vec::new();
    for trans in list.iter_mut() {
        let orig = ctx.cond_keys.set_of(trans.cond_space);
        let merged = orig.union(set);
        let id = ctx.cond_keys.add_cond_space(&merged)?;
        if trans.cond_space != Some(id) {
            added.extend(expand_cond_list(&mut trans.conds, &orig, &merged));
            trans.cond_space = Some(id);
        }

        let conds = mem::take(&mut trans.conds);
        for cond in conds {
            if keys.contains(&remap_cond_key(cond.key, &merged, set)) {
                trans.conds.push(cond);
            } else if let Some(to) = cond.to {
                dropped.push(to);
            }
        }
    }
    list.retain(|t| !t.conds.is_empty());
    Ok((added, dropped))
}

impl FsmGraph {
    /// Brings two transitions into the union of their condition spaces.
    ///
    /// Copies made for `dest` are attached to `from`, `src` is a detached
    /// scratch copy and only gets rewritten.
    pub fn expand_cond_transitions(&mut self, ctx: &mut FsmCtx, from: StateId,
                                   dest: &mut Trans, src: &mut Trans) -> Result<()> {
        let dest_set = ctx.cond_keys.set_of(dest.cond_space);
        let src_set = ctx.cond_keys.set_of(src.cond_space);
        let merged = dest_set.union(&src_set);
        let id = ctx.cond_keys.add_cond_space(&merged)?;

        self.expand_conds(from, dest, &dest_set, &merged, true);
        self.expand_conds(from, src, &src_set, &merged, false);
        dest.cond_space = Some(id);
        src.cond_space = Some(id);
        Ok(())
    }

    pub fn expand_conds(&mut self, from: StateId, trans: &mut Trans,
                        from_set: &CondSet, merged: &CondSet, attach: bool) {
        let added = expand_cond_list(&mut trans.conds, from_set, merged);
        if attach {
            for to in added {
                self.attach_target(from, to);
            }
        }
    }

    /// Guards every transition leaving `state` with `action == sense`.
    ///
    /// The opposite combination gets no transition, input seen while the
    /// condition has the other value fails.
    pub fn embed_condition(&mut self, ctx: &mut FsmCtx, state: StateId, action: ActionId, sense: bool) -> Result<()> {
        self.set_misfit_accounting(true);
        let res = self.do_embed_condition(ctx, state, action, sense);
        self.remove_misfits();
        self.set_misfit_accounting(false);
        res?;
        self.after_op_minimize(ctx);
        Ok(())
    }

    fn do_embed_condition(&mut self, ctx: &mut FsmCtx, state: StateId, action: ActionId, sense: bool) -> Result<()> {
        let mut list = mem::take(&mut self[state].out_list);
        let res = embed_in_list(ctx, &mut list, action, sense);
        self[state].out_list = list;
        for to in res? {
            self.detach_target(state, to);
        }
        Ok(())
    }

    /// Restricts the transitions leaving `state` to the combinations `keys` of
    /// the condition set `set`.
    pub fn embed_cond_set(&mut self, ctx: &mut FsmCtx, state: StateId, set: &CondSet, keys: &BTreeSet<CondKey>) -> Result<()> {
        self.set_misfit_accounting(true);
        let res = self.restrict_cond_set(ctx, state, set, keys);
        self.remove_misfits();
        self.set_misfit_accounting(false);
        res?;
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// `embed_cond_set` without the closing sweep, for states not yet
    /// connected to the machine.
    pub(crate) fn restrict_cond_set(&mut self, ctx: &mut FsmCtx, state: StateId, set: &CondSet,
                                    keys: &BTreeSet<CondKey>) -> Result<()> {
        let mut list = mem::take(&mut self[state].out_list);
        let res = restrict_list(ctx, &mut list, set, keys);
        self[state].out_list = list;
        let (added, dropped) = res?;
        for to in added {
            self.attach_target(state, to);
        }
        for to in dropped {
            self.detach_target(state, to);
        }
        Ok(())
    }

    /// Records that leaving the machine from `state` requires
    /// `action == sense`. The restriction lands on the leaving transitions
    /// when a later concatenation draws them in.
    pub fn add_out_condition(&mut self, ctx: &mut FsmCtx, state: StateId, action: ActionId, sense: bool) -> Result<()> {
        let orig = ctx.cond_keys.set_of(self[state].out_cond_space);
        if orig.contains(action) {
            let bit: CondKey = orig.pos(action).map_or(0, |p| 1 << p);
            self[state].out_cond_keys.retain(|k| (k & bit != 0) == sense);
            return Ok(());
        }

        let mut merged = orig.clone();
        merged.insert(action);
        let id = ctx.cond_keys.add_cond_space(&merged)?;
        let bit: CondKey = merged.pos(action).map_or(0, |p| 1 << p);

        let state = &mut self[state];
        let keys: BTreeSet<CondKey> = if state.out_cond_space.is_none() {
            [0].into_iter().collect()
        } else {
            state.out_cond_keys.iter().map(|k| remap_cond_key(*k, &orig, &merged)).collect()
        };
        state.out_cond_keys = keys.into_iter()
            .map(|k| if sense { k | bit } else { k })
            .collect();
        state.out_cond_space = Some(id);
        Ok(())
    }

    /// Guards the transitions leaving the start state.
    pub fn start_fsm_condition(&mut self, ctx: &mut FsmCtx, action: ActionId, sense: bool) -> Result<()> {
        self.isolate_start_state(ctx)?;
        let start = self.ensure_start();
        self.embed_condition(ctx, start, action, sense)?;
        if self[start].is_final() {
            self.add_out_condition(ctx, start, action, sense)?;
        }
        Ok(())
    }

    pub fn all_trans_condition(&mut self, ctx: &mut FsmCtx, action: ActionId, sense: bool) -> Result<()> {
        self.set_misfit_accounting(true);
        let res = self.state_ids().into_iter()
            .try_for_each(|state| self.do_embed_condition(ctx, state, action, sense));
        self.remove_misfits();
        self.set_misfit_accounting(false);
        res?;
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// Guards leaving the machine through any of its final states.
    pub fn leave_fsm_condition(&mut self, ctx: &mut FsmCtx, action: ActionId, sense: bool) -> Result<()> {
        for state in self.finals.clone() {
            self.add_out_condition(ctx, state, action, sense)?;
        }
        Ok(())
    }
}
