use tracing::debug;

use crate::action::PriorDesc;
use crate::ctx::FsmCtx;
use crate::error::Result;
use crate::graph::{EntryId, FsmGraph, StateBits, StateId};
use crate::merge::MergeData;

impl FsmGraph {
    /// Appends `other`: every final state of this machine gets the behaviour of
    /// `other`'s start state and stops being final.
    pub fn concat_op(&mut self, ctx: &mut FsmCtx, other: FsmGraph) -> Result<()> {
        self.do_concat(ctx, other, None, false)?;
        debug!(states = self.state_count(), "concat");
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// Concatenation where `other`'s start transitions win over this machine's
    /// transitions on the same keys.
    pub fn right_start_concat_op(&mut self, ctx: &mut FsmCtx, mut other: FsmGraph) -> Result<()> {
        let low = ctx.alloc_prior(0);
        let ordering = ctx.next_prior_ord();
        self.all_trans_prior(ordering, low);

        let high = PriorDesc { key: low.key, priority: 1 };
        let ordering = ctx.next_prior_ord();
        other.start_fsm_prior(ctx, ordering, high)?;

        self.concat_op(ctx, other)
    }

    /// Concatenation worker.
    ///
    /// `from_states` defaults to the final states. With `optional` they stay
    /// final, so the concatenated part may be skipped.
    pub(crate) fn do_concat(&mut self, ctx: &mut FsmCtx, mut other: FsmGraph,
                            from_states: Option<Vec<StateId>>, optional: bool) -> Result<()> {
        let mut md = MergeData::new();
        self.ensure_start();
        let other_start = other.ensure_start();

        self.set_misfit_accounting(true);
        other.set_misfit_accounting(true);

        let from_states = from_states.unwrap_or_else(|| self.finals.iter().copied().collect());
        if !optional {
            self.unset_all_fin_states();
        }
        let map = self.absorb(other);
        let other_start = map[&other_start];

        for state in from_states {
            if !self.contains(state) {
                continue;
            }
            self.merge_states_leaving(ctx, &mut md, state, other_start)?;
            if !self.is_final(state) {
                self.clear_out_data(state);
            }
        }

        self.fill_in_states(ctx, &mut md)?;
        self.remove_misfits();
        self.set_misfit_accounting(false);
        Ok(())
    }

    pub fn union_op(&mut self, ctx: &mut FsmCtx, mut other: FsmGraph) -> Result<()> {
        self.set_misfit_accounting(true);
        other.set_misfit_accounting(true);
        self.do_union(ctx, other)?;
        self.remove_misfits();
        self.set_misfit_accounting(false);
        debug!(states = self.state_count(), "union");
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// Union worker: a fresh start state merged from both start states.
    pub(crate) fn do_union(&mut self, ctx: &mut FsmCtx, mut other: FsmGraph) -> Result<()> {
        let mut md = MergeData::new();
        let first = self.ensure_start();
        let second = other.ensure_start();

        self.unset_start_state();
        let map = self.absorb(other);
        let second = map[&second];

        let start = self.add_state();
        self.set_start_state(start);
        self.merge_state_list(ctx, &mut md, start, &[first, second])?;
        self.fill_in_states(ctx, &mut md)
    }

    /// Keeps the strings accepted by both machines.
    pub fn intersect_op(&mut self, ctx: &mut FsmCtx, mut other: FsmGraph) -> Result<()> {
        self.set_fin_bits(StateBits::GRAPH1);
        other.set_fin_bits(StateBits::GRAPH2);

        self.set_misfit_accounting(true);
        other.set_misfit_accounting(true);
        self.do_union(ctx, other)?;
        self.unset_incomplete_finals();
        self.remove_misfits();
        self.set_misfit_accounting(false);

        self.remove_dead_end_states();
        debug!(states = self.state_count(), "intersect");
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// Removes the strings accepted by `other`.
    pub fn subtract_op(&mut self, ctx: &mut FsmCtx, mut other: FsmGraph) -> Result<()> {
        other.set_fin_bits(StateBits::GRAPH1);

        self.set_misfit_accounting(true);
        other.set_misfit_accounting(true);
        self.do_union(ctx, other)?;
        self.unset_killed_finals();
        self.remove_misfits();
        self.set_misfit_accounting(false);

        self.remove_dead_end_states();
        debug!(states = self.state_count(), "subtract");
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// Final states stay final only if both machines of an intersection
    /// reached them.
    fn unset_incomplete_finals(&mut self) {
        for state in self.finals.clone() {
            if !self[state].bits.contains(StateBits::BOTH) {
                self.unset_fin_state(state);
            }
            self[state].bits.remove(StateBits::BOTH);
        }
    }

    /// Final states reached by the subtracted machine lose their finality.
    fn unset_killed_finals(&mut self) {
        for state in self.finals.clone() {
            if self[state].bits.contains(StateBits::GRAPH1) {
                self.unset_fin_state(state);
            }
            self[state].bits.remove(StateBits::GRAPH1);
        }
    }

    /// Gives every final state an epsilon transition to entry point `id`,
    /// resolved by a later [`FsmGraph::epsilon_op`] or join.
    pub fn epsilon_trans(&mut self, id: EntryId) {
        for state in self.finals.clone() {
            let eps = &mut self[state].epsilon_trans;
            if !eps.contains(&id) {
                eps.push(id);
            }
        }
    }

    /// Makes sure no transition or entry point leads into the start state by
    /// replacing it with a fresh copy.
    pub fn isolate_start_state(&mut self, ctx: &mut FsmCtx) -> Result<()> {
        let prev = self.ensure_start();
        if self.is_start_state_isolated() {
            return Ok(());
        }

        let mut md = MergeData::new();
        self.set_misfit_accounting(true);
        let start = self.add_state();
        self.set_start_state(start);
        self.merge_states(ctx, &mut md, start, prev, false)?;
        self.fill_in_states(ctx, &mut md)?;
        self.remove_misfits();
        self.set_misfit_accounting(false);
        Ok(())
    }

    /// Leaves every entry point pointing at exactly one state, merging the
    /// targets of entry points that had several.
    pub fn deterministic_entry(&mut self, ctx: &mut FsmCtx) -> Result<()> {
        let mut md = MergeData::new();
        self.set_misfit_accounting(true);
        let prev = self.entry_points.clone();
        self.unset_all_entry_points();

        for (id, targets) in prev {
            let targets: Vec<StateId> = targets.into_iter().collect();
            match targets.as_slice() {
                [single] => self.set_entry(id, *single),
                _ => {
                    let state = self.add_state();
                    self.merge_state_list(ctx, &mut md, state, &targets)?;
                    self.set_entry(id, state);
                }
            }
        }

        self.fill_in_states(ctx, &mut md)?;
        self.remove_misfits();
        self.set_misfit_accounting(false);
        self.after_op_minimize(ctx);
        Ok(())
    }
}
