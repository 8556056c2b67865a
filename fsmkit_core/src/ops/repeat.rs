use tracing::debug;

use crate::ctx::FsmCtx;
use crate::error::Result;
use crate::graph::{FsmGraph, StateBits, StateId};
use crate::merge::MergeData;

impl FsmGraph {
    /// Kleene star.
    pub fn star_op(&mut self, ctx: &mut FsmCtx) -> Result<()> {
        let mut md = MergeData::new();
        let prev_start = self.ensure_start();

        self.set_misfit_accounting(true);
        self.unset_start_state();
        let start = self.add_state();
        self.set_start_state(start);
        self.merge_states(ctx, &mut md, start, prev_start, false)?;

        // The start state merges into itself last, after every other final
        // state has taken its transitions.
        for state in self.finals.clone() {
            if state != start {
                self.merge_states_leaving(ctx, &mut md, state, start)?;
            }
        }
        if self.is_final(start) {
            self.merge_states_leaving(ctx, &mut md, start, start)?;
        }
        self.set_fin_state(start);

        self.fill_in_states(ctx, &mut md)?;
        self.remove_misfits();
        self.set_misfit_accounting(false);
        debug!(states = self.state_count(), "star");
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// One or more repetitions.
    pub fn plus_op(&mut self, ctx: &mut FsmCtx) -> Result<()> {
        let mut dup = self.clone();
        dup.star_op(ctx)?;
        self.concat_op(ctx, dup)
    }

    /// Zero or one repetition.
    pub fn question_op(&mut self, ctx: &mut FsmCtx) -> Result<()> {
        self.union_op(ctx, FsmGraph::lambda_fsm())
    }

    /// Exactly `times` repetitions, the empty string for zero.
    pub fn exact_repeat_op(&mut self, ctx: &mut FsmCtx, times: u32) -> Result<()> {
        if times == 0 {
            *self = FsmGraph::lambda_fsm();
            return Ok(());
        }
        if times == 1 {
            return Ok(());
        }

        let copy_from = self.clone();
        for _ in 1..times - 1 {
            self.do_concat(ctx, copy_from.clone(), None, false)?;
        }
        self.do_concat(ctx, copy_from, None, false)?;
        debug!(times, states = self.state_count(), "exact repeat");
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// Between zero and `times` repetitions.
    pub fn max_repeat_op(&mut self, ctx: &mut FsmCtx, times: u32) -> Result<()> {
        if times == 0 {
            *self = FsmGraph::lambda_fsm();
            return Ok(());
        }
        if times == 1 {
            self.isolate_start_state(ctx)?;
            let start = self.ensure_start();
            self.set_fin_state(start);
            return Ok(());
        }

        let copy_from = self.clone();
        let old_start = self.start;
        let mut last_finals: Vec<StateId> = self.finals.iter().copied().collect();

        // Zero copies are allowed: the start state becomes final.
        self.isolate_start_state(ctx)?;
        let start = self.ensure_start();
        self.set_fin_state(start);

        // A final start replaced by isolation lives on in its copy.
        last_finals = last_finals.into_iter()
            .map(|s| if Some(s) == old_start && !self.contains(s) { start } else { s })
            .filter(|s| self.contains(*s))
            .collect();

        for _ in 1..times - 1 {
            let mut dup = copy_from.clone();
            dup.set_fin_bits(StateBits::GRAPH2);
            self.do_concat(ctx, dup, Some(last_finals), true)?;

            last_finals = Vec::new();
            for state in self.finals.clone() {
                if self[state].bits.contains(StateBits::GRAPH2) {
                    last_finals.push(state);
                    self[state].bits.remove(StateBits::GRAPH2);
                }
            }
        }
        self.do_concat(ctx, copy_from, Some(last_finals), true)?;
        debug!(times, states = self.state_count(), "max repeat");
        self.after_op_minimize(ctx);
        Ok(())
    }

    /// At least `times` repetitions.
    pub fn min_repeat_op(&mut self, ctx: &mut FsmCtx, times: u32) -> Result<()> {
        if times == 0 {
            return self.star_op(ctx);
        }
        let mut dup = self.clone();
        self.exact_repeat_op(ctx, times)?;
        dup.star_op(ctx)?;
        self.concat_op(ctx, dup)
    }

    /// Between `low` and `high` repetitions. An inverted range accepts nothing.
    pub fn range_repeat_op(&mut self, ctx: &mut FsmCtx, low: u32, high: u32) -> Result<()> {
        if low > high {
            *self = FsmGraph::empty_fsm();
            return Ok(());
        }
        if high == 0 {
            *self = FsmGraph::lambda_fsm();
            return Ok(());
        }
        if low == 0 {
            return self.max_repeat_op(ctx, high);
        }
        if low == high {
            return self.exact_repeat_op(ctx, low);
        }

        let mut dup = self.clone();
        self.exact_repeat_op(ctx, low)?;
        dup.max_repeat_op(ctx, high - low)?;
        self.concat_op(ctx, dup)
    }
}
