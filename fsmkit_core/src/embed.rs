use crate::action::{ActionId, PriorDesc};
use crate::ctx::FsmCtx;
use crate::error::Result;
use crate::graph::{CondTrans, FsmGraph, StateId};

impl FsmGraph {
    /// Applies `f` to every condition transition of `state` that has a target.
    fn for_each_cond(&mut self, state: StateId, mut f: impl FnMut(&mut CondTrans)) {
        for trans in self[state].out_list.iter_mut() {
            for cond in trans.conds.iter_mut().filter(|c| c.to.is_some()) {
                f(cond);
            }
        }
    }

    /// Applies `f` to every condition transition entering a final state.
    fn for_each_cond_into_final(&mut self, mut f: impl FnMut(&mut CondTrans)) {
        let finals = self.finals.clone();
        for state in self.state_ids() {
            for trans in self[state].out_list.iter_mut() {
                for cond in trans.conds.iter_mut() {
                    if cond.to.map_or(false, |to| finals.contains(&to)) {
                        f(cond);
                    }
                }
            }
        }
    }

    /// Runs `action` on the first transition taken.
    ///
    /// When the start state is final the action also becomes pending on
    /// leaving it, so the empty match does not bypass it.
    pub fn start_fsm_action(&mut self, ctx: &mut FsmCtx, ordering: i32, action: ActionId) -> Result<()> {
        self.isolate_start_state(ctx)?;
        let start = self.ensure_start();
        self.for_each_cond(start, |c| c.actions.set_action(ordering, action));
        if self[start].is_final() {
            self[start].out_actions.set_action(ordering, action);
        }
        let nfa_targets: Vec<StateId> = self[start].nfa_out.iter().map(|n| n.to).collect();
        for target in nfa_targets {
            self.for_each_cond(target, |c| c.actions.set_action(ordering, action));
        }
        self.after_op_minimize(ctx);
        Ok(())
    }

    pub fn all_trans_action(&mut self, ordering: i32, action: ActionId) {
        for state in self.state_ids() {
            self.for_each_cond(state, |c| c.actions.set_action(ordering, action));
        }
    }

    /// Runs `action` on every transition that enters a final state.
    pub fn finish_fsm_action(&mut self, ordering: i32, action: ActionId) {
        self.for_each_cond_into_final(|c| c.actions.set_action(ordering, action));
    }

    /// Runs `action` when the machine is left through a final state.
    pub fn leave_fsm_action(&mut self, ordering: i32, action: ActionId) {
        for state in self.finals.clone() {
            self[state].out_actions.set_action(ordering, action);
        }
    }

    pub fn all_to_state_action(&mut self, ordering: i32, action: ActionId) {
        for state in self.state_ids() {
            self[state].to_state_actions.set_action(ordering, action);
        }
    }

    pub fn all_from_state_action(&mut self, ordering: i32, action: ActionId) {
        for state in self.state_ids() {
            self[state].from_state_actions.set_action(ordering, action);
        }
    }

    pub fn final_eof_action(&mut self, ordering: i32, action: ActionId) {
        for state in self.finals.clone() {
            self[state].eof_actions.set_action(ordering, action);
        }
    }

    pub fn start_fsm_prior(&mut self, ctx: &mut FsmCtx, ordering: i32, desc: PriorDesc) -> Result<()> {
        self.isolate_start_state(ctx)?;
        let start = self.ensure_start();
        self.for_each_cond(start, |c| c.priors.set_prior(ordering, desc));
        if self[start].is_final() {
            self[start].out_priors.set_prior(ordering, desc);
        }
        self.after_op_minimize(ctx);
        Ok(())
    }

    pub fn all_trans_prior(&mut self, ordering: i32, desc: PriorDesc) {
        for state in self.state_ids() {
            self.for_each_cond(state, |c| c.priors.set_prior(ordering, desc));
            for nfa in self[state].nfa_out.iter_mut() {
                nfa.priors.set_prior(ordering, desc);
            }
        }
    }

    pub fn finish_fsm_prior(&mut self, ordering: i32, desc: PriorDesc) {
        self.for_each_cond_into_final(|c| c.priors.set_prior(ordering, desc));
    }

    pub fn leave_fsm_prior(&mut self, ordering: i32, desc: PriorDesc) {
        for state in self.finals.clone() {
            self[state].out_priors.set_prior(ordering, desc);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::action::ActionId;
    use crate::ctx::FsmCtx;
    use crate::graph::FsmGraph;

    const A: ActionId = ActionId(1);
    const B: ActionId = ActionId(2);

    fn actions_on_path(fsm: &FsmGraph, input: &[u8]) -> Vec<ActionId> {
        let mut state = fsm.start().unwrap();
        let mut res = Vec::new();
        for key in input {
            let trans = fsm[state].find_trans((*key).into()).unwrap();
            res.extend(trans.conds[0].actions.actions());
            state = trans.conds[0].to.unwrap();
        }
        res
    }

    #[test]
    fn start_and_finish_actions() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::from_text(b"abc");
        fsm.start_fsm_action(&mut ctx, 0, A).unwrap();
        fsm.finish_fsm_action(1, B);
        assert_eq!(actions_on_path(&fsm, b"abc"), vec![A, B]);
    }

    #[test]
    fn leaving_actions_move_to_next_machine() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::from_text(b"ab");
        fsm.leave_fsm_action(0, A);
        fsm.concat_op(&mut ctx, FsmGraph::from_text(b"c")).unwrap();
        assert_eq!(actions_on_path(&fsm, b"abc"), vec![A]);
        let fin = *fsm.finals().iter().next().unwrap();
        assert!(fsm[fin].out_actions().is_empty());
    }

    #[test]
    fn start_action_on_final_start() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::lambda_fsm();
        fsm.start_fsm_action(&mut ctx, 0, A).unwrap();
        let start = fsm.start().unwrap();
        assert!(fsm[start].out_actions().has_action(A));
    }

    #[test]
    fn all_trans_and_state_actions() {
        let mut fsm = FsmGraph::from_text(b"xy");
        fsm.all_trans_action(0, A);
        fsm.all_to_state_action(0, B);
        fsm.final_eof_action(0, B);
        assert_eq!(actions_on_path(&fsm, b"xy"), vec![A, A]);
        for (id, state) in fsm.states() {
            assert!(state.to_state_actions().has_action(B));
            assert_eq!(state.eof_actions().has_action(B), fsm.is_final(id));
        }
    }
}
