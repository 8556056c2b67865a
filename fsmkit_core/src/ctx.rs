use fsmkit_util::HostType;

use crate::action::PriorDesc;
use crate::cond::KeySpaceAllocator;
use crate::key::KeyOps;
use crate::nfa::NfaRound;

/// When the operators minimize their result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MinimizeLevel {
    Never,
    /// Only when the caller asks for it, after the whole machine is built.
    #[default]
    End,
    EveryOp,
}

/// Construction session shared by every machine built in it.
///
/// Machines combined by an operator must come from the same context: condition
/// space ids and action orderings are only meaningful inside it.
#[derive(Clone, Debug)]
pub struct FsmCtx {
    pub key_ops: KeyOps,
    pub cond_keys: KeySpaceAllocator,
    pub minimize: MinimizeLevel,
    pub cur_action_ord: i32,
    pub cur_prior_ord: i32,
    pub next_prior_key: i32,
    /// Plan followed by [`FsmGraph::nfa_union`](crate::graph::FsmGraph::nfa_union).
    pub nfa_rounds: Vec<NfaRound>,
}

impl FsmCtx {
    pub fn new(host: HostType) -> Self {
        let key_ops = KeyOps::new(host);
        FsmCtx {
            key_ops,
            cond_keys: KeySpaceAllocator::new(key_ops),
            minimize: MinimizeLevel::default(),
            cur_action_ord: 0,
            cur_prior_ord: 0,
            next_prior_key: 0,
            nfa_rounds: Vec::new(),
        }
    }

    /// Replaces the condition key allocator with one bounded by `limit`.
    pub fn with_cond_key_limit(mut self, limit: i64) -> Self {
        self.cond_keys = KeySpaceAllocator::with_key_limit(self.key_ops, limit);
        self
    }

    pub fn with_minimize(mut self, level: MinimizeLevel) -> Self {
        self.minimize = level;
        self
    }

    pub fn with_nfa_rounds(mut self, rounds: Vec<NfaRound>) -> Self {
        self.nfa_rounds = rounds;
        self
    }

    pub fn next_action_ord(&mut self) -> i32 {
        let res = self.cur_action_ord;
        self.cur_action_ord += 1;
        res
    }

    pub fn next_prior_ord(&mut self) -> i32 {
        let res = self.cur_prior_ord;
        self.cur_prior_ord += 1;
        res
    }

    /// A priority on a fresh key, unrelated to every priority handed out before.
    pub fn alloc_prior(&mut self, priority: i32) -> PriorDesc {
        let key = self.next_prior_key;
        self.next_prior_key += 1;
        PriorDesc { key, priority }
    }
}

impl Default for FsmCtx {
    fn default() -> Self {
        FsmCtx::new(HostType::UChar)
    }
}
