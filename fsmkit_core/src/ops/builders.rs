use crate::ctx::FsmCtx;
use crate::graph::FsmGraph;
use crate::key::Key;

impl FsmGraph {
    /// Accepts exactly the sequence `keys`.
    pub fn concat_fsm(keys: &[Key]) -> FsmGraph {
        let mut fsm = FsmGraph::new();
        let mut last = fsm.add_state();
        fsm.set_start_state(last);
        for key in keys {
            let next = fsm.add_state();
            fsm.attach_new_trans(last, next, *key, *key);
            last = next;
        }
        fsm.set_fin_state(last);
        fsm
    }

    /// Converts the text passed as input to a machine accepting that byte string.
    pub fn from_text(text: &[u8]) -> FsmGraph {
        let keys: Vec<Key> = text.iter().map(|x| Key::from(*x)).collect();
        FsmGraph::concat_fsm(&keys)
    }

    /// Like [`FsmGraph::concat_fsm`], ASCII letters match in either case.
    pub fn concat_fsm_ci(keys: &[Key]) -> FsmGraph {
        let mut fsm = FsmGraph::new();
        let mut last = fsm.add_state();
        fsm.set_start_state(last);
        for key in keys {
            let next = fsm.add_state();
            if key.is_upper() || key.is_lower() {
                fsm.attach_new_trans(last, next, key.to_upper(), key.to_upper());
                fsm.attach_new_trans(last, next, key.to_lower(), key.to_lower());
            } else {
                fsm.attach_new_trans(last, next, *key, *key);
            }
            last = next;
        }
        fsm.set_fin_state(last);
        fsm
    }

    pub fn char_fsm(key: Key) -> FsmGraph {
        FsmGraph::concat_fsm(&[key])
    }

    /// Accepts any single key of `keys`.
    pub fn or_fsm(keys: &[Key]) -> FsmGraph {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut fsm = FsmGraph::new();
        let start = fsm.add_state();
        let end = fsm.add_state();
        fsm.set_start_state(start);
        fsm.set_fin_state(end);
        for key in keys {
            fsm.attach_new_trans(start, end, key, key);
        }
        fsm
    }

    /// Accepts a single key in `low..=high`, nothing when the range is empty.
    pub fn range_fsm(low: Key, high: Key) -> FsmGraph {
        if low > high {
            return FsmGraph::empty_fsm();
        }
        let mut fsm = FsmGraph::new();
        let start = fsm.add_state();
        let end = fsm.add_state();
        fsm.set_start_state(start);
        fsm.set_fin_state(end);
        fsm.attach_new_trans(start, end, low, high);
        fsm
    }

    /// Any number of keys from `low..=high`.
    pub fn range_star_fsm(low: Key, high: Key) -> FsmGraph {
        let mut fsm = FsmGraph::new();
        let start = fsm.add_state();
        fsm.set_start_state(start);
        fsm.set_fin_state(start);
        if low <= high {
            fsm.attach_new_trans(start, start, low, high);
        }
        fsm
    }

    pub fn dot_fsm(ctx: &FsmCtx) -> FsmGraph {
        FsmGraph::range_fsm(ctx.key_ops.min_key, ctx.key_ops.max_key)
    }

    pub fn dot_star_fsm(ctx: &FsmCtx) -> FsmGraph {
        FsmGraph::range_star_fsm(ctx.key_ops.min_key, ctx.key_ops.max_key)
    }

    /// Accepts only the empty string.
    pub fn lambda_fsm() -> FsmGraph {
        let mut fsm = FsmGraph::new();
        let start = fsm.add_state();
        fsm.set_start_state(start);
        fsm.set_fin_state(start);
        fsm
    }

    /// Accepts nothing.
    pub fn empty_fsm() -> FsmGraph {
        let mut fsm = FsmGraph::new();
        let start = fsm.add_state();
        fsm.set_start_state(start);
        fsm
    }
}
