//! Machine generators and language comparison for tests.

use std::collections::{BTreeSet, VecDeque};

use fsmkit_util::KeyIter;
use proptest::prelude::*;

use crate::ctx::FsmCtx;
use crate::graph::{FsmGraph, StateId};
use crate::key::Key;

pub const ALPHABET: &[u8] = b"abc";

/// A small regular expression over [`ALPHABET`].
#[derive(Clone, Debug)]
pub enum Expr {
    Lit(Vec<u8>),
    Range(u8, u8),
    Lambda,
    Cat(Box<Expr>, Box<Expr>),
    Alt(Box<Expr>, Box<Expr>),
    Star(Box<Expr>),
    Opt(Box<Expr>),
}

impl Expr {
    pub fn build(&self, ctx: &mut FsmCtx) -> FsmGraph {
        match self {
            Expr::Lit(text) => FsmGraph::from_text(text),
            Expr::Range(low, high) => FsmGraph::range_fsm(Key::from(*low), Key::from(*high)),
            Expr::Lambda => FsmGraph::lambda_fsm(),
            Expr::Cat(a, b) => {
                let mut fsm = a.build(ctx);
                let other = b.build(ctx);
                fsm.concat_op(ctx, other).unwrap();
                fsm
            }
            Expr::Alt(a, b) => {
                let mut fsm = a.build(ctx);
                let other = b.build(ctx);
                fsm.union_op(ctx, other).unwrap();
                fsm
            }
            Expr::Star(a) => {
                let mut fsm = a.build(ctx);
                fsm.star_op(ctx).unwrap();
                fsm
            }
            Expr::Opt(a) => {
                let mut fsm = a.build(ctx);
                fsm.question_op(ctx).unwrap();
                fsm
            }
        }
    }
}

pub fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        prop::collection::vec(prop::sample::select(ALPHABET.to_vec()), 1..3).prop_map(Expr::Lit),
        Just(Expr::Range(b'a', b'b')),
        Just(Expr::Lambda),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::Cat(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::Alt(Box::new(a), Box::new(b))),
            inner.clone().prop_map(|a| Expr::Star(Box::new(a))),
            inner.prop_map(|a| Expr::Opt(Box::new(a))),
        ]
    })
}

pub fn arb_words() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(
        prop::collection::vec(prop::sample::select(ALPHABET.to_vec()), 1..5),
        2..6,
    )
}

/// The symbols from `low` to `high` inclusive.
pub fn symbols(low: u8, high: u8) -> KeyIter {
    KeyIter::new(low as i64, high as i64)
}

/// Every word over `alphabet` of at most `max_len` symbols.
pub fn all_words(alphabet: KeyIter, max_len: usize) -> Vec<Vec<u8>> {
    let mut words = vec![Vec::new()];
    let mut last = vec![Vec::new()];
    for _ in 0..max_len {
        let mut next = Vec::with_capacity(last.len() * alphabet.len());
        for word in last.iter() {
            for symbol in alphabet.clone() {
                let mut longer = word.clone();
                longer.push(symbol as u8);
                next.push(longer);
            }
        }
        words.extend(next.iter().cloned());
        last = next;
    }
    words
}

/// The words of at most `max_len` symbols over [`ALPHABET`] the machine accepts.
pub fn language(fsm: &FsmGraph, ctx: &FsmCtx, max_len: usize) -> BTreeSet<Vec<u8>> {
    all_words(symbols(b'a', b'c'), max_len)
        .into_iter()
        .filter(|w| fsm.accepts(ctx, w))
        .collect()
}

/// States found by a breadth-first walk from the start state and the entry
/// points, compared with the states the graph holds.
pub fn all_reachable(fsm: &FsmGraph) -> bool {
    let mut seen: BTreeSet<StateId> = BTreeSet::new();
    let mut queue: VecDeque<StateId> = fsm.start().into_iter()
        .chain(fsm.entry_points().values().flatten().copied())
        .collect();
    while let Some(id) = queue.pop_front() {
        if seen.insert(id) {
            queue.extend(fsm[id].successors());
        }
    }
    seen == fsm.state_ids().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::action::ActionId;
    use crate::cond::CondSet;
    use crate::ctx::{FsmCtx, MinimizeLevel};
    use crate::error::FsmError;
    use crate::graph::FsmGraph;
    use crate::key::Key;
    use crate::nfa::{NfaRepeatActions, NfaRound};

    use super::*;

    const MAX_LEN: usize = 4;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn union_commutes(a in arb_expr(), b in arb_expr()) {
            let mut ctx = FsmCtx::default();
            let mut ab = a.build(&mut ctx);
            let rhs = b.build(&mut ctx);
            ab.union_op(&mut ctx, rhs).unwrap();
            let mut ba = b.build(&mut ctx);
            let rhs = a.build(&mut ctx);
            ba.union_op(&mut ctx, rhs).unwrap();
            prop_assert_eq!(language(&ab, &ctx, MAX_LEN), language(&ba, &ctx, MAX_LEN));
        }

        #[test]
        fn union_associates(a in arb_expr(), b in arb_expr(), c in arb_expr()) {
            let mut ctx = FsmCtx::default();
            let mut left = a.build(&mut ctx);
            let rhs = b.build(&mut ctx);
            left.union_op(&mut ctx, rhs).unwrap();
            let rhs = c.build(&mut ctx);
            left.union_op(&mut ctx, rhs).unwrap();

            let mut right = b.build(&mut ctx);
            let rhs = c.build(&mut ctx);
            right.union_op(&mut ctx, rhs).unwrap();
            let mut outer = a.build(&mut ctx);
            outer.union_op(&mut ctx, right).unwrap();

            prop_assert_eq!(language(&left, &ctx, MAX_LEN), language(&outer, &ctx, MAX_LEN));
        }

        #[test]
        fn concat_with_lambda_is_identity(a in arb_expr()) {
            let mut ctx = FsmCtx::default();
            let plain = a.build(&mut ctx);
            let mut right = a.build(&mut ctx);
            right.concat_op(&mut ctx, FsmGraph::lambda_fsm()).unwrap();
            let mut left = FsmGraph::lambda_fsm();
            let rhs = a.build(&mut ctx);
            left.concat_op(&mut ctx, rhs).unwrap();

            let expected = language(&plain, &ctx, MAX_LEN);
            prop_assert_eq!(&language(&right, &ctx, MAX_LEN), &expected);
            prop_assert_eq!(&language(&left, &ctx, MAX_LEN), &expected);
        }

        #[test]
        fn star_is_idempotent(a in arb_expr()) {
            let mut ctx = FsmCtx::default();
            let mut once = a.build(&mut ctx);
            once.star_op(&mut ctx).unwrap();
            let mut twice = once.clone();
            twice.star_op(&mut ctx).unwrap();
            prop_assert_eq!(language(&once, &ctx, MAX_LEN), language(&twice, &ctx, MAX_LEN));
        }

        #[test]
        fn operators_leave_only_reachable_states(a in arb_expr(), b in arb_expr()) {
            let mut ctx = FsmCtx::default();
            let check = |fsm: &FsmGraph| all_reachable(fsm);

            prop_assert!(check(&a.build(&mut ctx)));

            let mut cat = a.build(&mut ctx);
            let rhs = b.build(&mut ctx);
            cat.concat_op(&mut ctx, rhs).unwrap();
            prop_assert!(check(&cat));

            let mut and = a.build(&mut ctx);
            let rhs = b.build(&mut ctx);
            and.intersect_op(&mut ctx, rhs).unwrap();
            prop_assert!(check(&and));

            let mut sub = a.build(&mut ctx);
            let rhs = b.build(&mut ctx);
            sub.subtract_op(&mut ctx, rhs).unwrap();
            prop_assert!(check(&sub));

            let mut rep = a.build(&mut ctx);
            rep.range_repeat_op(&mut ctx, 1, 3).unwrap();
            prop_assert!(check(&rep));

            let mut alt = a.build(&mut ctx);
            let rhs = b.build(&mut ctx);
            alt.union_op(&mut ctx, rhs).unwrap();
            prop_assert!(check(&alt));

            let mut star = a.build(&mut ctx);
            star.star_op(&mut ctx).unwrap();
            prop_assert!(check(&star));

            // Contradicting conditions cut the start off, loops behind it too.
            let mut cut = a.build(&mut ctx);
            let mut tail = b.build(&mut ctx);
            tail.star_op(&mut ctx).unwrap();
            cut.concat_op(&mut ctx, tail).unwrap();
            if let Some(start) = cut.start() {
                cut.embed_condition(&mut ctx, start, ActionId(1), true).unwrap();
                cut.embed_condition(&mut ctx, start, ActionId(1), false).unwrap();
            }
            prop_assert!(check(&cut));

            let mut guarded = a.build(&mut ctx);
            guarded.all_trans_condition(&mut ctx, ActionId(2), true).unwrap();
            guarded.all_trans_condition(&mut ctx, ActionId(2), false).unwrap();
            prop_assert!(check(&guarded));
            prop_assert_eq!(guarded.state_count(), 1);

            let mut restricted = a.build(&mut ctx);
            let mut tail = b.build(&mut ctx);
            tail.star_op(&mut ctx).unwrap();
            restricted.concat_op(&mut ctx, tail).unwrap();
            if let Some(start) = restricted.start() {
                let set: CondSet = [ActionId(3)].into_iter().collect();
                restricted.embed_cond_set(&mut ctx, start, &set, &BTreeSet::new()).unwrap();
            }
            prop_assert!(check(&restricted));

            let mut eps = a.build(&mut ctx);
            let mut other = b.build(&mut ctx);
            if let Some(start) = other.start() {
                other.set_entry(7, start);
            }
            eps.epsilon_trans(7);
            eps.glob_op(vec![other]);
            eps.epsilon_op(&mut ctx).unwrap();
            prop_assert!(check(&eps));

            let mut joined = a.build(&mut ctx);
            if let Some(start) = joined.start() {
                joined.set_entry(0, start);
            }
            joined.epsilon_trans(9);
            let other = b.build(&mut ctx);
            joined.join_op(&mut ctx, 0, Some(9), vec![other]).unwrap();
            prop_assert!(check(&joined));

            let mut nfa_rep = a.build(&mut ctx);
            nfa_rep.nfa_repeat_op(&mut ctx, NfaRepeatActions {
                push: ActionId(10),
                pop: ActionId(11),
                init: ActionId(12),
                stay: ActionId(13),
                repeat: ActionId(14),
                exit: ActionId(15),
            }).unwrap();
            prop_assert!(check(&nfa_rep));

            for depth in [0, 1] {
                let mut fan = a.build(&mut ctx);
                let rhs = b.build(&mut ctx);
                fan.nfa_union_op(&mut ctx, vec![rhs], depth).unwrap();
                prop_assert!(check(&fan));
            }
        }

        #[test]
        fn intersect_and_subtract_match_sets(a in arb_expr(), b in arb_expr()) {
            let mut ctx = FsmCtx::default();
            let la = language(&a.build(&mut ctx), &ctx, MAX_LEN);
            let lb = language(&b.build(&mut ctx), &ctx, MAX_LEN);

            let mut and = a.build(&mut ctx);
            let rhs = b.build(&mut ctx);
            and.intersect_op(&mut ctx, rhs).unwrap();
            let expected: BTreeSet<Vec<u8>> = la.intersection(&lb).cloned().collect();
            prop_assert_eq!(language(&and, &ctx, MAX_LEN), expected);

            let mut sub = a.build(&mut ctx);
            let rhs = b.build(&mut ctx);
            sub.subtract_op(&mut ctx, rhs).unwrap();
            let expected: BTreeSet<Vec<u8>> = la.difference(&lb).cloned().collect();
            prop_assert_eq!(language(&sub, &ctx, MAX_LEN), expected);
        }

        #[test]
        fn minimization_keeps_language(a in arb_expr()) {
            let mut ctx = FsmCtx::default();
            let plain = a.build(&mut ctx);
            let mut min = plain.clone();
            min.minimize_partition();
            prop_assert!(min.state_count() <= plain.state_count());
            prop_assert_eq!(language(&min, &ctx, MAX_LEN), language(&plain, &ctx, MAX_LEN));

            let mut eager = FsmCtx::default().with_minimize(MinimizeLevel::EveryOp);
            let built = a.build(&mut eager);
            prop_assert_eq!(language(&built, &eager, MAX_LEN), language(&plain, &ctx, MAX_LEN));
        }

        #[test]
        fn nfa_union_depth_keeps_language(words in arb_words()) {
            let mut ctx = FsmCtx::default();
            let machines = || words.iter().map(|w| FsmGraph::from_text(w)).collect::<Vec<_>>();
            let expected: BTreeSet<Vec<u8>> = words.iter().cloned().collect();

            let mut full = machines();
            let mut full_fsm = full.remove(0);
            full_fsm.nfa_union_op(&mut ctx, full, u32::MAX).unwrap();
            let full_count = full_fsm.nondeterministic_count();
            prop_assert_eq!(full_count, 0);

            for depth in [0, 1, 2, 3, 5] {
                let mut group = machines();
                let mut fsm = group.remove(0);
                fsm.nfa_union_op(&mut ctx, group, depth).unwrap();
                prop_assert_eq!(&language(&fsm, &ctx, 5), &expected);
                prop_assert!(fsm.nondeterministic_count() >= full_count);
            }

            let mut rounds = FsmCtx::default().with_nfa_rounds(vec![NfaRound::new(1, 2), NfaRound::new(3, 2)]);
            let fsm = FsmGraph::nfa_union(&mut rounds, machines()).unwrap();
            prop_assert_eq!(&language(&fsm, &rounds, 5), &expected);
        }

        #[test]
        fn keyspace_capacity(conds in 1usize..6) {
            // Embedding the i-th condition allocates a space of 2^i blocks.
            let blocks: i64 = (1..=conds).map(|i| 1i64 << i).sum();
            let mut ctx = FsmCtx::default().with_cond_key_limit(255 + blocks * 256);
            let mut fsm = FsmGraph::char_fsm(Key::from(b'x'));
            let start = fsm.start().unwrap();

            for action in 0..conds {
                let res = fsm.embed_condition(&mut ctx, start, ActionId(action as u32), true);
                prop_assert!(res.is_ok());
            }
            let res = fsm.embed_condition(&mut ctx, start, ActionId(conds as u32), true);
            let is_exhausted = matches!(res, Err(FsmError::KeySpaceExhausted { .. }));
            prop_assert!(is_exhausted);
        }
    }

    #[test]
    fn scenario_concat() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::char_fsm(Key::from(b'a'));
        fsm.concat_op(&mut ctx, FsmGraph::char_fsm(Key::from(b'b'))).unwrap();

        assert!(fsm.accepts(&ctx, b"ab"));
        for word in [&b"a"[..], &b"b"[..], &b"abc"[..], &b""[..]] {
            assert!(!fsm.accepts(&ctx, word));
        }
        assert_eq!(language(&fsm, &ctx, MAX_LEN), [b"ab".to_vec()].into_iter().collect());
    }

    #[test]
    fn scenario_star() {
        let mut ctx = FsmCtx::default();
        let mut fsm = FsmGraph::char_fsm(Key::from(b'a'));
        fsm.star_op(&mut ctx).unwrap();

        for word in [&b""[..], &b"a"[..], &b"aaaa"[..]] {
            assert!(fsm.accepts(&ctx, word));
        }
        assert!(!fsm.accepts(&ctx, b"b"));
        assert!(!fsm.accepts(&ctx, b"ab"));
    }

    #[test]
    fn scenario_even_a_then_b() {
        let mut ctx = FsmCtx::default();
        let mut any_a = FsmGraph::char_fsm(Key::from(b'a'));
        any_a.star_op(&mut ctx).unwrap();
        any_a.concat_op(&mut ctx, FsmGraph::char_fsm(Key::from(b'b'))).unwrap();

        let mut pairs = FsmGraph::from_text(b"aa");
        pairs.star_op(&mut ctx).unwrap();
        pairs.concat_op(&mut ctx, FsmGraph::char_fsm(Key::from(b'b'))).unwrap();

        any_a.intersect_op(&mut ctx, pairs).unwrap();
        for word in all_words(symbols(b'a', b'b'), 7) {
            let a_count = word.iter().take_while(|c| **c == b'a').count();
            let expected = word.len() == a_count + 1 && word[a_count] == b'b' && a_count % 2 == 0;
            assert_eq!(any_a.accepts(&ctx, &word), expected, "{:?}", String::from_utf8_lossy(&word));
        }
    }

    #[test]
    fn scenario_two_conditions() {
        let mut ctx = FsmCtx::default();
        let (c1, c2) = (ActionId(1), ActionId(2));
        let mut fsm = FsmGraph::char_fsm(Key::from(b'x'));
        let start = fsm.start().unwrap();
        let target = *fsm.finals().iter().next().unwrap();
        fsm.embed_condition(&mut ctx, start, c1, true).unwrap();
        fsm.embed_condition(&mut ctx, start, c2, false).unwrap();

        let trans = &fsm[start].out_list()[0];
        let space = ctx.cond_keys.space(trans.cond_space.unwrap());
        assert_eq!(space.full_size(), 4);
        assert_eq!(trans.conds.len(), 1);
        assert_eq!(trans.conds[0].key, 0b01);
        assert_eq!(trans.conds[0].to, Some(target));

        for (v1, v2) in [(false, false), (false, true), (true, false), (true, true)] {
            let accepted = fsm.accepts_with(&ctx, b"x", |a| if a == c1 { v1 } else { v2 });
            assert_eq!(accepted, v1 && !v2);
        }
    }
}
