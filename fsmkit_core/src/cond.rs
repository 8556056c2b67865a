use std::collections::btree_set;
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::action::ActionId;
use crate::error::{FsmError, Result};
use crate::key::{Key, KeyOps};

/// One truth assignment of the conditions of a space: bit `i` holds the value
/// of the condition at rank `i` in the space's set.
pub type CondKey = u64;

/// Ordered set of condition predicates.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CondSet(BTreeSet<ActionId>);

impl CondSet {
    pub fn new() -> Self {
        CondSet(BTreeSet::new())
    }

    pub fn insert(&mut self, action: ActionId) -> bool {
        self.0.insert(action)
    }

    pub fn contains(&self, action: ActionId) -> bool {
        self.0.contains(&action)
    }

    /// Bit position of `action` in this set.
    pub fn pos(&self, action: ActionId) -> Option<usize> {
        self.0.iter().position(|a| *a == action)
    }

    pub fn union(&self, other: &CondSet) -> CondSet {
        CondSet(self.0.union(&other.0).copied().collect())
    }

    pub fn iter(&self) -> btree_set::Iter<ActionId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ActionId> for CondSet {
    fn from_iter<I: IntoIterator<Item = ActionId>>(iter: I) -> Self {
        CondSet(iter.into_iter().collect())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CondSpaceId(pub u32);

/// A condition set together with the block of flat keys reserved for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CondSpace {
    pub id: CondSpaceId,
    pub set: CondSet,
    pub base_key: Key,
}

impl CondSpace {
    /// Number of condition combinations.
    pub fn full_size(&self) -> u64 {
        1u64 << self.set.len()
    }

    pub fn flat_key(&self, ops: &KeyOps, cond_key: CondKey, key: Key) -> Key {
        let offset = cond_key as i128 * ops.alph_size() as i128
            + (key.get() as i128 - ops.min_key.get() as i128);
        Key::new((self.base_key.get() as i128 + offset) as i64)
    }
}

/// Re-expresses `key` from the bit layout of `from` into the layout of `to`.
///
/// Conditions missing from `to` are dropped, conditions missing from `from`
/// stay false.
pub fn remap_cond_key(key: CondKey, from: &CondSet, to: &CondSet) -> CondKey {
    let mut res = 0;
    for (pos, action) in from.iter().enumerate() {
        if key & (1 << pos) != 0 {
            if let Some(new_pos) = to.pos(*action) {
                res |= 1 << new_pos;
            }
        }
    }
    res
}

/// Remaps a set of combinations from `from` into the superset `merged`,
/// doubling it for every condition `from` does not mention.
pub fn expand_cond_keys(keys: &BTreeSet<CondKey>, from: &CondSet, merged: &CondSet) -> BTreeSet<CondKey> {
    let mut res: BTreeSet<CondKey> = keys.iter()
        .map(|k| remap_cond_key(*k, from, merged))
        .collect();
    for (pos, action) in merged.iter().enumerate() {
        if !from.contains(*action) {
            let doubled: Vec<CondKey> = res.iter().map(|k| k | (1 << pos)).collect();
            res.extend(doubled);
        }
    }
    res
}

/// Hands out disjoint blocks of the key space above the alphabet, one per
/// distinct condition set.
///
/// Allocation is monotonic: blocks are never released and an already known set
/// always resolves to the block it got the first time.
#[derive(Clone, Debug)]
pub struct KeySpaceAllocator {
    key_ops: KeyOps,
    last_cond_key: i64,
    key_limit: i64,
    spaces: IndexMap<CondSet, CondSpace>,
}

impl KeySpaceAllocator {
    pub fn new(key_ops: KeyOps) -> Self {
        KeySpaceAllocator::with_key_limit(key_ops, key_ops.host.cond_key_limit())
    }

    pub fn with_key_limit(key_ops: KeyOps, key_limit: i64) -> Self {
        KeySpaceAllocator {
            key_ops,
            last_cond_key: key_ops.max_key.get(),
            key_limit,
            spaces: IndexMap::new(),
        }
    }

    pub fn add_cond_space(&mut self, set: &CondSet) -> Result<CondSpaceId> {
        if let Some(id) = self.find(set) {
            return Ok(id);
        }

        let needed = 1u128.checked_shl(set.len() as u32)
            .unwrap_or(u128::MAX)
            .saturating_mul(self.key_ops.alph_size() as u128);
        let available = self.available();
        if needed > available {
            warn!(conds = set.len(), needed, available, "condition key space exhausted");
            return Err(FsmError::KeySpaceExhausted {
                conds: set.len(),
                needed,
                available,
            });
        }

        let id = CondSpaceId(self.spaces.len() as u32);
        let base_key = Key::new(self.last_cond_key + 1);
        self.last_cond_key += needed as i64;
        debug!(id = id.0, conds = set.len(), base = base_key.get(), "allocated condition space");

        self.spaces.insert(set.clone(), CondSpace {
            id,
            set: set.clone(),
            base_key,
        });
        Ok(id)
    }

    pub fn find(&self, set: &CondSet) -> Option<CondSpaceId> {
        self.spaces.get(set).map(|s| s.id)
    }

    pub fn space(&self, id: CondSpaceId) -> &CondSpace {
        &self.spaces[id.0 as usize]
    }

    /// The condition set of `id`, empty for plain transitions.
    pub fn set_of(&self, id: Option<CondSpaceId>) -> CondSet {
        id.map(|id| self.space(id).set.clone()).unwrap_or_default()
    }

    pub fn spaces(&self) -> impl Iterator<Item = &CondSpace> {
        self.spaces.values()
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn last_cond_key(&self) -> Key {
        Key::new(self.last_cond_key)
    }

    pub fn key_limit(&self) -> Key {
        Key::new(self.key_limit)
    }

    pub fn available(&self) -> u128 {
        (self.key_limit as i128 - self.last_cond_key as i128).max(0) as u128
    }
}

#[cfg(test)]
mod tests {
    use fsmkit_util::HostType;

    use super::*;

    fn set(ids: &[u32]) -> CondSet {
        ids.iter().map(|x| ActionId(*x)).collect()
    }

    #[test]
    fn spaces_are_interned() {
        let mut alloc = KeySpaceAllocator::new(KeyOps::new(HostType::UChar));
        let a = alloc.add_cond_space(&set(&[1, 2])).unwrap();
        let last = alloc.last_cond_key();
        let b = alloc.add_cond_space(&set(&[2, 1])).unwrap();
        assert_eq!(a, b);
        assert_eq!(alloc.last_cond_key(), last);
        assert_eq!(alloc.len(), 1);
    }

    #[test]
    fn blocks_are_disjoint() {
        let ops = KeyOps::new(HostType::UChar);
        let mut alloc = KeySpaceAllocator::new(ops);
        let a = alloc.add_cond_space(&set(&[1])).unwrap();
        let b = alloc.add_cond_space(&set(&[1, 2])).unwrap();
        let a = alloc.space(a).clone();
        let b = alloc.space(b).clone();
        assert_eq!(a.base_key, Key::new(256));
        assert_eq!(b.base_key, Key::new(256 + 2 * 256));
        let a_last = a.flat_key(&ops, 1, ops.max_key);
        assert_eq!(a_last.inc(), b.base_key);
        assert_eq!(alloc.last_cond_key(), b.flat_key(&ops, 3, ops.max_key));
    }

    #[test]
    fn exact_capacity() {
        let ops = KeyOps::new(HostType::UChar);
        let needed = 4 * 256;

        let mut alloc = KeySpaceAllocator::with_key_limit(ops, 255 + needed);
        assert!(alloc.add_cond_space(&set(&[1, 2])).is_ok());
        assert_eq!(alloc.available(), 0);

        let mut alloc = KeySpaceAllocator::with_key_limit(ops, 255 + needed - 1);
        let err = alloc.add_cond_space(&set(&[1, 2])).unwrap_err();
        assert_eq!(err, FsmError::KeySpaceExhausted {
            conds: 2,
            needed: needed as u128,
            available: needed as u128 - 1,
        });
        assert_eq!(alloc.last_cond_key(), Key::new(255));
    }

    #[test]
    fn char_host_runs_out() {
        // 2^8 * 256 keys do not fit below the short maximum.
        let mut alloc = KeySpaceAllocator::new(KeyOps::new(HostType::Char));
        let big = set(&[0, 1, 2, 3, 4, 5, 6, 7]);
        assert!(matches!(alloc.add_cond_space(&big), Err(FsmError::KeySpaceExhausted { .. })));
        assert!(alloc.add_cond_space(&set(&[0])).is_ok());
    }

    #[test]
    fn remap_and_expand() {
        let from = set(&[2]);
        let merged = set(&[1, 2]);
        assert_eq!(remap_cond_key(1, &from, &merged), 2);
        assert_eq!(remap_cond_key(3, &merged, &from), 1);

        let keys: BTreeSet<CondKey> = [1].into_iter().collect();
        let expanded = expand_cond_keys(&keys, &from, &merged);
        assert_eq!(expanded.into_iter().collect::<Vec<_>>(), vec![2, 3]);
    }
}
