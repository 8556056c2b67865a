use std::cmp::Ordering;

use serde::Serialize;

/// Opaque reference to a user action or condition predicate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ActionId(pub u32);

/// Orderings used by the nondeterministic repetition construction.
pub const ORD_PUSH: i32 = 0;
pub const ORD_RESTORE: i32 = -2;
pub const ORD_COND: i32 = -1;
pub const ORD_TEST: i32 = 1073741824;

/// Actions attached to a transition or state, sorted by their ordering.
///
/// Several actions can share an ordering, an exact (ordering, action) duplicate
/// is stored once.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionTable(Vec<(i32, ActionId)>);

impl ActionTable {
    pub fn new() -> Self {
        ActionTable(Vec::new())
    }

    pub fn set_action(&mut self, ordering: i32, action: ActionId) {
        let item = (ordering, action);
        if let Err(pos) = self.0.binary_search(&item) {
            self.0.insert(pos, item);
        }
    }

    pub fn set_actions(&mut self, other: &ActionTable) {
        for &(ordering, action) in other.0.iter() {
            self.set_action(ordering, action);
        }
    }

    pub fn has_action(&self, action: ActionId) -> bool {
        self.0.iter().any(|(_, a)| *a == action)
    }

    /// Actions in execution order.
    pub fn actions(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.0.iter().map(|(_, a)| *a)
    }

    pub fn iter(&self) -> std::slice::Iter<(i32, ActionId)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }
}

/// A priority assignment: transitions are only ranked against each other when
/// they carry a priority under the same key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriorDesc {
    pub key: i32,
    pub priority: i32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriorEl {
    pub ordering: i32,
    pub desc: PriorDesc,
}

/// Priorities of a transition, at most one per priority key.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriorTable(Vec<PriorEl>);

impl PriorTable {
    pub fn new() -> Self {
        PriorTable(Vec::new())
    }

    /// Records `desc`, replacing a priority on the same key unless that one was
    /// assigned with a greater ordering.
    pub fn set_prior(&mut self, ordering: i32, desc: PriorDesc) {
        match self.0.binary_search_by_key(&desc.key, |el| el.desc.key) {
            Ok(pos) => {
                if ordering >= self.0[pos].ordering {
                    self.0[pos] = PriorEl { ordering, desc };
                }
            }
            Err(pos) => self.0.insert(pos, PriorEl { ordering, desc }),
        }
    }

    pub fn set_priors(&mut self, other: &PriorTable) {
        for el in other.0.iter() {
            self.set_prior(el.ordering, el.desc);
        }
    }

    pub fn get(&self, key: i32) -> Option<&PriorEl> {
        self.0.binary_search_by_key(&key, |el| el.desc.key)
            .ok()
            .map(|pos| &self.0[pos])
    }

    pub fn iter(&self) -> std::slice::Iter<PriorEl> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }
}

/// Ranks two priority tables.
///
/// Only keys present in both tables take part, the first key whose priorities
/// differ decides. Tables without a shared differing key are equal.
pub fn compare_prior(first: &PriorTable, second: &PriorTable) -> Ordering {
    let (mut i, mut j) = (0, 0);
    while i < first.0.len() && j < second.0.len() {
        let a = &first.0[i].desc;
        let b = &second.0[j].desc;
        match a.key.cmp(&b.key) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                match a.priority.cmp(&b.priority) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
                i += 1;
                j += 1;
            }
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prior(key: i32, priority: i32) -> PriorDesc {
        PriorDesc { key, priority }
    }

    #[test]
    fn action_table_is_ordered() {
        let mut table = ActionTable::new();
        table.set_action(5, ActionId(1));
        table.set_action(2, ActionId(7));
        table.set_action(5, ActionId(0));
        table.set_action(2, ActionId(7));
        assert_eq!(table.actions().collect::<Vec<_>>(), vec![ActionId(7), ActionId(0), ActionId(1)]);
        assert!(table.has_action(ActionId(0)));
        assert!(!table.has_action(ActionId(3)));
    }

    #[test]
    fn restore_runs_before_tests() {
        let mut table = ActionTable::new();
        table.set_action(ORD_TEST, ActionId(3));
        table.set_action(ORD_COND, ActionId(2));
        table.set_action(ORD_PUSH, ActionId(4));
        table.set_action(ORD_RESTORE, ActionId(1));
        assert_eq!(table.actions().collect::<Vec<_>>(),
                   vec![ActionId(1), ActionId(2), ActionId(4), ActionId(3)]);
    }

    #[test]
    fn later_priority_wins() {
        let mut table = PriorTable::new();
        table.set_prior(3, prior(1, 10));
        table.set_prior(1, prior(1, 20));
        assert_eq!(table.get(1).map(|x| x.desc.priority), Some(10));
        table.set_prior(4, prior(1, 30));
        assert_eq!(table.get(1).map(|x| x.desc.priority), Some(30));
    }

    #[test]
    fn compare_uses_shared_keys() {
        let mut a = PriorTable::new();
        let mut b = PriorTable::new();
        a.set_prior(0, prior(1, 5));
        b.set_prior(0, prior(2, 9));
        assert_eq!(compare_prior(&a, &b), Ordering::Equal);

        b.set_prior(0, prior(1, 7));
        assert_eq!(compare_prior(&a, &b), Ordering::Less);
        assert_eq!(compare_prior(&b, &a), Ordering::Greater);
    }
}
