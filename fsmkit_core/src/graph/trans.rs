use crate::action::{ActionTable, PriorTable};
use crate::cond::{CondKey, CondSpaceId};
use crate::key::Key;

use super::state::StateId;

/// One condition combination of a transition.
///
/// A missing target keeps the combination's actions and priorities alive while
/// the combination itself goes nowhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CondTrans {
    pub key: CondKey,
    pub to: Option<StateId>,
    pub actions: ActionTable,
    pub priors: PriorTable,
}

impl CondTrans {
    pub fn new(key: CondKey, to: Option<StateId>) -> Self {
        CondTrans {
            key,
            to,
            actions: ActionTable::new(),
            priors: PriorTable::new(),
        }
    }
}

/// Transition over the key range `low..=high`, split by condition combination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trans {
    pub low: Key,
    pub high: Key,
    pub cond_space: Option<CondSpaceId>,
    /// Sorted by key. Without a condition space this holds exactly one entry
    /// with key 0.
    pub conds: Vec<CondTrans>,
}

impl Trans {
    pub fn new(low: Key, high: Key, to: Option<StateId>) -> Self {
        Trans {
            low,
            high,
            cond_space: None,
            conds: vec![CondTrans::new(0, to)],
        }
    }

    /// Copy of this transition restricted to `low..=high`.
    pub fn with_keys(&self, low: Key, high: Key) -> Self {
        Trans {
            low,
            high,
            cond_space: self.cond_space,
            conds: self.conds.clone(),
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = StateId> + '_ {
        self.conds.iter().filter_map(|c| c.to)
    }

    pub fn find_cond(&self, key: CondKey) -> Option<&CondTrans> {
        self.conds.binary_search_by_key(&key, |c| c.key)
            .ok()
            .map(|pos| &self.conds[pos])
    }
}

/// Epsilon-like edge kept for a run-time backtracking driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NfaTrans {
    pub to: StateId,
    pub order: i32,
    pub push_actions: ActionTable,
    pub restore_actions: ActionTable,
    pub pop_test: ActionTable,
    pub pop_actions: ActionTable,
    pub priors: PriorTable,
}

impl NfaTrans {
    pub fn new(to: StateId, order: i32) -> Self {
        NfaTrans {
            to,
            order,
            push_actions: ActionTable::new(),
            restore_actions: ActionTable::new(),
            pop_test: ActionTable::new(),
            pop_actions: ActionTable::new(),
            priors: PriorTable::new(),
        }
    }
}
