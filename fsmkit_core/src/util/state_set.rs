use std::collections::BTreeSet;
use std::collections::btree_set;
use std::fmt::{Display, Error, Formatter};

use crate::graph::StateId;

/// An ordered set of states, used as the identity of a combination state.
#[derive(Debug, Default, PartialEq, Eq, Clone, Hash, PartialOrd, Ord)]
pub struct StateSet(BTreeSet<StateId>);

impl StateSet {
    pub fn create_empty() -> Self {
        StateSet(BTreeSet::new())
    }

    pub fn singleton(state: StateId) -> Self {
        let mut res = StateSet::create_empty();
        res.insert(state);
        res
    }

    pub fn insert(&mut self, x: StateId) -> bool {
        self.0.insert(x)
    }

    pub fn remove(&mut self, x: StateId) -> bool {
        self.0.remove(&x)
    }

    pub fn contains(&self, x: StateId) -> bool {
        self.0.contains(&x)
    }

    pub fn union_with(&mut self, other: &StateSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn iter(&self) -> btree_set::Iter<StateId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<StateId> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<StateId> for StateSet {
    fn from_iter<I: IntoIterator<Item = StateId>>(iter: I) -> Self {
        StateSet(iter.into_iter().collect())
    }
}

impl Display for StateSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_str("{")?;
        for (index, state) in self.0.iter().enumerate() {
            if index != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", state)?;
        }
        f.write_str("}")
    }
}
