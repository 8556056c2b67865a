use std::collections::BTreeSet;
use std::fmt::{Display, Error, Formatter};
use std::ops::{BitAnd, BitOr, Not};

use crate::action::{ActionTable, PriorTable};
use crate::cond::{CondKey, CondSpaceId};
use crate::key::Key;
use crate::util::StateSet;

use super::trans::{NfaTrans, Trans};

/// Named entry point of a machine, the target of epsilon transitions and joins.
pub type EntryId = u32;

/// Handle of a state inside its graph's arena.
///
/// The generation makes handles of deleted states detectably stale even after
/// their slot is reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl StateId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        StateId { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl Display for StateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "s{}", self.index)
    }
}

/// Marker bits used by the operators while they run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StateBits(u8);

impl StateBits {
    pub const NONE: StateBits = StateBits(0);
    pub const GRAPH1: StateBits = StateBits(0x01);
    pub const GRAPH2: StateBits = StateBits(0x02);
    pub const BOTH: StateBits = StateBits(0x03);
    pub const ISFINAL: StateBits = StateBits(0x04);
    pub const ISMARKED: StateBits = StateBits(0x08);
    pub const NFA_REP: StateBits = StateBits(0x20);

    pub fn contains(self, other: StateBits) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: StateBits) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: StateBits) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: StateBits) {
        self.0 &= !other.0;
    }
}

impl BitOr for StateBits {
    type Output = StateBits;

    fn bitor(self, rhs: Self) -> Self::Output {
        StateBits(self.0 | rhs.0)
    }
}

impl BitAnd for StateBits {
    type Output = StateBits;

    fn bitand(self, rhs: Self) -> Self::Output {
        StateBits(self.0 & rhs.0)
    }
}

impl Not for StateBits {
    type Output = StateBits;

    fn not(self) -> Self::Output {
        StateBits(!self.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct State {
    pub(crate) out_list: Vec<Trans>,
    pub(crate) nfa_out: Vec<NfaTrans>,
    pub(crate) bits: StateBits,
    pub(crate) entry_ids: BTreeSet<EntryId>,
    pub(crate) epsilon_trans: Vec<EntryId>,
    pub(crate) owning_graph: u32,

    pub(crate) to_state_actions: ActionTable,
    pub(crate) from_state_actions: ActionTable,
    pub(crate) eof_actions: ActionTable,

    /// Pending for transitions that leave the machine from this (final) state.
    pub(crate) out_actions: ActionTable,
    pub(crate) out_priors: PriorTable,
    pub(crate) out_cond_space: Option<CondSpaceId>,
    pub(crate) out_cond_keys: BTreeSet<CondKey>,

    /// States this one stands for while it is a combination state.
    pub(crate) dict_set: Option<StateSet>,
    /// Whether the members of `dict_set` are still referenced by this state.
    pub(crate) dict_refs: bool,

    pub(crate) foreign_in: u32,
    pub(crate) in_trans: u32,
    pub(crate) misfit: bool,
}

impl State {
    pub fn out_list(&self) -> &[Trans] {
        &self.out_list
    }

    pub fn nfa_out(&self) -> &[NfaTrans] {
        &self.nfa_out
    }

    pub fn bits(&self) -> StateBits {
        self.bits
    }

    pub fn is_final(&self) -> bool {
        self.bits.contains(StateBits::ISFINAL)
    }

    pub fn entry_ids(&self) -> &BTreeSet<EntryId> {
        &self.entry_ids
    }

    pub fn epsilon_trans(&self) -> &[EntryId] {
        &self.epsilon_trans
    }

    pub fn to_state_actions(&self) -> &ActionTable {
        &self.to_state_actions
    }

    pub fn from_state_actions(&self) -> &ActionTable {
        &self.from_state_actions
    }

    pub fn eof_actions(&self) -> &ActionTable {
        &self.eof_actions
    }

    pub fn out_actions(&self) -> &ActionTable {
        &self.out_actions
    }

    pub fn out_priors(&self) -> &PriorTable {
        &self.out_priors
    }

    pub fn out_cond_space(&self) -> Option<CondSpaceId> {
        self.out_cond_space
    }

    pub fn out_cond_keys(&self) -> &BTreeSet<CondKey> {
        &self.out_cond_keys
    }

    /// References from other states, NFA edges, the start designation and
    /// entry points.
    pub fn foreign_in(&self) -> u32 {
        self.foreign_in
    }

    /// Transitions and NFA edges ending here, self loops included.
    pub fn in_trans(&self) -> u32 {
        self.in_trans
    }

    pub fn is_misfit(&self) -> bool {
        self.misfit
    }

    /// Destination states of every transition and NFA edge.
    pub fn successors(&self) -> impl Iterator<Item = StateId> + '_ {
        self.out_list.iter()
            .flat_map(|t| t.targets())
            .chain(self.nfa_out.iter().map(|n| n.to))
    }

    pub(crate) fn has_out_data(&self) -> bool {
        !self.out_actions.is_empty() || !self.out_priors.is_empty() || self.out_cond_space.is_some()
    }

    /// The transition whose range contains `key`.
    pub fn find_trans(&self, key: Key) -> Option<&Trans> {
        let pos = self.out_list.partition_point(|t| t.high < key);
        self.out_list.get(pos).filter(|t| t.low <= key)
    }
}
