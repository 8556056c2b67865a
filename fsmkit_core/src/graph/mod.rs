use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Error, Formatter};
use std::ops::{Index, IndexMut};

use crate::util::{index_twice, IndexTwice};

mod attach;
mod state;
mod trans;

pub use state::{EntryId, State, StateBits, StateId};
pub use trans::{CondTrans, NfaTrans, Trans};

#[derive(Clone, Debug, Default)]
struct Slot {
    generation: u32,
    state: Option<State>,
}

/// A finite state machine under construction.
///
/// States live in an arena owned by the graph and refer to each other through
/// [`StateId`]s. Every operator mutates the graph in place, the machines it
/// consumes are moved into this arena first.
#[derive(Clone, Debug, Default)]
pub struct FsmGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    pub(crate) start: Option<StateId>,
    pub(crate) finals: BTreeSet<StateId>,
    pub(crate) entry_points: BTreeMap<EntryId, BTreeSet<StateId>>,
    pub(crate) misfit_accounting: bool,
    pub(crate) misfit_queue: Vec<StateId>,
}

impl FsmGraph {
    pub fn new() -> Self {
        FsmGraph::default()
    }

    /// Live states, including misfits still waiting for removal.
    pub fn state_count(&self) -> usize {
        self.live
    }

    pub fn get(&self, id: StateId) -> Option<&State> {
        self.slots.get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.slots.get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_mut())
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.get(id).is_some()
    }

    /// Ids of every live state in arena order, detached from the graph so it
    /// can be mutated while iterating.
    pub fn state_ids(&self) -> Vec<StateId> {
        self.states().map(|(id, _)| id).collect()
    }

    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.state.as_ref().map(|s| (StateId::new(index as u32, slot.generation), s))
        })
    }

    /// Arena capacity, an upper bound for [`StateId::index`].
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn start(&self) -> Option<StateId> {
        self.start
    }

    pub fn finals(&self) -> &BTreeSet<StateId> {
        &self.finals
    }

    pub fn is_final(&self, id: StateId) -> bool {
        self.finals.contains(&id)
    }

    pub fn entry_points(&self) -> &BTreeMap<EntryId, BTreeSet<StateId>> {
        &self.entry_points
    }

    pub fn find_entry(&self, id: EntryId) -> Option<&BTreeSet<StateId>> {
        self.entry_points.get(&id)
    }

    pub(crate) fn insert_state(&mut self, state: State) -> StateId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.state = Some(state);
                StateId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot { generation: 0, state: Some(state) });
                StateId::new(self.slots.len() as u32 - 1, 0)
            }
        }
    }

    /// Adds an empty state. Under misfit accounting it starts out as a misfit
    /// until something references it.
    pub fn add_state(&mut self) -> StateId {
        let state = State {
            misfit: self.misfit_accounting,
            ..State::default()
        };
        let id = self.insert_state(state);
        if self.misfit_accounting {
            self.misfit_queue.push(id);
        }
        id
    }

    /// Releases the slot of a state nothing refers to anymore.
    pub(crate) fn free_state(&mut self, id: StateId) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            if slot.generation == id.generation && slot.state.take().is_some() {
                slot.generation += 1;
                self.free.push(id.index);
                self.live -= 1;
            }
        }
    }

    /// Borrows two distinct states at once.
    pub(crate) fn pair_mut(&mut self, a: StateId, b: StateId) -> Option<(&mut State, &mut State)> {
        if a.generation != self.slots.get(a.index())?.generation
            || b.generation != self.slots.get(b.index())?.generation {
            return None;
        }
        match index_twice(&mut self.slots, a.index(), b.index()) {
            IndexTwice::Both(x, y) => Some((x.state.as_mut()?, y.state.as_mut()?)),
            _ => None,
        }
    }

    /// Designates the start state, returning the previous one to normal duty.
    pub fn set_start_state(&mut self, state: StateId) {
        self.unset_start_state();
        self.start = Some(state);
        self.inc_foreign(state);
    }

    pub fn unset_start_state(&mut self) {
        if let Some(old) = self.start.take() {
            self.dec_foreign(old);
        }
    }

    /// The start state, created empty when the machine has none.
    pub(crate) fn ensure_start(&mut self) -> StateId {
        match self.start {
            Some(start) => start,
            None => {
                let start = self.add_state();
                self.set_start_state(start);
                start
            }
        }
    }

    pub fn set_fin_state(&mut self, state: StateId) {
        if self.finals.insert(state) {
            self[state].bits.insert(StateBits::ISFINAL);
        }
    }

    pub fn unset_fin_state(&mut self, state: StateId) {
        if self.finals.remove(&state) {
            self[state].bits.remove(StateBits::ISFINAL);
        }
    }

    pub fn unset_all_fin_states(&mut self) {
        for state in std::mem::take(&mut self.finals) {
            self[state].bits.remove(StateBits::ISFINAL);
        }
    }

    pub fn set_fin_bits(&mut self, bits: StateBits) {
        for state in self.finals.clone() {
            self[state].bits.insert(bits);
        }
    }

    pub fn unset_fin_bits(&mut self, bits: StateBits) {
        for state in self.finals.clone() {
            self[state].bits.remove(bits);
        }
    }

    pub fn set_entry(&mut self, id: EntryId, state: StateId) {
        if self.entry_points.entry(id).or_default().insert(state) {
            self[state].entry_ids.insert(id);
            self.inc_foreign(state);
        }
    }

    pub fn unset_entry(&mut self, id: EntryId, state: StateId) {
        let mut removed = false;
        let mut emptied = false;
        if let Some(set) = self.entry_points.get_mut(&id) {
            removed = set.remove(&state);
            emptied = set.is_empty();
        }
        if emptied {
            self.entry_points.remove(&id);
        }
        if removed {
            self[state].entry_ids.remove(&id);
            self.dec_foreign(state);
        }
    }

    pub fn unset_all_entry_points(&mut self) {
        for (id, states) in std::mem::take(&mut self.entry_points) {
            for state in states {
                self[state].entry_ids.remove(&id);
                self.dec_foreign(state);
            }
        }
    }

    /// Moves entry point `id` from `from` to `to`.
    pub fn change_entry(&mut self, id: EntryId, to: StateId, from: StateId) {
        self.set_entry(id, to);
        self.unset_entry(id, from);
    }

    /// Moves every state of `other` into this arena.
    ///
    /// The start designation of `other` is dropped, its final states and entry
    /// points carry over. Returns the mapping from `other`'s ids to the new ones.
    pub(crate) fn absorb(&mut self, mut other: FsmGraph) -> HashMap<StateId, StateId> {
        other.unset_start_state();

        let mut map = HashMap::with_capacity(other.live);
        let mut moved = Vec::with_capacity(other.live);
        for (index, slot) in other.slots.iter_mut().enumerate() {
            if let Some(state) = slot.state.take() {
                let new_id = self.insert_state(state);
                map.insert(StateId::new(index as u32, slot.generation), new_id);
                moved.push(new_id);
            }
        }

        for id in moved {
            let state = &mut self[id];
            for trans in state.out_list.iter_mut() {
                for cond in trans.conds.iter_mut() {
                    cond.to = cond.to.map(|to| map[&to]);
                }
            }
            for nfa in state.nfa_out.iter_mut() {
                nfa.to = map[&nfa.to];
            }
            if let Some(set) = state.dict_set.take() {
                state.dict_set = Some(set.iter().map(|s| map[s]).collect());
            }
        }

        self.finals.extend(other.finals.iter().map(|s| map[s]));
        for (id, states) in other.entry_points.iter() {
            self.entry_points.entry(*id)
                .or_default()
                .extend(states.iter().map(|s| map[s]));
        }
        self.misfit_queue.extend(other.misfit_queue.iter().filter_map(|s| map.get(s).copied()));

        map
    }
}

impl Index<StateId> for FsmGraph {
    type Output = State;

    fn index(&self, id: StateId) -> &State {
        match self.get(id) {
            Some(state) => state,
            None => panic!("dangling state id {}", id),
        }
    }
}

impl IndexMut<StateId> for FsmGraph {
    fn index_mut(&mut self, id: StateId) -> &mut State {
        match self.get_mut(id) {
            Some(state) => state,
            None => panic!("dangling state id {}", id),
        }
    }
}

impl Display for FsmGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "States: {}", self.live)?;
        if let Some(start) = self.start {
            writeln!(f, "start = {}", start)?;
        }
        for state in self.finals.iter() {
            writeln!(f, "{} final", state)?;
        }
        for (id, states) in self.entry_points.iter() {
            for state in states {
                writeln!(f, "entry {} = {}", id, state)?;
            }
        }
        for (from, state) in self.states() {
            for trans in state.out_list.iter() {
                for cond in trans.conds.iter() {
                    let to = match cond.to {
                        Some(to) => to.to_string(),
                        None => "-".to_string(),
                    };
                    if trans.low == trans.high {
                        write!(f, "{} -> {} ({})", from, to, trans.low)?;
                    } else {
                        write!(f, "{} -> {} ({}..{})", from, to, trans.low, trans.high)?;
                    }
                    if let Some(space) = trans.cond_space {
                        write!(f, " if {}:{}", space.0, cond.key)?;
                    }
                    writeln!(f)?;
                }
            }
            for nfa in state.nfa_out.iter() {
                writeln!(f, "{} => {} [{}]", from, nfa.to, nfa.order)?;
            }
        }
        Ok(())
    }
}
