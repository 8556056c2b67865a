use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Error, Formatter, Write};

use tracing::debug;

use crate::action::{ActionTable, PriorTable};
use crate::cond::{CondKey, CondSpaceId};
use crate::graph::{EntryId, FsmGraph, StateId, Trans};
use crate::key::Key;

/// Dense indices of the states being partitioned.
type Partition = BTreeSet<u32>;

#[derive(Debug, Clone, PartialEq, Eq, Ord, PartialOrd)]
struct FullPartition(BTreeSet<Partition>);

impl Display for FullPartition {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_char('{')?;
        for (index, partition) in self.0.iter().enumerate() {
            if index != 0 {
                f.write_char(',')?;
            }
            f.write_char('[')?;
            for (i, node) in partition.iter().enumerate() {
                if i != 0 {
                    f.write_char(' ')?;
                }
                write!(f, "{}", node)?;
            }
            f.write_char(']')?;
        }
        f.write_char('}')
    }
}

/// Maps every node to the id of the partition holding it during one
/// refinement round.
struct PartitionRegistry {
    node_to_partition_id: Vec<u32>,
}

impl PartitionRegistry {
    fn from_part(node_count: usize, part: &FullPartition) -> Self {
        let mut node_to_partition_id = vec![0; node_count];
        for (id, partition) in part.0.iter().enumerate() {
            for node in partition.iter() {
                node_to_partition_id[*node as usize] = id as u32;
            }
        }
        PartitionRegistry { node_to_partition_id }
    }

    fn search_node_partition(&self, node: u32) -> u32 {
        self.node_to_partition_id[node as usize]
    }
}

/// Everything about a state that does not depend on where its edges lead.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct StateData<'a> {
    is_final: bool,
    epsilon_trans: &'a [EntryId],
    to_state_actions: &'a ActionTable,
    from_state_actions: &'a ActionTable,
    eof_actions: &'a ActionTable,
    out_actions: &'a ActionTable,
    out_priors: &'a PriorTable,
    out_cond_space: Option<CondSpaceId>,
    out_cond_keys: &'a BTreeSet<CondKey>,
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CondBehaviour<'a> {
    key: CondKey,
    to: Option<u32>,
    actions: &'a ActionTable,
    priors: &'a PriorTable,
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct NfaBehaviour<'a> {
    to: u32,
    order: i32,
    push_actions: &'a ActionTable,
    restore_actions: &'a ActionTable,
    pop_test: &'a ActionTable,
    pop_actions: &'a ActionTable,
    priors: &'a PriorTable,
}

/// Where a state goes, in terms of partitions instead of states.
///
/// Adjacent ranges with the same outcome are coalesced so that two states
/// splitting their transitions differently still compare equal.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct StateBehaviour<'a> {
    ranges: Vec<(Key, Key, Option<CondSpaceId>, Vec<CondBehaviour<'a>>)>,
    nfa: Vec<NfaBehaviour<'a>>,
}

struct MinimizeData<'a> {
    graph: &'a FsmGraph,
    nodes: Vec<StateId>,
    node_of: HashMap<StateId, u32>,
    partitions: PartitionRegistry,
}

impl<'a> MinimizeData<'a> {
    fn new(graph: &'a FsmGraph) -> Self {
        let nodes = graph.state_ids();
        let node_of = nodes.iter()
            .enumerate()
            .map(|(index, id)| (*id, index as u32))
            .collect();
        MinimizeData {
            graph,
            nodes,
            node_of,
            partitions: PartitionRegistry { node_to_partition_id: Vec::new() },
        }
    }

    fn partition_by_data(&self) -> FullPartition {
        let mut part = BTreeMap::new();

        for (index, id) in self.nodes.iter().enumerate() {
            let state = &self.graph[*id];
            let data = StateData {
                is_final: state.is_final(),
                epsilon_trans: &state.epsilon_trans,
                to_state_actions: &state.to_state_actions,
                from_state_actions: &state.from_state_actions,
                eof_actions: &state.eof_actions,
                out_actions: &state.out_actions,
                out_priors: &state.out_priors,
                out_cond_space: state.out_cond_space,
                out_cond_keys: &state.out_cond_keys,
            };
            part.entry(data).or_insert_with(Partition::new).insert(index as u32);
        }

        FullPartition(part.into_values().collect())
    }

    fn target_partition(&self, to: StateId) -> u32 {
        self.partitions.search_node_partition(self.node_of[&to])
    }

    fn get_behaviour(&self, node: u32) -> StateBehaviour<'a> {
        let graph: &'a FsmGraph = self.graph;
        let state = &graph[self.nodes[node as usize]];
        let mut ranges: Vec<(Key, Key, Option<CondSpaceId>, Vec<CondBehaviour<'a>>)> = Vec::new();

        for trans in state.out_list.iter() {
            let conds: Vec<CondBehaviour<'a>> = trans.conds.iter()
                .map(|c| CondBehaviour {
                    key: c.key,
                    to: c.to.map(|to| self.target_partition(to)),
                    actions: &c.actions,
                    priors: &c.priors,
                })
                .collect();
            match ranges.last_mut() {
                Some(last) if last.1.inc() == trans.low && last.2 == trans.cond_space && last.3 == conds => {
                    last.1 = trans.high;
                }
                _ => ranges.push((trans.low, trans.high, trans.cond_space, conds)),
            }
        }

        let mut nfa: Vec<NfaBehaviour<'a>> = state.nfa_out.iter()
            .map(|n| NfaBehaviour {
                to: self.target_partition(n.to),
                order: n.order,
                push_actions: &n.push_actions,
                restore_actions: &n.restore_actions,
                pop_test: &n.pop_test,
                pop_actions: &n.pop_actions,
                priors: &n.priors,
            })
            .collect();
        nfa.sort();
        nfa.dedup();

        StateBehaviour { ranges, nfa }
    }

    /// Splits a partition into groups of nodes that agree, for every key, on
    /// the partition they move to (or on rejecting the key).
    fn split_partition(&self, partition: &Partition) -> FullPartition {
        if partition.len() == 1 {
            return FullPartition([partition.clone()].into_iter().collect());
        }
        let mut nodes_by_behaviour = BTreeMap::new();

        for node in partition.iter() {
            nodes_by_behaviour.entry(self.get_behaviour(*node))
                .or_insert_with(Partition::new)
                .insert(*node);
        }

        FullPartition(nodes_by_behaviour.into_values().collect())
    }
}

impl FsmGraph {
    /// Fuses every group of equivalent states into one, returning the number
    /// of states removed.
    ///
    /// States start out partitioned by their own data (finality, state
    /// actions, pending out data). Each round splits the partitions by where
    /// their members' edges lead, until a round splits nothing. Each final
    /// partition becomes a single state; the start state represents its own
    /// partition.
    pub fn minimize_partition(&mut self) -> usize {
        if self.state_count() < 2 {
            return 0;
        }

        let groups: Vec<Vec<StateId>> = {
            let mut data = MinimizeData::new(self);
            let node_count = data.nodes.len();
            let mut todo_partition = data.partition_by_data();
            let mut partition = FullPartition(BTreeSet::new());
            let mut rounds = 0;

            while todo_partition.0.len() != partition.0.len() {
                partition = todo_partition;
                data.partitions = PartitionRegistry::from_part(node_count, &partition);
                todo_partition = FullPartition(BTreeSet::new());

                for part in partition.0.iter() {
                    let mut splitted = data.split_partition(part);
                    todo_partition.0.append(&mut splitted.0);
                }
                rounds += 1;
            }
            if partition.0.len() < 16 {
                debug!(%partition, "minimized partition");
            }
            debug!(rounds, partitions = partition.0.len(), "partition refinement");

            partition.0.iter()
                .map(|p| p.iter().map(|node| data.nodes[*node as usize]).collect())
                .collect()
        };

        let mut rep = HashMap::new();
        for group in groups.iter() {
            let head = match self.start {
                Some(start) if group.contains(&start) => start,
                _ => group[0],
            };
            for member in group.iter().filter(|m| **m != head) {
                rep.insert(*member, head);
            }
        }
        if rep.is_empty() {
            return 0;
        }

        for id in self.state_ids() {
            if rep.contains_key(&id) {
                continue;
            }
            let state = &mut self[id];
            for trans in state.out_list.iter_mut() {
                for cond in trans.conds.iter_mut() {
                    if let Some(to) = cond.to.and_then(|to| rep.get(&to)) {
                        cond.to = Some(*to);
                    }
                }
            }
            for nfa in state.nfa_out.iter_mut() {
                if let Some(to) = rep.get(&nfa.to) {
                    nfa.to = *to;
                }
            }
            let mut unique = Vec::with_capacity(state.nfa_out.len());
            for nfa in state.nfa_out.drain(..) {
                if !unique.contains(&nfa) {
                    unique.push(nfa);
                }
            }
            state.nfa_out = unique;
        }

        for (member, head) in rep.iter() {
            for entry in self[*member].entry_ids.clone() {
                if let Some(set) = self.entry_points.get_mut(&entry) {
                    set.remove(member);
                    set.insert(*head);
                }
                self[*head].entry_ids.insert(entry);
            }
            self.finals.remove(member);
            self.free_state(*member);
        }

        self.recount_references();
        self.compress_transitions();
        debug!(removed = rep.len(), states = self.state_count(), "minimize");
        rep.len()
    }

    /// Joins adjacent transitions of a state that behave identically.
    pub fn compress_transitions(&mut self) {
        let mut changed = false;
        for id in self.state_ids() {
            let state = &mut self[id];
            let mut compressed: Vec<Trans> = Vec::with_capacity(state.out_list.len());
            for trans in state.out_list.drain(..) {
                match compressed.last_mut() {
                    Some(last) if last.high.inc() == trans.low
                        && last.cond_space == trans.cond_space
                        && last.conds == trans.conds => {
                        last.high = trans.high;
                        changed = true;
                    }
                    _ => compressed.push(trans),
                }
            }
            state.out_list = compressed;
        }
        if changed {
            self.recount_references();
        }
    }
}
