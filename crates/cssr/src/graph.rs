//! The state-transition graph shared by transient-state removal and
//! determinization.
//!
//! Nodes are causal states; an edge `s --a--> t` exists when some member
//! history of `s` was observed followed by `a` and the shifted history belongs
//! to `t`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::alphabet::Symbol;
use crate::history::{HistoryId, HistoryTree};
use crate::partition::{Partition, StateId};

/// Where the members of one state go on one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSuccessors {
    /// The emitted symbol.
    pub symbol: Symbol,
    /// Successor state per member history that was observed emitting `symbol`.
    /// Histories whose shifted successor is not in the partition map to `None`.
    pub targets: Vec<(HistoryId, Option<StateId>)>,
}

impl SymbolSuccessors {
    /// Distinct successor states, in order of first appearance.
    pub fn distinct_states(&self) -> Vec<StateId> {
        let mut seen = Vec::new();
        for state in self.targets.iter().filter_map(|(_, s)| *s) {
            if !seen.contains(&state) {
                seen.push(state);
            }
        }
        seen
    }
}

/// Observed successors of every member history, for one state and one symbol.
pub fn successors_on(
    tree: &HistoryTree,
    partition: &Partition,
    state: StateId,
    symbol: Symbol,
) -> SymbolSuccessors {
    let targets = partition
        .state(state)
        .map(|s| {
            s.histories()
                .iter()
                .copied()
                .filter(|&h| {
                    tree.node(h)
                        .and_then(|n| n.counts().get(symbol).copied())
                        .unwrap_or(0)
                        > 0
                })
                .map(|h| (h, partition.successor(tree, h, symbol)))
                .collect()
        })
        .unwrap_or_default();
    SymbolSuccessors { symbol, targets }
}

/// Directed multigraph over the states of a partition, edges labeled by symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateGraph {
    edges: Vec<BTreeMap<Symbol, BTreeSet<StateId>>>,
}

impl StateGraph {
    /// Builds the graph of observed one-step transitions.
    pub fn from_partition(tree: &HistoryTree, partition: &Partition) -> Self {
        let mut edges = vec![BTreeMap::new(); partition.len()];
        for state in partition.states() {
            for symbol in 0..tree.alphabet_size() {
                let successors = successors_on(tree, partition, state.id(), symbol);
                for target in successors.distinct_states() {
                    edges[state.id()]
                        .entry(symbol)
                        .or_insert_with(BTreeSet::new)
                        .insert(target);
                }
            }
        }
        Self { edges }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// `true` when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Labeled outgoing edges of `state`.
    pub fn edges(&self, state: StateId) -> impl Iterator<Item = (Symbol, StateId)> + '_ {
        self.edges
            .get(state)
            .into_iter()
            .flat_map(|m| m.iter())
            .flat_map(|(symbol, targets)| targets.iter().map(move |t| (*symbol, *t)))
    }

    /// Distinct successor states of `state`.
    pub fn neighbors(&self, state: StateId) -> BTreeSet<StateId> {
        self.edges(state).map(|(_, t)| t).collect()
    }

    /// `true` when every state has at most one successor per symbol.
    pub fn is_deterministic(&self) -> bool {
        self.edges
            .iter()
            .all(|m| m.values().all(|targets| targets.len() <= 1))
    }

    /// States reachable from `start` in one or more steps, moving only
    /// through states for which `allowed` holds.
    fn reachable_within(&self, start: StateId, allowed: &[bool]) -> BTreeSet<StateId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<StateId> = VecDeque::new();
        queue.extend(self.neighbors(start).into_iter().filter(|t| allowed[*t]));
        while let Some(state) = queue.pop_front() {
            if seen.insert(state) {
                queue.extend(
                    self.neighbors(state)
                        .into_iter()
                        .filter(|t| allowed[*t] && !seen.contains(t)),
                );
            }
        }
        seen
    }

    /// States reachable from `start` in one or more steps.
    pub fn reachable_from(&self, start: StateId) -> BTreeSet<StateId> {
        self.reachable_within(start, &vec![true; self.len()])
    }

    /// Marks states from which the walk can continue forever. States whose
    /// every path runs into a node without outgoing edges are dead ends;
    /// these come from histories seen only at the end of a sequence.
    fn live_states(&self) -> Vec<bool> {
        let mut live = vec![true; self.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for state in 0..self.len() {
                if live[state] && !self.neighbors(state).iter().any(|t| live[*t]) {
                    live[state] = false;
                    changed = true;
                }
            }
        }
        live
    }

    /// Marks the recurrent states.
    ///
    /// Dead ends are discarded first. Among the remaining states, a state is
    /// recurrent when it lies on a cycle and every state reachable from it can
    /// reach it back, i.e. it belongs to a closed communicating class.
    /// Everything else is transient.
    pub fn recurrent_states(&self) -> Vec<bool> {
        let live = self.live_states();
        let reach: Vec<BTreeSet<StateId>> = (0..self.len())
            .map(|s| {
                if live[s] {
                    self.reachable_within(s, &live)
                } else {
                    BTreeSet::new()
                }
            })
            .collect();
        (0..self.len())
            .map(|s| {
                live[s]
                    && reach[s].contains(&s)
                    && reach[s].iter().all(|t| reach[*t].contains(&s))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(adjacency: &[&[(Symbol, StateId)]]) -> StateGraph {
        let edges = adjacency
            .iter()
            .map(|out| {
                let mut map: BTreeMap<Symbol, BTreeSet<StateId>> = BTreeMap::new();
                for (symbol, target) in out.iter() {
                    map.entry(*symbol).or_default().insert(*target);
                }
                map
            })
            .collect();
        StateGraph { edges }
    }

    #[test]
    fn test_cycle_is_recurrent() {
        let g = graph(&[&[(1, 1)], &[(0, 0)]]);
        assert_eq!(g.recurrent_states(), vec![true, true]);
    }

    #[test]
    fn test_entry_state_is_transient() {
        // 0 -> 1 <-> 2; nothing returns to 0.
        let g = graph(&[&[(0, 1)], &[(0, 2)], &[(1, 1)]]);
        assert_eq!(g.recurrent_states(), vec![false, true, true]);
    }

    #[test]
    fn test_sink_without_loop_is_transient() {
        // 1 is a dead end; 0 keeps its loop.
        let g = graph(&[&[(0, 0), (1, 1)], &[]]);
        assert_eq!(g.recurrent_states(), vec![true, false]);
        let g = graph(&[&[(0, 1)], &[]]);
        assert_eq!(g.recurrent_states(), vec![false, false]);
    }

    #[test]
    fn test_two_closed_classes_are_both_recurrent() {
        let g = graph(&[&[(0, 0)], &[(0, 1)], &[(0, 0), (1, 1)]]);
        assert_eq!(g.recurrent_states(), vec![true, true, false]);
    }

    #[test]
    fn test_determinism_check() {
        assert!(graph(&[&[(0, 0), (1, 1)], &[(0, 0)]]).is_deterministic());
        assert!(!graph(&[&[(0, 0), (0, 1)], &[(0, 0)]]).is_deterministic());
    }

    #[test]
    fn test_graph_from_alternating_partition() {
        let mut tree = HistoryTree::new(2, 2, 100);
        tree.insert(&[0, 1, 0, 1, 0, 1, 0, 1]).unwrap();
        let zero_one = tree.find(&[0, 1]).unwrap();
        let one_zero = tree.find(&[1, 0]).unwrap();
        let partition = Partition::from_groups(
            &tree,
            vec![vec![zero_one], vec![one_zero]],
            &BTreeSet::new(),
        )
        .unwrap();

        let g = StateGraph::from_partition(&tree, &partition);
        assert_eq!(g.edges(0).collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(g.edges(1).collect::<Vec<_>>(), vec![(1, 0)]);
        assert!(g.is_deterministic());
        assert_eq!(g.recurrent_states(), vec![true, true]);
    }
}
