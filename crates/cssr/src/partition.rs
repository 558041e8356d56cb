//! Causal states and partition snapshots.
//!
//! A [`Partition`] maps history identifiers to state identifiers. Each
//! refinement stage of the pipeline derives a new snapshot from the previous
//! one, either by assigning histories incrementally or by regrouping members
//! wholesale with [`Partition::from_groups`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::alphabet::Symbol;
use crate::error::{Error, Result};
use crate::history::{HistoryId, HistoryTree};

/// Dense index of a causal state within a partition.
pub type StateId = usize;

/// A set of histories sharing one next-symbol distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalState {
    id: StateId,
    histories: Vec<HistoryId>,
    counts: Vec<u64>,
    total: u64,
}

impl CausalState {
    fn new(id: StateId, alphabet_size: usize) -> Self {
        Self {
            id,
            histories: Vec::new(),
            counts: vec![0; alphabet_size],
            total: 0,
        }
    }

    /// The state's identifier.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Member histories, in order of joining.
    pub fn histories(&self) -> &[HistoryId] {
        &self.histories
    }

    /// Aggregated next-symbol counts over all members.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Sum of [`counts`](Self::counts).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Normalized next-symbol distribution. All zeros when no member has a
    /// recorded successor.
    pub fn distribution(&self) -> Vec<f64> {
        if self.total == 0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts
            .iter()
            .map(|&c| c as f64 / self.total as f64)
            .collect()
    }

    /// Probability of `symbol` following this state.
    pub fn probability(&self, symbol: Symbol) -> f64 {
        match self.counts.get(symbol) {
            Some(&c) if self.total > 0 => c as f64 / self.total as f64,
            _ => 0.0,
        }
    }

    fn absorb(&mut self, history: HistoryId, counts: &[u64]) {
        self.histories.push(history);
        for (acc, c) in self.counts.iter_mut().zip(counts) {
            *acc += c;
        }
        self.total += counts.iter().sum::<u64>();
    }
}

/// An assignment of histories to causal states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    alphabet_size: usize,
    states: Vec<CausalState>,
    owner: BTreeMap<HistoryId, StateId>,
    provisional: BTreeSet<HistoryId>,
}

impl Partition {
    /// Creates an empty partition.
    pub fn new(alphabet_size: usize) -> Self {
        Self {
            alphabet_size,
            states: Vec::new(),
            owner: BTreeMap::new(),
            provisional: BTreeSet::new(),
        }
    }

    /// Builds a snapshot whose state `i` holds `groups[i]`. Empty groups are
    /// skipped and the remaining states numbered densely in order.
    /// Provisional marks carry over for histories that are still present.
    pub fn from_groups(
        tree: &HistoryTree,
        groups: Vec<Vec<HistoryId>>,
        provisional: &BTreeSet<HistoryId>,
    ) -> Result<Self> {
        let mut partition = Self::new(tree.alphabet_size());
        for group in groups.into_iter().filter(|g| !g.is_empty()) {
            let state = partition.create_state();
            for history in group {
                partition.assign(tree, history, state)?;
                if provisional.contains(&history) {
                    partition.provisional.insert(history);
                }
            }
        }
        Ok(partition)
    }

    /// Appends a new, empty state and returns its identifier.
    pub fn create_state(&mut self) -> StateId {
        let id = self.states.len();
        self.states.push(CausalState::new(id, self.alphabet_size));
        id
    }

    /// Adds `history` to `state`, folding its counts into the state's aggregate.
    pub fn assign(&mut self, tree: &HistoryTree, history: HistoryId, state: StateId) -> Result<()> {
        let node = tree
            .node(history)
            .ok_or_else(|| Error::Internal(format!("history {} is not in the tree", history)))?;
        if let Some(previous) = self.owner.get(&history) {
            return Err(Error::Internal(format!(
                "history {} already belongs to state {}",
                history, previous
            )));
        }
        let target = self
            .states
            .get_mut(state)
            .ok_or_else(|| Error::Internal(format!("state {} does not exist", state)))?;
        target.absorb(history, node.counts());
        self.owner.insert(history, state);
        Ok(())
    }

    /// Like [`assign`](Self::assign), and marks the membership as provisional.
    pub fn assign_provisional(
        &mut self,
        tree: &HistoryTree,
        history: HistoryId,
        state: StateId,
    ) -> Result<()> {
        self.assign(tree, history, state)?;
        self.provisional.insert(history);
        Ok(())
    }

    /// The state holding `history`.
    pub fn state_of(&self, history: HistoryId) -> Option<StateId> {
        self.owner.get(&history).copied()
    }

    /// The state with identifier `id`.
    pub fn state(&self, id: StateId) -> Option<&CausalState> {
        self.states.get(id)
    }

    /// All states, indexed by identifier.
    pub fn states(&self) -> &[CausalState] {
        &self.states
    }

    /// Member lists of every state, indexed by identifier.
    pub fn groups(&self) -> Vec<Vec<HistoryId>> {
        self.states.iter().map(|s| s.histories.clone()).collect()
    }

    /// `true` if `history` was placed without a conclusive test.
    pub fn is_provisional(&self, history: HistoryId) -> bool {
        self.provisional.contains(&history)
    }

    /// Histories placed without a conclusive test.
    pub fn provisional(&self) -> &BTreeSet<HistoryId> {
        &self.provisional
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// `true` when no state exists.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of assigned histories.
    pub fn history_count(&self) -> usize {
        self.owner.len()
    }

    /// The state that `history` moves to after emitting `symbol`, if that
    /// history is stored and assigned.
    pub fn successor(&self, tree: &HistoryTree, history: HistoryId, symbol: Symbol) -> Option<StateId> {
        tree.shift(history, symbol)
            .and_then(|next| self.state_of(next))
    }

    /// A new snapshot keeping only histories for which `keep` holds.
    pub fn retain_histories<F>(&self, tree: &HistoryTree, mut keep: F) -> Result<Self>
    where
        F: FnMut(HistoryId) -> bool,
    {
        let groups = self
            .states
            .iter()
            .map(|s| s.histories.iter().copied().filter(|&h| keep(h)).collect())
            .collect();
        Self::from_groups(tree, groups, &self.provisional)
    }

    /// A new snapshot keeping only the states flagged in `keep`.
    pub fn retain_states(&self, tree: &HistoryTree, keep: &[bool]) -> Result<Self> {
        let groups = self
            .states
            .iter()
            .filter(|s| keep.get(s.id).copied().unwrap_or(false))
            .map(|s| s.histories.clone())
            .collect();
        Self::from_groups(tree, groups, &self.provisional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> HistoryTree {
        let mut tree = HistoryTree::new(2, 2, 100);
        tree.insert(&[0, 1, 0, 1, 1, 0, 1]).unwrap();
        tree
    }

    #[test]
    fn test_assign_aggregates_counts() {
        let tree = sample_tree();
        let mut partition = Partition::new(2);
        let state = partition.create_state();

        let zero = tree.find(&[0]).unwrap();
        let one = tree.find(&[1]).unwrap();
        partition.assign(&tree, zero, state).unwrap();
        partition.assign(&tree, one, state).unwrap();

        let s = partition.state(state).unwrap();
        let expected: Vec<u64> = tree
            .node(zero)
            .unwrap()
            .counts()
            .iter()
            .zip(tree.node(one).unwrap().counts())
            .map(|(a, b)| a + b)
            .collect();
        assert_eq!(s.counts(), expected.as_slice());
        assert_eq!(s.total(), expected.iter().sum::<u64>());
        assert_eq!(partition.state_of(zero), Some(state));
    }

    #[test]
    fn test_double_assignment_is_rejected() {
        let tree = sample_tree();
        let mut partition = Partition::new(2);
        let a = partition.create_state();
        let b = partition.create_state();
        let zero = tree.find(&[0]).unwrap();
        partition.assign(&tree, zero, a).unwrap();
        assert!(matches!(
            partition.assign(&tree, zero, b),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let tree = sample_tree();
        let mut partition = Partition::new(2);
        let state = partition.create_state();
        for id in tree.histories(2) {
            partition.assign(&tree, id, state).unwrap();
        }
        let sum: f64 = partition.state(state).unwrap().distribution().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_groups_drops_empty_and_renumbers() {
        let tree = sample_tree();
        let zero = tree.find(&[0]).unwrap();
        let one = tree.find(&[1]).unwrap();
        let mut provisional = BTreeSet::new();
        provisional.insert(one);

        let partition =
            Partition::from_groups(&tree, vec![vec![], vec![one], vec![zero]], &provisional)
                .unwrap();
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.state_of(one), Some(0));
        assert_eq!(partition.state_of(zero), Some(1));
        assert!(partition.is_provisional(one));
        assert!(!partition.is_provisional(zero));
    }

    #[test]
    fn test_retain_states() {
        let tree = sample_tree();
        let zero = tree.find(&[0]).unwrap();
        let one = tree.find(&[1]).unwrap();
        let partition =
            Partition::from_groups(&tree, vec![vec![zero], vec![one]], &BTreeSet::new()).unwrap();

        let kept = partition.retain_states(&tree, &[false, true]).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.state_of(one), Some(0));
        assert_eq!(kept.state_of(zero), None);
    }

    #[test]
    fn test_successor_follows_shifted_history() {
        let tree = sample_tree();
        let groups = vec![tree.histories(2)];
        let partition = Partition::from_groups(&tree, groups, &BTreeSet::new()).unwrap();
        let zero_one = tree.find(&[0, 1]).unwrap();
        assert_eq!(partition.successor(&tree, zero_one, 0), Some(0));
    }
}
