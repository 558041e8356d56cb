//! Causal-state inference: the splitting pipeline over a finished history tree.
//!
//! The stages run strictly in order:
//!
//! ```text
//! initial_frequencies
//!   -> calc_new_dist(1) .. calc_new_dist(max_length)
//!   -> destroy_short_hists
//!   -> check_conn_components
//!   -> determinize
//!   -> check_conn_components
//!   -> store_transitions
//!   -> state_dists_multi
//! ```
//!
//! Each stage replaces the current [`Partition`] with a new snapshot.

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::alphabet::Symbol;
use crate::config::InferenceConfig;
use crate::error::{Error, Result};
use crate::graph::{successors_on, StateGraph};
use crate::history::{HistoryId, HistoryTree, ROOT};
use crate::partition::{Partition, StateId};
use crate::stats::EquivalenceTest;

/// Counters collected while inferring states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceStats {
    /// Distinct histories stored in the tree, the root included.
    pub histories: usize,
    /// Equivalence tests evaluated.
    pub tests_run: u64,
    /// States created because a history matched no existing state.
    pub splits: u64,
    /// Histories placed provisionally for lack of evidence.
    pub deferred: u64,
    /// States removed as transient, summed over both connectivity checks.
    pub transient_removed: u64,
    /// States created by determinization.
    pub determinization_splits: u64,
}

/// Single-valued transition function over the final states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTable {
    table: Vec<Vec<Option<StateId>>>,
}

impl TransitionTable {
    /// The successor of `state` on `symbol`, if that pair was observed.
    pub fn get(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        self.table.get(state)?.get(symbol).copied().flatten()
    }

    /// Number of states covered.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// `true` when no state is covered.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Successor row of `state`, indexed by symbol.
    pub fn row(&self, state: StateId) -> &[Option<StateId>] {
        self.table.get(state).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Per-sequence state assignments and the empirical occupation frequencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateOccupation {
    /// For each input sequence, the state at every position; `None` until
    /// enough history is available or where the history is not in the model.
    pub series: Vec<Vec<Option<StateId>>>,
    /// Occupation frequency per state, summing to 1.
    pub stationary: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Created,
    Initialized,
    Grown(usize),
    ShortDestroyed,
    Connected,
    Determinized,
    Reconnected,
    TransitionsStored,
    Finished,
}

/// Owns the evolving partition of histories into causal states.
pub struct StateSet<'a> {
    tree: &'a HistoryTree,
    test: Box<dyn EquivalenceTest>,
    significance: f64,
    min_sample: u64,
    partition: Partition,
    transitions: Option<TransitionTable>,
    stage: Stage,
    stats: InferenceStats,
}

impl<'a> StateSet<'a> {
    /// Prepares a pipeline over `tree`. The equivalence test is chosen here,
    /// once, from the configuration.
    pub fn new(tree: &'a HistoryTree, config: &InferenceConfig) -> Result<Self> {
        config.validate()?;
        if config.max_length != tree.max_length() {
            return Err(Error::Internal(format!(
                "tree built for max_length {} but configuration asks for {}",
                tree.max_length(),
                config.max_length
            )));
        }
        let test = config.test_kind.build();
        debug!(
            "Using the {} test at significance {}",
            test.name(),
            config.significance_level
        );
        Ok(Self {
            tree,
            test,
            significance: config.significance_level,
            min_sample: config.min_sample,
            partition: Partition::new(tree.alphabet_size()),
            transitions: None,
            stage: Stage::Created,
            stats: InferenceStats {
                histories: tree.len(),
                ..Default::default()
            },
        })
    }

    /// Runs every stage in order.
    pub fn run(mut self, sequences: &[Vec<Symbol>]) -> Result<(Self, StateOccupation)> {
        self.initial_frequencies()?;
        for k in 1..=self.tree.max_length() {
            self.calc_new_dist(k)?;
        }
        self.destroy_short_hists()?;
        self.check_conn_components()?;
        self.determinize()?;
        self.check_conn_components()?;
        self.store_transitions()?;
        let occupation = self.state_dists_multi(sequences)?;
        Ok((self, occupation))
    }

    fn expect_stage(&self, expected: Stage, operation: &str) -> Result<()> {
        if self.stage != expected {
            return Err(Error::Internal(format!(
                "{} called at stage {:?}, expected {:?}",
                operation, self.stage, expected
            )));
        }
        Ok(())
    }

    /// Seeds the partition with a single state holding the empty history,
    /// whose distribution is the raw symbol frequency.
    pub fn initial_frequencies(&mut self) -> Result<()> {
        self.expect_stage(Stage::Created, "initial_frequencies")?;
        if self.tree.root().total() == 0 {
            return Err(Error::EmptyData("no symbols were inserted".to_string()));
        }

        let mut partition = Partition::new(self.tree.alphabet_size());
        let state = partition.create_state();
        partition.assign(self.tree, ROOT, state)?;
        self.partition = partition;
        self.stage = Stage::Initialized;

        info!(
            "Initial frequencies over {} symbols: {:?}",
            self.tree.symbol_count(),
            self.tree.root().counts()
        );
        Ok(())
    }

    /// Places every history of length `k` by comparing its next-symbol
    /// distribution with the state holding its suffix.
    pub fn calc_new_dist(&mut self, k: usize) -> Result<()> {
        let expected = if k == 1 {
            Stage::Initialized
        } else {
            Stage::Grown(k - 1)
        };
        self.expect_stage(expected, "calc_new_dist")?;
        if k > self.tree.max_length() {
            return Err(Error::Internal(format!(
                "calc_new_dist({}) beyond max_length {}",
                k,
                self.tree.max_length()
            )));
        }

        let mut partition = self.partition.clone();
        for history in self.tree.histories(k) {
            self.place_history(&mut partition, history)?;
        }
        self.partition = partition;
        self.stage = Stage::Grown(k);

        info!(
            "Length {}: {} states over {} histories",
            k,
            self.partition.len(),
            self.partition.history_count()
        );
        Ok(())
    }

    fn place_history(&mut self, partition: &mut Partition, history: HistoryId) -> Result<()> {
        let tree = self.tree;
        let node = tree
            .node(history)
            .ok_or_else(|| Error::Internal(format!("history {} is not in the tree", history)))?;
        let parent_state = node
            .parent()
            .and_then(|parent| partition.state_of(parent))
            .ok_or_else(|| {
                Error::Internal(format!(
                    "history {:?} has no state holding its suffix",
                    node.symbols()
                ))
            })?;

        if node.total() < self.min_sample {
            trace!(
                "Deferring {:?}: {} observations",
                node.symbols(),
                node.total()
            );
            self.stats.deferred += 1;
            return partition.assign_provisional(self.tree, history, parent_state);
        }

        let parent_counts = partition
            .state(parent_state)
            .map(|s| s.counts().to_vec())
            .unwrap_or_default();
        self.stats.tests_run += 1;
        let p = self.test.p_value(node.counts(), &parent_counts);
        trace!(
            "{:?} vs state {}: p = {:.6}",
            node.symbols(),
            parent_state,
            p
        );
        if p >= self.significance {
            return partition.assign(self.tree, history, parent_state);
        }

        // Differs from its suffix: look for the best matching existing state.
        let mut best: Option<(StateId, f64)> = None;
        for state in partition.states() {
            if state.id() == parent_state {
                continue;
            }
            self.stats.tests_run += 1;
            let p = self.test.p_value(node.counts(), state.counts());
            if p >= self.significance && best.map_or(true, |(_, bp)| p > bp) {
                best = Some((state.id(), p));
            }
        }

        match best {
            Some((state, p)) => {
                debug!(
                    "{:?} moves from state {} to state {} (p = {:.6})",
                    node.symbols(),
                    parent_state,
                    state,
                    p
                );
                partition.assign(self.tree, history, state)
            }
            None => {
                let state = partition.create_state();
                self.stats.splits += 1;
                debug!(
                    "{:?} splits from state {} into new state {}",
                    node.symbols(),
                    parent_state,
                    state
                );
                partition.assign(self.tree, history, state)
            }
        }
    }

    /// Drops every history shorter than the maximum length. States left
    /// without members disappear.
    pub fn destroy_short_hists(&mut self) -> Result<()> {
        let max_length = self.tree.max_length();
        self.expect_stage(Stage::Grown(max_length), "destroy_short_hists")?;

        let tree = self.tree;
        self.partition = self.partition.retain_histories(tree, |h| {
            tree.node(h).map_or(false, |n| n.len() == max_length)
        })?;
        self.stage = Stage::ShortDestroyed;

        if self.partition.is_empty() {
            return Err(Error::EmptyData(format!(
                "no history of length {} was observed",
                max_length
            )));
        }
        info!(
            "Kept {} histories of length {} in {} states",
            self.partition.history_count(),
            max_length,
            self.partition.len()
        );
        Ok(())
    }

    /// Removes transient states: everything outside the closed communicating
    /// classes of the state-transition graph.
    pub fn check_conn_components(&mut self) -> Result<()> {
        let next = match self.stage {
            Stage::ShortDestroyed => Stage::Connected,
            Stage::Determinized => Stage::Reconnected,
            _ => {
                return Err(Error::Internal(format!(
                    "check_conn_components called at stage {:?}",
                    self.stage
                )))
            }
        };

        let graph = StateGraph::from_partition(self.tree, &self.partition);
        let recurrent = graph.recurrent_states();
        let removed = recurrent.iter().filter(|r| !**r).count();
        if removed > 0 {
            for (state, keep) in recurrent.iter().enumerate() {
                if !keep {
                    debug!("Removing transient state {}", state);
                }
            }
            self.partition = self.partition.retain_states(self.tree, &recurrent)?;
            self.stats.transient_removed += removed as u64;
        }
        self.stage = next;

        if self.partition.is_empty() {
            return Err(Error::NoRecurrentStates(
                "every inferred state was transient".to_string(),
            ));
        }
        info!(
            "Connectivity check removed {} transient states, {} remain",
            removed,
            self.partition.len()
        );
        Ok(())
    }

    /// Splits states until every state has a single successor per observed
    /// symbol. Repeats to a fixed point, so longer futures are covered too.
    pub fn determinize(&mut self) -> Result<()> {
        self.expect_stage(Stage::Connected, "determinize")?;

        loop {
            // Original states keep their positions; new pieces go to the end.
            let mut kept: Vec<Vec<HistoryId>> = Vec::with_capacity(self.partition.len());
            let mut created: Vec<Vec<HistoryId>> = Vec::new();

            for state in self.partition.states() {
                let mut pieces = vec![state.histories().to_vec()];
                for symbol in 0..self.tree.alphabet_size() {
                    let mut refined = Vec::new();
                    for piece in pieces {
                        refined.extend(self.split_on(&piece, symbol));
                    }
                    pieces = refined;
                }
                if pieces.len() > 1 {
                    debug!(
                        "Determinization splits state {} into {} states",
                        state.id(),
                        pieces.len()
                    );
                    self.stats.determinization_splits += (pieces.len() - 1) as u64;
                }
                let mut pieces = pieces.into_iter();
                kept.extend(pieces.next());
                created.extend(pieces);
            }

            if created.is_empty() {
                break;
            }
            kept.extend(created);
            self.partition = Partition::from_groups(self.tree, kept, self.partition.provisional())?;
        }

        self.stage = Stage::Determinized;
        info!("Determinized into {} states", self.partition.len());
        Ok(())
    }

    /// Groups `members` by where they move on `symbol`. The group holding the
    /// first member comes first and also receives members that never emitted
    /// `symbol`.
    fn split_on(&self, members: &[HistoryId], symbol: Symbol) -> Vec<Vec<HistoryId>> {
        let mut keys: Vec<Option<StateId>> = Vec::new();
        let mut groups: Vec<Vec<HistoryId>> = Vec::new();
        let mut unobserved = Vec::new();

        for &history in members {
            let emitted = self
                .tree
                .node(history)
                .and_then(|n| n.counts().get(symbol).copied())
                .unwrap_or(0)
                > 0;
            if !emitted {
                unobserved.push(history);
                continue;
            }
            let key = self.partition.successor(self.tree, history, symbol);
            match keys.iter().position(|k| *k == key) {
                Some(i) => groups[i].push(history),
                None => {
                    keys.push(key);
                    groups.push(vec![history]);
                }
            }
        }

        if groups.is_empty() {
            return vec![unobserved];
        }
        groups[0].extend(unobserved);
        // Restore membership order within the leading group.
        let order: std::collections::HashMap<HistoryId, usize> =
            members.iter().enumerate().map(|(i, h)| (*h, i)).collect();
        groups[0].sort_by_key(|h| order.get(h).copied().unwrap_or(usize::MAX));
        groups
    }

    /// Records the successor of every state on every observed symbol.
    pub fn store_transitions(&mut self) -> Result<()> {
        self.expect_stage(Stage::Reconnected, "store_transitions")?;

        let mut table = vec![vec![None; self.tree.alphabet_size()]; self.partition.len()];
        for state in self.partition.states() {
            for symbol in 0..self.tree.alphabet_size() {
                let successors = successors_on(self.tree, &self.partition, state.id(), symbol);
                let distinct = successors.distinct_states();
                if distinct.len() > 1 {
                    return Err(Error::Internal(format!(
                        "state {} still has {} successors on symbol {} after determinization",
                        state.id(),
                        distinct.len(),
                        symbol
                    )));
                }
                table[state.id()][symbol] = distinct.first().copied();
            }
        }

        self.transitions = Some(TransitionTable { table });
        self.stage = Stage::TransitionsStored;
        Ok(())
    }

    /// Re-scans every input sequence, assigning each position the state of the
    /// longest history ending there, and derives the stationary distribution
    /// from the occupation counts.
    pub fn state_dists_multi(&mut self, sequences: &[Vec<Symbol>]) -> Result<StateOccupation> {
        self.expect_stage(Stage::TransitionsStored, "state_dists_multi")?;

        let length = self.tree.max_length();
        let mut occupancy = vec![0u64; self.partition.len()];
        let mut series = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            let mut states = Vec::with_capacity(sequence.len());
            for end in 0..sequence.len() {
                let state = if end + 1 >= length {
                    self.tree
                        .find(&sequence[end + 1 - length..=end])
                        .and_then(|h| self.partition.state_of(h))
                } else {
                    None
                };
                if let Some(s) = state {
                    occupancy[s] += 1;
                }
                states.push(state);
            }
            series.push(states);
        }

        let assigned: u64 = occupancy.iter().sum();
        if assigned == 0 {
            return Err(Error::NoRecurrentStates(
                "no position of the input was assigned a recurrent state".to_string(),
            ));
        }
        let stationary = occupancy
            .iter()
            .map(|&c| c as f64 / assigned as f64)
            .collect();

        self.stage = Stage::Finished;
        Ok(StateOccupation { series, stationary })
    }

    /// The current partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The transition function, once stored.
    pub fn transitions(&self) -> Option<&TransitionTable> {
        self.transitions.as_ref()
    }

    /// The tree the states were inferred from.
    pub fn tree(&self) -> &'a HistoryTree {
        self.tree
    }

    /// Counters collected so far.
    pub fn stats(&self) -> &InferenceStats {
        &self.stats
    }

    /// `true` once every stage has run.
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Finished
    }
}
