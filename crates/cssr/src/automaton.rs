//! The frozen causal-state automaton and its queries.

use serde::{Deserialize, Serialize};

use crate::alphabet::{Alphabet, Symbol};
use crate::config::InferenceConfig;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::partition::StateId;
use crate::states::{InferenceStats, StateOccupation, StateSet, TransitionTable};

/// A causal state as published by the automaton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Dense state index.
    pub id: StateId,
    /// Member histories rendered with the alphabet, oldest symbol first.
    pub histories: Vec<String>,
    /// Members that were placed without a conclusive test.
    pub provisional: Vec<String>,
    /// Aggregated next-symbol counts.
    pub counts: Vec<u64>,
    /// Sum of `counts`.
    pub total: u64,
}

impl StateRecord {
    /// Normalized next-symbol distribution.
    pub fn distribution(&self) -> Vec<f64> {
        if self.total == 0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts
            .iter()
            .map(|&c| c as f64 / self.total as f64)
            .collect()
    }

    /// Probability of emitting `symbol` from this state.
    pub fn probability(&self, symbol: Symbol) -> f64 {
        match self.counts.get(symbol) {
            Some(&c) if self.total > 0 => c as f64 / self.total as f64,
            _ => 0.0,
        }
    }
}

/// The inferred model: states, a deterministic transition function, the
/// stationary distribution and the derived metrics. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automaton {
    alphabet: Alphabet,
    config: InferenceConfig,
    states: Vec<StateRecord>,
    transitions: TransitionTable,
    stationary: Vec<f64>,
    series: Vec<Vec<Option<StateId>>>,
    symbol_count: u64,
    metrics: Metrics,
    stats: InferenceStats,
}

impl Automaton {
    /// Freezes a finished [`StateSet`] and computes the metrics.
    pub fn build(
        alphabet: Alphabet,
        config: InferenceConfig,
        states: &StateSet<'_>,
        occupation: StateOccupation,
    ) -> Result<Self> {
        if !states.is_finished() {
            return Err(Error::Internal(
                "automaton built from an unfinished state set".to_string(),
            ));
        }
        let transitions = states
            .transitions()
            .cloned()
            .ok_or_else(|| Error::Internal("transitions were never stored".to_string()))?;
        let tree = states.tree();
        let partition = states.partition();

        let records = partition
            .states()
            .iter()
            .map(|state| {
                let mut histories = Vec::with_capacity(state.histories().len());
                let mut provisional = Vec::new();
                for &h in state.histories() {
                    let text = tree
                        .node(h)
                        .map(|n| alphabet.decode(n.symbols()))
                        .unwrap_or_default();
                    if partition.is_provisional(h) {
                        provisional.push(text.clone());
                    }
                    histories.push(text);
                }
                StateRecord {
                    id: state.id(),
                    histories,
                    provisional,
                    counts: state.counts().to_vec(),
                    total: state.total(),
                }
            })
            .collect();

        let mut automaton = Self {
            alphabet,
            config,
            states: records,
            transitions,
            stationary: occupation.stationary,
            series: occupation.series,
            symbol_count: tree.symbol_count(),
            metrics: Metrics::default(),
            stats: states.stats().clone(),
        };
        automaton.metrics = Metrics::compute(&automaton, tree);
        Ok(automaton)
    }

    /// The alphabet the model is defined over.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Parameters of the run that produced this model.
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Number of causal states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// All causal states.
    pub fn states(&self) -> &[StateRecord] {
        &self.states
    }

    /// The state with index `id`.
    pub fn state(&self, id: StateId) -> Option<&StateRecord> {
        self.states.get(id)
    }

    /// Stationary probability per state.
    pub fn stationary(&self) -> &[f64] {
        &self.stationary
    }

    /// Stationary probability of `state`.
    pub fn stationary_probability(&self, state: StateId) -> Option<f64> {
        self.stationary.get(state).copied()
    }

    /// The transition function.
    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Successor of `state` on symbol index `symbol`.
    pub fn transition(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        self.transitions.get(state, symbol)
    }

    /// Successor of `state` on the symbol written as `symbol`.
    pub fn transition_on(&self, state: StateId, symbol: char) -> Option<StateId> {
        self.alphabet
            .index_of(symbol)
            .and_then(|s| self.transition(state, s))
    }

    /// Probability of emitting `symbol` from `state`.
    pub fn emission_probability(&self, state: StateId, symbol: Symbol) -> f64 {
        self.state(state).map_or(0.0, |s| s.probability(symbol))
    }

    /// Probability the model assigns to `word`, starting from the stationary
    /// distribution. A word that runs into an undefined transition
    /// contributes nothing from that start state.
    pub fn string_probability(&self, word: &[Symbol]) -> f64 {
        let mut total = 0.0;
        for (start, &weight) in self.stationary.iter().enumerate() {
            if weight <= 0.0 {
                continue;
            }
            let mut p = weight;
            let mut state = Some(start);
            for (i, &symbol) in word.iter().enumerate() {
                let Some(current) = state else {
                    p = 0.0;
                    break;
                };
                p *= self.emission_probability(current, symbol);
                if p <= 0.0 {
                    break;
                }
                if i + 1 < word.len() {
                    state = self.transition(current, symbol);
                }
            }
            total += p;
        }
        total
    }

    /// Per-sequence state assignments, one entry per input position.
    pub fn state_series(&self) -> &[Vec<Option<StateId>>] {
        &self.series
    }

    /// Number of input symbols the model was inferred from.
    pub fn symbol_count(&self) -> u64 {
        self.symbol_count
    }

    /// Number of input sequences the model was inferred from.
    pub fn sequence_count(&self) -> usize {
        self.series.len()
    }

    /// The computed metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Statistical complexity (Cmu), in bits.
    pub fn statistical_complexity(&self) -> f64 {
        self.metrics.statistical_complexity
    }

    /// Entropy rate, in bits per symbol.
    pub fn entropy_rate(&self) -> f64 {
        self.metrics.entropy_rate
    }

    /// Counters collected during inference.
    pub fn stats(&self) -> &InferenceStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryTree;

    fn alternating_automaton() -> Automaton {
        let sequences: Vec<Vec<Symbol>> = vec![(0..400).map(|i| i % 2).collect()];
        let mut tree = HistoryTree::new(2, 2, 1_000);
        tree.insert(&sequences[0]).unwrap();
        let config = InferenceConfig::new(2);
        let set = StateSet::new(&tree, &config).unwrap();
        let (set, occupation) = set.run(&sequences).unwrap();
        Automaton::build(Alphabet::parse("01").unwrap(), config, &set, occupation).unwrap()
    }

    #[test]
    fn test_alternating_queries() {
        let automaton = alternating_automaton();
        assert_eq!(automaton.num_states(), 2);

        let after_one = automaton
            .states()
            .iter()
            .find(|s| s.histories.contains(&"01".to_string()))
            .unwrap()
            .id;
        let after_zero = 1 - after_one;
        assert_eq!(automaton.transition_on(after_one, '0'), Some(after_zero));
        assert_eq!(automaton.transition_on(after_one, '1'), None);
        assert_eq!(automaton.transition_on(after_zero, '1'), Some(after_one));
        assert_eq!(automaton.emission_probability(after_zero, 1), 1.0);
    }

    #[test]
    fn test_string_probability() {
        let automaton = alternating_automaton();
        let p01 = automaton.string_probability(&[0, 1]);
        let p10 = automaton.string_probability(&[1, 0]);
        assert!((p01 + p10 - 1.0).abs() < 1e-12);
        assert_eq!(automaton.string_probability(&[0, 0]), 0.0);
        assert_eq!(automaton.string_probability(&[1, 1, 0]), 0.0);
        assert!((automaton.string_probability(&[]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_alternating_metrics() {
        let automaton = alternating_automaton();
        let metrics = automaton.metrics();
        assert!((metrics.statistical_complexity - 1.0).abs() < 1e-3);
        assert!(metrics.entropy_rate.abs() < 1e-12);
        assert!(metrics.relative_entropy.abs() < 1e-9);
        assert!(metrics.relative_entropy_rate.abs() < 1e-9);
        assert!(metrics.variation.abs() < 1e-9);
    }

    #[test]
    fn test_stationary_lookup() {
        let automaton = alternating_automaton();
        let sum: f64 = (0..automaton.num_states())
            .filter_map(|s| automaton.stationary_probability(s))
            .sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(automaton.stationary_probability(5), None);
    }
}
