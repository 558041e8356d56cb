//! Information-theoretic measures of an inferred automaton.
//!
//! All logarithms are base 2, so every quantity is in bits.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::alphabet::Symbol;
use crate::automaton::Automaton;
use crate::history::HistoryTree;

/// The five scalar summaries of a reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Kullback-Leibler divergence of the model's word distribution from the
    /// empirical one, over words of the maximum history length.
    pub relative_entropy: f64,
    /// Divergence of the model's next-symbol predictions from the empirical
    /// ones, per symbol.
    pub relative_entropy_rate: f64,
    /// Entropy of the stationary distribution over causal states (Cmu).
    pub statistical_complexity: f64,
    /// Stationary-weighted entropy of the states' next-symbol distributions.
    pub entropy_rate: f64,
    /// Total variation between the model's and the data's word distributions.
    pub variation: f64,
}

impl Metrics {
    /// Computes every measure for `automaton` against the counts in `tree`.
    pub fn compute(automaton: &Automaton, tree: &HistoryTree) -> Self {
        Self {
            relative_entropy: relative_entropy(automaton, tree),
            relative_entropy_rate: relative_entropy_rate(automaton, tree),
            statistical_complexity: statistical_complexity(automaton),
            entropy_rate: entropy_rate(automaton),
            variation: variation(automaton, tree),
        }
    }
}

/// Shannon entropy of a probability vector. Zero entries contribute nothing.
pub fn entropy(probabilities: &[f64]) -> f64 {
    let h: f64 = probabilities
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.log2())
        .sum();
    h.max(0.0)
}

/// Cmu: entropy of the stationary distribution.
pub fn statistical_complexity(automaton: &Automaton) -> f64 {
    entropy(automaton.stationary())
}

/// Σ π(s)·H(P(·|s)).
pub fn entropy_rate(automaton: &Automaton) -> f64 {
    automaton
        .states()
        .iter()
        .zip(automaton.stationary())
        .map(|(state, &p)| p * entropy(&state.distribution()))
        .sum()
}

/// Empirical distribution over the words of the maximum length, as
/// `(word, probability)` pairs in canonical order.
fn empirical_words(tree: &HistoryTree) -> Vec<(Vec<Symbol>, f64)> {
    let words: Vec<_> = tree
        .histories(tree.max_length())
        .into_iter()
        .filter_map(|id| tree.node(id))
        .map(|node| (node.symbols().to_vec(), node.occurrences()))
        .collect();
    let total: u64 = words.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return Vec::new();
    }
    words
        .into_iter()
        .map(|(w, c)| (w, c as f64 / total as f64))
        .collect()
}

/// Σ_w p̂(w)·log2(p̂(w) / P_M(w)) over observed words of the maximum length.
pub fn relative_entropy(automaton: &Automaton, tree: &HistoryTree) -> f64 {
    let mut divergence = 0.0;
    for (word, p_data) in empirical_words(tree) {
        let p_model = automaton.string_probability(&word);
        if p_model <= 0.0 {
            warn!(
                "Model assigns zero probability to observed word {:?}; skipped",
                automaton.alphabet().decode(&word)
            );
            continue;
        }
        divergence += p_data * (p_data / p_model).log2();
    }
    divergence.max(0.0)
}

/// Σ_h p̂(h)·Σ_a p̂(a|h)·log2(p̂(a|h) / P_M(a|h)) over histories one symbol
/// shorter than the maximum length.
pub fn relative_entropy_rate(automaton: &Automaton, tree: &HistoryTree) -> f64 {
    let histories: Vec<_> = tree
        .histories(tree.max_length() - 1)
        .into_iter()
        .filter_map(|id| tree.node(id))
        .filter(|node| node.total() > 0)
        .collect();
    let grand_total: u64 = histories.iter().map(|n| n.total()).sum();
    if grand_total == 0 {
        return 0.0;
    }

    let mut rate = 0.0;
    for node in histories {
        let p_history_model = automaton.string_probability(node.symbols());
        if p_history_model <= 0.0 {
            continue;
        }
        let weight = node.total() as f64 / grand_total as f64;
        let mut extended = node.symbols().to_vec();
        extended.push(0);
        let last = extended.len() - 1;

        let mut divergence = 0.0;
        for (symbol, &count) in node.counts().iter().enumerate() {
            if count == 0 {
                continue;
            }
            extended[last] = symbol;
            let p_model = automaton.string_probability(&extended) / p_history_model;
            if p_model <= 0.0 {
                warn!(
                    "Model assigns zero probability to observed word {:?}; skipped",
                    automaton.alphabet().decode(&extended)
                );
                continue;
            }
            let p_data = count as f64 / node.total() as f64;
            divergence += p_data * (p_data / p_model).log2();
        }
        rate += weight * divergence;
    }
    rate.max(0.0)
}

/// Σ_w |p̂(w) − P_M(w)| over observed words, plus the probability mass the
/// model puts on words never observed.
pub fn variation(automaton: &Automaton, tree: &HistoryTree) -> f64 {
    let mut distance = 0.0;
    let mut model_mass = 0.0;
    for (word, p_data) in empirical_words(tree) {
        let p_model = automaton.string_probability(&word);
        model_mass += p_model;
        distance += (p_data - p_model).abs();
    }
    distance + (1.0 - model_mass).max(0.0)
}
