//! Result artifacts: the state catalogue, the metrics report, the transition
//! graph and the per-sequence state series.
//!
//! Every artifact is a plain serializable value with a text rendering
//! (`Display`). [`Artifacts`] bundles all four and writes them together.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::automaton::Automaton;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::partition::StateId;
use crate::states::InferenceStats;
use crate::stats::TestKind;

/// Suffix of the state catalogue file.
pub const RESULTS_SUFFIX: &str = "_results.txt";
/// Suffix of the metrics report file.
pub const INFO_SUFFIX: &str = "_info.txt";
/// Suffix of the Graphviz transition graph file.
pub const DOT_SUFFIX: &str = "_inf.dot";
/// Suffix of the state series file.
pub const SERIES_SUFFIX: &str = "_state_series.txt";

/// Probability of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolProbability {
    /// The symbol, as declared in the alphabet.
    pub symbol: char,
    /// Probability of emitting it next.
    pub probability: f64,
}

/// One defined transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTransition {
    /// The emitted symbol.
    pub symbol: char,
    /// State entered after emitting it.
    pub target: StateId,
}

/// Catalogue entry for one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    /// State id.
    pub id: StateId,
    /// Member histories, oldest symbol first.
    pub histories: Vec<String>,
    /// Next-symbol distribution, one entry per alphabet symbol.
    pub distribution: Vec<SymbolProbability>,
    /// Defined transitions only.
    pub transitions: Vec<SymbolTransition>,
    /// Stationary probability.
    pub probability: f64,
}

/// Every state with its member histories, distribution, transitions and
/// stationary probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCatalogue {
    /// One entry per state, in id order.
    pub states: Vec<StateEntry>,
}

impl StateCatalogue {
    /// Collects every state of `automaton`.
    pub fn from_automaton(automaton: &Automaton) -> Self {
        let alphabet = automaton.alphabet();
        let states = automaton
            .states()
            .iter()
            .map(|state| StateEntry {
                id: state.id,
                histories: state.histories.clone(),
                distribution: alphabet
                    .iter()
                    .enumerate()
                    .map(|(index, symbol)| SymbolProbability {
                        symbol,
                        probability: state.probability(index),
                    })
                    .collect(),
                transitions: alphabet
                    .iter()
                    .enumerate()
                    .filter_map(|(index, symbol)| {
                        automaton
                            .transition(state.id, index)
                            .map(|target| SymbolTransition { symbol, target })
                    })
                    .collect(),
                probability: automaton.stationary_probability(state.id).unwrap_or(0.0),
            })
            .collect();
        Self { states }
    }
}

impl fmt::Display for StateCatalogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in &self.states {
            writeln!(f, "State number: {}", state.id)?;
            for history in &state.histories {
                writeln!(f, "{}", history)?;
            }
            write!(f, "distribution:")?;
            for entry in &state.distribution {
                write!(f, " P({}) = {:.7}", entry.symbol, entry.probability)?;
            }
            writeln!(f)?;
            write!(f, "transitions:")?;
            for entry in &state.transitions {
                write!(f, " T({}) = {}", entry.symbol, entry.target)?;
            }
            writeln!(f)?;
            writeln!(f, "P(state): {:.7}", state.probability)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Run parameters, data size and the computed metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Alphabet symbols in index order.
    pub alphabet: String,
    /// Number of input sequences.
    pub sequences: usize,
    /// Total number of input symbols.
    pub data_size: u64,
    /// Longest history considered.
    pub max_length: usize,
    /// Significance level of the equivalence test.
    pub significance_level: f64,
    /// Equivalence test used.
    pub test: TestKind,
    /// Fewest observations for a history to be tested.
    pub min_sample: u64,
    /// Whether the input was read one sequence per line.
    pub multi_line: bool,
    /// Number of inferred states.
    pub num_states: usize,
    /// Fit and complexity measures.
    pub metrics: Metrics,
    /// Counters collected during inference.
    pub stats: InferenceStats,
}

impl MetricsReport {
    /// Gathers the run parameters and metrics of `automaton`. `multi_line`
    /// is guessed from the sequence count; see [`Artifacts::with_multi_line`].
    pub fn from_automaton(automaton: &Automaton) -> Self {
        let config = automaton.config();
        Self {
            alphabet: automaton.alphabet().to_string(),
            sequences: automaton.sequence_count(),
            data_size: automaton.symbol_count(),
            max_length: config.max_length,
            significance_level: config.significance_level,
            test: config.test_kind,
            min_sample: config.min_sample,
            multi_line: automaton.sequence_count() > 1,
            num_states: automaton.num_states(),
            metrics: *automaton.metrics(),
            stats: automaton.stats().clone(),
        }
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Alphabet: {}", self.alphabet)?;
        writeln!(f, "Alphabet Size: {}", self.alphabet.chars().count())?;
        writeln!(f, "Data Size: {}", self.data_size)?;
        writeln!(f, "Sequences: {}", self.sequences)?;
        writeln!(f, "History Length: {}", self.max_length)?;
        writeln!(f, "Significance Level: {}", self.significance_level)?;
        writeln!(f, "Test: {}", self.test)?;
        writeln!(f, "Minimum Sample: {}", self.min_sample)?;
        writeln!(f, "Multi-line Mode: {}", self.multi_line)?;
        writeln!(f)?;
        writeln!(f, "Relative Entropy: {:.7}", self.metrics.relative_entropy)?;
        writeln!(
            f,
            "Relative Entropy Rate: {:.7}",
            self.metrics.relative_entropy_rate
        )?;
        writeln!(
            f,
            "Statistical Complexity: {:.7}",
            self.metrics.statistical_complexity
        )?;
        writeln!(f, "Entropy Rate: {:.7}", self.metrics.entropy_rate)?;
        writeln!(f, "Variation: {:.7}", self.metrics.variation)?;
        writeln!(f, "Number of Inferred States: {}", self.num_states)?;
        writeln!(f)?;
        writeln!(f, "Histories Stored: {}", self.stats.histories)?;
        writeln!(f, "Tests Run: {}", self.stats.tests_run)?;
        writeln!(f, "Splits: {}", self.stats.splits)?;
        writeln!(f, "Deferred Histories: {}", self.stats.deferred)?;
        writeln!(f, "Transient States Removed: {}", self.stats.transient_removed)?;
        writeln!(
            f,
            "Determinization Splits: {}",
            self.stats.determinization_splits
        )
    }
}

/// A node of the transition graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// State id.
    pub id: StateId,
    /// Stationary probability.
    pub probability: f64,
}

/// A labeled edge of the transition graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source state.
    pub from: StateId,
    /// Target state.
    pub to: StateId,
    /// Symbol emitted along the edge.
    pub symbol: char,
    /// Probability of emitting `symbol` from `from`.
    pub probability: f64,
}

/// The automaton as a directed graph, one edge per defined transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionGraph {
    /// One node per state.
    pub nodes: Vec<GraphNode>,
    /// Edges grouped by source state, then alphabet order.
    pub edges: Vec<GraphEdge>,
}

impl TransitionGraph {
    /// Builds the graph of `automaton`.
    pub fn from_automaton(automaton: &Automaton) -> Self {
        let nodes = automaton
            .states()
            .iter()
            .map(|s| GraphNode {
                id: s.id,
                probability: automaton.stationary_probability(s.id).unwrap_or(0.0),
            })
            .collect();

        let mut edges = Vec::new();
        for state in automaton.states() {
            for (index, symbol) in automaton.alphabet().iter().enumerate() {
                if let Some(to) = automaton.transition(state.id, index) {
                    edges.push(GraphEdge {
                        from: state.id,
                        to,
                        symbol,
                        probability: state.probability(index),
                    });
                }
            }
        }
        Self { nodes, edges }
    }

    /// Graphviz source.
    pub fn to_dot(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TransitionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph G {{")?;
        writeln!(f, "  size = \"6,8.5\";")?;
        writeln!(f, "  ratio = \"fill\";")?;
        writeln!(f, "  node [shape = circle];")?;
        writeln!(f, "  node [fontsize = 24];")?;
        writeln!(f, "  edge [fontsize = 24];")?;
        for node in &self.nodes {
            writeln!(
                f,
                "  {} [label = \"{}\\n{:.4}\"];",
                node.id, node.id, node.probability
            )?;
        }
        for edge in &self.edges {
            writeln!(
                f,
                "  {} -> {} [label = \"{}: {:.7}\"];",
                edge.from, edge.to, edge.symbol, edge.probability
            )?;
        }
        writeln!(f, "}}")
    }
}

/// The state visited at every position of every input sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSeries {
    /// Per sequence, the state at each position, `None` where none applies.
    pub sequences: Vec<Vec<Option<StateId>>>,
}

impl StateSeries {
    /// Copies the state series of `automaton`.
    pub fn from_automaton(automaton: &Automaton) -> Self {
        Self {
            sequences: automaton.state_series().to_vec(),
        }
    }
}

impl fmt::Display for StateSeries {
    /// One line per sequence, states separated by spaces; `-` marks a
    /// position without an assigned state.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sequence in &self.sequences {
            let mut first = true;
            for state in sequence {
                if !first {
                    write!(f, " ")?;
                }
                first = false;
                match state {
                    Some(s) => write!(f, "{}", s)?,
                    None => write!(f, "-")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// All four artifacts of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    /// Written to `<prefix>_results.txt`.
    pub catalogue: StateCatalogue,
    /// Written to `<prefix>_info.txt`.
    pub report: MetricsReport,
    /// Written to `<prefix>_inf.dot`.
    pub graph: TransitionGraph,
    /// Written to `<prefix>_state_series.txt`.
    pub series: StateSeries,
}

impl Artifacts {
    /// Builds all four artifacts from `automaton`.
    pub fn from_automaton(automaton: &Automaton) -> Self {
        Self {
            catalogue: StateCatalogue::from_automaton(automaton),
            report: MetricsReport::from_automaton(automaton),
            graph: TransitionGraph::from_automaton(automaton),
            series: StateSeries::from_automaton(automaton),
        }
    }

    /// Marks the report as produced from line-separated input.
    pub fn with_multi_line(mut self, multi_line: bool) -> Self {
        self.report.multi_line = multi_line;
        self
    }

    /// Pretty-printed JSON of every artifact.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Renders the four files as `(path, contents)` pairs under `dir`.
    pub fn render(&self, dir: &Path, prefix: &str) -> Result<Vec<(PathBuf, String)>> {
        if prefix.is_empty() {
            return Err(Error::InvalidParameter(
                "output prefix must not be empty".to_string(),
            ));
        }
        let path = |suffix: &str| dir.join(format!("{}{}", prefix, suffix));
        Ok(vec![
            (path(RESULTS_SUFFIX), self.catalogue.to_string()),
            (path(INFO_SUFFIX), self.report.to_string()),
            (path(DOT_SUFFIX), self.graph.to_dot()),
            (path(SERIES_SUFFIX), self.series.to_string()),
        ])
    }

    /// Writes the four files. Everything is rendered before the first file
    /// is created, and files already written are removed if a later write
    /// fails.
    pub fn write_to(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        let rendered = self.render(dir, prefix)?;
        let mut written = Vec::with_capacity(rendered.len());
        for (path, contents) in rendered {
            if let Err(e) = fs::write(&path, contents) {
                for done in &written {
                    let _ = fs::remove_file(done);
                }
                return Err(Error::Io(format!("{}: {}", path.display(), e)));
            }
            written.push(path);
        }
        info!("Wrote {} artifacts with prefix {:?}", written.len(), prefix);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> TransitionGraph {
        TransitionGraph {
            nodes: vec![
                GraphNode {
                    id: 0,
                    probability: 0.5,
                },
                GraphNode {
                    id: 1,
                    probability: 0.5,
                },
            ],
            edges: vec![
                GraphEdge {
                    from: 0,
                    to: 1,
                    symbol: '1',
                    probability: 1.0,
                },
                GraphEdge {
                    from: 1,
                    to: 0,
                    symbol: '0',
                    probability: 1.0,
                },
            ],
        }
    }

    #[test]
    fn test_dot_output() {
        let dot = sample_graph().to_dot();
        assert!(dot.starts_with("digraph G {"));
        assert!(dot.contains("0 -> 1 [label = \"1: 1.0000000\"];"));
        assert!(dot.contains("1 -> 0 [label = \"0: 1.0000000\"];"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_state_series_rendering() {
        let series = StateSeries {
            sequences: vec![vec![None, Some(0), Some(1)], vec![None, Some(12)]],
        };
        assert_eq!(series.to_string(), "- 0 1\n- 12\n");
    }

    #[test]
    fn test_catalogue_rendering() {
        let catalogue = StateCatalogue {
            states: vec![StateEntry {
                id: 0,
                histories: vec!["01".to_string(), "11".to_string()],
                distribution: vec![
                    SymbolProbability {
                        symbol: '0',
                        probability: 1.0,
                    },
                    SymbolProbability {
                        symbol: '1',
                        probability: 0.0,
                    },
                ],
                transitions: vec![SymbolTransition {
                    symbol: '0',
                    target: 1,
                }],
                probability: 0.5,
            }],
        };
        let text = catalogue.to_string();
        assert!(text.starts_with("State number: 0\n01\n11\n"));
        assert!(text.contains("P(0) = 1.0000000 P(1) = 0.0000000"));
        assert!(text.contains("T(0) = 1\n"));
        assert!(text.contains("P(state): 0.5000000"));
    }

    #[test]
    fn test_graph_json_roundtrip() {
        let graph = sample_graph();
        let json = serde_json::to_string(&graph).unwrap();
        let back: TransitionGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }
}
