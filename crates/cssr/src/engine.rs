//! The embedding entry point: construct, feed, run, query.

use log::{debug, info};

use crate::alphabet::{Alphabet, Symbol};
use crate::automaton::Automaton;
use crate::config::InferenceConfig;
use crate::error::{Error, Result};
use crate::history::HistoryTree;
use crate::states::StateSet;
use crate::stats::TestKind;

/// Collects sequences into a history tree and infers automata from it.
///
/// Input is validated as it is fed, so a bad symbol is reported before any
/// inference work begins. The engine can be run several times, e.g. at
/// different significance levels, over the same data.
///
/// # Examples
///
/// ```
/// use cssr::{Alphabet, Engine, TestKind};
///
/// let mut engine = Engine::new(Alphabet::parse("01").unwrap(), 2).unwrap();
/// engine.feed(&"01".repeat(200)).unwrap();
/// let automaton = engine.run(0.05, TestKind::KolmogorovSmirnov).unwrap();
/// assert_eq!(automaton.num_states(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    alphabet: Alphabet,
    config: InferenceConfig,
    tree: HistoryTree,
    sequences: Vec<Vec<Symbol>>,
}

impl Engine {
    /// Creates an engine with default parameters apart from `max_length`.
    pub fn new(alphabet: Alphabet, max_length: usize) -> Result<Self> {
        Self::with_config(alphabet, InferenceConfig::new(max_length))
    }

    /// Creates an engine with explicit parameters.
    pub fn with_config(alphabet: Alphabet, config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        let tree = HistoryTree::new(alphabet.len(), config.max_length, config.max_histories);
        Ok(Self {
            alphabet,
            config,
            tree,
            sequences: Vec::new(),
        })
    }

    /// Adds one sequence written with the alphabet's characters.
    pub fn feed(&mut self, raw: &str) -> Result<()> {
        let index = self.sequences.len();
        let symbols = self
            .alphabet
            .encode(raw)
            .map_err(|e| e.in_sequence(index))?;
        self.feed_symbols(symbols)
    }

    /// Adds several sequences. Every sequence is checked before any is
    /// stored, so on error the engine is unchanged.
    pub fn feed_all<I, S>(&mut self, sequences: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let base = self.sequences.len();
        let encoded = sequences
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                let raw = raw.as_ref();
                if raw.is_empty() {
                    return Err(Error::EmptyData(format!("sequence {} is empty", base + i)));
                }
                self.alphabet
                    .encode(raw)
                    .map_err(|e| e.in_sequence(base + i))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut tree = self.tree.clone();
        for symbols in &encoded {
            tree.insert(symbols)?;
        }
        self.tree = tree;
        self.sequences.extend(encoded);
        Ok(())
    }

    /// Adds one sequence of symbol indices. On error the engine is unchanged.
    ///
    /// An index outside the alphabet is reported as `UnknownSymbol` with
    /// `char::REPLACEMENT_CHARACTER` in place of the symbol.
    pub fn feed_symbols(&mut self, symbols: Vec<Symbol>) -> Result<()> {
        let index = self.sequences.len();
        if symbols.is_empty() {
            return Err(Error::EmptyData(format!("sequence {} is empty", index)));
        }
        if let Some(position) = symbols.iter().position(|&s| s >= self.alphabet.len()) {
            return Err(Error::UnknownSymbol {
                symbol: char::REPLACEMENT_CHARACTER,
                sequence: index,
                position,
            });
        }

        // The history cap can trip partway through a sequence.
        let mut tree = self.tree.clone();
        tree.insert(&symbols)?;
        self.tree = tree;
        debug!(
            "Fed sequence {} ({} symbols, {} histories stored)",
            index,
            symbols.len(),
            self.tree.len()
        );
        self.sequences.push(symbols);
        Ok(())
    }

    /// Infers an automaton at the given significance level with the given
    /// test. Other parameters come from the engine's configuration.
    pub fn run(&self, significance_level: f64, test_kind: TestKind) -> Result<Automaton> {
        let config = self
            .config
            .clone()
            .with_significance(significance_level)
            .with_test(test_kind);
        self.infer_with(config)
    }

    /// Infers an automaton with the engine's configuration.
    pub fn infer(&self) -> Result<Automaton> {
        self.infer_with(self.config.clone())
    }

    fn infer_with(&self, config: InferenceConfig) -> Result<Automaton> {
        config.validate()?;
        if self.sequences.is_empty() {
            return Err(Error::EmptyData("no sequence was fed".to_string()));
        }
        info!(
            "Inferring from {} sequences ({} symbols), max_length {}, {} at {}",
            self.sequences.len(),
            self.tree.symbol_count(),
            config.max_length,
            config.test_kind,
            config.significance_level
        );

        let states = StateSet::new(&self.tree, &config)?;
        let (states, occupation) = states.run(&self.sequences)?;
        let automaton = Automaton::build(self.alphabet.clone(), config, &states, occupation)?;

        info!(
            "Inferred {} states, Cmu = {:.4}, entropy rate = {:.4}",
            automaton.num_states(),
            automaton.statistical_complexity(),
            automaton.entropy_rate()
        );
        Ok(automaton)
    }

    /// The declared alphabet.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The engine's configuration.
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// The history tree built from the data fed so far.
    pub fn tree(&self) -> &HistoryTree {
        &self.tree
    }

    /// Number of sequences fed so far.
    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }
}
