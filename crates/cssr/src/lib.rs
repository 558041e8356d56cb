#![doc = include_str!("../README.md")]
//! # CSSR - Causal State Splitting Reconstruction
//!
//! Infers the minimal predictive automaton (the causal-state machine) of a
//! stationary discrete process from sample symbol sequences.
//!
//! ## Overview
//!
//! Two histories belong to the same causal state when they predict the same
//! distribution over the next symbol. CSSR grows histories one symbol at a
//! time and splits a history off from its suffix's state when a statistical
//! test says their next-symbol distributions differ. The resulting states are
//! then cleaned up:
//! - **Transient** states, which the process leaves and never revisits, are
//!   dropped
//! - States are split until the transition on every symbol is **deterministic**
//! - The **stationary** distribution is measured by re-scanning the data
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │  Alphabet    │  │  StateSet    │  │   Automaton      │   │
//! │  │              │  │              │  │                  │   │
//! │  │ • encode     │─►│ • split      │─►│ • transitions    │   │
//! │  │ • validate   │  │ • prune      │  │ • stationary π   │   │
//! │  └──────┬───────┘  │ • determinize│  │ • metrics        │   │
//! │         │          └──────▲───────┘  └────────┬─────────┘   │
//! │  ┌──────▼───────┐         │                   │             │
//! │  │ HistoryTree  │─────────┘          ┌────────▼─────────┐   │
//! │  │ (counts)     │                    │    Artifacts     │   │
//! │  └──────────────┘                    │ results/info/dot │   │
//! │                                      │ state series     │   │
//! │                                      └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use cssr::{Alphabet, Engine, TestKind};
//!
//! let mut engine = Engine::new(Alphabet::parse("01").unwrap(), 3).unwrap();
//! engine.feed(&"011".repeat(300)).unwrap();
//!
//! let automaton = engine.run(0.05, TestKind::KolmogorovSmirnov).unwrap();
//! assert_eq!(automaton.num_states(), 3);
//! println!("Cmu = {:.4} bits", automaton.statistical_complexity());
//! ```
//!
//! ### Writing the result files
//!
//! ```rust,ignore
//! use cssr::Artifacts;
//! use std::path::Path;
//!
//! let artifacts = Artifacts::from_automaton(&automaton);
//! artifacts.write_to(Path::new("."), "run1")?;
//! // run1_results.txt, run1_info.txt, run1_inf.dot, run1_state_series.txt
//! ```

pub mod alphabet;
pub mod automaton;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod history;
pub mod metrics;
pub mod partition;
pub mod report;
pub mod states;
pub mod stats;

pub use alphabet::{Alphabet, Symbol};
pub use automaton::{Automaton, StateRecord};
pub use config::InferenceConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use history::{HistoryId, HistoryNode, HistoryTree};
pub use metrics::Metrics;
pub use partition::{CausalState, Partition, StateId};
pub use report::{Artifacts, MetricsReport, StateCatalogue, StateSeries, TransitionGraph};
pub use states::{InferenceStats, StateOccupation, StateSet, TransitionTable};
pub use stats::{EquivalenceTest, TestKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Infers an automaton from sequences written with the characters of
/// `alphabet`, in one call.
///
/// # Examples
///
/// ```
/// use cssr::{reconstruct, InferenceConfig};
///
/// let data = "01".repeat(100);
/// let automaton = reconstruct("01", &[data.as_str()], InferenceConfig::new(2)).unwrap();
/// assert_eq!(automaton.num_states(), 2);
/// ```
pub fn reconstruct<S: AsRef<str>>(
    alphabet: &str,
    sequences: &[S],
    config: InferenceConfig,
) -> Result<Automaton> {
    let mut engine = Engine::with_config(Alphabet::parse(alphabet)?, config)?;
    engine.feed_all(sequences)?;
    engine.infer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_rejects_bad_alphabet() {
        let result = reconstruct("00", &["0000"], InferenceConfig::new(2));
        assert!(matches!(result, Err(Error::InvalidAlphabet(_))));
    }

    #[test]
    fn test_reconstruct_rejects_empty_input() {
        let none: [&str; 0] = [];
        let result = reconstruct("01", &none, InferenceConfig::new(2));
        assert!(matches!(result, Err(Error::EmptyData(_))));
    }
}
