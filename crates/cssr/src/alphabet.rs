//! The symbol alphabet shared by every component of the engine.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A dense symbol index in `[0, alphabet.len())`.
pub type Symbol = usize;

/// An immutable bidirectional mapping between symbols and dense indices.
///
/// Indices follow declaration order, so `Alphabet::parse("ab")` maps `'a'` to
/// `0` and `'b'` to `1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alphabet {
    symbols: IndexSet<char>,
}

impl Alphabet {
    /// Builds an alphabet from a declared symbol set.
    ///
    /// Fails if a symbol is declared twice or fewer than two symbols are given,
    /// since distribution comparison over a single symbol is degenerate.
    pub fn new<I>(symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = char>,
    {
        let mut set = IndexSet::new();
        for symbol in symbols {
            if !set.insert(symbol) {
                return Err(Error::InvalidAlphabet(format!(
                    "symbol {:?} declared more than once",
                    symbol
                )));
            }
        }
        if set.len() < 2 {
            return Err(Error::InvalidAlphabet(format!(
                "at least 2 symbols are required, got {}",
                set.len()
            )));
        }
        Ok(Self { symbols: set })
    }

    /// Builds an alphabet from the characters of a string, e.g. `"01"`.
    pub fn parse(symbols: &str) -> Result<Self> {
        Self::new(symbols.chars())
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always `false`; an alphabet holds at least two symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Index of `symbol`, if declared.
    pub fn index_of(&self, symbol: char) -> Option<Symbol> {
        self.symbols.get_index_of(&symbol)
    }

    /// Symbol at `index`, if in range.
    pub fn symbol(&self, index: Symbol) -> Option<char> {
        self.symbols.get_index(index).copied()
    }

    /// Iterates symbols in index order.
    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.symbols.iter().copied()
    }

    /// Translates a raw sequence into symbol indices.
    ///
    /// The returned `UnknownSymbol` error reports sequence `0`; callers that
    /// feed several sequences re-label it with the real sequence index.
    pub fn encode(&self, raw: &str) -> Result<Vec<Symbol>> {
        raw.chars()
            .enumerate()
            .map(|(position, symbol)| {
                self.index_of(symbol).ok_or(Error::UnknownSymbol {
                    symbol,
                    sequence: 0,
                    position,
                })
            })
            .collect()
    }

    /// Translates symbol indices back into a string. Out-of-range indices
    /// render as `'?'`.
    pub fn decode(&self, symbols: &[Symbol]) -> String {
        symbols
            .iter()
            .map(|&s| self.symbol(s).unwrap_or('?'))
            .collect()
    }
}

impl std::fmt::Display for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for symbol in self.iter() {
            write!(f, "{}", symbol)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_directions() {
        let alphabet = Alphabet::parse("abc").unwrap();
        assert_eq!(alphabet.len(), 3);
        assert_eq!(alphabet.index_of('b'), Some(1));
        assert_eq!(alphabet.symbol(2), Some('c'));
        assert_eq!(alphabet.index_of('z'), None);
        assert_eq!(alphabet.symbol(3), None);
    }

    #[test]
    fn test_rejects_duplicates_and_tiny_alphabets() {
        assert!(matches!(
            Alphabet::parse("aba"),
            Err(Error::InvalidAlphabet(_))
        ));
        assert!(matches!(Alphabet::parse("a"), Err(Error::InvalidAlphabet(_))));
        assert!(matches!(Alphabet::parse(""), Err(Error::InvalidAlphabet(_))));
    }

    #[test]
    fn test_encode_decode() {
        let alphabet = Alphabet::parse("01").unwrap();
        let encoded = alphabet.encode("0110").unwrap();
        assert_eq!(encoded, vec![0, 1, 1, 0]);
        assert_eq!(alphabet.decode(&encoded), "0110");
    }

    #[test]
    fn test_encode_reports_unknown_symbol_position() {
        let alphabet = Alphabet::parse("01").unwrap();
        let err = alphabet.encode("0102").unwrap_err();
        assert_eq!(
            err,
            Error::UnknownSymbol {
                symbol: '2',
                sequence: 0,
                position: 3
            }
        );
    }

    #[test]
    fn test_display_in_index_order() {
        let alphabet = Alphabet::parse("xyz").unwrap();
        assert_eq!(alphabet.to_string(), "xyz");
    }
}
