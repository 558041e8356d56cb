//! Error types for causal-state reconstruction.

use thiserror::Error;

/// A specialized `Result` type for reconstruction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The errors that can occur while validating input or inferring an automaton.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A run parameter is missing, malformed, or out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The declared alphabet is unusable (duplicates, fewer than two symbols).
    #[error("Invalid alphabet: {0}")]
    InvalidAlphabet(String),

    /// Input data contains a symbol absent from the declared alphabet.
    #[error("Unknown symbol {symbol:?} at position {position} of sequence {sequence}")]
    UnknownSymbol {
        symbol: char,
        sequence: usize,
        position: usize,
    },

    /// No usable data was supplied.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// The history tree or partition outgrew its configured limit.
    #[error("Resource limit exceeded: {0}")]
    ResourceExhausted(String),

    /// Transient-state removal left nothing to build a machine from.
    #[error("No recurrent causal states: {0}")]
    NoRecurrentStates(String),

    /// An internal invariant was violated. This indicates a defect, not bad input.
    #[error("Internal invariant violated: {0}")]
    Internal(String),

    /// Reading input or writing artifacts failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// An artifact could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns `true` for failures caused by the caller's input, which are
    /// always reported before any inference work begins.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameter(_)
                | Error::InvalidAlphabet(_)
                | Error::UnknownSymbol { .. }
                | Error::EmptyData(_)
        )
    }

    /// Attaches the index of the offending sequence to an `UnknownSymbol` error.
    pub(crate) fn in_sequence(self, index: usize) -> Self {
        match self {
            Error::UnknownSymbol {
                symbol, position, ..
            } => Error::UnknownSymbol {
                symbol,
                sequence: index,
                position,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                Error::InvalidParameter("max_length must be at least 2".into()),
                "Invalid parameter: max_length must be at least 2",
            ),
            (
                Error::UnknownSymbol {
                    symbol: 'x',
                    sequence: 1,
                    position: 4,
                },
                "Unknown symbol 'x' at position 4 of sequence 1",
            ),
            (
                Error::Internal("history 7 has no parent state".into()),
                "Internal invariant violated: history 7 has no parent state",
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_input_errors_are_distinguished_from_defects() {
        assert!(Error::InvalidParameter("p".into()).is_input_error());
        assert!(Error::EmptyData("d".into()).is_input_error());
        assert!(Error::UnknownSymbol {
            symbol: 'z',
            sequence: 0,
            position: 0
        }
        .is_input_error());
        assert!(!Error::Internal("i".into()).is_input_error());
        assert!(!Error::ResourceExhausted("r".into()).is_input_error());
    }

    #[test]
    fn test_in_sequence_only_rewrites_unknown_symbol() {
        let err = Error::UnknownSymbol {
            symbol: '2',
            sequence: 0,
            position: 9,
        }
        .in_sequence(3);
        assert_eq!(
            err,
            Error::UnknownSymbol {
                symbol: '2',
                sequence: 3,
                position: 9
            }
        );

        let other = Error::EmptyData("none".into()).in_sequence(3);
        assert_eq!(other, Error::EmptyData("none".into()));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("{invalid}");
        let error: Error = json_result.unwrap_err().into();
        assert!(matches!(error, Error::Serialization(_)));
    }
}
