//! Error types for proportion testing.

use thiserror::Error;

/// Degenerate or malformed input, detected before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("sample group {0} has no cells")]
    EmptyGroup(String),

    #[error("cell {index} has sample label {label}, expected one of the two compared samples")]
    UnknownSample { index: usize, label: String },

    #[error("both compared samples are labelled {0}")]
    IdenticalSamples(String),

    #[error("cluster column has {clusters} entries but sample column has {samples}")]
    LengthMismatch { clusters: usize, samples: usize },

    #[error("{name} must be at least 1, got {value}")]
    Iterations { name: &'static str, value: usize },

    #[error("confidence level must lie in (0, 1), got {0}")]
    ConfidenceLevel(f64),

    #[error("pseudo count must be finite and non-negative, got {0}")]
    PseudoCount(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProportionError {
    /// No `source`: the message already contains the inner error.
    #[error("invalid input: {0}")]
    InvalidInput(InvalidInput),

    /// Per-cluster sub-results disagree on their cluster keys.
    #[error("inconsistent results: {0}")]
    InconsistentResults(String),
}

impl From<InvalidInput> for ProportionError {
    fn from(err: InvalidInput) -> Self {
        ProportionError::InvalidInput(err)
    }
}

impl ProportionError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ProportionError::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, ProportionError>;
