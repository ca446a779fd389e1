//! Error types for chain editing and simulation.

use std::collections::BTreeSet;

use thiserror::Error;

/// Result type alias for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors that can occur while editing or simulating a chain.
///
/// Every variant describes a rejected operation; the chain is left exactly as it
/// was before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    /// Deleting a state would leave fewer than the minimum population.
    #[error("cannot delete state: minimum {minimum} states required (have {current})")]
    MinimumStateViolation { minimum: usize, current: usize },

    /// A transition probability was negative or not a finite number.
    #[error("invalid probability {value} for transition {from} -> {to}")]
    InvalidProbability { from: usize, to: usize, value: f64 },

    /// The transition matrix is not row-stochastic.
    #[error("transition matrix has invalid rows: {invalid_rows:?}")]
    InvalidMatrix { invalid_rows: BTreeSet<usize> },

    /// The chain has no states to simulate.
    #[error("chain is empty: generate a chain first")]
    EmptyChain,

    /// A persisted document failed validation.
    #[error("invalid chain document: {reason}")]
    InvalidDocument { reason: String },

    /// A state index does not name an existing state.
    #[error("state {index} out of range (have {count} states)")]
    StateOutOfRange { index: usize, count: usize },

    /// A state position was NaN or infinite.
    #[error("invalid position ({x}, {y}): coordinates must be finite")]
    InvalidPosition { x: f64, y: f64 },

    /// A chain must be generated with at least one state.
    #[error("invalid node count: {count} (must be >= 1)")]
    InvalidNodeCount { count: usize },
}

impl ChainError {
    /// Build an `InvalidDocument` error from any displayable reason.
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        ChainError::InvalidDocument {
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::MinimumStateViolation { .. } => "minimum_state_violation",
            ChainError::InvalidProbability { .. } => "invalid_probability",
            ChainError::InvalidMatrix { .. } => "invalid_matrix",
            ChainError::EmptyChain => "empty_chain",
            ChainError::InvalidDocument { .. } => "invalid_document",
            ChainError::StateOutOfRange { .. } => "state_out_of_range",
            ChainError::InvalidPosition { .. } => "invalid_position",
            ChainError::InvalidNodeCount { .. } => "invalid_node_count",
        }
    }
}
