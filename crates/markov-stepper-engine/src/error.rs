//! Error types for the simulation engine.

use thiserror::Error;

use markov_stepper_core::ChainError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A chain command was rejected.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Document serialization error.
    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (file operations).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The simulation runtime task has shut down.
    #[error("simulation runtime is closed")]
    RuntimeClosed,
}

impl EngineError {
    /// The chain error behind this failure, if it is a rejected command.
    pub fn as_chain(&self) -> Option<&ChainError> {
        match self {
            EngineError::Chain(e) => Some(e),
            _ => None,
        }
    }
}
