//! Editing and stepping engine for Markov chains.
//!
//! This crate owns the mutable side of the stepper: the graph store, the visit
//! statistics, the paced simulation loop and the document codec.
//!
//! ## Core Concepts
//!
//! - **ChainStore**: states plus transition matrix, resized together on every edit
//! - **VisitStats**: per-state visit counters and the total step counter
//! - **Simulation**: the owned aggregate; an `Idle`/`Running` state machine whose
//!   scheduled ticks are invalidated by `stop()` and by structural edits
//! - **SimulationRuntime**: a tokio task that paces ticks and serialises commands
//! - **ChainDocument**: the versioned JSON form, validated before it is applied
//!
//! ## Invariants
//!
//! ```text
//! nodes.len() == matrix.size() == visits.len()
//! sum(visits) == total_steps + 1        (since the last reset)
//! current < nodes.len()                 (whenever nodes is non-empty)
//! ```

pub mod config;
mod error;
mod events;
pub mod persistence;
pub mod runtime;
mod simulation;
mod stats;
mod store;

pub use config::SimulationConfig;
pub use error::{EngineError, EngineResult};
pub use events::ChainEvent;
pub use persistence::{
    default_file_name, validate_document, ChainDocument, DocumentStore, NodeRecord,
    DOCUMENT_VERSION,
};
pub use runtime::{RuntimeHandle, SimulationRuntime};
pub use simulation::{LoopState, Simulation, TickHandle, TickOutcome};
pub use stats::{StatisticsRow, VisitStats};
pub use store::{pointer_after_removal, ChainStore};

// Re-export the core model so callers need only one dependency
pub use markov_stepper_core::{
    ChainError, ChainResult, MatrixReport, Position, StateNode, TransitionMatrix,
};
