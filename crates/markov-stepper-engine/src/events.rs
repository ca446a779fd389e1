//! Events published to the presentation layer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Something the presentation layer may want to redraw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainEvent {
    /// States were added, removed, moved or replaced.
    NodeSetChanged { count: usize },

    /// One or more matrix cells changed.
    MatrixChanged,

    /// The token moved from one state to another (possibly the same one).
    StateTransitioned { from: usize, to: usize, step: u64 },

    /// Visit counters or the step counter changed.
    StatisticsChanged { total_steps: u64 },

    /// Result of re-validating the matrix after an edit.
    ValidityChanged {
        valid: bool,
        invalid_rows: BTreeSet<usize>,
    },

    /// The loop went from idle to running.
    SimulationStarted,

    /// The loop went from running to idle.
    SimulationStopped,
}

impl ChainEvent {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            ChainEvent::NodeSetChanged { .. } => "node_set_changed",
            ChainEvent::MatrixChanged => "matrix_changed",
            ChainEvent::StateTransitioned { .. } => "state_transitioned",
            ChainEvent::StatisticsChanged { .. } => "statistics_changed",
            ChainEvent::ValidityChanged { .. } => "validity_changed",
            ChainEvent::SimulationStarted => "simulation_started",
            ChainEvent::SimulationStopped => "simulation_stopped",
        }
    }
}
