//! The simulation aggregate: one owned chain, its statistics and the stepping loop.
//!
//! `Simulation` is a single-actor state machine. Every command is a synchronous
//! `&mut self` call, so two commands never interleave. The only deferred work is
//! the next tick, represented by a [`TickHandle`]: a handle is bound to the loop
//! epoch it was issued in, and `stop()` (or any structural edit) bumps the epoch,
//! so a handle issued earlier is ignored when it is eventually fired.
//!
//! ```text
//!            start() ok
//!   Idle ───────────────▶ Running ──┐ fire(handle) → tick → reschedule
//!    ▲                       │  ▲    │
//!    └─────── stop() ────────┘  └────┘
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use markov_stepper_core::{
    sample_with, ChainError, ChainResult, MatrixReport, Position, StateNode,
};

use crate::config::SimulationConfig;
use crate::events::ChainEvent;
use crate::stats::VisitStats;
use crate::store::{pointer_after_removal, ChainStore};

/// Whether the loop is currently stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    #[default]
    Idle,
    Running,
}

/// A scheduled tick, valid only for the loop epoch it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle {
    epoch: u64,
}

impl TickHandle {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutcome {
    /// State the token left.
    pub from: usize,
    /// State the token arrived at.
    pub to: usize,
    /// Total steps after this tick.
    pub step: u64,
}

/// A chain plus everything needed to step it.
pub struct Simulation {
    store: ChainStore,
    stats: VisitStats,
    current: usize,
    state: LoopState,
    epoch: u64,
    config: SimulationConfig,
    rng: StdRng,
    events: Vec<ChainEvent>,
}

impl Simulation {
    /// Create a simulation with an empty chain.
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            store: ChainStore::new(),
            stats: VisitStats::default(),
            current: 0,
            state: LoopState::Idle,
            epoch: 0,
            config,
            rng,
            events: Vec::new(),
        }
    }

    /// Create a simulation and generate a chain of `count` states.
    pub fn generated(config: SimulationConfig, count: usize) -> ChainResult<Self> {
        let mut sim = Self::new(config);
        sim.generate(count)?;
        sim.events.clear();
        Ok(sim)
    }

    pub fn store(&self) -> &ChainStore {
        &self.store
    }

    pub fn stats(&self) -> &VisitStats {
        &self.stats
    }

    /// Index of the state the token is on.
    pub fn current_state(&self) -> usize {
        self.current
    }

    pub fn loop_state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Validate the matrix with the configured tolerance.
    pub fn matrix_report(&self) -> MatrixReport {
        self.store.validate(self.config.tolerance)
    }

    /// Take all events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<ChainEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // Loop control
    // =========================================================================

    /// Start stepping. Returns the handle for the first tick.
    ///
    /// Refuses an empty chain and a matrix with any non-stochastic row. Starting
    /// an already running loop returns the live handle.
    pub fn start(&mut self) -> ChainResult<TickHandle> {
        if self.is_running() {
            return Ok(self.live_handle());
        }
        if self.store.is_empty() {
            warn!("simulation_start_rejected_empty");
            return Err(ChainError::EmptyChain);
        }
        self.matrix_report().into_result().inspect_err(|e| {
            warn!(error = %e, "simulation_start_rejected_matrix");
        })?;

        self.epoch += 1;
        self.state = LoopState::Running;
        self.events.push(ChainEvent::SimulationStarted);
        info!(
            states = self.store.state_count(),
            current = self.current,
            "simulation_started"
        );
        Ok(self.live_handle())
    }

    /// Stop stepping and invalidate any outstanding handle. Returns whether the
    /// loop was running.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = LoopState::Idle;
        self.epoch += 1;
        self.events.push(ChainEvent::SimulationStopped);
        info!(total_steps = self.stats.total_steps(), "simulation_stopped");
        true
    }

    /// Handle for the next tick, if the loop is running.
    pub fn pending_handle(&self) -> Option<TickHandle> {
        self.is_running().then(|| self.live_handle())
    }

    /// Run the tick a handle was scheduled for.
    ///
    /// A handle from an earlier epoch, or any handle while idle, does nothing.
    pub fn fire(&mut self, handle: TickHandle) -> Option<TickOutcome> {
        if !self.is_running() || handle.epoch != self.epoch {
            debug!(
                handle_epoch = handle.epoch,
                epoch = self.epoch,
                "stale_tick_ignored"
            );
            return None;
        }
        Some(self.tick())
    }

    fn tick(&mut self) -> TickOutcome {
        let from = self.current;
        let to = sample_with(self.store.matrix(), from, &mut self.rng);

        self.stats.record_visit(to);
        self.stats.record_step();
        self.current = to;

        let step = self.stats.total_steps();
        self.events.push(ChainEvent::StateTransitioned { from, to, step });
        self.events.push(ChainEvent::StatisticsChanged { total_steps: step });
        debug!(from, to, step, "simulation_tick");

        TickOutcome { from, to, step }
    }

    fn live_handle(&self) -> TickHandle {
        TickHandle { epoch: self.epoch }
    }

    // =========================================================================
    // Editor commands
    // =========================================================================

    /// Replace the chain with a random one of `count` states and reset statistics.
    pub fn generate(&mut self, count: usize) -> ChainResult<()> {
        self.store.generate(count, &mut self.rng)?;
        self.stop();
        self.stats.reset(count);
        self.current = 0;

        self.emit_nodes_changed();
        self.events.push(ChainEvent::MatrixChanged);
        self.emit_statistics_changed();
        self.emit_validity();
        Ok(())
    }

    /// Append a state (self-loop row) and a zero visit counter.
    pub fn add_state(&mut self, position: Position, color: Option<String>) -> ChainResult<u64> {
        let id = self.store.add_state(position, color)?;
        self.stop();
        self.stats.push_state();

        self.emit_nodes_changed();
        self.events.push(ChainEvent::MatrixChanged);
        self.emit_statistics_changed();
        self.emit_validity();
        Ok(id)
    }

    /// Delete a state, its matrix row/column and its visit counter.
    pub fn remove_state(&mut self, index: usize) -> ChainResult<StateNode> {
        let removed = self.store.remove_state(index, self.config.min_states)?;
        self.stop();
        self.stats.remove_state(index);
        self.current = pointer_after_removal(self.current, index);

        self.emit_nodes_changed();
        self.events.push(ChainEvent::MatrixChanged);
        self.emit_statistics_changed();
        self.emit_validity();
        Ok(removed)
    }

    /// Move a state on the canvas. Does not affect a running loop.
    pub fn move_state(&mut self, index: usize, position: Position) -> ChainResult<Position> {
        let placed = self.store.move_state(index, position)?;
        self.emit_nodes_changed();
        Ok(placed)
    }

    /// Set one transition probability. The row is not renormalised.
    pub fn set_transition(&mut self, from: usize, to: usize, probability: f64) -> ChainResult<f64> {
        let previous = self.store.set_transition(from, to, probability)?;
        self.matrix_edited();
        Ok(previous)
    }

    /// Set one transition probability to zero.
    pub fn clear_transition(&mut self, from: usize, to: usize) -> ChainResult<f64> {
        let previous = self.store.clear_transition(from, to)?;
        self.matrix_edited();
        Ok(previous)
    }

    /// Create an edge with the configured default probability if none exists.
    pub fn add_edge(&mut self, from: usize, to: usize) -> ChainResult<bool> {
        let changed = self
            .store
            .add_edge(from, to, self.config.default_edge_probability)?;
        if changed {
            self.matrix_edited();
        }
        Ok(changed)
    }

    /// Remove an existing edge.
    pub fn remove_edge(&mut self, from: usize, to: usize) -> ChainResult<bool> {
        let changed = self.store.remove_edge(from, to)?;
        if changed {
            self.matrix_edited();
        }
        Ok(changed)
    }

    /// Normalise one row; a zero row is left as is and the loop keeps running.
    pub fn normalize_row(&mut self, index: usize) -> ChainResult<bool> {
        let changed = self.store.normalize_row(index)?;
        if changed {
            self.matrix_edited();
        }
        Ok(changed)
    }

    /// Normalise every row with a positive sum.
    pub fn normalize_all(&mut self) -> usize {
        let rows = self.store.normalize_all();
        if rows > 0 {
            self.matrix_edited();
        }
        rows
    }

    /// Redraw the matrix for the current states; statistics are kept.
    pub fn randomize_matrix(&mut self) {
        self.store.randomize_matrix(&mut self.rng);
        self.matrix_edited();
    }

    /// Swap in a whole chain (used by document loading). Stops the loop first.
    pub(crate) fn replace_chain(&mut self, store: ChainStore, stats: VisitStats, current: usize) {
        self.stop();
        self.store = store;
        self.stats = stats;
        self.current = current;

        self.emit_nodes_changed();
        self.events.push(ChainEvent::MatrixChanged);
        self.emit_statistics_changed();
        self.emit_validity();
    }

    fn matrix_edited(&mut self) {
        self.stop();
        self.events.push(ChainEvent::MatrixChanged);
        self.emit_validity();
    }

    fn emit_nodes_changed(&mut self) {
        self.events.push(ChainEvent::NodeSetChanged {
            count: self.store.state_count(),
        });
    }

    fn emit_statistics_changed(&mut self) {
        self.events.push(ChainEvent::StatisticsChanged {
            total_steps: self.stats.total_steps(),
        });
    }

    fn emit_validity(&mut self) {
        let report = self.matrix_report();
        self.events.push(ChainEvent::ValidityChanged {
            valid: report.valid,
            invalid_rows: report.invalid_rows,
        });
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("state_count", &self.store.state_count())
            .field("current", &self.current)
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .field("total_steps", &self.stats.total_steps())
            .finish()
    }
}
