//! Graph store: the states of a chain and their transition matrix.
//!
//! Every mutation that changes the state set resizes the matrix in the same call,
//! so `nodes.len() == matrix.size()` holds between any two calls.

use rand::Rng;
use tracing::{debug, info, warn};

use markov_stepper_core::{
    circle_layout, palette_color, validate, ChainError, ChainResult, MatrixReport, Position,
    StateNode, TransitionMatrix,
};

/// States plus transition matrix, kept structurally consistent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainStore {
    nodes: Vec<StateNode>,
    matrix: TransitionMatrix,
    next_node_id: u64,
}

impl ChainStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a store from already-validated parts.
    pub fn from_parts(
        nodes: Vec<StateNode>,
        matrix: TransitionMatrix,
        next_node_id: u64,
    ) -> ChainResult<Self> {
        if nodes.len() != matrix.size() {
            return Err(ChainError::invalid_document(format!(
                "{} nodes but a {}x{} transition matrix",
                nodes.len(),
                matrix.size(),
                matrix.size()
            )));
        }
        Ok(Self {
            nodes,
            matrix,
            next_node_id,
        })
    }

    pub fn nodes(&self) -> &[StateNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&StateNode> {
        self.nodes.get(index)
    }

    pub fn matrix(&self) -> &TransitionMatrix {
        &self.matrix
    }

    pub fn state_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Identity the next created state will get.
    pub fn next_node_id(&self) -> u64 {
        self.next_node_id
    }

    /// Validate the matrix against `tolerance`.
    pub fn validate(&self, tolerance: f64) -> MatrixReport {
        validate(&self.matrix, tolerance)
    }

    // =========================================================================
    // State editing
    // =========================================================================

    /// Append a state with a self-loop of probability 1.
    ///
    /// Without an explicit colour the state takes the next palette colour.
    /// Returns the new state's id; its index is `state_count() - 1`.
    pub fn add_state(&mut self, position: Position, color: Option<String>) -> ChainResult<u64> {
        check_position(position)?;
        let id = self.next_node_id;
        self.next_node_id += 1;

        let color = color.unwrap_or_else(|| palette_color(self.nodes.len()).to_string());
        self.nodes.push(StateNode::new(id, position, color));
        let index = self.matrix.push_state();

        debug!(id, index, x = position.x, y = position.y, "state_added");
        Ok(id)
    }

    /// Remove a state, its matrix row and its matrix column.
    ///
    /// Fails with `MinimumStateViolation` unless more than `min_states` states
    /// exist. Remaining states are renumbered 0..N-1; `next_node_id` is kept.
    pub fn remove_state(&mut self, index: usize, min_states: usize) -> ChainResult<StateNode> {
        let count = self.nodes.len();
        if count <= min_states {
            warn!(index, count, min_states, "state_removal_rejected");
            return Err(ChainError::MinimumStateViolation {
                minimum: min_states,
                current: count,
            });
        }
        self.check_index(index)?;

        self.matrix.remove_state(index)?;
        let removed = self.nodes.remove(index);
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.id = i as u64;
        }

        debug!(index, remaining = self.nodes.len(), "state_removed");
        Ok(removed)
    }

    /// Move a state, clamped to the canvas.
    pub fn move_state(&mut self, index: usize, position: Position) -> ChainResult<Position> {
        self.check_index(index)?;
        check_position(position)?;
        let clamped = position.clamped_to_canvas();
        self.nodes[index].position = clamped;
        Ok(clamped)
    }

    // =========================================================================
    // Transition editing
    // =========================================================================

    /// Set one transition probability, returning the previous value.
    pub fn set_transition(&mut self, from: usize, to: usize, probability: f64) -> ChainResult<f64> {
        let previous = self.matrix.set(from, to, probability).inspect_err(|e| {
            warn!(from, to, probability, error = %e, "transition_rejected");
        })?;
        debug!(from, to, previous, probability, "transition_set");
        Ok(previous)
    }

    /// Set a transition to zero.
    pub fn clear_transition(&mut self, from: usize, to: usize) -> ChainResult<f64> {
        self.set_transition(from, to, 0.0)
    }

    /// Create an edge with `probability` if none exists. Returns whether a cell changed.
    pub fn add_edge(&mut self, from: usize, to: usize, probability: f64) -> ChainResult<bool> {
        match self.matrix.get(from, to) {
            Some(p) if p == 0.0 => {
                self.set_transition(from, to, probability)?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(self.out_of_range(from, to)),
        }
    }

    /// Remove an existing edge. Returns whether a cell changed.
    pub fn remove_edge(&mut self, from: usize, to: usize) -> ChainResult<bool> {
        match self.matrix.get(from, to) {
            Some(p) if p > 0.0 => {
                self.clear_transition(from, to)?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(self.out_of_range(from, to)),
        }
    }

    /// Normalise one row. A zero row is left untouched and reported as `false`.
    pub fn normalize_row(&mut self, index: usize) -> ChainResult<bool> {
        self.matrix.normalize_row(index)
    }

    /// Normalise every row with a positive sum.
    pub fn normalize_all(&mut self) -> usize {
        let rows = self.matrix.normalize_all();
        debug!(rows, "matrix_normalized");
        rows
    }

    // =========================================================================
    // Whole-chain operations
    // =========================================================================

    /// Replace the chain with `count` states on a circle and a random row-stochastic matrix.
    pub fn generate<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> ChainResult<()> {
        if count == 0 {
            return Err(ChainError::InvalidNodeCount { count });
        }

        self.nodes = circle_layout(count)
            .into_iter()
            .enumerate()
            .map(|(i, position)| StateNode::new(i as u64, position, palette_color(i)))
            .collect();
        self.next_node_id = count as u64;
        self.matrix = TransitionMatrix::random(count, rng);

        info!(states = count, "chain_generated");
        Ok(())
    }

    /// Redraw the matrix for the current states, as `generate` would.
    pub fn randomize_matrix<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.matrix = TransitionMatrix::random(self.nodes.len(), rng);
        debug!(states = self.nodes.len(), "matrix_randomized");
    }

    fn check_index(&self, index: usize) -> ChainResult<()> {
        if index < self.nodes.len() {
            Ok(())
        } else {
            Err(ChainError::StateOutOfRange {
                index,
                count: self.nodes.len(),
            })
        }
    }

    fn out_of_range(&self, from: usize, to: usize) -> ChainError {
        ChainError::StateOutOfRange {
            index: if from >= self.nodes.len() { from } else { to },
            count: self.nodes.len(),
        }
    }
}

/// Where the token pointer goes after the state at `removed` is deleted.
///
/// Deleting the occupied state sends the token to state 0; deleting a
/// lower-indexed state shifts it down by one.
pub fn pointer_after_removal(current: usize, removed: usize) -> usize {
    if removed == current {
        0
    } else if removed < current {
        current - 1
    } else {
        current
    }
}

fn check_position(position: Position) -> ChainResult<()> {
    if position.is_finite() {
        Ok(())
    } else {
        warn!(x = position.x, y = position.y, "position_rejected");
        Err(ChainError::InvalidPosition {
            x: position.x,
            y: position.y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generated(count: usize) -> ChainStore {
        let mut store = ChainStore::new();
        store.generate(count, &mut StdRng::seed_from_u64(1)).unwrap();
        store
    }

    #[test]
    fn test_generate() {
        let store = generated(4);

        assert_eq!(store.state_count(), 4);
        assert_eq!(store.matrix().size(), 4);
        assert_eq!(store.next_node_id(), 4);
        assert!(store.validate(1e-9).valid);
        let ids: Vec<u64> = store.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(store.node(1).unwrap().color, "#06b6d4");
    }

    #[test]
    fn test_generate_rejects_zero() {
        let mut store = generated(3);
        let before = store.clone();

        let err = store.generate(0, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, ChainError::InvalidNodeCount { count: 0 }));
        assert_eq!(store, before);
    }

    #[test]
    fn test_add_state_resizes_matrix() {
        let mut store = generated(2);
        let id = store.add_state(Position::new(100.0, 100.0), None).unwrap();

        assert_eq!(id, 2);
        assert_eq!(store.state_count(), 3);
        assert_eq!(store.matrix().size(), 3);
        assert_eq!(store.matrix().row(2).unwrap(), &[0.0, 0.0, 1.0]);
        assert_eq!(store.matrix().get(0, 2), Some(0.0));
        assert_eq!(store.node(2).unwrap().color, palette_color(2));
    }

    #[test]
    fn test_remove_state_enforces_floor() {
        let mut store = generated(2);

        let err = store.remove_state(0, 2).unwrap_err();
        assert!(matches!(
            err,
            ChainError::MinimumStateViolation {
                minimum: 2,
                current: 2
            }
        ));
        assert_eq!(store.state_count(), 2);
    }

    #[test]
    fn test_remove_state_renumbers_ids() {
        let mut store = generated(3);
        store
            .add_state(Position::new(50.0, 50.0), Some("#ffffff".into()))
            .unwrap();
        assert_eq!(store.next_node_id(), 4);

        let removed = store.remove_state(1, 2).unwrap();
        assert_eq!(removed.id, 1);

        let ids: Vec<u64> = store.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(store.matrix().size(), 3);
        assert_eq!(store.node(2).unwrap().color, "#ffffff");
        // Ids are not reused
        assert_eq!(store.next_node_id(), 4);
    }

    #[test]
    fn test_remove_state_out_of_range() {
        let mut store = generated(3);
        assert!(matches!(
            store.remove_state(9, 2),
            Err(ChainError::StateOutOfRange { index: 9, count: 3 })
        ));
        assert_eq!(store.state_count(), 3);
    }

    #[test]
    fn test_add_and_remove_edge() {
        let mut store = generated(2);
        store.clear_transition(0, 1).unwrap();

        assert!(store.add_edge(0, 1, 0.5).unwrap());
        assert_eq!(store.matrix().get(0, 1), Some(0.5));
        // Existing edge is left alone
        assert!(!store.add_edge(0, 1, 0.5).unwrap());

        assert!(store.remove_edge(0, 1).unwrap());
        assert_eq!(store.matrix().get(0, 1), Some(0.0));
        assert!(!store.remove_edge(0, 1).unwrap());

        assert!(store.add_edge(0, 5, 0.5).is_err());
    }

    #[test]
    fn test_set_transition_keeps_prior_value_on_error() {
        let mut store = generated(2);
        let before = store.matrix().get(1, 0);

        assert!(store.set_transition(1, 0, -1.0).is_err());
        assert_eq!(store.matrix().get(1, 0), before);
    }

    #[test]
    fn test_move_state_clamps() {
        let mut store = generated(2);
        let pos = store.move_state(0, Position::new(10_000.0, -5.0)).unwrap();
        assert_eq!(pos, Position::new(775.0, 25.0));
        assert_eq!(store.node(0).unwrap().position, pos);
    }

    #[test]
    fn test_non_finite_positions_rejected() {
        let mut store = generated(3);
        let before = store.clone();

        for bad in [
            Position::new(f64::NAN, 100.0),
            Position::new(100.0, f64::INFINITY),
            Position::new(f64::NEG_INFINITY, f64::NAN),
        ] {
            assert!(matches!(
                store.add_state(bad, None),
                Err(ChainError::InvalidPosition { .. })
            ));
            assert!(matches!(
                store.move_state(1, bad),
                Err(ChainError::InvalidPosition { .. })
            ));
        }
        assert_eq!(store, before);
    }

    #[test]
    fn test_randomize_keeps_nodes() {
        let mut store = generated(3);
        let nodes = store.nodes().to_vec();

        store.randomize_matrix(&mut StdRng::seed_from_u64(99));
        assert_eq!(store.nodes(), nodes.as_slice());
        assert!(store.validate(1e-9).valid);
    }

    #[test]
    fn test_pointer_after_removal() {
        assert_eq!(pointer_after_removal(2, 2), 0);
        assert_eq!(pointer_after_removal(2, 0), 1);
        assert_eq!(pointer_after_removal(1, 3), 1);
    }

    #[test]
    fn test_from_parts_checks_size() {
        let nodes = vec![StateNode::new(0, Position::default(), "#000")];
        assert!(ChainStore::from_parts(nodes.clone(), TransitionMatrix::identity(2), 1).is_err());
        assert!(ChainStore::from_parts(nodes, TransitionMatrix::identity(1), 1).is_ok());
    }
}
