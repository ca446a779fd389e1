//! Square transition matrix with structural editing.
//!
//! The matrix is always N×N. Growing and shrinking happen one state at a time so
//! the dimensions stay in lockstep with the state set owned by the graph store.
//! Row-stochasticity is *not* enforced here; see [`crate::validation`].

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};

/// An N×N matrix of transition probabilities, `rows[i][j]` = P(i -> j).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct TransitionMatrix {
    rows: Vec<Vec<f64>>,
}

impl TransitionMatrix {
    /// Create an empty 0×0 matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an N×N matrix of zeros.
    pub fn zeros(size: usize) -> Self {
        Self {
            rows: vec![vec![0.0; size]; size],
        }
    }

    /// Create an N×N matrix where every state loops back to itself.
    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::zeros(size);
        for i in 0..size {
            matrix.rows[i][i] = 1.0;
        }
        matrix
    }

    /// Build a matrix from explicit rows.
    ///
    /// Rejects non-square input and any cell that is negative or not finite.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> ChainResult<Self> {
        let size = rows.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(ChainError::invalid_document(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                if !is_valid_probability(value) {
                    return Err(ChainError::InvalidProbability {
                        from: i,
                        to: j,
                        value,
                    });
                }
            }
        }
        Ok(Self { rows })
    }

    /// Draw a random row-stochastic matrix.
    ///
    /// Each row is `size` independent uniform draws normalised to sum to 1.
    pub fn random<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        let mut rows = Vec::with_capacity(size);
        for i in 0..size {
            let mut row: Vec<f64> = (0..size).map(|_| rng.random::<f64>()).collect();
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                row.iter_mut().for_each(|p| *p /= sum);
            } else {
                // Every draw came out exactly 0.0
                row[i] = 1.0;
            }
            rows.push(row);
        }
        Self { rows }
    }

    /// Number of states (rows, and columns).
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Check if the matrix has no states.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Probability of moving from `from` to `to`.
    pub fn get(&self, from: usize, to: usize) -> Option<f64> {
        self.rows.get(from).and_then(|row| row.get(to)).copied()
    }

    /// Borrow one row.
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Borrow all rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Sum of a row, or 0 for an index past the end.
    pub fn row_sum(&self, index: usize) -> f64 {
        self.row(index).map(|row| row.iter().sum()).unwrap_or(0.0)
    }

    /// Set one cell, returning the previous value.
    ///
    /// The row is not renormalised; a row may be transiently non-stochastic.
    pub fn set(&mut self, from: usize, to: usize, probability: f64) -> ChainResult<f64> {
        self.check_index(from)?;
        self.check_index(to)?;
        if !is_valid_probability(probability) {
            return Err(ChainError::InvalidProbability {
                from,
                to,
                value: probability,
            });
        }
        let previous = std::mem::replace(&mut self.rows[from][to], probability);
        Ok(previous)
    }

    /// Append a state whose row is a self-loop with probability 1.
    ///
    /// Existing rows get a zero column for the new state.
    pub fn push_state(&mut self) -> usize {
        for row in &mut self.rows {
            row.push(0.0);
        }
        let size = self.rows.len() + 1;
        let mut row = vec![0.0; size];
        row[size - 1] = 1.0;
        self.rows.push(row);
        size - 1
    }

    /// Remove the row and column of a state.
    pub fn remove_state(&mut self, index: usize) -> ChainResult<()> {
        self.check_index(index)?;
        self.rows.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        Ok(())
    }

    /// Scale a row so it sums to 1.
    ///
    /// Returns `false` without touching the row when its sum is zero.
    pub fn normalize_row(&mut self, index: usize) -> ChainResult<bool> {
        self.check_index(index)?;
        let sum = self.row_sum(index);
        if sum > 0.0 {
            self.rows[index].iter_mut().for_each(|p| *p /= sum);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Normalise every row with a positive sum. Returns how many rows were scaled.
    pub fn normalize_all(&mut self) -> usize {
        let mut normalized = 0;
        for row in &mut self.rows {
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                row.iter_mut().for_each(|p| *p /= sum);
                normalized += 1;
            }
        }
        normalized
    }

    /// Iterate over non-zero cells as `(from, to, probability)`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows.iter().enumerate().flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, p)| **p > 0.0)
                .map(move |(j, p)| (i, j, *p))
        })
    }

    fn check_index(&self, index: usize) -> ChainResult<()> {
        if index < self.rows.len() {
            Ok(())
        } else {
            Err(ChainError::StateOutOfRange {
                index,
                count: self.rows.len(),
            })
        }
    }
}

impl TryFrom<Vec<Vec<f64>>> for TransitionMatrix {
    type Error = ChainError;

    fn try_from(rows: Vec<Vec<f64>>) -> ChainResult<Self> {
        Self::from_rows(rows)
    }
}

impl From<TransitionMatrix> for Vec<Vec<f64>> {
    fn from(matrix: TransitionMatrix) -> Self {
        matrix.rows
    }
}

/// A probability cell must be a finite, non-negative number.
pub fn is_valid_probability(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_push_state_adds_self_loop() {
        let mut m = TransitionMatrix::identity(2);
        let index = m.push_state();

        assert_eq!(index, 2);
        assert_eq!(m.size(), 3);
        assert_eq!(m.row(0).unwrap(), &[1.0, 0.0, 0.0]);
        assert_eq!(m.row(2).unwrap(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_push_onto_empty() {
        let mut m = TransitionMatrix::new();
        m.push_state();
        assert_eq!(m.rows(), &[vec![1.0]]);
    }

    #[test]
    fn test_remove_state_drops_row_and_column() {
        let mut m = TransitionMatrix::from_rows(vec![
            vec![0.1, 0.2, 0.7],
            vec![0.3, 0.3, 0.4],
            vec![0.5, 0.25, 0.25],
        ])
        .unwrap();

        m.remove_state(1).unwrap();

        assert_eq!(m.rows(), &[vec![0.1, 0.7], vec![0.5, 0.25]]);
        assert!(matches!(
            m.remove_state(5),
            Err(ChainError::StateOutOfRange { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut m = TransitionMatrix::identity(2);

        assert!(matches!(
            m.set(0, 1, -0.5),
            Err(ChainError::InvalidProbability { .. })
        ));
        assert!(m.set(0, 1, f64::NAN).is_err());
        assert!(m.set(0, 1, f64::INFINITY).is_err());
        assert_eq!(m.get(0, 1), Some(0.0));

        let previous = m.set(0, 1, 0.25).unwrap();
        assert_eq!(previous, 0.0);
        assert_eq!(m.get(0, 1), Some(0.25));
        // No automatic renormalisation
        assert!((m.row_sum(0) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_row() {
        let mut m = TransitionMatrix::from_rows(vec![vec![2.0, 2.0], vec![0.0, 0.0]]).unwrap();

        assert!(m.normalize_row(0).unwrap());
        assert_eq!(m.row(0).unwrap(), &[0.5, 0.5]);

        // Zero row is a defined no-op
        assert!(!m.normalize_row(1).unwrap());
        assert_eq!(m.row(1).unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn test_normalize_all_is_idempotent() {
        let mut m = TransitionMatrix::from_rows(vec![
            vec![0.2, 0.9, 0.4],
            vec![0.0, 0.0, 0.0],
            vec![3.0, 1.0, 1.0],
        ])
        .unwrap();

        assert_eq!(m.normalize_all(), 2);
        let once = m.clone();
        m.normalize_all();

        for (a, b) in once.rows().iter().flatten().zip(m.rows().iter().flatten()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_random_rows_sum_to_one() {
        let mut rng = StdRng::seed_from_u64(7);
        for size in 1..8 {
            let m = TransitionMatrix::random(size, &mut rng);
            assert_eq!(m.size(), size);
            for i in 0..size {
                assert!((m.row_sum(i) - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = TransitionMatrix::from_rows(vec![vec![1.0, 0.0], vec![1.0]]).unwrap_err();
        assert_eq!(err.kind(), "invalid_document");
    }

    #[test]
    fn test_serde_is_plain_rows() {
        let m = TransitionMatrix::from_rows(vec![vec![0.3, 0.7], vec![1.0, 0.0]]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[[0.3,0.7],[1.0,0.0]]");

        let back: TransitionMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);

        assert!(serde_json::from_str::<TransitionMatrix>("[[1.0],[1.0]]").is_err());
    }

    #[test]
    fn test_edges_skip_zero_cells() {
        let m = TransitionMatrix::from_rows(vec![vec![0.0, 1.0], vec![0.4, 0.6]]).unwrap();
        let edges: Vec<_> = m.edges().collect();
        assert_eq!(edges, vec![(0, 1, 1.0), (1, 0, 0.4), (1, 1, 0.6)]);
    }
}
