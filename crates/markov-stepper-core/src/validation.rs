//! Row-stochasticity checks.
//!
//! These are pure functions over a [`TransitionMatrix`]. A failing check is a
//! reportable condition, not a structural error: editing may leave rows off by
//! more than the tolerance until the user normalises them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::matrix::TransitionMatrix;

/// Allowed deviation of a row sum from 1.0.
pub const DEFAULT_TOLERANCE: f64 = 0.001;

/// Warning shown while any row is off.
pub const ROW_SUM_WARNING: &str = "Row sums should equal 1.0 for valid probabilities";

/// Sum of row `index`.
pub fn row_sum(matrix: &TransitionMatrix, index: usize) -> f64 {
    matrix.row_sum(index)
}

/// Check that row `index` sums to 1 within `tolerance`.
pub fn is_row_stochastic(matrix: &TransitionMatrix, index: usize, tolerance: f64) -> bool {
    index < matrix.size() && (row_sum(matrix, index) - 1.0).abs() <= tolerance
}

/// Validate every row.
pub fn validate(matrix: &TransitionMatrix, tolerance: f64) -> MatrixReport {
    let invalid_rows: BTreeSet<usize> = (0..matrix.size())
        .filter(|&i| !is_row_stochastic(matrix, i, tolerance))
        .collect();

    MatrixReport {
        valid: invalid_rows.is_empty(),
        invalid_rows,
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatrixReport {
    /// True when every row is within tolerance.
    pub valid: bool,

    /// Rows whose sum is off by more than the tolerance.
    pub invalid_rows: BTreeSet<usize>,
}

impl MatrixReport {
    /// Display warning, if any row is off.
    pub fn warning(&self) -> Option<&'static str> {
        (!self.valid).then_some(ROW_SUM_WARNING)
    }

    /// Convert a failing report into the error used to refuse a simulation start.
    pub fn into_result(self) -> Result<(), ChainError> {
        if self.valid {
            Ok(())
        } else {
            Err(ChainError::InvalidMatrix {
                invalid_rows: self.invalid_rows,
            })
        }
    }
}
