//! Next-state sampling from a categorical row.

use rand::Rng;
use tracing::warn;

use crate::matrix::TransitionMatrix;

/// Pick the next state for a token at `current`, given a uniform draw in `[0, 1)`.
///
/// Walks row `current` left to right and returns the first column whose
/// cumulative probability reaches `draw`. Zero cells are never chosen, even for a
/// draw of exactly 0. If the row runs out before that (a row
/// summing to less than 1, or a draw landing in rounding slack at the end of a
/// valid row) the token stays at `current`.
pub fn sample_next(matrix: &TransitionMatrix, current: usize, draw: f64) -> usize {
    let Some(row) = matrix.row(current) else {
        warn!(current, size = matrix.size(), "sample_from_missing_row");
        return current;
    };

    let mut cumulative = 0.0;
    for (j, p) in row.iter().enumerate() {
        cumulative += p;
        if *p > 0.0 && draw <= cumulative {
            return j;
        }
    }

    warn!(current, draw, row_sum = cumulative, "sample_fell_through_row");
    current
}

/// Sample the next state using a random number generator.
pub fn sample_with<R: Rng + ?Sized>(
    matrix: &TransitionMatrix,
    current: usize,
    rng: &mut R,
) -> usize {
    sample_next(matrix, current, rng.random::<f64>())
}
