//! Core domain types for the Markov stepper.
//!
//! A chain is a set of states plus a square transition matrix. This crate holds the
//! pieces that carry no simulation state of their own:
//!
//! - [`StateNode`], [`Position`] and the colour palette used by the editor
//! - [`TransitionMatrix`], which keeps its N×N shape under state insertion/removal
//! - the row-stochasticity validator ([`validate`], [`MatrixReport`])
//! - the categorical sampler ([`sample_next`])
//!
//! ```text
//! matrix[i][j] = P(next = j | current = i)
//! valid        <=> |sum_j matrix[i][j] - 1| <= tolerance  for every i
//! ```

mod error;
mod matrix;
mod node;
mod sampler;
pub mod validation;

pub use error::{ChainError, ChainResult};
pub use matrix::{is_valid_probability, TransitionMatrix};
pub use node::{
    circle_layout, palette_color, Position, StateNode, CANVAS_HEIGHT, CANVAS_WIDTH,
    LAYOUT_RADIUS, NODE_PALETTE, NODE_RADIUS,
};
pub use sampler::{sample_next, sample_with};
pub use validation::{
    is_row_stochastic, row_sum, validate, MatrixReport, DEFAULT_TOLERANCE, ROW_SUM_WARNING,
};
