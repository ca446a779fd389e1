//! CLI command implementations.

pub mod chain;
pub mod config;
pub mod run;
