//! Simulation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use markov_stepper_core::DEFAULT_TOLERANCE;

/// Configuration for a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Delay between simulation ticks, in milliseconds.
    pub tick_interval_ms: u64,

    /// Allowed deviation of a row sum from 1.0.
    pub tolerance: f64,

    /// Fewest states a chain may be reduced to by deletion.
    pub min_states: usize,

    /// Probability given to an edge created with `add_edge`.
    pub default_edge_probability: f64,

    /// State count used when no explicit count is given.
    pub default_node_count: usize,

    /// Seed for the simulation RNG. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1500,
            tolerance: DEFAULT_TOLERANCE,
            min_states: 2,
            default_edge_probability: 0.5,
            default_node_count: 5,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Create a config for quick runs (short ticks).
    pub fn fast() -> Self {
        Self {
            tick_interval_ms: 50,
            ..Default::default()
        }
    }

    /// Set a fixed RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Delay between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(1500));
        assert_eq!(config.min_states, 2);
        assert_eq!(config.tolerance, 0.001);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SimulationConfig = serde_json::from_str(r#"{"tick_interval_ms": 10}"#).unwrap();
        assert_eq!(config.tick_interval_ms, 10);
        assert_eq!(config.default_edge_probability, 0.5);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_builders() {
        let config = SimulationConfig::fast()
            .with_seed(3)
            .with_tick_interval(Duration::from_millis(20));
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.tick_interval_ms, 20);
    }

    #[test]
    fn test_huge_tick_interval_saturates() {
        let config = SimulationConfig::default().with_tick_interval(Duration::MAX);
        assert_eq!(config.tick_interval_ms, u64::MAX);
    }
}
