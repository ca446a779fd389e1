//! Visit statistics accumulated over a run.

use serde::{Deserialize, Serialize};

/// Per-state visit counters plus the total number of simulated transitions.
///
/// The starting occupancy counts as a visit, so after `reset` the counters sum
/// to `total_steps + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitStats {
    visits: Vec<u64>,
    total_steps: u64,
}

impl VisitStats {
    /// Fresh statistics for `state_count` states, seeded with a visit to state 0.
    pub fn new(state_count: usize) -> Self {
        let mut stats = Self::default();
        stats.reset(state_count);
        stats
    }

    /// Restore statistics from persisted values.
    pub fn from_parts(visits: Vec<u64>, total_steps: u64) -> Self {
        Self {
            visits,
            total_steps,
        }
    }

    /// Zero every counter, then count the start at state 0.
    pub fn reset(&mut self, state_count: usize) {
        self.visits = vec![0; state_count];
        if let Some(first) = self.visits.first_mut() {
            *first = 1;
        }
        self.total_steps = 0;
    }

    /// Count an arrival at `index`. Out-of-range indices are ignored.
    pub fn record_visit(&mut self, index: usize) {
        if let Some(count) = self.visits.get_mut(index) {
            *count += 1;
        }
    }

    /// Count one simulated transition.
    pub fn record_step(&mut self) {
        self.total_steps += 1;
    }

    /// Add a zero counter for a newly created state.
    pub fn push_state(&mut self) {
        self.visits.push(0);
    }

    /// Drop the counter of a deleted state.
    pub fn remove_state(&mut self, index: usize) {
        if index < self.visits.len() {
            self.visits.remove(index);
        }
    }

    pub fn visits(&self) -> &[u64] {
        &self.visits
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Sum of all visit counters.
    pub fn total_visits(&self) -> u64 {
        self.visits.iter().sum()
    }

    /// Share of visits per state, as fractions in `[0, 1]`.
    pub fn percentages(&self) -> Vec<f64> {
        let total = self.total_visits().max(1) as f64;
        self.visits.iter().map(|&v| v as f64 / total).collect()
    }

    /// Rows for a statistics table.
    pub fn rows(&self) -> Vec<StatisticsRow> {
        self.visits
            .iter()
            .zip(self.percentages())
            .enumerate()
            .map(|(index, (&visits, percentage))| StatisticsRow {
                index,
                visits,
                percentage,
            })
            .collect()
    }
}

/// One line of the statistics table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRow {
    pub index: usize,
    pub visits: u64,
    /// Fraction of all visits, in `[0, 1]`.
    pub percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_seeds_first_state() {
        let stats = VisitStats::new(3);
        assert_eq!(stats.visits(), &[1, 0, 0]);
        assert_eq!(stats.total_steps(), 0);
        assert_eq!(stats.percentages(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_percentages_guard() {
        let stats = VisitStats::from_parts(vec![0, 0], 0);
        assert_eq!(stats.percentages(), vec![0.0, 0.0]);
        assert!(VisitStats::new(0).percentages().is_empty());
    }

    #[test]
    fn test_record_and_percentages() {
        let mut stats = VisitStats::new(2);
        stats.record_visit(1);
        stats.record_step();
        stats.record_visit(1);
        stats.record_step();
        stats.record_visit(1);
        stats.record_step();

        assert_eq!(stats.visits(), &[1, 3]);
        assert_eq!(stats.total_steps(), 3);
        assert_eq!(stats.total_visits(), stats.total_steps() + 1);
        assert_eq!(stats.percentages(), vec![0.25, 0.75]);

        let rows = stats.rows();
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[1].visits, 3);
        assert_eq!(rows[1].percentage, 0.75);
    }

    #[test]
    fn test_resize_in_lockstep() {
        let mut stats = VisitStats::from_parts(vec![4, 2, 1], 6);
        stats.push_state();
        assert_eq!(stats.visits(), &[4, 2, 1, 0]);

        stats.remove_state(1);
        assert_eq!(stats.visits(), &[4, 1, 0]);

        stats.record_visit(10);
        assert_eq!(stats.visits(), &[4, 1, 0]);
    }
}
