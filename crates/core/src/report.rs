//! Flat row views of a [`ComparisonResult`] for the presentation layer.

use serde::Serialize;

use crate::types::ComparisonResult;

/// One row per policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub policy: String,
    pub completed_repetitions: usize,
    pub mean_terminal_regret: f64,
    pub var_terminal_regret: f64,
    pub mean_ctr: f64,
    pub var_ctr: f64,
    pub mean_total_reward: f64,
    pub std_total_reward: f64,
    pub exploration_ratio: f64,
    pub selection_counts: Vec<u64>,
    pub selection_frequency: Vec<f64>,
}

/// One row per round per policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesRow {
    pub policy: String,
    /// One-based: the row for `RoundRecord::round_index == i` has `round == i + 1`.
    pub round: usize,
    pub mean_cumulative_regret: f64,
    pub var_cumulative_regret: f64,
    pub mean_ctr: f64,
    pub var_ctr: f64,
}

impl ComparisonResult {
    pub fn summary_rows(&self) -> Vec<SummaryRow> {
        self.policies
            .iter()
            .map(|p| SummaryRow {
                policy: p.name.clone(),
                completed_repetitions: p.completed_repetitions,
                mean_terminal_regret: p.terminal_regret.mean,
                var_terminal_regret: p.terminal_regret.variance,
                mean_ctr: p.terminal_ctr.mean,
                var_ctr: p.terminal_ctr.variance,
                mean_total_reward: p.total_reward.mean,
                std_total_reward: p.total_reward.std_dev(),
                exploration_ratio: p.exploration_ratio,
                selection_counts: p.selection_counts.clone(),
                selection_frequency: p.selection_frequency.clone(),
            })
            .collect()
    }

    /// Rows are grouped by policy in configuration order, rounds ascending (1-based).
    pub fn time_series_rows(&self) -> Vec<TimeSeriesRow> {
        let mut rows = Vec::with_capacity(self.policies.len() * self.n_rounds);
        for p in &self.policies {
            for (i, (regret, ctr)) in p.regret_curve.iter().zip(&p.ctr_curve).enumerate() {
                rows.push(TimeSeriesRow {
                    policy: p.name.clone(),
                    round: i + 1,
                    mean_cumulative_regret: regret.mean,
                    var_cumulative_regret: regret.variance,
                    mean_ctr: ctr.mean,
                    var_ctr: ctr.variance,
                });
            }
        }
        rows
    }
}
