use serde::{Deserialize, Serialize};

/// One selectable alternative. Created with the environment and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arm {
    pub id: usize,
    pub true_payoff_rate: f64,
    pub category: String,
    #[serde(default)]
    pub feature_vector: Option<Vec<f64>>,
}

/// Outcome of a single select/update round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Zero-based. Report rows number rounds from 1, i.e. `round_index + 1`.
    pub round_index: u64,
    pub arm_chosen: usize,
    /// Observed click (0 or 1).
    pub reward: u8,
    /// Whether the policy picked this arm as an exploration move.
    pub explored: bool,
    /// Uniform draw the reward was decided with.
    pub noise: f64,
    /// True payoff rate of the chosen arm.
    pub expected_reward: f64,
    /// True payoff rate of the best arm.
    pub optimal_reward: f64,
    pub instantaneous_regret: f64,
}

/// Full record of one policy run against one environment realization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub policy_name: String,
    pub seed: u64,
    pub n_arms: usize,
    pub records: Vec<RoundRecord>,
    pub cumulative_regret: Vec<f64>,
    pub cumulative_reward: Vec<u64>,
}

impl TrialResult {
    pub fn n_rounds(&self) -> usize {
        self.records.len()
    }

    pub fn terminal_regret(&self) -> f64 {
        self.cumulative_regret.last().copied().unwrap_or(0.0)
    }

    pub fn total_reward(&self) -> u64 {
        self.cumulative_reward.last().copied().unwrap_or(0)
    }

    /// Realized click-through rate after round `index` (0-based).
    pub fn ctr_at(&self, index: usize) -> f64 {
        match self.cumulative_reward.get(index) {
            Some(&clicks) => clicks as f64 / (index + 1) as f64,
            None => 0.0,
        }
    }

    pub fn terminal_ctr(&self) -> f64 {
        if self.records.is_empty() {
            0.0
        } else {
            self.ctr_at(self.records.len() - 1)
        }
    }

    pub fn ctr_curve(&self) -> Vec<f64> {
        (0..self.cumulative_reward.len())
            .map(|i| self.ctr_at(i))
            .collect()
    }

    /// How many times each arm was chosen over the trial.
    pub fn selection_counts(&self) -> Vec<u64> {
        let mut counts = vec![0u64; self.n_arms];
        for record in &self.records {
            if let Some(slot) = counts.get_mut(record.arm_chosen) {
                *slot += 1;
            }
        }
        counts
    }

    pub fn exploration_ratio(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let explored = self.records.iter().filter(|r| r.explored).count();
        explored as f64 / self.records.len() as f64
    }
}

/// Mean and population variance of a sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub mean: f64,
    pub variance: f64,
}

impl Moments {
    pub fn std_dev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }
}

/// Welford accumulator for [`Moments`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMoments {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningMoments {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn moments(&self) -> Moments {
        if self.count == 0 {
            return Moments::default();
        }
        Moments {
            mean: self.mean,
            variance: (self.m2 / self.count as f64).max(0.0),
        }
    }
}

/// Statistics for one policy aggregated across repetitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub name: String,
    pub completed_repetitions: usize,
    pub terminal_regret: Moments,
    pub terminal_ctr: Moments,
    pub total_reward: Moments,
    pub exploration_ratio: f64,
    /// Per-round mean/variance of cumulative regret.
    pub regret_curve: Vec<Moments>,
    /// Per-round mean/variance of realized CTR.
    pub ctr_curve: Vec<Moments>,
    pub selection_counts: Vec<u64>,
    pub selection_frequency: Vec<f64>,
}

/// A trial that did not complete. Reported, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialFailure {
    pub policy: String,
    pub repetition: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub n_arms: usize,
    pub n_rounds: usize,
    pub n_repetitions: usize,
    pub base_seed: u64,
    pub policies: Vec<PolicySummary>,
    pub failures: Vec<TrialFailure>,
}

impl ComparisonResult {
    pub fn get(&self, name: &str) -> Option<&PolicySummary> {
        self.policies.iter().find(|p| p.name == name)
    }

    /// Policy with the lowest mean terminal regret among those that completed.
    pub fn best_policy(&self) -> Option<&PolicySummary> {
        self.policies
            .iter()
            .filter(|p| p.completed_repetitions > 0)
            .min_by(|a, b| {
                a.terminal_regret
                    .mean
                    .partial_cmp(&b.terminal_regret.mean)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}
