//! Comparison aggregator: repeated trials across policies, averaged per round.
//!
//! Repetition `r` uses one environment realization and one seed for every
//! policy, so policies differ only by their decisions. Trials run on a rayon
//! pool, each writing to its own slot; aggregation happens once all slots are
//! filled.

use std::collections::HashSet;

use bandit_lab_core::config::SimulationConfig;
use bandit_lab_core::error::{BanditError, BanditResult};
use bandit_lab_core::types::{
    ComparisonResult, PolicySummary, RunningMoments, TrialFailure, TrialResult,
};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::bandits::{BanditPolicy, Policy};
use crate::environment::RewardSource;
use crate::seed::repetition_seed;
use crate::trial::{run_trial_with_cancel, CancellationToken};

/// A policy prototype. Every trial starts from a fresh clone.
#[derive(Debug, Clone)]
pub struct NamedPolicy {
    pub name: String,
    pub policy: Policy,
}

impl NamedPolicy {
    pub fn new(name: impl Into<String>, policy: Policy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub n_rounds: usize,
    pub n_repetitions: usize,
    pub base_seed: u64,
    /// Trial pool size; `None` uses the global rayon pool.
    pub worker_threads: Option<usize>,
    pub cancel: CancellationToken,
}

impl CompareOptions {
    pub fn new(n_rounds: usize, n_repetitions: usize, base_seed: u64) -> Self {
        Self {
            n_rounds,
            n_repetitions,
            base_seed,
            worker_threads: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Outcome of one `(policy, repetition)` job.
#[derive(Debug)]
pub struct TrialSlot {
    pub policy_index: usize,
    pub repetition: usize,
    pub outcome: BanditResult<TrialResult>,
}

pub fn compare<F>(
    policies: &[NamedPolicy],
    reward_source_factory: F,
    n_rounds: usize,
    n_repetitions: usize,
    base_seed: u64,
) -> BanditResult<ComparisonResult>
where
    F: Fn(u64) -> BanditResult<RewardSource>,
{
    compare_with(
        policies,
        reward_source_factory,
        &CompareOptions::new(n_rounds, n_repetitions, base_seed),
    )
}

pub fn compare_with<F>(
    policies: &[NamedPolicy],
    reward_source_factory: F,
    options: &CompareOptions,
) -> BanditResult<ComparisonResult>
where
    F: Fn(u64) -> BanditResult<RewardSource>,
{
    let environments = prepare(policies, reward_source_factory, options)?;
    let n_arms = environments.first().map(|e| e.n_arms()).unwrap_or(0);

    info!(
        policies = policies.len(),
        n_rounds = options.n_rounds,
        n_repetitions = options.n_repetitions,
        base_seed = options.base_seed,
        "Comparison starting"
    );

    let slots = run_batch(policies, &environments, options)?;
    let result = aggregate(policies, slots, n_arms, options);

    info!(
        completed = result
            .policies
            .iter()
            .map(|p| p.completed_repetitions)
            .sum::<usize>(),
        failures = result.failures.len(),
        "Comparison finished"
    );
    Ok(result)
}

/// Validate and compare straight from a [`SimulationConfig`].
pub fn compare_config(config: &SimulationConfig) -> BanditResult<ComparisonResult> {
    config.validate()?;
    let n_arms = config.arm_count();
    let policies = config
        .policies
        .iter()
        .map(|entry| {
            Policy::from_config(&entry.policy, n_arms, config.context.dim)
                .map(|policy| NamedPolicy::new(entry.name.clone(), policy))
        })
        .collect::<BanditResult<Vec<_>>>()?;

    let options = CompareOptions {
        worker_threads: config.worker_threads,
        ..CompareOptions::new(config.n_rounds, config.n_repetitions, config.seed)
    };
    compare_with(
        &policies,
        |seed| RewardSource::from_config(config, seed),
        &options,
    )
}

/// Checks that must pass before any trial runs. Builds one environment per repetition.
/// Context dimensions are checked per trial, so a mismatch only fails that policy.
fn prepare<F>(
    policies: &[NamedPolicy],
    factory: F,
    options: &CompareOptions,
) -> BanditResult<Vec<RewardSource>>
where
    F: Fn(u64) -> BanditResult<RewardSource>,
{
    if options.n_repetitions < 1 {
        return Err(BanditError::InconsistentConfiguration(
            "n_repetitions must be at least 1".to_string(),
        ));
    }
    if options.n_rounds == 0 {
        return Err(BanditError::invalid("n_rounds", "must be greater than 0"));
    }
    if policies.is_empty() {
        return Err(BanditError::InconsistentConfiguration(
            "no policies to compare".to_string(),
        ));
    }
    let mut names = HashSet::new();
    for p in policies {
        if !names.insert(p.name.as_str()) {
            return Err(BanditError::InconsistentConfiguration(format!(
                "duplicate policy name `{}`",
                p.name
            )));
        }
    }

    let environments = (0..options.n_repetitions)
        .map(|r| factory(repetition_seed(options.base_seed, r)))
        .collect::<BanditResult<Vec<_>>>()?;

    for env in &environments {
        for p in policies {
            if p.policy.n_arms() != env.n_arms() {
                return Err(BanditError::InconsistentConfiguration(format!(
                    "policy `{}` has {} arms, environment has {}",
                    p.name,
                    p.policy.n_arms(),
                    env.n_arms()
                )));
            }
        }
    }
    Ok(environments)
}

/// Map phase: run every `(policy, repetition)` trial. `environments[r]` is
/// shared read-only by all policies for repetition `r`.
pub fn run_batch(
    policies: &[NamedPolicy],
    environments: &[RewardSource],
    options: &CompareOptions,
) -> BanditResult<Vec<TrialSlot>> {
    let jobs: Vec<(usize, usize)> = (0..policies.len())
        .flat_map(|p| (0..environments.len()).map(move |r| (p, r)))
        .collect();

    let run = || {
        jobs.par_iter()
            .map(|&(policy_index, repetition)| {
                let proto = &policies[policy_index];
                let mut policy = proto.policy.clone();
                let outcome = run_trial_with_cancel(
                    &proto.name,
                    &mut policy,
                    &environments[repetition],
                    options.n_rounds,
                    repetition_seed(options.base_seed, repetition),
                    &options.cancel,
                );
                TrialSlot {
                    policy_index,
                    repetition,
                    outcome,
                }
            })
            .collect::<Vec<_>>()
    };

    match options.worker_threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| BanditError::InvalidState(format!("trial pool: {e}")))?;
            Ok(pool.install(run))
        }
        None => Ok(run()),
    }
}

/// Reduce phase: fold completed trials into per-policy summaries; failed or
/// cancelled trials are reported and left out of every statistic.
pub fn aggregate(
    policies: &[NamedPolicy],
    slots: Vec<TrialSlot>,
    n_arms: usize,
    options: &CompareOptions,
) -> ComparisonResult {
    let n_rounds = options.n_rounds;
    let mut accumulators: Vec<PolicyAccumulator> = policies
        .iter()
        .map(|_| PolicyAccumulator::new(n_arms, n_rounds))
        .collect();
    let mut failures = Vec::new();

    let mut slots = slots;
    slots.sort_by_key(|s| (s.policy_index, s.repetition));

    for slot in slots {
        let name = &policies[slot.policy_index].name;
        match slot.outcome {
            Ok(trial) => accumulators[slot.policy_index].merge(&trial),
            Err(e) => {
                warn!(policy = %name, repetition = slot.repetition, error = %e, "Trial failed");
                failures.push(TrialFailure {
                    policy: name.clone(),
                    repetition: slot.repetition,
                    error: e.to_string(),
                });
            }
        }
    }

    let summaries = policies
        .iter()
        .zip(accumulators)
        .map(|(p, acc)| acc.finish(&p.name))
        .collect();

    ComparisonResult {
        n_arms,
        n_rounds,
        n_repetitions: options.n_repetitions,
        base_seed: options.base_seed,
        policies: summaries,
        failures,
    }
}

struct PolicyAccumulator {
    completed: usize,
    terminal_regret: RunningMoments,
    terminal_ctr: RunningMoments,
    total_reward: RunningMoments,
    exploration: RunningMoments,
    regret_curve: Vec<RunningMoments>,
    ctr_curve: Vec<RunningMoments>,
    selection_counts: Vec<u64>,
}

impl PolicyAccumulator {
    fn new(n_arms: usize, n_rounds: usize) -> Self {
        Self {
            completed: 0,
            terminal_regret: RunningMoments::default(),
            terminal_ctr: RunningMoments::default(),
            total_reward: RunningMoments::default(),
            exploration: RunningMoments::default(),
            regret_curve: vec![RunningMoments::default(); n_rounds],
            ctr_curve: vec![RunningMoments::default(); n_rounds],
            selection_counts: vec![0; n_arms],
        }
    }

    fn merge(&mut self, trial: &TrialResult) {
        self.completed += 1;
        self.terminal_regret.push(trial.terminal_regret());
        self.terminal_ctr.push(trial.terminal_ctr());
        self.total_reward.push(trial.total_reward() as f64);
        self.exploration.push(trial.exploration_ratio());

        for (acc, regret) in self.regret_curve.iter_mut().zip(&trial.cumulative_regret) {
            acc.push(*regret);
        }
        for (i, acc) in self.ctr_curve.iter_mut().enumerate().take(trial.n_rounds()) {
            acc.push(trial.ctr_at(i));
        }
        for (slot, count) in self.selection_counts.iter_mut().zip(trial.selection_counts()) {
            *slot += count;
        }
    }

    fn finish(self, name: &str) -> PolicySummary {
        let total: u64 = self.selection_counts.iter().sum();
        let selection_frequency = self
            .selection_counts
            .iter()
            .map(|&c| if total > 0 { c as f64 / total as f64 } else { 0.0 })
            .collect();

        PolicySummary {
            name: name.to_string(),
            completed_repetitions: self.completed,
            terminal_regret: self.terminal_regret.moments(),
            terminal_ctr: self.terminal_ctr.moments(),
            total_reward: self.total_reward.moments(),
            exploration_ratio: self.exploration.moments().mean,
            regret_curve: self.regret_curve.iter().map(|m| m.moments()).collect(),
            ctr_curve: self.ctr_curve.iter().map(|m| m.moments()).collect(),
            selection_counts: self.selection_counts,
            selection_frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arms::ArmRegistry;
    use crate::bandits::{EpsilonGreedy, FixedArm, ThompsonSampling, Ucb};
    use crate::contextual::LinUcb;

    fn fixed_rates(rates: &'static [f64]) -> impl Fn(u64) -> BanditResult<RewardSource> {
        move |seed| Ok(RewardSource::new(ArmRegistry::from_rates(rates, None, seed)?))
    }

    fn standard_policies(n_arms: usize) -> Vec<NamedPolicy> {
        vec![
            NamedPolicy::new(
                "eg",
                Policy::EpsilonGreedy(EpsilonGreedy::new(n_arms, 0.1).unwrap()),
            ),
            NamedPolicy::new("ucb", Policy::Ucb(Ucb::new(n_arms, 2.0).unwrap())),
            NamedPolicy::new(
                "ts",
                Policy::Thompson(ThompsonSampling::new(n_arms, 1.0, 1.0).unwrap()),
            ),
        ]
    }

    #[test]
    fn test_compare_produces_summary_per_policy() {
        let result = compare(
            &standard_policies(3),
            fixed_rates(&[0.1, 0.2, 0.3]),
            200,
            4,
            42,
        )
        .unwrap();

        assert_eq!(result.policies.len(), 3);
        assert!(result.failures.is_empty());
        for p in &result.policies {
            assert_eq!(p.completed_repetitions, 4);
            assert_eq!(p.regret_curve.len(), 200);
            assert_eq!(p.ctr_curve.len(), 200);
            assert_eq!(p.selection_counts.iter().sum::<u64>(), 800);
            let freq: f64 = p.selection_frequency.iter().sum();
            assert!((freq - 1.0).abs() < 1e-9);
            assert!(
                (p.regret_curve.last().unwrap().mean - p.terminal_regret.mean).abs() < 1e-9
            );
        }
    }

    #[test]
    fn test_compare_is_reproducible() {
        let a = compare(&standard_policies(3), fixed_rates(&[0.1, 0.2, 0.3]), 100, 3, 7)
            .unwrap();
        let b = compare(&standard_policies(3), fixed_rates(&[0.1, 0.2, 0.3]), 100, 3, 7)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_worker_pool_matches_global_pool() {
        let policies = standard_policies(3);
        let mut options = CompareOptions::new(100, 3, 11);
        let global = compare_with(&policies, fixed_rates(&[0.1, 0.2, 0.3]), &options).unwrap();
        options.worker_threads = Some(2);
        let pooled = compare_with(&policies, fixed_rates(&[0.1, 0.2, 0.3]), &options).unwrap();
        assert_eq!(global, pooled);
    }

    #[test]
    fn test_fixed_arms_see_same_noise() {
        let policies = vec![
            NamedPolicy::new("arm0", Policy::FixedArm(FixedArm::new(2, 0).unwrap())),
            NamedPolicy::new("arm1", Policy::FixedArm(FixedArm::new(2, 1).unwrap())),
        ];
        let options = CompareOptions::new(50, 3, 99);
        let envs = prepare(&policies, fixed_rates(&[0.4, 0.6]), &options).unwrap();
        let slots = run_batch(&policies, &envs, &options).unwrap();

        for r in 0..3 {
            let noise = |p: usize| -> Vec<f64> {
                let slot = slots
                    .iter()
                    .find(|s| s.policy_index == p && s.repetition == r)
                    .unwrap();
                let trial = slot.outcome.as_ref().unwrap();
                trial.records.iter().map(|rec| rec.noise).collect()
            };
            assert_eq!(noise(0), noise(1));
        }
    }

    #[test]
    fn test_zero_repetitions_inconsistent() {
        assert!(matches!(
            compare(&standard_policies(3), fixed_rates(&[0.1, 0.2, 0.3]), 10, 0, 1),
            Err(BanditError::InconsistentConfiguration(_))
        ));
    }

    #[test]
    fn test_arm_count_mismatch_inconsistent() {
        assert!(matches!(
            compare(&standard_policies(4), fixed_rates(&[0.1, 0.2, 0.3]), 10, 2, 1),
            Err(BanditError::InconsistentConfiguration(_))
        ));
    }

    #[test]
    fn test_cancelled_trials_are_reported_not_merged() {
        let policies = standard_policies(2);
        let options = CompareOptions::new(10, 2, 3);
        options.cancel.cancel();
        let result = compare_with(&policies, fixed_rates(&[0.2, 0.3]), &options).unwrap();
        assert_eq!(result.failures.len(), 6);
        assert!(result.policies.iter().all(|p| p.completed_repetitions == 0));
        assert!(result.best_policy().is_none());
    }

    #[test]
    fn test_context_mismatch_fails_only_that_policy() {
        let policies = vec![
            NamedPolicy::new(
                "eg",
                Policy::EpsilonGreedy(EpsilonGreedy::new(2, 0.1).unwrap()),
            ),
            NamedPolicy::new("lin", Policy::LinUcb(LinUcb::new(2, 4, 1.0, 1.0).unwrap())),
        ];
        let factory = |seed: u64| -> BanditResult<RewardSource> {
            let registry = ArmRegistry::from_rates(&[0.2, 0.4], Some(3), seed)?;
            RewardSource::with_context(registry, 3, 0.1, 0.95)
        };
        let result = compare(&policies, factory, 20, 2, 5).unwrap();

        let eg = result.get("eg").unwrap();
        assert_eq!(eg.completed_repetitions, 2);
        assert_eq!(eg.selection_counts.iter().sum::<u64>(), 40);
        assert_eq!(result.get("lin").unwrap().completed_repetitions, 0);
        assert_eq!(result.failures.len(), 2);
        for failure in &result.failures {
            assert_eq!(failure.policy, "lin");
            assert_eq!(
                failure.error,
                BanditError::DimensionMismatch {
                    expected: 4,
                    actual: 3
                }
                .to_string()
            );
        }
        assert_eq!(result.best_policy().unwrap().name, "eg");
    }

    #[test]
    fn test_compare_config_defaults() {
        let config = SimulationConfig {
            n_rounds: 100,
            n_repetitions: 2,
            ..Default::default()
        };
        let result = compare_config(&config).unwrap();
        assert_eq!(result.n_arms, 10);
        assert_eq!(result.policies.len(), 3);
        assert_eq!(result.time_series_rows().len(), 300);
    }

    #[test]
    fn test_compare_config_rejects_bad_parameter() {
        let mut config = SimulationConfig::default();
        config.policies[1].policy = bandit_lab_core::PolicyConfig::Ucb { c: -1.0 };
        assert!(matches!(
            compare_config(&config),
            Err(BanditError::InvalidParameter { ref field, .. }) if field == "policies[1].c"
        ));
    }
}
