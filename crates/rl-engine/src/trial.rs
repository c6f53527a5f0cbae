//! Trial runner: drives one policy against one reward source for `n_rounds`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bandit_lab_core::error::{BanditError, BanditResult};
use bandit_lab_core::types::{RoundRecord, TrialResult};
use tracing::debug;

use crate::bandits::BanditPolicy;
use crate::environment::RewardSource;
use crate::seed::{stream_rng, Stream};

/// Shared cancellation flag, checked between rounds.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run one trial. All randomness is derived from `seed`: reward noise,
/// contexts and policy draws each use their own stream.
pub fn run_trial<P: BanditPolicy>(
    name: &str,
    policy: &mut P,
    source: &RewardSource,
    n_rounds: usize,
    seed: u64,
) -> BanditResult<TrialResult> {
    run_trial_with_cancel(name, policy, source, n_rounds, seed, &CancellationToken::new())
}

pub fn run_trial_with_cancel<P: BanditPolicy>(
    name: &str,
    policy: &mut P,
    source: &RewardSource,
    n_rounds: usize,
    seed: u64,
    cancel: &CancellationToken,
) -> BanditResult<TrialResult> {
    if n_rounds == 0 {
        return Err(BanditError::invalid("n_rounds", "must be greater than 0"));
    }
    if policy.n_arms() != source.n_arms() {
        return Err(BanditError::InconsistentConfiguration(format!(
            "policy `{name}` has {} arms, environment has {}",
            policy.n_arms(),
            source.n_arms()
        )));
    }
    if let Some(dim) = policy.context_dim() {
        let available = source.context_dim().unwrap_or(0);
        if available != dim {
            return Err(BanditError::DimensionMismatch {
                expected: dim,
                actual: available,
            });
        }
    }

    debug!(policy = name, seed, n_rounds, "Trial starting");

    let mut noise_rng = stream_rng(seed, Stream::RewardNoise);
    let mut context_rng = stream_rng(seed, Stream::Context);
    let mut policy_rng = stream_rng(seed, Stream::Policy);

    let optimal = source.best_rate();
    let mut records = Vec::with_capacity(n_rounds);
    let mut cumulative_regret = Vec::with_capacity(n_rounds);
    let mut cumulative_reward = Vec::with_capacity(n_rounds);
    let mut regret_total = 0.0;
    let mut reward_total = 0u64;

    for round in 0..n_rounds {
        if cancel.is_cancelled() {
            debug!(policy = name, seed, round, "Trial cancelled");
            return Err(BanditError::Cancelled);
        }

        // Every policy sees the same context sequence, contextual or not.
        let context = match source.context_dim() {
            Some(_) => Some(source.next_context(&mut context_rng)?),
            None => None,
        };
        let ctx = context.as_deref();

        let selection = policy.select(&mut policy_rng, ctx)?;
        let draw = source.sample_reward(selection.arm, ctx, &mut noise_rng)?;
        policy.update(selection.arm, draw.reward, ctx)?;

        let expected = source.true_rate(selection.arm)?;
        let regret = (optimal - expected).max(0.0);
        regret_total += regret;
        reward_total += u64::from(draw.reward);

        records.push(RoundRecord {
            round_index: round as u64,
            arm_chosen: selection.arm,
            reward: draw.reward,
            explored: selection.explored,
            noise: draw.noise,
            expected_reward: expected,
            optimal_reward: optimal,
            instantaneous_regret: regret,
        });
        cumulative_regret.push(regret_total);
        cumulative_reward.push(reward_total);
    }

    debug!(
        policy = name,
        seed,
        total_reward = reward_total,
        regret = regret_total,
        "Trial finished"
    );

    Ok(TrialResult {
        policy_name: name.to_string(),
        seed,
        n_arms: source.n_arms(),
        records,
        cumulative_regret,
        cumulative_reward,
    })
}
