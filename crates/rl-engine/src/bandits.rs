//! Multi-Armed Bandit policies: Epsilon-Greedy, UCB1, Thompson Sampling and a
//! fixed-arm control, plus the [`Policy`] sum type the trial runner drives.
//!
//! Every policy honours the same two-phase protocol: `select` reads state and
//! the caller's random stream, `update` mutates the chosen arm only.

use bandit_lab_core::config::PolicyConfig;
use bandit_lab_core::error::{BanditError, BanditResult};
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta as BetaPosterior, ContinuousCDF};

use crate::contextual::LinUcb;

/// Shared baseline state every policy keeps per arm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmStats {
    pub pull_count: u64,
    /// Running mean of observed rewards.
    pub value_estimate: f64,
}

impl ArmStats {
    pub(crate) fn observe(&mut self, reward: f64) {
        self.value_estimate += (reward - self.value_estimate) / (self.pull_count + 1) as f64;
        self.pull_count += 1;
    }
}

/// Chosen arm and whether the choice was an exploration move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub arm: usize,
    pub explored: bool,
}

pub trait BanditPolicy {
    fn n_arms(&self) -> usize;

    /// Feature dimension for contextual policies.
    fn context_dim(&self) -> Option<usize> {
        None
    }

    /// Pick an arm without touching policy state.
    fn select<R: Rng>(&self, rng: &mut R, context: Option<&[f64]>) -> BanditResult<Selection>;

    fn select_arm<R: Rng>(&self, rng: &mut R, context: Option<&[f64]>) -> BanditResult<usize> {
        self.select(rng, context).map(|s| s.arm)
    }

    /// Record the binary reward observed for `arm`.
    fn update(&mut self, arm: usize, reward: u8, context: Option<&[f64]>) -> BanditResult<()>;

    fn arm_stats(&self) -> &[ArmStats];
}

pub(crate) fn ensure_arms(n_arms: usize) -> BanditResult<()> {
    if n_arms == 0 {
        Err(BanditError::InvalidState(
            "cannot select from zero arms".to_string(),
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn check_arm(arm: usize, n_arms: usize) -> BanditResult<()> {
    if arm < n_arms {
        Ok(())
    } else {
        Err(BanditError::ArmOutOfRange { arm, n_arms })
    }
}

pub(crate) fn check_reward(reward: u8) -> BanditResult<f64> {
    match reward {
        0 => Ok(0.0),
        1 => Ok(1.0),
        other => Err(BanditError::invalid(
            "reward",
            format!("must be 0 or 1, got {other}"),
        )),
    }
}

/// Index of the largest score; the lowest index wins ties.
pub(crate) fn argmax(scores: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.into_iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

// ─── Epsilon-Greedy ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    epsilon: f64,
    stats: Vec<ArmStats>,
}

impl EpsilonGreedy {
    pub fn new(n_arms: usize, epsilon: f64) -> BanditResult<Self> {
        PolicyConfig::EpsilonGreedy { epsilon }.validate("", n_arms)?;
        Ok(Self {
            epsilon,
            stats: vec![ArmStats::default(); n_arms],
        })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl BanditPolicy for EpsilonGreedy {
    fn n_arms(&self) -> usize {
        self.stats.len()
    }

    fn select<R: Rng>(&self, rng: &mut R, _context: Option<&[f64]>) -> BanditResult<Selection> {
        ensure_arms(self.stats.len())?;
        if rng.gen::<f64>() < self.epsilon {
            return Ok(Selection {
                arm: rng.gen_range(0..self.stats.len()),
                explored: true,
            });
        }
        let arm = argmax(self.stats.iter().map(|s| s.value_estimate)).unwrap_or(0);
        Ok(Selection {
            arm,
            explored: false,
        })
    }

    fn update(&mut self, arm: usize, reward: u8, _context: Option<&[f64]>) -> BanditResult<()> {
        check_arm(arm, self.stats.len())?;
        let r = check_reward(reward)?;
        self.stats[arm].observe(r);
        Ok(())
    }

    fn arm_stats(&self) -> &[ArmStats] {
        &self.stats
    }
}

// ─── UCB1 ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Ucb {
    c: f64,
    stats: Vec<ArmStats>,
}

impl Ucb {
    pub fn new(n_arms: usize, c: f64) -> BanditResult<Self> {
        PolicyConfig::Ucb { c }.validate("", n_arms)?;
        Ok(Self {
            c,
            stats: vec![ArmStats::default(); n_arms],
        })
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn total_pulls(&self) -> u64 {
        self.stats.iter().map(|s| s.pull_count).sum()
    }

    /// Upper confidence bound per arm; untried arms score `+inf`.
    pub fn ucb_scores(&self) -> Vec<f64> {
        let log_total = (self.total_pulls().max(1) as f64).ln();
        self.stats
            .iter()
            .map(|s| {
                if s.pull_count == 0 {
                    f64::INFINITY
                } else {
                    s.value_estimate + self.c * (log_total / s.pull_count as f64).sqrt()
                }
            })
            .collect()
    }
}

impl BanditPolicy for Ucb {
    fn n_arms(&self) -> usize {
        self.stats.len()
    }

    fn select<R: Rng>(&self, _rng: &mut R, _context: Option<&[f64]>) -> BanditResult<Selection> {
        ensure_arms(self.stats.len())?;
        if let Some(untried) = self.stats.iter().position(|s| s.pull_count == 0) {
            return Ok(Selection {
                arm: untried,
                explored: true,
            });
        }
        let arm = argmax(self.ucb_scores()).unwrap_or(0);
        Ok(Selection {
            arm,
            explored: false,
        })
    }

    fn update(&mut self, arm: usize, reward: u8, _context: Option<&[f64]>) -> BanditResult<()> {
        check_arm(arm, self.stats.len())?;
        let r = check_reward(reward)?;
        self.stats[arm].observe(r);
        Ok(())
    }

    fn arm_stats(&self) -> &[ArmStats] {
        &self.stats
    }
}

// ─── Thompson Sampling ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ThompsonSampling {
    alpha_prior: f64,
    beta_prior: f64,
    alpha: Vec<f64>,
    beta: Vec<f64>,
    stats: Vec<ArmStats>,
}

impl ThompsonSampling {
    pub fn new(n_arms: usize, alpha_prior: f64, beta_prior: f64) -> BanditResult<Self> {
        PolicyConfig::Thompson {
            alpha_prior,
            beta_prior,
        }
        .validate("", n_arms)?;
        Ok(Self {
            alpha_prior,
            beta_prior,
            alpha: vec![alpha_prior; n_arms],
            beta: vec![beta_prior; n_arms],
            stats: vec![ArmStats::default(); n_arms],
        })
    }

    pub fn priors(&self) -> (f64, f64) {
        (self.alpha_prior, self.beta_prior)
    }

    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    pub fn posterior_means(&self) -> Vec<f64> {
        self.alpha
            .iter()
            .zip(&self.beta)
            .map(|(a, b)| a / (a + b))
            .collect()
    }

    /// Equal-tailed credible interval per arm at `level` (e.g. 0.95).
    pub fn credible_intervals(&self, level: f64) -> BanditResult<Vec<(f64, f64)>> {
        if !(level.is_finite() && level > 0.0 && level < 1.0) {
            return Err(BanditError::invalid(
                "level",
                format!("must be within (0, 1), got {level}"),
            ));
        }
        let tail = (1.0 - level) / 2.0;
        self.alpha
            .iter()
            .zip(&self.beta)
            .map(|(&a, &b)| {
                let posterior = BetaPosterior::new(a, b)
                    .map_err(|e| BanditError::InvalidState(format!("beta({a}, {b}): {e}")))?;
                Ok((posterior.inverse_cdf(tail), posterior.inverse_cdf(1.0 - tail)))
            })
            .collect()
    }
}

impl BanditPolicy for ThompsonSampling {
    fn n_arms(&self) -> usize {
        self.stats.len()
    }

    fn select<R: Rng>(&self, rng: &mut R, _context: Option<&[f64]>) -> BanditResult<Selection> {
        ensure_arms(self.stats.len())?;
        let mut samples = Vec::with_capacity(self.alpha.len());
        for (&a, &b) in self.alpha.iter().zip(&self.beta) {
            let dist = Beta::new(a, b)
                .map_err(|e| BanditError::InvalidState(format!("beta({a}, {b}): {e}")))?;
            samples.push(dist.sample(rng));
        }
        let arm = argmax(samples).unwrap_or(0);
        Ok(Selection {
            arm,
            explored: false,
        })
    }

    fn update(&mut self, arm: usize, reward: u8, _context: Option<&[f64]>) -> BanditResult<()> {
        check_arm(arm, self.stats.len())?;
        let r = check_reward(reward)?;
        self.stats[arm].observe(r);
        if reward == 1 {
            self.alpha[arm] += 1.0;
        } else {
            self.beta[arm] += 1.0;
        }
        Ok(())
    }

    fn arm_stats(&self) -> &[ArmStats] {
        &self.stats
    }
}

// ─── Fixed arm (control) ────────────────────────────────────────────────────

/// Always plays the same arm. Serves as a holdout/control baseline.
#[derive(Debug, Clone)]
pub struct FixedArm {
    arm: usize,
    stats: Vec<ArmStats>,
}

impl FixedArm {
    pub fn new(n_arms: usize, arm: usize) -> BanditResult<Self> {
        PolicyConfig::FixedArm { arm }.validate("", n_arms)?;
        Ok(Self {
            arm,
            stats: vec![ArmStats::default(); n_arms],
        })
    }
}

impl BanditPolicy for FixedArm {
    fn n_arms(&self) -> usize {
        self.stats.len()
    }

    fn select<R: Rng>(&self, _rng: &mut R, _context: Option<&[f64]>) -> BanditResult<Selection> {
        ensure_arms(self.stats.len())?;
        Ok(Selection {
            arm: self.arm,
            explored: false,
        })
    }

    fn update(&mut self, arm: usize, reward: u8, _context: Option<&[f64]>) -> BanditResult<()> {
        check_arm(arm, self.stats.len())?;
        let r = check_reward(reward)?;
        self.stats[arm].observe(r);
        Ok(())
    }

    fn arm_stats(&self) -> &[ArmStats] {
        &self.stats
    }
}

// ─── Policy sum type ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Policy {
    EpsilonGreedy(EpsilonGreedy),
    Ucb(Ucb),
    Thompson(ThompsonSampling),
    LinUcb(LinUcb),
    FixedArm(FixedArm),
}

impl Policy {
    /// Build a fresh policy. `context_dim` is only used by contextual kinds.
    pub fn from_config(
        config: &PolicyConfig,
        n_arms: usize,
        context_dim: usize,
    ) -> BanditResult<Self> {
        Ok(match *config {
            PolicyConfig::EpsilonGreedy { epsilon } => {
                Policy::EpsilonGreedy(EpsilonGreedy::new(n_arms, epsilon)?)
            }
            PolicyConfig::Ucb { c } => Policy::Ucb(Ucb::new(n_arms, c)?),
            PolicyConfig::Thompson {
                alpha_prior,
                beta_prior,
            } => Policy::Thompson(ThompsonSampling::new(n_arms, alpha_prior, beta_prior)?),
            PolicyConfig::LinUcb {
                alpha_explore,
                lambda,
            } => Policy::LinUcb(LinUcb::new(n_arms, context_dim, alpha_explore, lambda)?),
            PolicyConfig::FixedArm { arm } => Policy::FixedArm(FixedArm::new(n_arms, arm)?),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Policy::EpsilonGreedy(_) => "epsilon_greedy",
            Policy::Ucb(_) => "ucb",
            Policy::Thompson(_) => "thompson",
            Policy::LinUcb(_) => "lin_ucb",
            Policy::FixedArm(_) => "fixed_arm",
        }
    }
}

impl BanditPolicy for Policy {
    fn n_arms(&self) -> usize {
        match self {
            Policy::EpsilonGreedy(p) => p.n_arms(),
            Policy::Ucb(p) => p.n_arms(),
            Policy::Thompson(p) => p.n_arms(),
            Policy::LinUcb(p) => p.n_arms(),
            Policy::FixedArm(p) => p.n_arms(),
        }
    }

    fn context_dim(&self) -> Option<usize> {
        match self {
            Policy::LinUcb(p) => p.context_dim(),
            _ => None,
        }
    }

    fn select<R: Rng>(&self, rng: &mut R, context: Option<&[f64]>) -> BanditResult<Selection> {
        match self {
            Policy::EpsilonGreedy(p) => p.select(rng, context),
            Policy::Ucb(p) => p.select(rng, context),
            Policy::Thompson(p) => p.select(rng, context),
            Policy::LinUcb(p) => p.select(rng, context),
            Policy::FixedArm(p) => p.select(rng, context),
        }
    }

    fn update(&mut self, arm: usize, reward: u8, context: Option<&[f64]>) -> BanditResult<()> {
        match self {
            Policy::EpsilonGreedy(p) => p.update(arm, reward, context),
            Policy::Ucb(p) => p.update(arm, reward, context),
            Policy::Thompson(p) => p.update(arm, reward, context),
            Policy::LinUcb(p) => p.update(arm, reward, context),
            Policy::FixedArm(p) => p.update(arm, reward, context),
        }
    }

    fn arm_stats(&self) -> &[ArmStats] {
        match self {
            Policy::EpsilonGreedy(p) => p.arm_stats(),
            Policy::Ucb(p) => p.arm_stats(),
            Policy::Thompson(p) => p.arm_stats(),
            Policy::LinUcb(p) => p.arm_stats(),
            Policy::FixedArm(p) => p.arm_stats(),
        }
    }
}
