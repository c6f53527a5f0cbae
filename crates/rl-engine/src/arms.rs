//! Arm registry: the static set of alternatives a policy chooses between.

use bandit_lab_core::config::{RateConfig, RateDistribution};
use bandit_lab_core::error::{ensure_unit_interval, BanditError, BanditResult};
use bandit_lab_core::types::Arm;
use rand::Rng;
use rand_distr::{Beta, Distribution, StandardNormal};

use crate::seed::{stream_rng, Stream};

pub const CATEGORIES: [&str; 8] = [
    "Politics",
    "Technology",
    "Sports",
    "Entertainment",
    "Business",
    "Science",
    "Health",
    "World",
];

/// Immutable arm set plus the best true rate, which only the environment sees.
#[derive(Debug, Clone)]
pub struct ArmRegistry {
    arms: Vec<Arm>,
    best_arm: Option<usize>,
}

impl ArmRegistry {
    pub fn new(arms: Vec<Arm>) -> BanditResult<Self> {
        for (i, arm) in arms.iter().enumerate() {
            if arm.id != i {
                return Err(BanditError::InconsistentConfiguration(format!(
                    "arm at position {i} has id {}",
                    arm.id
                )));
            }
            ensure_unit_interval(&format!("arms[{i}].true_payoff_rate"), arm.true_payoff_rate)?;
        }

        // Lowest index wins ties.
        let mut best_arm = None;
        let mut best_rate = f64::NEG_INFINITY;
        for arm in &arms {
            if arm.true_payoff_rate > best_rate {
                best_rate = arm.true_payoff_rate;
                best_arm = Some(arm.id);
            }
        }

        Ok(Self { arms, best_arm })
    }

    /// Registry with explicit rates. Feature vectors are drawn only when `feature_dim` is set.
    pub fn from_rates(rates: &[f64], feature_dim: Option<usize>, seed: u64) -> BanditResult<Self> {
        let mut rng = stream_rng(seed, Stream::Arms);
        let arms = build_arms(rates, feature_dim, &mut rng);
        Self::new(arms)
    }

    pub fn arms(&self) -> &[Arm] {
        &self.arms
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    pub fn best_arm(&self) -> Option<usize> {
        self.best_arm
    }

    pub fn best_rate(&self) -> f64 {
        self.best_arm
            .map(|i| self.arms[i].true_payoff_rate)
            .unwrap_or(0.0)
    }

    pub fn get(&self, arm: usize) -> BanditResult<&Arm> {
        self.arms.get(arm).ok_or(BanditError::ArmOutOfRange {
            arm,
            n_arms: self.arms.len(),
        })
    }

    pub fn true_rates(&self) -> Vec<f64> {
        self.arms.iter().map(|a| a.true_payoff_rate).collect()
    }
}

/// Draw `count` arms with payoff rates from `rates`, reproducible for a given seed.
pub fn generate_arms(
    count: usize,
    rates: &RateConfig,
    feature_dim: Option<usize>,
    seed: u64,
) -> BanditResult<Vec<Arm>> {
    ensure_unit_interval("rates.min", rates.min)?;
    ensure_unit_interval("rates.max", rates.max)?;
    if rates.min > rates.max {
        return Err(BanditError::invalid(
            "rates.min",
            format!("must not exceed rates.max ({}), got {}", rates.max, rates.min),
        ));
    }

    let mut rng = stream_rng(seed, Stream::Arms);
    let span = rates.max - rates.min;
    let drawn: Vec<f64> = match rates.distribution {
        RateDistribution::Uniform => (0..count)
            .map(|_| rates.min + rng.gen::<f64>() * span)
            .collect(),
        RateDistribution::Skewed => {
            let skew = Beta::new(2.0, 5.0)
                .map_err(|e| BanditError::InvalidState(format!("beta(2, 5): {e}")))?;
            let mut v: Vec<f64> = (0..count)
                .map(|_| rates.min + skew.sample(&mut rng) * span)
                .collect();
            v.sort_by(|a, b| b.total_cmp(a));
            v
        }
    };

    Ok(build_arms(&drawn, feature_dim, &mut rng))
}

fn build_arms(rates: &[f64], feature_dim: Option<usize>, rng: &mut impl Rng) -> Vec<Arm> {
    rates
        .iter()
        .enumerate()
        .map(|(i, &rate)| Arm {
            id: i,
            true_payoff_rate: rate,
            category: CATEGORIES[i % CATEGORIES.len()].to_string(),
            feature_vector: feature_dim.map(|d| unit_vector(d, &mut *rng)),
        })
        .collect()
}

/// Standard-normal direction scaled to unit length.
pub(crate) fn unit_vector(dim: usize, rng: &mut impl Rng) -> Vec<f64> {
    let mut v: Vec<f64> = (0..dim)
        .map(|_| {
            let x: f64 = StandardNormal.sample(&mut *rng);
            x
        })
        .collect();
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    } else if let Some(first) = v.first_mut() {
        *first = 1.0;
    }
    v
}
