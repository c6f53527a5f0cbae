//! Reward source: Bernoulli click simulation over an [`ArmRegistry`].
//!
//! Context model: a context is a unit-norm vector drawn from a standard normal.
//! The click probability of arm `a` under context `x` is
//! `clamp(true_rate[a] + modulation * dot(x, features[a]), 0, max_rate)`.
//! Without a context, or for arms without features, the true rate is used
//! unchanged. Regret is always measured on the unmodulated true rates.

use bandit_lab_core::config::SimulationConfig;
use bandit_lab_core::error::{ensure_unit_interval, BanditError, BanditResult};
use rand::Rng;

use crate::arms::{generate_arms, unit_vector, ArmRegistry};

/// One Bernoulli draw: the uniform `noise` and the resulting click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardDraw {
    pub reward: u8,
    pub noise: f64,
}

#[derive(Debug, Clone)]
pub struct RewardSource {
    registry: ArmRegistry,
    context_dim: Option<usize>,
    modulation: f64,
    max_rate: f64,
}

impl RewardSource {
    /// Context-free source; every pull uses the arm's true rate.
    pub fn new(registry: ArmRegistry) -> Self {
        Self {
            registry,
            context_dim: None,
            modulation: 0.0,
            max_rate: 1.0,
        }
    }

    pub fn with_context(
        registry: ArmRegistry,
        dim: usize,
        modulation: f64,
        max_rate: f64,
    ) -> BanditResult<Self> {
        if dim == 0 {
            return Err(BanditError::invalid("context.dim", "must be greater than 0"));
        }
        if !modulation.is_finite() || modulation < 0.0 {
            return Err(BanditError::invalid(
                "context.modulation",
                format!("must be a non-negative number, got {modulation}"),
            ));
        }
        ensure_unit_interval("context.max_rate", max_rate)?;
        for arm in registry.arms() {
            if let Some(features) = &arm.feature_vector {
                if features.len() != dim {
                    return Err(BanditError::DimensionMismatch {
                        expected: dim,
                        actual: features.len(),
                    });
                }
            }
        }
        Ok(Self {
            registry,
            context_dim: Some(dim),
            modulation,
            max_rate,
        })
    }

    /// Environment realization for one repetition. Contexts are drawn only when
    /// `context.enabled` is set.
    pub fn from_config(config: &SimulationConfig, seed: u64) -> BanditResult<Self> {
        let ctx = &config.context;
        let feature_dim = ctx.enabled.then_some(ctx.dim);
        let registry = match &config.true_rates {
            Some(rates) => ArmRegistry::from_rates(rates, feature_dim, seed)?,
            None => ArmRegistry::new(generate_arms(
                config.n_arms,
                &config.rates,
                feature_dim,
                seed,
            )?)?,
        };
        if ctx.enabled {
            Self::with_context(registry, ctx.dim, ctx.modulation, ctx.max_rate)
        } else {
            Ok(Self::new(registry))
        }
    }

    pub fn registry(&self) -> &ArmRegistry {
        &self.registry
    }

    pub fn n_arms(&self) -> usize {
        self.registry.len()
    }

    pub fn context_dim(&self) -> Option<usize> {
        self.context_dim
    }

    pub fn best_rate(&self) -> f64 {
        self.registry.best_rate()
    }

    pub fn true_rate(&self, arm: usize) -> BanditResult<f64> {
        Ok(self.registry.get(arm)?.true_payoff_rate)
    }

    /// Draw the context for the next round from the caller's context stream.
    pub fn next_context(&self, rng: &mut impl Rng) -> BanditResult<Vec<f64>> {
        let dim = self.context_dim.ok_or_else(|| {
            BanditError::InvalidState("reward source has no context model".to_string())
        })?;
        Ok(unit_vector(dim, rng))
    }

    /// Click probability of `arm`, after context modulation.
    pub fn effective_rate(&self, arm: usize, context: Option<&[f64]>) -> BanditResult<f64> {
        let target = self.registry.get(arm)?;
        let (Some(x), Some(dim)) = (context, self.context_dim) else {
            return Ok(target.true_payoff_rate);
        };
        if x.len() != dim {
            return Err(BanditError::DimensionMismatch {
                expected: dim,
                actual: x.len(),
            });
        }
        match &target.feature_vector {
            Some(features) if self.modulation > 0.0 => {
                let affinity: f64 = x.iter().zip(features).map(|(a, b)| a * b).sum();
                Ok((target.true_payoff_rate + self.modulation * affinity).clamp(0.0, self.max_rate))
            }
            _ => Ok(target.true_payoff_rate),
        }
    }

    /// Bernoulli outcome for `arm`. Consumes exactly one uniform from `rng`,
    /// and none when the arguments are rejected.
    pub fn sample_reward(
        &self,
        arm: usize,
        context: Option<&[f64]>,
        rng: &mut impl Rng,
    ) -> BanditResult<RewardDraw> {
        let rate = self.effective_rate(arm, context)?;
        let noise: f64 = rng.gen();
        Ok(RewardDraw {
            reward: u8::from(noise < rate),
            noise,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{stream_rng, Stream};
    use bandit_lab_core::types::Arm;

    fn source(rates: &[f64]) -> RewardSource {
        RewardSource::new(ArmRegistry::from_rates(rates, None, 0).unwrap())
    }

    #[test]
    fn test_extreme_rates_are_deterministic() {
        let src = source(&[0.0, 1.0]);
        let mut rng = stream_rng(1, Stream::RewardNoise);
        for _ in 0..100 {
            assert_eq!(src.sample_reward(0, None, &mut rng).unwrap().reward, 0);
            assert_eq!(src.sample_reward(1, None, &mut rng).unwrap().reward, 1);
        }
    }

    #[test]
    fn test_empirical_rate_close_to_true_rate() {
        let src = source(&[0.3]);
        let mut rng = stream_rng(2, Stream::RewardNoise);
        let n = 20_000;
        let clicks: u32 = (0..n)
            .map(|_| src.sample_reward(0, None, &mut rng).unwrap().reward as u32)
            .sum();
        let rate = clicks as f64 / n as f64;
        assert!((rate - 0.3).abs() < 0.02, "rate={rate}");
    }

    #[test]
    fn test_out_of_range_arm_consumes_nothing() {
        let src = source(&[0.5]);
        let mut a = stream_rng(3, Stream::RewardNoise);
        let mut b = stream_rng(3, Stream::RewardNoise);
        assert!(matches!(
            src.sample_reward(4, None, &mut a),
            Err(BanditError::ArmOutOfRange { .. })
        ));
        let x = src.sample_reward(0, None, &mut a).unwrap();
        let y = src.sample_reward(0, None, &mut b).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn test_context_modulation_is_fixed_function() {
        let arms = vec![Arm {
            id: 0,
            true_payoff_rate: 0.2,
            category: "Science".to_string(),
            feature_vector: Some(vec![1.0, 0.0]),
        }];
        let src =
            RewardSource::with_context(ArmRegistry::new(arms).unwrap(), 2, 0.1, 0.95).unwrap();
        let aligned = src.effective_rate(0, Some(&[1.0, 0.0])).unwrap();
        let opposed = src.effective_rate(0, Some(&[-1.0, 0.0])).unwrap();
        let orthogonal = src.effective_rate(0, Some(&[0.0, 1.0])).unwrap();
        assert!((aligned - 0.3).abs() < 1e-12);
        assert!((opposed - 0.1).abs() < 1e-12);
        assert!((orthogonal - 0.2).abs() < 1e-12);
        assert!(matches!(
            src.effective_rate(0, Some(&[1.0])),
            Err(BanditError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_from_config_generates_contexts() {
        let mut config = SimulationConfig::default();
        config.context.enabled = true;
        let src = RewardSource::from_config(&config, 17).unwrap();
        assert_eq!(src.n_arms(), 10);
        assert_eq!(src.context_dim(), Some(5));
        let mut rng = stream_rng(17, Stream::Context);
        let ctx = src.next_context(&mut rng).unwrap();
        assert_eq!(ctx.len(), 5);
    }

    #[test]
    fn test_from_config_without_contexts_draws_none() {
        let config = SimulationConfig::default();
        let src = RewardSource::from_config(&config, 17).unwrap();
        assert_eq!(src.context_dim(), None);
        assert!(src.registry().arms().iter().all(|a| a.feature_vector.is_none()));
        let mut rng = stream_rng(17, Stream::Context);
        assert!(src.next_context(&mut rng).is_err());
    }

    #[test]
    fn test_context_free_source_has_no_contexts() {
        let src = source(&[0.1, 0.2]);
        let mut rng = stream_rng(0, Stream::Context);
        assert!(src.next_context(&mut rng).is_err());
    }
}
