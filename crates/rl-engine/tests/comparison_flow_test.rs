//! End-to-end flow: configuration → environment → trials → aggregated comparison.

#[cfg(test)]
mod tests {
    use bandit_lab_core::config::{PolicyConfig, PolicyEntry, RateDistribution, SimulationConfig};
    use bandit_lab_core::error::{BanditError, BanditResult};
    use bandit_lab_rl_engine::arms::ArmRegistry;
    use bandit_lab_rl_engine::bandits::{BanditPolicy, FixedArm, Policy, Ucb};
    use bandit_lab_rl_engine::seed::{stream_rng, Stream};
    use bandit_lab_rl_engine::{compare, compare_config, run_trial, NamedPolicy, RewardSource};

    fn entry(name: &str, policy: PolicyConfig) -> PolicyEntry {
        PolicyEntry {
            name: name.to_string(),
            policy,
        }
    }

    #[test]
    fn test_ucb_tries_every_arm_first() {
        let src = RewardSource::new(ArmRegistry::from_rates(&[0.1, 0.2, 0.3], None, 0).unwrap());
        let mut policy = Ucb::new(3, 2.0).unwrap();
        let trial = run_trial("ucb", &mut policy, &src, 50, 42).unwrap();

        let first: Vec<usize> = trial.records[..3].iter().map(|r| r.arm_chosen).collect();
        assert_eq!(first, vec![0, 1, 2]);
        assert!(policy.arm_stats().iter().all(|s| s.pull_count >= 1));
    }

    #[test]
    fn test_best_fixed_arm_has_zero_regret() {
        let mut config = SimulationConfig {
            n_arms: 3,
            true_rates: Some(vec![0.1, 0.5, 0.2]),
            n_rounds: 200,
            n_repetitions: 3,
            ..Default::default()
        };
        config.policies = vec![
            entry("best", PolicyConfig::FixedArm { arm: 1 }),
            entry("worst", PolicyConfig::FixedArm { arm: 0 }),
        ];
        let result = compare_config(&config).unwrap();

        let best = result.get("best").unwrap();
        let worst = result.get("worst").unwrap();
        assert_eq!(best.terminal_regret.mean, 0.0);
        assert_eq!(best.terminal_regret.variance, 0.0);
        assert!((worst.terminal_regret.mean - 200.0 * 0.4).abs() < 1e-9);
        assert_eq!(best.selection_frequency, vec![0.0, 1.0, 0.0]);
        assert_eq!(result.best_policy().unwrap().name, "best");
    }

    #[test]
    fn test_shared_noise_makes_better_arm_win_every_round() {
        // Same uniform per round for both policies: a click on the worse arm
        // implies a click on the better one.
        let policies = vec![
            NamedPolicy::new("low", Policy::FixedArm(FixedArm::new(2, 0).unwrap())),
            NamedPolicy::new("high", Policy::FixedArm(FixedArm::new(2, 1).unwrap())),
        ];
        let factory = |seed: u64| -> BanditResult<RewardSource> {
            Ok(RewardSource::new(ArmRegistry::from_rates(&[0.3, 0.6], None, seed)?))
        };
        let result = compare(&policies, factory, 300, 4, 8).unwrap();

        let low = result.get("low").unwrap();
        let high = result.get("high").unwrap();
        assert!(high.total_reward.mean >= low.total_reward.mean);
        for (l, h) in low.ctr_curve.iter().zip(&high.ctr_curve) {
            assert!(h.mean >= l.mean);
        }
    }

    #[test]
    fn test_learning_policies_beat_uniform_guessing() {
        let config = SimulationConfig {
            n_arms: 5,
            true_rates: Some(vec![0.05, 0.1, 0.15, 0.2, 0.5]),
            n_rounds: 2000,
            n_repetitions: 3,
            ..Default::default()
        };
        let result = compare_config(&config).unwrap();

        // Uniform play would average 0.3 regret per round.
        for p in &result.policies {
            assert!(
                p.terminal_regret.mean < 0.3 * 2000.0 * 0.5,
                "{} regret {}",
                p.name,
                p.terminal_regret.mean
            );
            assert!(p.selection_frequency[4] > 0.5, "{}", p.name);
        }
    }

    #[test]
    fn test_contextual_comparison_runs_alongside_plain_policies() {
        let mut config = SimulationConfig {
            n_arms: 4,
            n_rounds: 300,
            n_repetitions: 2,
            ..Default::default()
        };
        config.rates.distribution = RateDistribution::Skewed;
        config.context.enabled = true;
        config.context.dim = 3;
        config.policies.push(entry(
            "linucb",
            PolicyConfig::LinUcb {
                alpha_explore: 1.0,
                lambda: 1.0,
            },
        ));

        let result = compare_config(&config).unwrap();
        assert!(result.failures.is_empty());
        assert_eq!(result.policies.len(), 4);
        let lin = result.get("linucb").unwrap();
        assert_eq!(lin.completed_repetitions, 2);
        assert_eq!(lin.selection_counts.iter().sum::<u64>(), 600);
        assert!(lin.regret_curve.iter().all(|m| m.mean >= 0.0));
    }

    #[test]
    fn test_invalid_config_fails_before_any_trial() {
        let mut config = SimulationConfig::default();
        config.policies[0].policy = PolicyConfig::EpsilonGreedy { epsilon: 1.5 };
        match compare_config(&config) {
            Err(BanditError::InvalidParameter { field, .. }) => {
                assert_eq!(field, "policies[0].epsilon")
            }
            other => panic!("expected InvalidParameter, got {other:?}"),
        }

        let config = SimulationConfig {
            n_arms: 3,
            true_rates: Some(vec![0.1, 0.2]),
            ..Default::default()
        };
        assert!(matches!(
            compare_config(&config),
            Err(BanditError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_summary_rows_serialize_to_json() {
        let config = SimulationConfig {
            n_rounds: 50,
            n_repetitions: 2,
            ..Default::default()
        };
        let result = compare_config(&config).unwrap();
        let rows = result.summary_rows();
        assert_eq!(rows.len(), 3);

        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["policy"], "epsilon_greedy");
        assert!(json[0]["mean_terminal_regret"].is_number());
    }

    #[test]
    fn test_stream_rngs_are_independent_of_policy() {
        use rand::Rng;
        let mut a = stream_rng(5, Stream::RewardNoise);
        let mut b = stream_rng(5, Stream::Policy);
        let xa: f64 = a.gen();
        let xb: f64 = b.gen();
        assert_ne!(xa, xb);
    }
}
