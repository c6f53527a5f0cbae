//! Benchmarks for single trials and full comparisons.
//! Run with: cargo bench

use bandit_lab_core::config::SimulationConfig;
use bandit_lab_rl_engine::bandits::{EpsilonGreedy, Policy, ThompsonSampling, Ucb};
use bandit_lab_rl_engine::contextual::LinUcb;
use bandit_lab_rl_engine::{compare_config, run_trial, ArmRegistry, RewardSource};

fn time_trials(label: &str, mut make: impl FnMut() -> Policy, source: &RewardSource, rounds: usize) {
    let iterations = 50u32;

    // Warmup
    for seed in 0..5 {
        let mut policy = make();
        run_trial(label, &mut policy, source, rounds, seed).unwrap();
    }

    let start = std::time::Instant::now();
    for seed in 0..iterations {
        let mut policy = make();
        let _ = run_trial(label, &mut policy, source, rounds, u64::from(seed)).unwrap();
    }
    let elapsed = start.elapsed();
    let per_trial = elapsed / iterations;

    println!("--- {label} ---");
    println!("Per trial:   {:?}", per_trial);
    println!(
        "Throughput:  {:.0} rounds/sec",
        (iterations as usize * rounds) as f64 / elapsed.as_secs_f64()
    );
}

fn main() {
    let rates: Vec<f64> = (0..10).map(|i| 0.05 + 0.025 * i as f64).collect();
    let plain = RewardSource::new(ArmRegistry::from_rates(&rates, None, 1).unwrap());
    let contextual = RewardSource::with_context(
        ArmRegistry::from_rates(&rates, Some(5), 1).unwrap(),
        5,
        0.1,
        0.95,
    )
    .unwrap();
    let rounds = 5_000;

    println!("=== Trial Benchmark ({} arms, {} rounds) ===", rates.len(), rounds);
    time_trials(
        "epsilon_greedy",
        || Policy::EpsilonGreedy(EpsilonGreedy::new(10, 0.1).unwrap()),
        &plain,
        rounds,
    );
    time_trials("ucb", || Policy::Ucb(Ucb::new(10, 2.0).unwrap()), &plain, rounds);
    time_trials(
        "thompson",
        || Policy::Thompson(ThompsonSampling::new(10, 1.0, 1.0).unwrap()),
        &plain,
        rounds,
    );
    time_trials(
        "lin_ucb",
        || Policy::LinUcb(LinUcb::new(10, 5, 1.0, 1.0).unwrap()),
        &contextual,
        rounds,
    );

    let config = SimulationConfig {
        n_rounds: rounds,
        n_repetitions: 20,
        ..Default::default()
    };
    let start = std::time::Instant::now();
    let result = compare_config(&config).unwrap();
    let elapsed = start.elapsed();

    println!("=== Comparison Benchmark ===");
    println!("Policies:    {}", result.policies.len());
    println!("Repetitions: {}", result.n_repetitions);
    println!("Total time:  {:?}", elapsed);
}
