//! Bandit Lab: compare bandit policies on simulated click-through traffic.
//!
//! Loads a simulation config, runs the comparison and prints JSON to stdout.
//! Logs go to stderr.

use std::io::Write;
use std::path::PathBuf;

use bandit_lab_core::config::SimulationConfig;
use bandit_lab_rl_engine::compare_config;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    /// One row per policy
    Summary,
    /// One row per round per policy
    Timeseries,
    /// The complete comparison result
    Full,
}

#[derive(Parser, Debug)]
#[command(name = "bandit-lab")]
#[command(about = "Compare multi-armed bandit policies on simulated click-through traffic")]
#[command(version)]
struct Cli {
    /// Config file (TOML, JSON or YAML)
    #[arg(long, env = "BANDIT_LAB_CONFIG")]
    config: Option<PathBuf>,

    /// Rounds per trial (overrides config)
    #[arg(long, env = "BANDIT_LAB__N_ROUNDS")]
    rounds: Option<usize>,

    /// Repetitions per policy (overrides config)
    #[arg(long, env = "BANDIT_LAB__N_REPETITIONS")]
    repetitions: Option<usize>,

    /// Base seed (overrides config)
    #[arg(long, env = "BANDIT_LAB__SEED")]
    seed: Option<u64>,

    /// Number of generated arms (overrides config)
    #[arg(long, env = "BANDIT_LAB__N_ARMS")]
    arms: Option<usize>,

    /// Trial worker threads (overrides config)
    #[arg(long, env = "BANDIT_LAB__WORKER_THREADS")]
    threads: Option<usize>,

    #[arg(long, value_enum, default_value_t = Output::Summary)]
    output: Output,

    /// Pretty-print JSON
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bandit_lab=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(Some(path.as_path()))?,
        None => SimulationConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            SimulationConfig::default()
        }),
    };

    if let Some(rounds) = cli.rounds {
        config.n_rounds = rounds;
    }
    if let Some(repetitions) = cli.repetitions {
        config.n_repetitions = repetitions;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(arms) = cli.arms {
        config.n_arms = arms;
    }
    if let Some(threads) = cli.threads {
        config.worker_threads = Some(threads);
    }

    info!(
        n_arms = config.arm_count(),
        n_rounds = config.n_rounds,
        n_repetitions = config.n_repetitions,
        seed = config.seed,
        policies = config.policies.len(),
        "Configuration loaded"
    );

    let result = compare_config(&config)?;
    if let Some(best) = result.best_policy() {
        info!(
            policy = %best.name,
            terminal_regret = best.terminal_regret.mean,
            "Lowest mean regret"
        );
    }

    match cli.output {
        Output::Summary => print_json(&result.summary_rows(), cli.pretty)?,
        Output::Timeseries => print_json(&result.time_series_rows(), cli.pretty)?,
        Output::Full => print_json(&result, cli.pretty)?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    if pretty {
        serde_json::to_writer_pretty(&mut stdout, value)?;
    } else {
        serde_json::to_writer(&mut stdout, value)?;
    }
    writeln!(stdout)?;
    Ok(())
}
