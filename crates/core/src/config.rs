use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, ensure_unit_interval, BanditError, BanditResult};

/// Root simulation configuration. Loaded from an optional config file and
/// environment variables with the prefix `BANDIT_LAB__`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_n_arms")]
    pub n_arms: usize,
    /// Explicit payoff rates; overrides `rates` when present.
    #[serde(default)]
    pub true_rates: Option<Vec<f64>>,
    #[serde(default)]
    pub rates: RateConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default = "default_n_rounds")]
    pub n_rounds: usize,
    #[serde(default = "default_n_repetitions")]
    pub n_repetitions: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Size of the trial worker pool. `None` uses every core.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default = "default_policies")]
    pub policies: Vec<PolicyEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum RateDistribution {
    #[default]
    Uniform,
    /// `min + Beta(2, 5) * (max - min)`, sorted descending.
    Skewed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    #[serde(default = "default_rate_min")]
    pub min: f64,
    #[serde(default = "default_rate_max")]
    pub max: f64,
    #[serde(default)]
    pub distribution: RateDistribution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// When false no contexts are drawn and contextual policies are rejected.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_context_dim")]
    pub dim: usize,
    /// Weight of `dot(context, arm features)` added to the true rate.
    #[serde(default = "default_modulation")]
    pub modulation: f64,
    #[serde(default = "default_max_rate")]
    pub max_rate: f64,
}

/// Named policy as it appears in the `policies` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub name: String,
    #[serde(flatten)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    EpsilonGreedy {
        #[serde(default = "default_epsilon")]
        epsilon: f64,
    },
    Ucb {
        #[serde(default = "default_ucb_c")]
        c: f64,
    },
    Thompson {
        #[serde(default = "default_prior")]
        alpha_prior: f64,
        #[serde(default = "default_prior")]
        beta_prior: f64,
    },
    LinUcb {
        #[serde(default = "default_alpha_explore")]
        alpha_explore: f64,
        #[serde(default = "default_lambda")]
        lambda: f64,
    },
    FixedArm {
        arm: usize,
    },
}

// Default functions
fn default_n_arms() -> usize {
    10
}
fn default_n_rounds() -> usize {
    1000
}
fn default_n_repetitions() -> usize {
    5
}
fn default_seed() -> u64 {
    42
}
fn default_rate_min() -> f64 {
    0.05
}
fn default_rate_max() -> f64 {
    0.30
}
fn default_context_dim() -> usize {
    5
}
fn default_modulation() -> f64 {
    0.1
}
fn default_max_rate() -> f64 {
    0.95
}
fn default_epsilon() -> f64 {
    0.1
}
fn default_ucb_c() -> f64 {
    2.0
}
fn default_prior() -> f64 {
    1.0
}
fn default_alpha_explore() -> f64 {
    1.0
}
fn default_lambda() -> f64 {
    1.0
}
fn default_policies() -> Vec<PolicyEntry> {
    vec![
        PolicyEntry {
            name: "epsilon_greedy".to_string(),
            policy: PolicyConfig::EpsilonGreedy {
                epsilon: default_epsilon(),
            },
        },
        PolicyEntry {
            name: "ucb".to_string(),
            policy: PolicyConfig::Ucb { c: default_ucb_c() },
        },
        PolicyEntry {
            name: "thompson".to_string(),
            policy: PolicyConfig::Thompson {
                alpha_prior: default_prior(),
                beta_prior: default_prior(),
            },
        },
    ]
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            min: default_rate_min(),
            max: default_rate_max(),
            distribution: RateDistribution::default(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dim: default_context_dim(),
            modulation: default_modulation(),
            max_rate: default_max_rate(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_arms: default_n_arms(),
            true_rates: None,
            rates: RateConfig::default(),
            context: ContextConfig::default(),
            n_rounds: default_n_rounds(),
            n_repetitions: default_n_repetitions(),
            seed: default_seed(),
            worker_threads: None,
            policies: default_policies(),
        }
    }
}

impl PolicyConfig {
    /// Parameter checks shared by configuration validation and policy construction.
    /// `prefix` is prepended to field names in errors, e.g. `policies[1]`.
    pub fn validate(&self, prefix: &str, n_arms: usize) -> BanditResult<()> {
        let field = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };
        match *self {
            PolicyConfig::EpsilonGreedy { epsilon } => {
                ensure_unit_interval(&field("epsilon"), epsilon)
            }
            PolicyConfig::Ucb { c } => ensure_positive(&field("c"), c),
            PolicyConfig::Thompson {
                alpha_prior,
                beta_prior,
            } => {
                ensure_positive(&field("alpha_prior"), alpha_prior)?;
                ensure_positive(&field("beta_prior"), beta_prior)
            }
            PolicyConfig::LinUcb {
                alpha_explore,
                lambda,
            } => {
                ensure_positive(&field("alpha_explore"), alpha_explore)?;
                ensure_positive(&field("lambda"), lambda)
            }
            PolicyConfig::FixedArm { arm } => {
                if arm < n_arms {
                    Ok(())
                } else {
                    Err(BanditError::invalid(
                        field("arm"),
                        format!("must be below n_arms ({n_arms}), got {arm}"),
                    ))
                }
            }
        }
    }

    pub fn is_contextual(&self) -> bool {
        matches!(self, PolicyConfig::LinUcb { .. })
    }
}

impl SimulationConfig {
    /// Load configuration from an optional file and environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("BANDIT_LAB")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("true_rates"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Number of arms the environment will expose.
    pub fn arm_count(&self) -> usize {
        self.true_rates
            .as_ref()
            .map(|rates| rates.len())
            .unwrap_or(self.n_arms)
    }

    /// Check every field before any trial runs. Returns the first failure.
    pub fn validate(&self) -> BanditResult<()> {
        if self.n_arms == 0 {
            return Err(BanditError::invalid("n_arms", "must be greater than 0"));
        }
        if self.n_rounds == 0 {
            return Err(BanditError::invalid("n_rounds", "must be greater than 0"));
        }
        if self.n_repetitions == 0 {
            return Err(BanditError::invalid(
                "n_repetitions",
                "must be at least 1",
            ));
        }
        if let Some(rates) = &self.true_rates {
            if rates.len() != self.n_arms {
                return Err(BanditError::invalid(
                    "true_rates",
                    format!(
                        "expected {} rates to match n_arms, got {}",
                        self.n_arms,
                        rates.len()
                    ),
                ));
            }
            for (i, &rate) in rates.iter().enumerate() {
                ensure_unit_interval(&format!("true_rates[{i}]"), rate)?;
            }
        } else {
            ensure_unit_interval("rates.min", self.rates.min)?;
            ensure_unit_interval("rates.max", self.rates.max)?;
            if self.rates.min > self.rates.max {
                return Err(BanditError::invalid(
                    "rates.min",
                    format!(
                        "must not exceed rates.max ({}), got {}",
                        self.rates.max, self.rates.min
                    ),
                ));
            }
        }
        if self.context.dim == 0 {
            return Err(BanditError::invalid("context.dim", "must be greater than 0"));
        }
        if !self.context.modulation.is_finite() || self.context.modulation < 0.0 {
            return Err(BanditError::invalid(
                "context.modulation",
                format!("must be a non-negative number, got {}", self.context.modulation),
            ));
        }
        ensure_unit_interval("context.max_rate", self.context.max_rate)?;
        if self.worker_threads == Some(0) {
            return Err(BanditError::invalid(
                "worker_threads",
                "must be greater than 0 when set",
            ));
        }
        if self.policies.is_empty() {
            return Err(BanditError::invalid("policies", "at least one policy is required"));
        }

        let mut seen = HashSet::new();
        for (i, entry) in self.policies.iter().enumerate() {
            let prefix = format!("policies[{i}]");
            if entry.name.trim().is_empty() {
                return Err(BanditError::invalid(
                    format!("{prefix}.name"),
                    "must not be empty",
                ));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(BanditError::invalid(
                    format!("{prefix}.name"),
                    format!("duplicate policy name `{}`", entry.name),
                ));
            }
            entry.policy.validate(&prefix, self.n_arms)?;
            if entry.policy.is_contextual() && !self.context.enabled {
                return Err(BanditError::invalid(
                    format!("{prefix}.kind"),
                    "contextual policies require context.enabled",
                ));
            }
        }
        Ok(())
    }
}
