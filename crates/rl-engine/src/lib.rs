//! Bandit engine: simulated arms, Bernoulli reward source, multi-armed bandit
//! policies (Epsilon-Greedy, UCB1, Thompson Sampling), contextual bandits
//! (LinUCB), and the trial runner and comparison aggregator that evaluate them.

pub mod arms;
pub mod bandits;
pub mod comparison;
pub mod contextual;
pub mod environment;
pub mod seed;
pub mod trial;

pub use arms::ArmRegistry;
pub use bandits::{BanditPolicy, Policy};
pub use comparison::{compare, compare_config, CompareOptions, NamedPolicy};
pub use contextual::LinUcb;
pub use environment::RewardSource;
pub use trial::{run_trial, CancellationToken};
