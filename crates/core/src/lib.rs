pub mod config;
pub mod error;
pub mod report;
pub mod types;

pub use config::{PolicyConfig, PolicyEntry, SimulationConfig};
pub use error::{BanditError, BanditResult};
