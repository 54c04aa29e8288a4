//! Configuration types for the simulator.
//!
//! Configs are plain structs with builder-style setters. They can also be read
//! from TOML; every table and field is optional and falls back to its default.
//!
//! ```toml
//! member_name = "member-1"
//! seed = 7
//!
//! [[shards]]
//! name = "shard-0"
//! lookup_latency_ms = 2
//!
//! [[shards]]
//! name = "shard-1"
//! leader = "member-2/shard-1"
//!
//! [permits]
//! max_open_transactions = 64
//!
//! [workload]
//! num_chains = 8
//! transactions_per_chain = 50
//! failure_ratio = 0.01
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use txchain_types::ShardName;

/// Errors loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a simulation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Name of the simulated local member; prefixes every chain id.
    pub member_name: String,

    /// Random seed for deterministic workloads.
    pub seed: u64,

    /// Shards of the simulated cluster.
    pub shards: Vec<ShardConfig>,

    /// Write-transaction permit gate.
    pub permits: PermitConfig,

    /// Workload configuration.
    pub workload: WorkloadConfig,
}

impl SimulatorConfig {
    /// Create a configuration with `num_shards` shards named `shard-0..`.
    pub fn new(num_shards: usize) -> Self {
        Self {
            member_name: "member-1".to_string(),
            seed: 12345,
            shards: (0..num_shards).map(ShardConfig::numbered).collect(),
            permits: PermitConfig::default(),
            workload: WorkloadConfig::default(),
        }
    }

    /// Read a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is runnable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.member_name.is_empty() {
            return Err(ConfigError::Invalid("member_name must not be empty".into()));
        }
        if self.shards.is_empty() {
            return Err(ConfigError::Invalid("at least one shard is required".into()));
        }
        for (i, shard) in self.shards.iter().enumerate() {
            if self.shards[..i].iter().any(|other| other.name == shard.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate shard name: {}",
                    shard.name
                )));
            }
        }
        if self.permits.max_open_transactions == 0 {
            return Err(ConfigError::Invalid(
                "permits.max_open_transactions must be positive".into(),
            ));
        }
        self.workload.validate()
    }

    /// Replace the shard list.
    pub fn with_shards(mut self, shards: Vec<ShardConfig>) -> Self {
        self.shards = shards;
        self
    }

    /// Set the permit configuration.
    pub fn with_permits(mut self, permits: PermitConfig) -> Self {
        self.permits = permits;
        self
    }

    /// Set the workload configuration.
    pub fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Names of all configured shards, in order.
    pub fn shard_names(&self) -> Vec<ShardName> {
        self.shards
            .iter()
            .map(|shard| ShardName::new(shard.name.clone()))
            .collect()
    }

    /// Total number of transactions the workload will allocate.
    pub fn total_transactions(&self) -> usize {
        self.workload.num_chains * self.workload.transactions_per_chain
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::new(4)
    }
}

/// One shard of the simulated cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    /// Shard name.
    pub name: String,

    /// Leader address; defaults to `<member_name>/<name>`.
    pub leader: Option<String>,

    /// Simulate a shard with no elected leader: every lookup fails.
    pub leaderless: bool,

    /// Router lookup latency for this shard.
    pub lookup_latency_ms: u64,
}

impl ShardConfig {
    /// Shard `shard-<index>` with default settings.
    pub fn numbered(index: usize) -> Self {
        Self {
            name: format!("shard-{index}"),
            ..Default::default()
        }
    }

    /// Mark the shard as leaderless.
    pub fn leaderless(mut self) -> Self {
        self.leaderless = true;
        self
    }

    /// Set the router lookup latency.
    pub fn with_lookup_latency(mut self, latency: Duration) -> Self {
        self.lookup_latency_ms = latency.as_millis() as u64;
        self
    }

    /// Leader address lookups resolve to.
    pub fn leader_address(&self, member_name: &str) -> String {
        self.leader
            .clone()
            .unwrap_or_else(|| format!("{member_name}/{}", self.name))
    }

    /// Router lookup latency.
    pub fn lookup_latency(&self) -> Duration {
        Duration::from_millis(self.lookup_latency_ms)
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            name: "shard-0".to_string(),
            leader: None,
            leaderless: false,
            lookup_latency_ms: 1,
        }
    }
}

/// Write-transaction permit gate.
///
/// The gate never blocks. Allocations beyond the limit proceed but are logged
/// and counted as throttled.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PermitConfig {
    /// Open write transactions allowed before allocations count as throttled.
    pub max_open_transactions: usize,
}

impl Default for PermitConfig {
    fn default() -> Self {
        Self {
            max_open_transactions: 256,
        }
    }
}

/// How shards are picked for each transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShardSelection {
    /// Uniformly random distinct shards.
    #[default]
    Random,

    /// Consecutive shards, rotating through the cluster.
    RoundRobin,
}

/// Workload configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Number of chains driven concurrently.
    pub num_chains: usize,

    /// Transactions allocated on each chain before it is closed.
    pub transactions_per_chain: usize,

    /// Most shards a single transaction touches.
    pub max_shards_per_transaction: usize,

    /// Ratio of read-only transactions (vs writes).
    pub read_only_ratio: f64,

    /// Probability that a shard fails to stage a write.
    pub failure_ratio: f64,

    /// Shortest time a shard takes to stage a write.
    pub min_ready_delay_ms: u64,

    /// Longest time a shard takes to stage a write.
    pub max_ready_delay_ms: u64,

    /// Shard selection mode.
    pub shard_selection: ShardSelection,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            num_chains: 4,
            transactions_per_chain: 25,
            max_shards_per_transaction: 3,
            read_only_ratio: 0.2,
            failure_ratio: 0.0,
            min_ready_delay_ms: 1,
            max_ready_delay_ms: 20,
            shard_selection: ShardSelection::default(),
        }
    }
}

impl WorkloadConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_shards_per_transaction == 0 {
            return Err(ConfigError::Invalid(
                "workload.max_shards_per_transaction must be positive".into(),
            ));
        }
        if self.min_ready_delay_ms > self.max_ready_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "workload.min_ready_delay_ms ({}) exceeds max_ready_delay_ms ({})",
                self.min_ready_delay_ms, self.max_ready_delay_ms
            )));
        }
        for (name, ratio) in [
            ("read_only_ratio", self.read_only_ratio),
            ("failure_ratio", self.failure_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::Invalid(format!(
                    "workload.{name} must be within [0, 1], got {ratio}"
                )));
            }
        }
        Ok(())
    }

    /// Set the number of concurrent chains.
    pub fn with_num_chains(mut self, chains: usize) -> Self {
        self.num_chains = chains;
        self
    }

    /// Set the number of transactions per chain.
    pub fn with_transactions_per_chain(mut self, transactions: usize) -> Self {
        self.transactions_per_chain = transactions;
        self
    }

    /// Set the maximum shards per transaction.
    pub fn with_max_shards_per_transaction(mut self, shards: usize) -> Self {
        self.max_shards_per_transaction = shards;
        self
    }

    /// Set the read-only ratio.
    pub fn with_read_only_ratio(mut self, ratio: f64) -> Self {
        self.read_only_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the shard failure ratio.
    pub fn with_failure_ratio(mut self, ratio: f64) -> Self {
        self.failure_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the range shards take to stage a write.
    pub fn with_ready_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_ready_delay_ms = min.as_millis() as u64;
        self.max_ready_delay_ms = max.as_millis() as u64;
        self
    }

    /// Set the shard selection mode.
    pub fn with_shard_selection(mut self, selection: ShardSelection) -> Self {
        self.shard_selection = selection;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.shards.len(), 4);
        assert_eq!(config.shards[2].name, "shard-2");
        assert_eq!(config.total_transactions(), 100);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = SimulatorConfig::from_toml_str(
            r#"
            member_name = "member-7"
            seed = 99

            [[shards]]
            name = "alpha"
            leader = "member-2/alpha"
            lookup_latency_ms = 5

            [[shards]]
            name = "beta"
            leaderless = true

            [workload]
            num_chains = 2
            shard_selection = "round-robin"
            "#,
        )
        .unwrap();

        assert_eq!(config.member_name, "member-7");
        assert_eq!(config.seed, 99);
        assert_eq!(config.shards.len(), 2);
        assert_eq!(config.shards[0].leader_address("member-7"), "member-2/alpha");
        assert_eq!(config.shards[0].lookup_latency(), Duration::from_millis(5));
        assert_eq!(config.shards[1].leader_address("member-7"), "member-7/beta");
        assert!(config.shards[1].leaderless);
        assert_eq!(config.workload.num_chains, 2);
        assert_eq!(config.workload.shard_selection, ShardSelection::RoundRobin);
        // Untouched fields keep their defaults.
        assert_eq!(config.workload.transactions_per_chain, 25);
        assert_eq!(config.permits.max_open_transactions, 256);
    }

    #[test]
    fn test_rejects_duplicate_shards() {
        let err = SimulatorConfig::from_toml_str(
            r#"
            [[shards]]
            name = "alpha"

            [[shards]]
            name = "alpha"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("alpha")));
    }

    #[test]
    fn test_rejects_inverted_delay_range() {
        let config = SimulatorConfig::default().with_workload(
            WorkloadConfig::default()
                .with_ready_delay(Duration::from_millis(10), Duration::from_millis(5)),
        );
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = SimulatorConfig::from_toml_str("seed = \"not a number\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
