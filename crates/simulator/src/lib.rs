//! Transaction chain simulator
//!
//! Drives many transaction chains concurrently against an in-memory sharded
//! cluster and checks that the chains keep their ordering guarantee under
//! slow, failing and leaderless shards.
//!
//! # Architecture
//!
//! - **Cluster**: static leader router, per-shard broadcast inboxes behind the
//!   wire codec, and a non-blocking write permit gate
//! - **Workload Generation**: seeded per-chain transaction plans
//! - **Metrics Collection**: routing wait percentiles, failure counters and
//!   ordering violations
//! - **Configuration**: builder-style structs, loadable from TOML
//!
//! # Example
//!
//! ```ignore
//! use txchain_simulator::{Simulator, SimulatorConfig, WorkloadConfig};
//!
//! let config = SimulatorConfig::new(4)
//!     .with_workload(WorkloadConfig::default().with_num_chains(16).with_failure_ratio(0.01));
//!
//! let report = Simulator::new(config).run().await?;
//! assert_eq!(report.ordering_violations, 0);
//! report.print();
//! ```

pub mod cluster;
pub mod config;
pub mod metrics;
pub mod runner;
pub mod workload;

pub use cluster::{InMemoryRouter, PermitGate, ShardInboxes, SimulatedCluster};
pub use config::{
    ConfigError, PermitConfig, ShardConfig, ShardSelection, SimulatorConfig, WorkloadConfig,
};
pub use metrics::{MetricsCollector, RunSummary, SimulationReport};
pub use runner::{SimulationError, Simulator};
pub use workload::{ChainWorkload, ShardStep, TransactionPlan, WorkloadGenerator};
