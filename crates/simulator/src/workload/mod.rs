//! Workload generation for simulations.
//!
//! A workload is a list of [`TransactionPlan`]s per chain: what kind of
//! transaction to allocate, which shards it touches, and how each shard will
//! behave when asked to stage it.

mod chain;

pub use chain::ChainWorkload;

use std::time::Duration;
use txchain_types::{ShardName, TransactionKind};

/// How one shard answers a ready request.
#[derive(Clone, Debug, PartialEq)]
pub struct ShardStep {
    /// Shard the transaction touches.
    pub shard: ShardName,

    /// Time the shard takes to stage the transaction.
    pub ready_delay: Duration,

    /// Whether staging fails.
    pub fails: bool,
}

/// One transaction to run on a chain.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionPlan {
    /// Kind to allocate.
    pub kind: TransactionKind,

    /// Shards touched, in routing order. Distinct.
    pub steps: Vec<ShardStep>,
}

impl TransactionPlan {
    /// Whether any shard is scripted to fail.
    pub fn has_failure(&self) -> bool {
        self.steps.iter().any(|step| step.fails)
    }
}

/// Trait for generating chain workloads.
pub trait WorkloadGenerator {
    /// Generate the plans for one chain.
    fn generate_batch(&mut self, rng: &mut impl rand::Rng) -> Vec<TransactionPlan>;

    /// Generate a single transaction plan.
    fn generate_one(&mut self, rng: &mut impl rand::Rng) -> TransactionPlan;
}
