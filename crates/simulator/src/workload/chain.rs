//! Seeded workload for transaction chains.

use crate::config::{ShardSelection, WorkloadConfig};
use crate::workload::{ShardStep, TransactionPlan, WorkloadGenerator};
use rand::seq::SliceRandom;
use std::time::Duration;
use txchain_types::{ShardName, TransactionKind};

/// Generates chain workloads from a [`WorkloadConfig`].
pub struct ChainWorkload {
    shards: Vec<ShardName>,
    config: WorkloadConfig,

    /// Next starting shard for round-robin selection.
    cursor: usize,
}

impl ChainWorkload {
    /// Create a generator over `shards`.
    pub fn new(shards: Vec<ShardName>, config: WorkloadConfig) -> Self {
        Self {
            shards,
            config,
            cursor: 0,
        }
    }

    fn pick_kind(&self, rng: &mut impl rand::Rng) -> TransactionKind {
        if rng.gen_bool(self.config.read_only_ratio) {
            TransactionKind::ReadOnly
        } else if rng.gen_bool(0.5) {
            TransactionKind::WriteOnly
        } else {
            TransactionKind::ReadWrite
        }
    }

    fn pick_shards(&mut self, rng: &mut impl rand::Rng) -> Vec<ShardName> {
        let max = self.config.max_shards_per_transaction.min(self.shards.len());
        if max == 0 {
            return Vec::new();
        }
        let count = rng.gen_range(1..=max);

        match self.config.shard_selection {
            ShardSelection::Random => self
                .shards
                .choose_multiple(rng, count)
                .cloned()
                .collect(),
            ShardSelection::RoundRobin => {
                let start = self.cursor;
                self.cursor = (self.cursor + 1) % self.shards.len();
                (0..count)
                    .map(|i| self.shards[(start + i) % self.shards.len()].clone())
                    .collect()
            }
        }
    }

    fn pick_step(&self, shard: ShardName, rng: &mut impl rand::Rng) -> ShardStep {
        let delay_ms =
            rng.gen_range(self.config.min_ready_delay_ms..=self.config.max_ready_delay_ms);
        ShardStep {
            shard,
            ready_delay: Duration::from_millis(delay_ms),
            fails: rng.gen_bool(self.config.failure_ratio),
        }
    }
}

impl WorkloadGenerator for ChainWorkload {
    fn generate_batch(&mut self, rng: &mut impl rand::Rng) -> Vec<TransactionPlan> {
        (0..self.config.transactions_per_chain)
            .map(|_| self.generate_one(rng))
            .collect()
    }

    fn generate_one(&mut self, rng: &mut impl rand::Rng) -> TransactionPlan {
        let kind = self.pick_kind(rng);
        let steps = self
            .pick_shards(rng)
            .into_iter()
            .map(|shard| self.pick_step(shard, rng))
            .collect();
        TransactionPlan { kind, steps }
    }
}
