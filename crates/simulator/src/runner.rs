//! Simulation runner.

use crate::cluster::{PermitGate, SimulatedCluster};
use crate::config::{ConfigError, SimulatorConfig};
use crate::metrics::{MetricsCollector, RunSummary, SimulationReport};
use crate::workload::{ChainWorkload, ShardStep, TransactionPlan, WorkloadGenerator};
use futures::future::FutureExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};
use txchain_chain::{ChainError, ChainTransaction, ChainedTransactionFactory, TransactionChain};
use txchain_core::{ReadinessError, ReadyFuture};
use txchain_types::{ChainId, TransactionKind};

/// Errors that abort a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create latency histogram: {0}")]
    Metrics(#[from] hdrhistogram::CreationError),

    #[error("Chain rejected an operation: {0}")]
    Chain(#[from] ChainError),

    #[error("Chain task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Drives concurrent transaction chains against a simulated cluster.
///
/// Each chain runs its plans one transaction at a time: allocate, resolve
/// every touched shard through the chain, ready with one future per shard,
/// move on. After every successful lookup the runner checks that the previous
/// transaction on that chain had finished staging, and counts a violation if
/// not.
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    /// Create a simulator for `config`.
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// The configuration this simulator runs.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Run every chain to completion and report.
    ///
    /// Must be called from within a Tokio runtime; completion continuations
    /// are dispatched on it.
    pub async fn run(&self) -> Result<SimulationReport, SimulationError> {
        self.config.validate()?;

        let workload_config = &self.config.workload;
        let cluster = SimulatedCluster::from_config(&self.config, Handle::current());
        let metrics = Arc::new(MetricsCollector::new()?);
        let mut workload =
            ChainWorkload::new(self.config.shard_names(), workload_config.clone());
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        info!(
            chains = workload_config.num_chains,
            transactions_per_chain = workload_config.transactions_per_chain,
            shards = self.config.shards.len(),
            seed = self.config.seed,
            "Starting simulation"
        );

        let started = Instant::now();
        let mut handles = Vec::with_capacity(workload_config.num_chains);
        for _ in 0..workload_config.num_chains {
            let plans = workload.generate_batch(&mut rng);
            let chain = TransactionChain::new(cluster.context.clone(), ChainedTransactionFactory);
            handles.push(tokio::spawn(drive_chain(
                chain,
                plans,
                metrics.clone(),
                cluster.permits.clone(),
            )));
        }

        let mut closed = Vec::with_capacity(handles.len());
        for handle in handles {
            closed.push(handle.await??);
        }

        let chains_closed_everywhere = closed
            .iter()
            .filter(|chain| cluster.inboxes.all_shards_saw(chain))
            .count();
        let report = metrics.report(RunSummary {
            chains: closed.len(),
            chains_closed_everywhere,
            throttled_permits: cluster.permits.throttled(),
            elapsed: started.elapsed(),
        });

        info!(
            lookups = report.lookups,
            router_lookups = cluster.router.lookup_count(),
            ordering_violations = report.ordering_violations,
            elapsed = ?report.elapsed,
            "Simulation complete"
        );
        Ok(report)
    }
}

/// Run `plans` on `chain`, then close it.
async fn drive_chain(
    chain: TransactionChain,
    plans: Vec<TransactionPlan>,
    metrics: Arc<MetricsCollector>,
    permits: Arc<PermitGate>,
) -> Result<ChainId, ChainError> {
    // Staging of the last transaction readied with shards.
    let mut previous: Option<StagingProbe> = None;

    for plan in plans {
        let tx = match plan.kind {
            TransactionKind::ReadOnly => chain.new_read_only_transaction()?,
            TransactionKind::WriteOnly => chain.new_write_only_transaction()?,
            TransactionKind::ReadWrite => chain.new_read_write_transaction()?,
        };

        let probe = StagingProbe::new(plan.steps.len());
        let mut futures: Vec<ReadyFuture> = Vec::with_capacity(plan.steps.len());
        let mut routed = true;

        for step in &plan.steps {
            let lookup_started = Instant::now();
            match tx.resolve_shard(&step.shard).await {
                Ok(leader) => {
                    metrics.record_lookup(lookup_started.elapsed());
                    if previous.as_ref().is_some_and(|p| !p.is_complete()) {
                        metrics.record_ordering_violation();
                        error!(
                            chain_id = %chain.chain_id(),
                            tx = %tx.identifier(),
                            shard = %step.shard,
                            "Shard lookup answered before previous transaction was staged"
                        );
                    }
                    trace!(tx = %tx.identifier(), leader = %leader, "Resolved shard leader");
                    if plan.kind.is_write() {
                        futures.push(probe.ready_future(step));
                    }
                }
                Err(ChainError::Routing(e)) => {
                    metrics.record_routing_failure();
                    debug!(tx = %tx.identifier(), error = %e, "Shard lookup failed");
                    routed = false;
                    break;
                }
                Err(ChainError::Readiness(e)) => {
                    metrics.record_readiness_failure();
                    debug!(tx = %tx.identifier(), error = %e, "Previous transaction failed to stage");
                    routed = false;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if !plan.kind.is_write() {
            metrics.record_read_only();
            continue;
        }

        if routed {
            metrics.record_write();
        } else {
            // Nothing was sent to any shard; release the chain without
            // waiting on anything.
            futures.clear();
            metrics.record_abandoned();
        }

        let staged = !futures.is_empty();
        tx.ready(futures)?;
        permits.release();
        previous = staged.then_some(probe);
    }

    chain.close();
    Ok(chain.chain_id().clone())
}

/// Tracks whether every shard of one transaction has finished staging.
///
/// Complete once all shards succeeded or any one failed, which is exactly
/// when the chain's combined readiness resolves.
#[derive(Clone)]
struct StagingProbe {
    inner: Arc<ProbeInner>,
}

struct ProbeInner {
    remaining: AtomicUsize,
    failed: AtomicBool,
}

impl StagingProbe {
    fn new(shards: usize) -> Self {
        Self {
            inner: Arc::new(ProbeInner {
                remaining: AtomicUsize::new(shards),
                failed: AtomicBool::new(false),
            }),
        }
    }

    fn is_complete(&self) -> bool {
        self.inner.failed.load(Ordering::Acquire)
            || self.inner.remaining.load(Ordering::Acquire) == 0
    }

    /// Simulated shard staging for `step`, reporting into this probe.
    fn ready_future(&self, step: &ShardStep) -> ReadyFuture {
        let inner = self.inner.clone();
        let shard = step.shard.clone();
        let fails = step.fails;
        // The shard starts staging now, not when the future is first polled.
        let staging = tokio::time::sleep(step.ready_delay);

        async move {
            staging.await;
            if fails {
                inner.failed.store(true, Ordering::Release);
                return Err(ReadinessError::Rejected {
                    shard,
                    reason: "simulated staging failure".to_string(),
                });
            }
            inner.remaining.fetch_sub(1, Ordering::AcqRel);
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PermitConfig, ShardConfig, WorkloadConfig};
    use std::time::Duration;
    use tracing_test::traced_test;

    fn config(chains: usize, transactions: usize) -> SimulatorConfig {
        SimulatorConfig::new(4).with_seed(42).with_workload(
            WorkloadConfig::default()
                .with_num_chains(chains)
                .with_transactions_per_chain(transactions),
        )
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_clean_run_keeps_order_and_closes_everywhere() {
        let report = Simulator::new(config(3, 20)).run().await.unwrap();

        assert_eq!(report.chains, 3);
        assert_eq!(report.chains_closed_everywhere, 3);
        assert_eq!(report.write_transactions + report.read_only_transactions, 60);
        assert_eq!(report.abandoned_transactions, 0);
        assert_eq!(report.routing_failures, 0);
        assert_eq!(report.readiness_failures, 0);
        assert_eq!(report.ordering_violations, 0);
        assert!(report.is_clean());
        // Every lookup sits behind the router's 1ms latency.
        assert!(report.routing_p50 >= Duration::from_millis(1));
        assert!(report.routing_max >= report.routing_p99);
        assert!(report.routing_max < Duration::from_secs(1));
        assert!(logs_contain("Simulation complete"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_staging_failures_fail_following_lookups() {
        let config = config(4, 30).with_workload(
            WorkloadConfig::default()
                .with_num_chains(4)
                .with_transactions_per_chain(30)
                .with_read_only_ratio(0.0)
                .with_failure_ratio(0.3),
        );
        let report = Simulator::new(config).run().await.unwrap();

        assert!(report.readiness_failures > 0);
        assert_eq!(
            report.write_transactions + report.abandoned_transactions,
            120
        );
        assert_eq!(report.ordering_violations, 0);
        assert_eq!(report.chains_closed_everywhere, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaderless_shard_counts_routing_failures() {
        let config = config(2, 20)
            .with_shards(vec![
                ShardConfig::numbered(0),
                ShardConfig::numbered(1).leaderless(),
            ])
            .with_workload(
                WorkloadConfig::default()
                    .with_num_chains(2)
                    .with_transactions_per_chain(20)
                    .with_max_shards_per_transaction(2)
                    .with_shard_selection(crate::config::ShardSelection::RoundRobin),
            );
        let report = Simulator::new(config).run().await.unwrap();

        assert!(report.routing_failures > 0);
        assert_eq!(report.ordering_violations, 0);
        // Close still reaches the leaderless shard.
        assert_eq!(report.chains_closed_everywhere, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_limit_throttles_concurrent_chains() {
        let config = config(4, 5)
            .with_permits(PermitConfig {
                max_open_transactions: 1,
            })
            .with_workload(
                WorkloadConfig::default()
                    .with_num_chains(4)
                    .with_transactions_per_chain(5)
                    .with_read_only_ratio(0.0),
            );
        let report = Simulator::new(config).run().await.unwrap();

        assert!(report.throttled_permits > 0);
        assert_eq!(report.ordering_violations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_completes_on_first_failure() {
        let probe = StagingProbe::new(2);
        let slow = probe.ready_future(&ShardStep {
            shard: "alpha".into(),
            ready_delay: Duration::from_millis(50),
            fails: false,
        });
        let failing = probe.ready_future(&ShardStep {
            shard: "beta".into(),
            ready_delay: Duration::from_millis(5),
            fails: true,
        });

        assert!(!probe.is_complete());
        assert!(failing.await.is_err());
        assert!(probe.is_complete());
        assert!(slow.await.is_ok());
    }
}
