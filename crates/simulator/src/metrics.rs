//! Metrics collection for simulation runs.

use hdrhistogram::{CreationError, Histogram};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Longest routing wait the histogram resolves (60s); longer waits clamp.
const MAX_TRACKED_MICROS: u64 = 60_000_000;

/// Collects counters and routing latencies while chains run.
///
/// Shared by all chain tasks; every method takes `&self`.
pub struct MetricsCollector {
    /// Routing wait in microseconds, from lookup start to leader answer.
    routing_latency: Mutex<Histogram<u64>>,

    write_transactions: AtomicU64,
    read_only_transactions: AtomicU64,
    lookups: AtomicU64,
    routing_failures: AtomicU64,
    readiness_failures: AtomicU64,
    abandoned_transactions: AtomicU64,
    ordering_violations: AtomicU64,
}

impl MetricsCollector {
    /// Create an empty collector.
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            routing_latency: Mutex::new(Histogram::new_with_bounds(1, MAX_TRACKED_MICROS, 3)?),
            write_transactions: AtomicU64::new(0),
            read_only_transactions: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
            routing_failures: AtomicU64::new(0),
            readiness_failures: AtomicU64::new(0),
            abandoned_transactions: AtomicU64::new(0),
            ordering_violations: AtomicU64::new(0),
        })
    }

    /// Record a successful shard lookup and how long it waited.
    pub fn record_lookup(&self, waited: Duration) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.routing_latency
            .lock()
            .saturating_record(waited.as_micros() as u64);
    }

    /// Record a lookup the router failed.
    pub fn record_routing_failure(&self) {
        self.routing_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup failed by an earlier transaction's readiness.
    pub fn record_readiness_failure(&self) {
        self.readiness_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write transaction readied without shards after a failed
    /// lookup.
    pub fn record_abandoned(&self) {
        self.abandoned_transactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write transaction readied on its shards.
    pub fn record_write(&self) {
        self.write_transactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed read-only transaction.
    pub fn record_read_only(&self) {
        self.read_only_transactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that answered before the previous transaction was
    /// staged everywhere.
    pub fn record_ordering_violation(&self) {
        self.ordering_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookups that answered early so far.
    pub fn ordering_violations(&self) -> u64 {
        self.ordering_violations.load(Ordering::Relaxed)
    }

    /// Snapshot the collected metrics.
    pub fn report(&self, run: RunSummary) -> SimulationReport {
        let latency = self.routing_latency.lock();
        let micros = |q: f64| Duration::from_micros(latency.value_at_quantile(q));

        SimulationReport {
            chains: run.chains,
            chains_closed_everywhere: run.chains_closed_everywhere,
            write_transactions: self.write_transactions.load(Ordering::Relaxed),
            read_only_transactions: self.read_only_transactions.load(Ordering::Relaxed),
            abandoned_transactions: self.abandoned_transactions.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            routing_failures: self.routing_failures.load(Ordering::Relaxed),
            readiness_failures: self.readiness_failures.load(Ordering::Relaxed),
            ordering_violations: self.ordering_violations.load(Ordering::Relaxed),
            throttled_permits: run.throttled_permits,
            routing_p50: micros(0.5),
            routing_p99: micros(0.99),
            routing_max: Duration::from_micros(latency.max()),
            elapsed: run.elapsed,
        }
    }
}

/// Run-level facts the collector does not see itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunSummary {
    pub chains: usize,
    pub chains_closed_everywhere: usize,
    pub throttled_permits: u64,
    pub elapsed: Duration,
}

/// Results of a simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationReport {
    pub chains: usize,
    /// Chains whose close reached every shard.
    pub chains_closed_everywhere: usize,
    pub write_transactions: u64,
    pub read_only_transactions: u64,
    pub abandoned_transactions: u64,
    pub lookups: u64,
    pub routing_failures: u64,
    pub readiness_failures: u64,
    pub ordering_violations: u64,
    pub throttled_permits: u64,
    pub routing_p50: Duration,
    pub routing_p99: Duration,
    pub routing_max: Duration,
    pub elapsed: Duration,
}

impl SimulationReport {
    /// Whether the run upheld chain ordering and cleanup.
    pub fn is_clean(&self) -> bool {
        self.ordering_violations == 0 && self.chains_closed_everywhere == self.chains
    }

    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        println!("{self}");
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Simulation Report ===")?;
        writeln!(f, "Elapsed:              {:?}", self.elapsed)?;
        writeln!(
            f,
            "Chains:               {} ({} closed on every shard)",
            self.chains, self.chains_closed_everywhere
        )?;
        writeln!(f, "Write transactions:   {}", self.write_transactions)?;
        writeln!(f, "Read-only:            {}", self.read_only_transactions)?;
        writeln!(f, "Abandoned writes:     {}", self.abandoned_transactions)?;
        writeln!(f, "Lookups:              {}", self.lookups)?;
        writeln!(f, "Routing failures:     {}", self.routing_failures)?;
        writeln!(f, "Readiness failures:   {}", self.readiness_failures)?;
        writeln!(f, "Throttled permits:    {}", self.throttled_permits)?;
        writeln!(
            f,
            "Routing wait:         p50 {:?}, p99 {:?}, max {:?}",
            self.routing_p50, self.routing_p99, self.routing_max
        )?;
        write!(f, "Ordering violations:  {}", self.ordering_violations)
    }
}
