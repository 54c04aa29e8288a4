//! Transaction chain simulator CLI
//!
//! Runs a seeded chain workload against an in-memory cluster and prints a
//! report. Exits with an error if any chain broke ordering or cleanup.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use txchain_simulator::{ShardConfig, ShardSelection, Simulator, SimulatorConfig};

#[derive(Parser)]
#[command(name = "txchain-sim")]
#[command(about = "Transaction chain simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default configuration as TOML
    Config {
        /// Number of shards
        #[arg(long, default_value = "4")]
        num_shards: usize,
    },

    /// Run a simulation
    Run {
        /// TOML configuration file; command-line flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of shards (replaces configured shards)
        #[arg(long)]
        num_shards: Option<usize>,

        /// Number of concurrent chains
        #[arg(long)]
        chains: Option<usize>,

        /// Transactions per chain
        #[arg(long)]
        transactions: Option<usize>,

        /// Probability a shard fails to stage a write (0.0 to 1.0)
        #[arg(long)]
        failure_ratio: Option<f64>,

        /// Shard selection mode (random, round-robin)
        #[arg(long)]
        selection: Option<String>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn parse_selection(s: &str) -> anyhow::Result<ShardSelection> {
    match s.to_lowercase().as_str() {
        "random" => Ok(ShardSelection::Random),
        "round-robin" | "roundrobin" => Ok(ShardSelection::RoundRobin),
        _ => bail!("Unknown selection mode: {s}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { num_shards } => {
            // Don't initialize tracing - output goes to stdout
            let config = SimulatorConfig::new(num_shards);
            print!("{}", toml::to_string_pretty(&config)?);
        }

        Commands::Run {
            config,
            num_shards,
            chains,
            transactions,
            failure_ratio,
            selection,
            seed,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();

            let mut config = match config {
                Some(path) => SimulatorConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => SimulatorConfig::default(),
            };

            if let Some(n) = num_shards {
                config.shards = (0..n).map(ShardConfig::numbered).collect();
            }
            if let Some(chains) = chains {
                config.workload.num_chains = chains;
            }
            if let Some(transactions) = transactions {
                config.workload.transactions_per_chain = transactions;
            }
            if let Some(ratio) = failure_ratio {
                config.workload.failure_ratio = ratio;
            }
            if let Some(selection) = selection {
                config.workload.shard_selection = parse_selection(&selection)?;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }

            let report = Simulator::new(config).run().await?;
            report.print();

            if !report.is_clean() {
                bail!(
                    "{} ordering violations, {} of {} chains closed on every shard",
                    report.ordering_violations,
                    report.chains_closed_everywhere,
                    report.chains
                );
            }
        }
    }

    Ok(())
}
