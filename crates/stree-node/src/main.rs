mod cluster;
mod common;
mod events;
mod run;
mod simulate;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use stree_protocol::RuntimeConfig;
use stree_transport::{TransportConfig, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "stree-node", about = "Spanning-tree leader election node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one node from its topology file until it terminates.
    Run {
        /// Topology file (YAML) for this node.
        #[arg(long)]
        topology: PathBuf,
        /// Listen address (default: the topology address on --port).
        #[arg(long)]
        listen: Option<String>,
        #[command(flatten)]
        node: NodeOpts,
    },

    /// Run a whole cluster in this process, one task per node.
    Cluster {
        /// One topology file per node.
        #[arg(required = true)]
        topologies: Vec<PathBuf>,
        /// Give up on nodes still running after this long, in ms.
        #[arg(long, default_value = "30000")]
        timeout_ms: u64,
        /// Wait after the last node terminated, in ms.
        #[arg(long, default_value = "500")]
        grace_ms: u64,
        #[command(flatten)]
        node: NodeOpts,
    },

    /// Simulate a cluster in memory with a seeded delivery order.
    Simulate {
        /// One topology file per node.
        #[arg(required = true)]
        topologies: Vec<PathBuf>,
        /// Scheduler seed of the first run.
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Number of runs, with seeds seed, seed+1, ...
        #[arg(long, default_value = "1")]
        runs: u64,
        /// Scheduling steps before a run is abandoned.
        #[arg(long, default_value = "1000000")]
        max_steps: usize,
    },
}

/// Options shared by every command that opens sockets.
#[derive(Args, Clone)]
pub struct NodeOpts {
    /// Port for topology addresses that carry none.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Delay before a node sends its first EXPLORE, in ms.
    #[arg(long, default_value = "2000")]
    settle_ms: u64,
    /// Dial timeout per message, in ms.
    #[arg(long, default_value = "2000")]
    connect_timeout_ms: u64,
    /// Directory for the per-node `Log-<address>` files.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Seed for the initial neighbor choice (default: random).
    #[arg(long)]
    seed: Option<u64>,
}

impl NodeOpts {
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new().connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            settle_delay: Duration::from_millis(self.settle_ms),
            port: self.port,
            log_dir: self.log_dir.clone(),
            seed: self.seed,
            ..RuntimeConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    eprintln!("stree-node v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run {
            topology,
            listen,
            node,
        } => {
            let topology = stree_protocol::Topology::load(&topology)?;
            run::run(topology, listen, &node).await?;
        }

        Command::Cluster {
            topologies,
            timeout_ms,
            grace_ms,
            node,
        } => {
            let topologies = common::load_topologies(&topologies)?;
            cluster::run(
                topologies,
                &node,
                cluster::ClusterConfig {
                    timeout: Duration::from_millis(timeout_ms),
                    grace: Duration::from_millis(grace_ms),
                },
            )
            .await?;
        }

        Command::Simulate {
            topologies,
            seed,
            runs,
            max_steps,
        } => {
            let topologies = common::load_topologies(&topologies)?;
            simulate::run(&topologies, seed, runs, max_steps)?;
        }
    }

    Ok(())
}
