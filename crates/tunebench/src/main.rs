//! tunebench
//!
//! Discovers cluster and virtualization topology and applies node tuning
//! (ring buffers, tuned profiles, reboots, environment tests).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use kameo::actor::{ActorRef, Spawn};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tunebench_core::{
    ActionExecutor, ActionOutcome, ApplyProfile, ApplyRingBuffers, BatchReport, ListNodes,
    RebootNodes, RunEnvTest, TuningActor, TuningActorArgs,
};
use tunebench_exec::SshExecutor;
use tunebench_inventory::{ClusterInventory, PodScope, VirtInventory};

mod config;
mod factory;

use config::{Config, DaemonConfig};

#[derive(Parser)]
#[command(name = "tunebench")]
#[command(about = "Topology discovery and node tuning for performance labs", long_about = None)]
struct Cli {
    /// Configuration file (default: $TUNEBENCH_CONFIG or standard paths)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List nodes matching a selector
    Nodes {
        /// Substring filter; defaults to the configured selector
        #[arg(short, long)]
        selector: Option<String>,
    },
    /// List pods and the nodes they run on
    Pods {
        /// Namespace; defaults to the configured one
        #[arg(short, long)]
        namespace: Option<String>,
        /// List every namespace
        #[arg(short = 'A', long, conflicts_with = "namespace")]
        all_namespaces: bool,
    },
    /// List network attachment definitions
    Networks,
    /// List virtualization hosts
    Hosts {
        /// Resolve a single host by ip, name, uuid, or moid
        key: Option<String>,
    },
    /// Apply the configured ring buffer sizes
    #[command(name = "ring-buffers")]
    RingBuffers {
        /// Target addresses; defaults to every selected node
        targets: Vec<String>,
    },
    /// Apply the configured tuned profile
    Profile {
        /// Target addresses; defaults to every selected node
        targets: Vec<String>,
    },
    /// Reboot nodes and wait for each to come back
    Reboot {
        /// Target addresses; defaults to every selected node
        targets: Vec<String>,
    },
    /// Run the configured client/server environment test
    #[command(name = "env-test")]
    EnvTest,
}

fn init_tracing(config: &DaemonConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config_path = Config::locate(cli.config.as_deref());
    let config = Config::load_or_default(config_path.as_deref())?;
    init_tracing(&config.daemon);
    match &config_path {
        Some(path) => info!(path = %path.display(), "config loaded"),
        None => warn!("no config file found, using defaults"),
    }

    match cli.command {
        Commands::Nodes { selector } => {
            let selector = selector.unwrap_or_else(|| config.cluster.node_selector.clone());
            let mut inventory = cluster_inventory(&config);
            for node in inventory.nodes(&selector, false).await?.values() {
                println!("{}\t{}", node.name, node.ip);
            }
        }
        Commands::Pods {
            namespace,
            all_namespaces,
        } => {
            let scope = match namespace.or_else(|| config.cluster.namespace.clone()) {
                Some(ns) if !all_namespaces => PodScope::Namespace(ns),
                _ => PodScope::AllNamespaces,
            };
            let mut inventory = cluster_inventory(&config);
            for pod in inventory.pods(&scope, false).await?.values() {
                println!("{}\t{}\t{}", pod.namespace, pod.name, pod.node);
            }
        }
        Commands::Networks => {
            let mut inventory = cluster_inventory(&config);
            for network in inventory.networks(false).await? {
                println!("{network}");
            }
        }
        Commands::Hosts { key } => {
            let source = factory::virt_source(config.vcenter.as_ref()).await?;
            let mut inventory = VirtInventory::new(Arc::new(source));
            let hosts = match key {
                Some(key) => vec![inventory.host(&key).await?],
                None => inventory.hosts(false).await?,
            };
            for host in hosts {
                println!("{}\t{}\t{}\t{}", host.name, host.ip, host.uuid, host.moid);
            }
        }
        Commands::RingBuffers { targets } => {
            if config.tuning.ring_buffers.is_empty() {
                eyre::bail!("no [[tuning.ring_buffers]] configured");
            }
            let tuning = spawn_tuning_actor(&config)?;
            let targets = prepare_targets(&tuning, &config, targets).await?;
            let report = tuning
                .actor
                .ask(ApplyRingBuffers {
                    targets: Some(targets),
                    specs: config.tuning.ring_buffers.clone(),
                })
                .await?;
            print_report(&report)?;
        }
        Commands::Profile { targets } => {
            let Some(profile) = config.tuning.profile.clone() else {
                eyre::bail!("no [tuning.profile] configured");
            };
            let tuning = spawn_tuning_actor(&config)?;
            let targets = prepare_targets(&tuning, &config, targets).await?;
            let report = tuning
                .actor
                .ask(ApplyProfile {
                    targets: Some(targets),
                    profile,
                })
                .await?;
            print_report(&report)?;
        }
        Commands::Reboot { targets } => {
            let tuning = spawn_tuning_actor(&config)?;
            let targets = prepare_targets(&tuning, &config, targets).await?;
            let report = tuning
                .actor
                .ask(RebootNodes {
                    targets: Some(targets),
                })
                .await?;
            print_report(&report)?;
        }
        Commands::EnvTest => {
            let Some(spec) = config.tuning.env_test.clone() else {
                eyre::bail!("no [tuning.env_test] configured");
            };
            let tuning = spawn_tuning_actor(&config)?;
            let report = tuning.actor.ask(RunEnvTest { spec }).await?;
            print_outcome("server", &report.server);
            match &report.client {
                Some(client) => print_outcome("client", client),
                None => println!("client: not started"),
            }
            if !report.success() {
                eyre::bail!("environment test failed");
            }
        }
    }

    Ok(())
}

fn cluster_inventory(config: &Config) -> ClusterInventory {
    ClusterInventory::new(Arc::new(factory::cluster_source(&config.cluster)))
}

/// Running tuning actor plus the SSH executor it drives
struct Tuning {
    actor: ActorRef<TuningActor>,
    ssh: Arc<SshExecutor>,
}

fn spawn_tuning_actor(config: &Config) -> Result<Tuning> {
    let ssh = Arc::new(factory::ssh_executor(&config.ssh)?);

    let args = TuningActorArgs {
        inventory: cluster_inventory(config),
        node_actions: ActionExecutor::new(ssh.clone(), config.executor.clone()),
        workload_actions: ActionExecutor::new(factory::local_executor(), config.executor.clone()),
        workload_target: factory::LOCAL_TARGET.to_string(),
        node_selector: config.cluster.node_selector.clone(),
    };
    Ok(Tuning {
        actor: TuningActor::spawn(args),
        ssh,
    })
}

/// Explicit targets or every selected node, with the bootstrap key installed
async fn prepare_targets(
    tuning: &Tuning,
    config: &Config,
    targets: Vec<String>,
) -> Result<Vec<String>> {
    let targets = if targets.is_empty() {
        let nodes = tuning.actor.ask(ListNodes::default()).await?;
        nodes.into_iter().map(|n| n.ip).collect()
    } else {
        targets
    };
    if targets.is_empty() {
        eyre::bail!("no nodes match selector {:?}", config.cluster.node_selector);
    }
    factory::bootstrap_keys(&tuning.ssh, &config.ssh, &targets).await?;
    info!(count = targets.len(), "targets prepared");
    Ok(targets)
}

fn print_outcome(label: &str, outcome: &ActionOutcome) {
    println!("{label}: {}", outcome.status_line());
}

/// Print one status line per target; error if any target failed
fn print_report(report: &BatchReport) -> Result<()> {
    for outcome in &report.outcomes {
        print_outcome(&outcome.target, outcome);
    }
    let elapsed = report.finished_at - report.started_at;
    info!(
        action = %report.action,
        succeeded = report.succeeded(),
        failed = report.failed(),
        changed = report.changed(),
        elapsed_ms = elapsed.num_milliseconds(),
        "batch finished"
    );
    if report.failed() > 0 {
        eyre::bail!(
            "{} of {} targets failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}
