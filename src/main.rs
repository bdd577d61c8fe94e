use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use mastermind_collector::session::NullMetaSession;
use mastermind_collector::{Collector, create_default_config, load_config};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "collector.toml")]
    config: String,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Run one forced round, print the snapshot summary, and exit
    #[arg(long, default_value = "false")]
    oneshot: bool,
}

fn main() -> Result<()> {
    mastermind_collector::logging::init_logging();

    let args = Args::parse();

    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    let worker_threads = args.threads.unwrap_or(num_cpus);

    info!(
        "Starting collector with {} worker threads (detected {} CPUs)",
        worker_threads, num_cpus
    );
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;
    rt.block_on(run_collector(args))
}

async fn run_collector(args: Args) -> Result<()> {
    let config = if std::path::Path::new(&args.config).exists() {
        match load_config(&args.config) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config file '{}': {}", args.config, e);
                return Err(e);
            }
        }
    } else {
        warn!(
            "Config file '{}' not found, creating default config",
            args.config
        );
        let default_config = create_default_config();
        let config_toml = toml::to_string_pretty(&default_config)?;
        std::fs::write(&args.config, &config_toml)?;
        info!("Created default config file: {}", args.config);
        default_config
    };

    info!("Polling {} storage nodes:", config.nodes.len());
    for node in &config.nodes {
        info!("  - {}:{}:{}", node.host, node.port, node.family);
    }

    // the storage client library is wired in by the embedding service;
    // standalone runs collect monitor stats only
    let collector = Collector::new(config, Arc::new(NullMetaSession), None);

    if args.oneshot {
        collector.force_update().await?;
        let summary = collector.summary().await;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        collector.shutdown();
        return Ok(());
    }

    wait_for_termination().await?;
    info!("Shutdown signal received, stopping collector...");
    collector.shutdown();
    info!("Collector stopped");
    Ok(())
}

/// Block until the process is asked to stop.
///
/// The collector runs until SIGINT or SIGTERM; an in-flight round then
/// aborts at its next stage barrier instead of committing.
async fn wait_for_termination() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c().await?;

    Ok(())
}
