//! Runs incremental-unit networks described by JSON topology files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use network::{Network, TopologyConfig};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod demo;
mod record;

use record::Recorder;

/// Runs the demo modules wired by a topology file.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run incremental-unit networks", long_about = None)]
struct Cli {
    /// Log as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a topology until its sources finish.
    Run {
        /// Topology file (JSON).
        #[arg(long, value_name = "FILE")]
        topology: PathBuf,
        /// Record every emitted message as NDJSON under DIR/run_N.
        #[arg(long, value_name = "DIR")]
        record: Option<PathBuf>,
    },
    /// Print the introspection snapshot of a topology as JSON.
    Snapshot {
        /// Topology file (JSON).
        #[arg(long, value_name = "FILE")]
        topology: PathBuf,
        /// Run the network to completion first.
        #[arg(long)]
        after_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Run { topology, record } => run(&topology, record.as_deref()),
        Command::Snapshot {
            topology,
            after_run,
        } => snapshot(&topology, after_run),
    }
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    // Ignore error if already set (e.g., during tests).
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load(path: &Path) -> Result<Network> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read topology {path:?}"))?;
    let topology = TopologyConfig::from_json(&text)
        .with_context(|| format!("failed to parse topology {path:?}"))?;
    Ok(Network::from_topology(&topology, demo::build)?)
}

fn run(topology: &Path, record: Option<&Path>) -> Result<()> {
    let mut net = load(topology)?;
    let recorder = match record {
        Some(root) => Some(Recorder::start(root, net.tap(1024))?),
        None => None,
    };

    net.run()?;
    let outcome = net.wait();

    if let Some(recorder) = recorder {
        let dir = recorder.dir().to_path_buf();
        let written = recorder.finish()?;
        info!(dir = %dir.display(), written, "recording complete");
    }
    for module in net.snapshot().modules {
        info!(
            module = %module.name,
            steps = module.stats.steps,
            received = module.stats.received,
            emitted = module.stats.emitted,
            errors = module.stats.errors,
            failed = module.terminal_error.is_some(),
            "module finished"
        );
    }
    Ok(outcome?)
}

fn snapshot(topology: &Path, after_run: bool) -> Result<()> {
    let mut net = load(topology)?;
    if after_run {
        net.run()?;
        net.wait()?;
    }
    let json = serde_json::to_string_pretty(&net.snapshot()).context("serialize snapshot")?;
    println!("{json}");
    Ok(())
}
