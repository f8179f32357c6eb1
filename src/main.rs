//! # RuleFlow CLI
//!
//! Loads a flow file, feeds it events and drives the in-memory scheduler.
//!
//! Usage:
//!   ruleflow check                                  # Validate ~/.ruleflow/flow.toml
//!   ruleflow run --config flow.toml --events e.jsonl
//!   cat e.jsonl | ruleflow run --events -           # Events from stdin
//!
//! Event files hold one JSON object per line: `{"event": "...", "context": {...}}`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use ruleflow_core::FlowConfig;
use ruleflow_engine::{Flow, MemoryScheduler, declare, run_until_idle, spawn_redelivery};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ruleflow",
    version,
    about = "⚙️ RuleFlow — event-driven conditional task engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Register the configured channels, deliver events and run due tasks
    Run {
        /// Flow file (default: ~/.ruleflow/flow.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// JSON-lines event file, or "-" for stdin
        #[arg(short, long)]
        events: Option<String>,

        /// Stop the redelivery loop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Validate the flow file and list its channels
    Check {
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct EventLine {
    event: String,
    #[serde(default)]
    context: serde_json::Value,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn load_config(path: Option<&str>) -> Result<FlowConfig> {
    let config = match path {
        Some(p) => {
            let p = expand_path(p);
            FlowConfig::load_from(std::path::Path::new(&p))?
        }
        None => FlowConfig::load()?,
    };
    Ok(config)
}

fn read_events(source: &str) -> Result<Vec<EventLine>> {
    let content = if source == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read events from stdin")?
    } else {
        let path = expand_path(source);
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {path}"))?
    };
    parse_events(&content)
}

fn parse_events(content: &str) -> Result<Vec<EventLine>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid event on line {}", i + 1))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "ruleflow=debug,ruleflow_engine=debug"
    } else {
        "ruleflow=info,ruleflow_engine=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    match cli.command {
        Command::Check { config } => check(config.as_deref()),
        Command::Run {
            config,
            events,
            max_ticks,
        } => run(config.as_deref(), events.as_deref(), max_ticks).await,
    }
}

fn check(config: Option<&str>) -> Result<()> {
    let config = load_config(config)?;
    let mut flow = Flow::new(config.helpers.clone(), Arc::new(MemoryScheduler::new()));
    let count = declare(&mut flow, &config)?;

    println!("✅ {count} channels");
    for channel in flow.channels() {
        println!(
            "   {}/{}  after={}s every={}  immediate={} postponed={} actions={}",
            channel.event(),
            channel.name(),
            channel.delay(),
            channel
                .repeat_interval()
                .map(|s| format!("{s}s"))
                .unwrap_or_else(|| "-".into()),
            channel.immediate_rules().len(),
            channel.postponed_rules().len(),
            channel.action_count()
        );
    }
    Ok(())
}

async fn run(config: Option<&str>, events: Option<&str>, max_ticks: Option<u64>) -> Result<()> {
    let config = load_config(config)?;
    let scheduler = Arc::new(MemoryScheduler::new());
    let mut flow = Flow::new(config.helpers.clone(), scheduler.clone());
    let count = declare(&mut flow, &config)?;
    tracing::info!("⚙️ RuleFlow v{}: {count} channels", env!("CARGO_PKG_VERSION"));

    let events = match events {
        Some(source) => read_events(source)?,
        None => Vec::new(),
    };
    for line in events {
        match flow.message(&line.event, line.context).await {
            Ok(tasks) => tracing::info!("✅ '{}' scheduled {} tasks", line.event, tasks.len()),
            Err(e) if e.is_expected() => tracing::info!("'{}' not scheduled: {e}", line.event),
            Err(e) => tracing::warn!("⚠️ '{}' failed: {e}", line.event),
        }
    }

    let tick = Duration::from_secs(config.engine.tick_secs);
    if config.engine.idle_exit || max_ticks.is_some() {
        let stats = run_until_idle(&flow, &scheduler, tick, max_ticks).await;
        println!(
            "📊 processed={} triggered={} rejected={} failed={} pending={}",
            stats.processed,
            stats.triggered,
            stats.rejected,
            stats.failed,
            scheduler.len().await
        );
        return Ok(());
    }

    let handle = spawn_redelivery(Arc::new(flow), scheduler, tick);
    tokio::signal::ctrl_c().await?;
    tracing::info!("🛑 Shutting down");
    handle.abort();
    Ok(())
}
