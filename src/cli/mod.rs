//! CLI argument parsing and command dispatch

mod config;
mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loadgen_core::{OrchestratorBuilder, Phase, PhaseOutcome, RunReport};
use loadgen_storage::CsvSink;
use loadgen_vendors::{HttpInvoker, HttpOutcome};
use serde_json::Value;

use config::FileConfig;
use progress::{CountingSink, CountingSupplier, Progress, Spinner};

#[derive(Parser)]
#[command(name = "loadgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workload against the configured target
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the resolved phase schedule without sending traffic
    Plan {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run { config } => run(&config).await,
            Commands::Validate { config } => validate(&config),
            Commands::Plan { config, json } => plan(&config, json),
        }
    }
}

async fn run(path: &Path) -> Result<()> {
    let config = FileConfig::load(path)?;
    // nothing is opened or sent before the config checks out
    let phases = config.validate()?;

    let progress = Arc::new(Progress::default());
    let invoker = HttpInvoker::new(&config.target).context("invalid target")?;
    let supplier = CountingSupplier::new(config.payload.supplier()?, Arc::clone(&progress));
    let csv = CsvSink::<HttpOutcome>::create(&config.output.path, config.output.flush_interval)
        .context("failed to open result file")?;
    let sink = CountingSink::new(Arc::new(csv), Arc::clone(&progress));

    let orchestrator = OrchestratorBuilder::<Value, HttpOutcome>::new()
        .config(config.workload.clone())
        .invoker(Arc::new(invoker))
        .supplier(Arc::new(supplier))
        .sink(Arc::new(sink))
        .dispatch(config.dispatch.clone())
        .build()?;

    tracing::info!(
        url = %config.target.url,
        phases = phases.len(),
        output = %config.output.path.display(),
        "Starting loadgen"
    );

    let spinner = Spinner::start(Arc::clone(&progress))?;
    let report = orchestrator.run_with_signal_handling().await;
    spinner.finish("Run finished");

    let report = report?;
    print_report(&report);
    println!("Results written to {}", config.output.path.display());

    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let config = FileConfig::load(path)?;
    let phases = config.validate()?;

    let span = phases.iter().map(Phase::end_offset).max().unwrap_or_default();
    println!(
        "Configuration OK: {} phases spanning {:?} (max duration {:?})",
        phases.len(),
        span,
        config.workload.max_duration
    );
    if span > config.workload.max_duration {
        println!(
            "Note: phases past {:?} will be cut short or skipped",
            config.workload.max_duration
        );
    }
    Ok(())
}

fn plan(path: &Path, json: bool) -> Result<()> {
    let config = FileConfig::load(path)?;
    let phases = config.validate()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&phases)?);
        return Ok(());
    }

    println!(
        "{:<24} {:<9} {:>10} {:>10} {:>9} {:>9} {:>6}",
        "PHASE", "KIND", "START", "DURATION", "START_RPS", "END_RPS", "STEP"
    );
    for phase in &phases {
        println!(
            "{:<24} {:<9} {:>10} {:>10} {:>9} {:>9} {:>6}",
            phase.name,
            phase.kind.to_string(),
            format!("{:?}", phase.start_offset),
            format!("{:?}", phase.duration),
            phase.start_rps,
            phase.end_rps,
            phase.step
        );
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "{:<24} {:<14} {:>10} {:>10} {:>8} {:>10} {:>9}",
        "PHASE", "END", "DISPATCHED", "COMPLETED", "SHED", "ABANDONED", "PEAK_RPS"
    );
    for phase in &report.phases {
        match &phase.outcome {
            PhaseOutcome::Skipped => println!("{:<24} {:<14}", phase.name, "skipped"),
            PhaseOutcome::Ran { stats, drain } => println!(
                "{:<24} {:<14} {:>10} {:>10} {:>8} {:>10} {:>9}",
                phase.name,
                stats.end.to_string(),
                stats.dispatched,
                drain.completed,
                stats.shed,
                drain.abandoned,
                stats.peak_rps
            ),
        }
    }
    println!(
        "Total: {} dispatched, {} completed in {:.2}s ({:.1} req/s){}{}",
        report.total_dispatched(),
        report.total_completed(),
        report.elapsed.as_secs_f64(),
        report.dispatch_rate(),
        if report.deadline_reached { ", deadline reached" } else { "" },
        if report.cancelled { ", interrupted" } else { "" },
    );
}
