//! Binary entry point for Betakit.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - Registry initialization via adapter self-registration
//! - The headless `run` command driving scenarios against a target
//! - Event history viewing via `betakit events`
//! - Report regeneration from a persisted log via `betakit report`

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use betakit_cli::replay;
use betakit_cli::run::{ReportFormat, RunOptions, execute};
use betakit_core::{EventLog, global_registry};
use betakit_proto::Category;

#[derive(Parser)]
#[command(name = "betakit", version, about = "Beta-testing orchestration engine")]
struct Cli {
    /// Increase log verbosity (RUST_LOG overrides this).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios against a target build.
    Run(RunArgs),
    /// Print the persisted metrics event history.
    Events(EventsArgs),
    /// Regenerate report artifacts from a persisted event log.
    Report(ReportArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Target path, URL, or handle.
    #[arg(long)]
    target: String,

    /// Target category: web, windows, game, or vst.
    #[arg(long)]
    category: String,

    /// Scenario name to run; repeatable.
    #[arg(long = "scenario", required = true)]
    scenarios: Vec<String>,

    /// Directory containing scenario definition files.
    #[arg(long, default_value = "scenarios")]
    scenario_dir: PathBuf,

    /// JSON file with adapter configuration options.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Force headless mode (web targets).
    #[arg(long)]
    headless: bool,

    /// Durable metrics event log path.
    #[arg(long, default_value = ".betakit/metrics.jsonl")]
    metrics_log: PathBuf,

    /// Report output directory.
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,

    /// Report formats: json, html, exchange. Repeatable.
    #[arg(long = "format", default_values_t = [String::from("json"), String::from("html")])]
    formats: Vec<String>,

    /// Connect attempts before a scenario is abandoned.
    #[arg(long, default_value_t = 3)]
    connect_attempts: u32,

    /// Run each scenario as a stability benchmark for this many seconds.
    #[arg(long)]
    stability_secs: Option<u64>,
}

#[derive(clap::Args)]
struct EventsArgs {
    /// Metrics event log to read.
    #[arg(long, default_value = ".betakit/metrics.jsonl")]
    log: PathBuf,

    /// Only print the most recent N events.
    #[arg(long)]
    last: Option<usize>,
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Metrics event log to replay.
    #[arg(long, default_value = ".betakit/metrics.jsonl")]
    log: PathBuf,

    /// Report output directory.
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,

    /// Report formats: json, html. Repeatable.
    #[arg(long = "format", default_values_t = [String::from("json")])]
    formats: Vec<String>,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();
}

fn parse_formats(formats: &[String]) -> Result<Vec<ReportFormat>> {
    formats.iter().map(|f| ReportFormat::from_str(f)).collect()
}

async fn run_command(args: RunArgs) -> Result<ExitCode> {
    let registry = global_registry();
    betakit_adapters::register_defaults(registry).context("adapter registration failed")?;

    let category = Category::from_str(&args.category)?;
    let adapter_options = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("malformed adapter config {}", path.display()))?
        }
        None => serde_json::json!({}),
    };

    // Ctrl-C requests a graceful stop: in-flight operations finish, samples
    // gathered so far are preserved, and reports still render.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("stop requested, finishing in-flight operation");
            signal_token.cancel();
        }
    });

    let options = RunOptions {
        target: args.target,
        category,
        scenarios: args.scenarios,
        scenario_dir: args.scenario_dir,
        adapter_options,
        headless: args.headless,
        metrics_log: Some(args.metrics_log),
        report_dir: args.report_dir,
        formats: parse_formats(&args.formats)?,
        connect_attempts: args.connect_attempts,
        stability_secs: args.stability_secs,
    };

    let summary = execute(options, registry, cancel).await?;
    for report in &summary.reports {
        println!(
            "{}: {} passed, {} failed, {} skipped{}",
            report.scenario,
            report.count(betakit_proto::TestStatus::Passed),
            report.count(betakit_proto::TestStatus::Failed),
            report.count(betakit_proto::TestStatus::Skipped),
            if report.session_lost { " (session lost)" } else { "" },
        );
    }
    for artifact in &summary.artifacts {
        println!("report: {}", artifact.display());
    }

    Ok(if summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn events_command(args: &EventsArgs) -> Result<ExitCode> {
    let events = EventLog::read_all(&args.log)
        .with_context(|| format!("reading event log {}", args.log.display()))?;
    let skip = args
        .last
        .map(|n| events.len().saturating_sub(n))
        .unwrap_or(0);
    for event in &events[skip..] {
        println!("{}", replay::format_event(event.timestamp, &event.kind));
    }
    Ok(ExitCode::SUCCESS)
}

fn report_command(args: &ReportArgs) -> Result<ExitCode> {
    let formats = parse_formats(&args.formats)?;
    let artifacts = replay::regenerate(&args.log, &args.report_dir, &formats)?;
    for artifact in artifacts {
        println!("report: {}", artifact.display());
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => run_command(args).await,
        Commands::Events(args) => events_command(&args),
        Commands::Report(args) => report_command(&args),
    }
}
