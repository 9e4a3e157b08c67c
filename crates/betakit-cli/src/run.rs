//! The `betakit run` command: resolve an adapter, drive the selected
//! scenarios against the target, and render reports.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use betakit_core::{
    AdapterRegistry, BenchmarkRunner, DEFAULT_MIN_RUNS, ExchangeRenderer, HtmlRenderer,
    JsonRenderer, MetricsCollector, Renderer, ReportGenerator, ScenarioReport, Severity,
    TrendPoint, TrendSeries, connect_with_retries,
};
use betakit_proto::{Category, TargetDescriptor, TestStatus};

use crate::scenario::load_scenario;

/// Report output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Html,
    Exchange,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(ReportFormat::Json),
            "html" => Ok(ReportFormat::Html),
            "exchange" => Ok(ReportFormat::Exchange),
            other => anyhow::bail!("unknown report format {other:?} (json, html, exchange)"),
        }
    }
}

/// Everything `betakit run` needs, independent of argument parsing.
#[derive(Debug)]
pub struct RunOptions {
    pub target: String,
    pub category: Category,
    pub scenarios: Vec<String>,
    pub scenario_dir: PathBuf,
    /// Adapter options object passed to `configure`.
    pub adapter_options: serde_json::Value,
    /// Forces headless mode into web adapter options.
    pub headless: bool,
    pub metrics_log: Option<PathBuf>,
    pub report_dir: PathBuf,
    pub formats: Vec<ReportFormat>,
    pub connect_attempts: u32,
    /// When set, each scenario loops as a stability benchmark for this long.
    pub stability_secs: Option<u64>,
}

/// Outcome of a run invocation.
pub struct RunSummary {
    pub reports: Vec<ScenarioReport>,
    pub artifacts: Vec<PathBuf>,
}

impl RunSummary {
    /// True iff every scenario passed completely; drives the exit code.
    pub fn all_passed(&self) -> bool {
        !self.reports.is_empty() && self.reports.iter().all(ScenarioReport::all_passed)
    }
}

/// Executes the selected scenarios and renders reports.
///
/// Each scenario gets a fresh adapter instance from the registry; a scenario
/// whose session dies does not stop the remaining scenarios.
pub async fn execute(
    options: RunOptions,
    registry: &AdapterRegistry,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let collector = match &options.metrics_log {
        Some(path) => Arc::new(MetricsCollector::with_log(path)?),
        None => Arc::new(MetricsCollector::new()),
    };
    let runner = BenchmarkRunner::new(collector.clone());
    let mut generator = ReportGenerator::new();
    let mut reports = Vec::new();

    let target = TargetDescriptor::new(options.target.clone(), options.category);
    let adapter_options = effective_options(&options);

    for name in &options.scenarios {
        if cancel.is_cancelled() {
            warn!("stop requested, skipping remaining scenarios");
            break;
        }

        let scenario = load_scenario(&options.scenario_dir, name)?;

        let mut adapter = registry.resolve(options.category)?;
        adapter.configure(&adapter_options)?;

        if let Err(e) = connect_with_retries(adapter.as_mut(), &target, options.connect_attempts).await
        {
            warn!(scenario = %name, error = %e, "could not connect, scenario not started");
            generator.add_issue(
                format!("{name}: could not connect to target"),
                e.to_string(),
                Severity::Critical,
                None,
            );
            // An unstarted scenario counts as not passed.
            reports.push(ScenarioReport {
                scenario: name.clone(),
                steps: Vec::new(),
                samples_recorded: 0,
                session_lost: true,
                cancelled: false,
            });
            continue;
        }

        let report = match options.stability_secs {
            Some(secs) => {
                runner
                    .run_stability(
                        adapter.as_mut(),
                        &scenario,
                        Duration::from_secs(secs),
                        &cancel,
                    )
                    .await?
            }
            None => runner.run_scenario(adapter.as_mut(), &scenario, &cancel).await?,
        };

        if let Err(e) = adapter.disconnect().await {
            // A lost session is already disconnected; anything else is noise
            // worth surfacing.
            warn!(scenario = %name, error = %e, "disconnect failed");
        }

        collect_issues(&mut generator, &report);
        generator.add_scenario_report(&report);
        info!(
            scenario = %name,
            passed = report.count(TestStatus::Passed),
            failed = report.count(TestStatus::Failed),
            "scenario finished"
        );
        reports.push(report);
    }

    add_response_trends(&mut generator, &collector, &reports)?;

    let assembled = generator.assemble(
        collector.snapshot()?,
        collector.flaky_tests(DEFAULT_MIN_RUNS)?,
    );
    let mut artifacts = Vec::new();
    for format in &options.formats {
        let renderer = build_renderer(*format, &options);
        let path = renderer
            .render(&assembled, &options.report_dir)
            .with_context(|| format!("rendering {} report", renderer.format_name()))?;
        info!(format = renderer.format_name(), path = %path.display(), "report written");
        artifacts.push(path);
    }

    Ok(RunSummary { reports, artifacts })
}

/// Applies the CLI headless flag on top of the configured adapter options.
fn effective_options(options: &RunOptions) -> serde_json::Value {
    let mut adapter_options = options.adapter_options.clone();
    if options.headless && options.category == Category::Web {
        if let Some(map) = adapter_options.as_object_mut() {
            map.insert("headless".to_string(), serde_json::Value::Bool(true));
        }
    }
    adapter_options
}

/// Adds a response-time trend series per operation observed during the run.
fn add_response_trends(
    generator: &mut ReportGenerator,
    collector: &MetricsCollector,
    reports: &[ScenarioReport],
) -> Result<()> {
    let mut operations = std::collections::BTreeSet::new();
    for report in reports {
        for step in &report.steps {
            operations.insert(step.operation.clone());
        }
    }
    for operation in operations {
        let points = collector.trend(&operation, 50)?;
        if points.len() < 2 {
            continue;
        }
        generator.add_trend_series(TrendSeries {
            name: format!("{operation} response time (ms)"),
            points: points
                .into_iter()
                .map(|(ts, value)| TrendPoint {
                    label: ts.format("%H:%M:%S").to_string(),
                    value,
                })
                .collect(),
        });
    }
    Ok(())
}

/// Turns failed and errored steps into report issues.
fn collect_issues(generator: &mut ReportGenerator, report: &ScenarioReport) {
    for step in &report.steps {
        let severity = match step.result.status {
            TestStatus::Failed => Severity::Medium,
            TestStatus::Error => Severity::High,
            _ => continue,
        };
        let detail = step
            .result
            .error_message
            .clone()
            .unwrap_or_else(|| "no detail".to_string());
        generator.add_issue(
            format!("{} failed in {}", step.operation, report.scenario),
            detail,
            severity,
            Some(step.result.name.as_str()),
        );
    }
    if report.session_lost {
        generator.add_issue(
            format!("{}: session lost mid-run", report.scenario),
            "remaining operations were skipped".to_string(),
            Severity::Critical,
            None,
        );
    }
}

fn build_renderer(format: ReportFormat, options: &RunOptions) -> Box<dyn Renderer> {
    match format {
        ReportFormat::Json => Box::new(JsonRenderer),
        ReportFormat::Html => Box::new(HtmlRenderer),
        ReportFormat::Exchange => {
            let environment = BTreeMap::from([
                ("target".to_string(), options.target.clone()),
                ("category".to_string(), options.category.to_string()),
                ("engine".to_string(), format!("betakit {}", env!("CARGO_PKG_VERSION"))),
            ]);
            Box::new(ExchangeRenderer::new(environment))
        }
    }
}
