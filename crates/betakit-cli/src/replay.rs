//! The `betakit report` command: regenerate report artifacts from a
//! persisted metrics event log.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use betakit_core::{
    DEFAULT_MIN_RUNS, HtmlRenderer, JsonRenderer, MetricEventKind, MetricsCollector, Renderer,
    ReportGenerator, SuiteResult,
};
use betakit_proto::TestResult;

use crate::run::ReportFormat;

/// Rebuilds a collector from `log` and renders reports into `out_dir`.
///
/// Replay derives the exact aggregates of the run that produced the log; the
/// test results are presented as one `history` suite since suite grouping is
/// not part of the persisted event stream.
pub fn regenerate(log: &Path, out_dir: &Path, formats: &[ReportFormat]) -> Result<Vec<PathBuf>> {
    let collector = MetricsCollector::replay(log)
        .with_context(|| format!("replaying event log {}", log.display()))?;

    let mut generator = ReportGenerator::new();
    generator.add_suite(SuiteResult {
        name: "history".to_string(),
        results: history_results(&collector)?,
    });

    let report = generator.assemble(
        collector.snapshot()?,
        collector.flaky_tests(DEFAULT_MIN_RUNS)?,
    );

    let mut artifacts = Vec::new();
    for format in formats {
        let renderer: Box<dyn Renderer> = match format {
            ReportFormat::Json => Box::new(JsonRenderer),
            ReportFormat::Html => Box::new(HtmlRenderer),
            ReportFormat::Exchange => {
                anyhow::bail!("exchange bundles need a live run for environment data")
            }
        };
        artifacts.push(renderer.render(&report, out_dir)?);
    }
    Ok(artifacts)
}

/// Reconstructs test results from the replayed event history.
fn history_results(collector: &MetricsCollector) -> Result<Vec<TestResult>> {
    let mut results = Vec::new();
    for event in collector.events()? {
        if let MetricEventKind::TestResult {
            name,
            status,
            duration_ms,
            error_message,
        } = event.kind
        {
            results.push(TestResult {
                name,
                status,
                duration_ms,
                error_message,
                timestamp: event.timestamp,
            });
        }
    }
    Ok(results)
}

/// Formats one event line for `betakit events` output.
pub fn format_event(timestamp: DateTime<Utc>, kind: &MetricEventKind) -> String {
    match kind {
        MetricEventKind::TestResult {
            name,
            status,
            duration_ms,
            error_message,
        } => {
            let detail = error_message
                .as_deref()
                .map(|d| format!(" — {d}"))
                .unwrap_or_default();
            format!("{timestamp}  test_result  {name} {status:?} {duration_ms}ms{detail}")
        }
        MetricEventKind::BenchmarkSample {
            operation,
            elapsed_ms,
            value,
        } => {
            let payload = value.map(|v| format!(" value={v}")).unwrap_or_default();
            format!("{timestamp}  sample       {operation} {elapsed_ms}ms{payload}")
        }
        MetricEventKind::Crash => format!("{timestamp}  crash"),
    }
}
