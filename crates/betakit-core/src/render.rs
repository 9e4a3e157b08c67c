//! Output renderers for assembled reports.
//!
//! Every renderer consumes the same [`Report`] value; a format may lay the
//! facts out differently but never drops a recorded value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use betakit_proto::{Result, TestStatus};

use crate::report::Report;

/// Renders a [`Report`] into one artifact under an output directory.
pub trait Renderer {
    /// Short format tag, used for logging and CLI selection.
    fn format_name(&self) -> &'static str;

    /// Writes the artifact and returns its path.
    fn render(&self, report: &Report, out_dir: &Path) -> Result<PathBuf>;
}

/// Full report as pretty-printed JSON.
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn format_name(&self) -> &'static str {
        "json"
    }

    fn render(&self, report: &Report, out_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(out_dir)?;
        let path = out_dir.join("report.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Self-contained HTML page: summary tiles, key points, issue list, trend
/// tables, and screenshot-diff sections.
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn format_name(&self) -> &'static str {
        "html"
    }

    fn render(&self, report: &Report, out_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(out_dir)?;
        let path = out_dir.join("report.html");
        std::fs::write(&path, render_html(report))?;
        Ok(path)
    }
}

fn render_html(report: &Report) -> String {
    let mut html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Betakit Test Report</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        .summary {{ background: #f0f0f0; padding: 20px; border-radius: 8px; }}
        .stats {{ display: flex; gap: 20px; margin: 20px 0; }}
        .stat-box {{ background: white; padding: 15px; border-radius: 4px; text-align: center; }}
        .passed {{ color: green; }}
        .failed {{ color: red; }}
        .issue {{ padding: 10px; margin: 5px 0; border-left: 3px solid; }}
        .critical {{ border-color: red; background: #fff0f0; }}
        .high {{ border-color: orange; background: #fff8f0; }}
        .medium {{ border-color: #c0a000; background: #fffef0; }}
        .low {{ border-color: green; background: #f0fff0; }}
        table {{ border-collapse: collapse; }}
        td, th {{ border: 1px solid #ddd; padding: 6px 10px; }}
        .diff-images {{ display: flex; gap: 20px; }}
    </style>
</head>
<body>
    <h1>Betakit Test Report</h1>
    <p>Generated: {generated}</p>

    <div class="summary">
        <h2>Summary</h2>
        <div class="stats">
            <div class="stat-box"><h3>{total}</h3><p>Total Tests</p></div>
            <div class="stat-box passed"><h3>{passed}</h3><p>Passed</p></div>
            <div class="stat-box failed"><h3>{failed}</h3><p>Failed</p></div>
            <div class="stat-box"><h3>{skipped}</h3><p>Skipped</p></div>
            <div class="stat-box"><h3>{pass_rate:.1}%</h3><p>Pass Rate</p></div>
            <div class="stat-box"><h3>{crash_rate:.2}</h3><p>Crashes/h</p></div>
            <div class="stat-box"><h3>{flaky_rate:.1}%</h3><p>Flaky Rate</p></div>
            <div class="stat-box"><h3>{mean_ms:.1}ms</h3><p>Mean Response</p></div>
        </div>
    </div>
"#,
        generated = report.generated_at.format("%Y-%m-%d %H:%M:%S"),
        total = report.summary.total,
        passed = report.summary.passed,
        failed = report.summary.failed,
        skipped = report.summary.skipped,
        pass_rate = report.summary.pass_rate * 100.0,
        crash_rate = report.snapshot.crash_rate_per_hour,
        flaky_rate = report.snapshot.flaky_rate * 100.0,
        mean_ms = report.snapshot.response.mean_ms,
    );

    html.push_str("    <h2>Key Points</h2>\n    <ul>\n");
    for point in &report.key_points {
        html.push_str(&format!("        <li>{}</li>\n", escape(point)));
    }
    html.push_str("    </ul>\n");

    html.push_str(&format!("    <h2>Issues ({})</h2>\n", report.issues.len()));
    for issue in &report.issues {
        html.push_str(&format!(
            r#"    <div class="issue {class}">
        <strong>{title}</strong>
        <p>{description}</p>
        <small>Severity: {severity} &middot; Occurrences: {occurrences}</small>
    </div>
"#,
            class = issue.severity.as_str(),
            title = escape(&issue.title),
            description = escape(&issue.description),
            severity = issue.severity.as_str(),
            occurrences = issue.occurrences,
        ));
    }

    if !report.flaky.is_empty() {
        html.push_str("    <h2>Flaky Tests</h2>\n    <table>\n");
        html.push_str("        <tr><th>Test</th><th>Runs</th><th>Pass</th><th>Fail</th><th>Flakiness</th></tr>\n");
        for flaky in &report.flaky {
            html.push_str(&format!(
                "        <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.0}%</td></tr>\n",
                escape(&flaky.name),
                flaky.total_runs,
                flaky.pass_count,
                flaky.fail_count,
                flaky.flakiness * 100.0,
            ));
        }
        html.push_str("    </table>\n");
    }

    for series in &report.trends {
        html.push_str(&format!("    <h2>Trend: {}</h2>\n    <table>\n", escape(&series.name)));
        for point in &series.points {
            html.push_str(&format!(
                "        <tr><td>{}</td><td>{:.2}</td></tr>\n",
                escape(&point.label),
                point.value,
            ));
        }
        html.push_str("    </table>\n");
    }

    for diff in &report.screenshot_diffs {
        html.push_str(&format!(
            r#"    <h2>Screenshot Diff: {name}</h2>
    <div class="diff-images">
        <div><img src="{baseline}" alt="Baseline"><p>Baseline</p></div>
        <div><img src="{current}" alt="Current"><p>Current</p></div>
"#,
            name = escape(&diff.name),
            baseline = escape(&diff.baseline),
            current = escape(&diff.current),
        ));
        if let Some(diff_path) = &diff.diff {
            html.push_str(&format!(
                "        <div><img src=\"{}\" alt=\"Diff\"><p>Difference</p></div>\n",
                escape(diff_path)
            ));
        }
        html.push_str("    </div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Third-party-compatible exchange bundle: a directory of per-test result
/// files plus an `environment.properties` descriptor.
pub struct ExchangeRenderer {
    environment: BTreeMap<String, String>,
}

impl ExchangeRenderer {
    /// Creates a renderer with the given environment descriptor entries.
    pub fn new(environment: BTreeMap<String, String>) -> Self {
        Self { environment }
    }
}

impl Renderer for ExchangeRenderer {
    fn format_name(&self) -> &'static str {
        "exchange"
    }

    fn render(&self, report: &Report, out_dir: &Path) -> Result<PathBuf> {
        let bundle_dir = out_dir.join("exchange-results");
        std::fs::create_dir_all(&bundle_dir)?;

        for suite in &report.suites {
            for (index, result) in suite.results.iter().enumerate() {
                let status = match result.status {
                    TestStatus::Passed => "passed",
                    TestStatus::Failed => "failed",
                    TestStatus::Skipped => "skipped",
                    TestStatus::Error => "broken",
                };
                let mut entry = serde_json::json!({
                    "historyId": result.name,
                    "name": result.name,
                    "status": status,
                    "stage": "finished",
                    "labels": [
                        {"name": "suite", "value": suite.name},
                    ],
                    "start": result.timestamp.timestamp_millis(),
                    "stop": result.timestamp.timestamp_millis() + result.duration_ms as i64,
                });
                if let Some(message) = &result.error_message {
                    entry["statusDetails"] = serde_json::json!({ "message": message });
                }

                let filename = format!("{}-{index}-result.json", sanitize(&suite.name));
                let path = bundle_dir.join(filename);
                std::fs::write(&path, serde_json::to_string_pretty(&entry)?)?;
            }
        }

        let mut properties = String::new();
        for (key, value) in &self.environment {
            properties.push_str(&format!("{key}={value}\n"));
        }
        std::fs::write(bundle_dir.join("environment.properties"), properties)?;

        Ok(bundle_dir)
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
