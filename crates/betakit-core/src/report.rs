//! Report assembly over collected metrics.
//!
//! The generator gathers suite results, issues, trend series, and
//! screenshot-diff records, then assembles them together with a
//! [`MetricsSnapshot`] into a single [`Report`] value. Renderers consume only
//! that value, so every output format presents the same underlying facts.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use betakit_proto::{TestResult, TestStatus};

use crate::collector::{FlakyTestDetail, MetricsSnapshot};
use crate::runner::ScenarioReport;

/// Issue severity, most severe last so `Ord` sorts naturally ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Canonical lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// A reported issue, possibly merged from repeated observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Stable identifier, `ISSUE-<n>` in insertion order.
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// Tests this issue was observed in.
    pub tests: Vec<String>,
    /// Artifact reference, opaque to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// How many times a duplicate of this issue was reported.
    pub occurrences: u32,
    pub created: DateTime<Utc>,
}

/// One labelled point on a trend chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label: String,
    pub value: f64,
}

/// A named series of labelled points mapped to a rate or duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub name: String,
    pub points: Vec<TrendPoint>,
}

/// Baseline/current/diff artifact references for a visual comparison.
/// The artifacts themselves are opaque to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotDiff {
    pub name: String,
    pub baseline: String,
    pub current: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Results of one suite (scenario) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub results: Vec<TestResult>,
}

impl SuiteResult {
    /// Pass/fail/skip statistics for this suite.
    pub fn summary(&self) -> SuiteSummary {
        let mut summary = SuiteSummary::default();
        for result in &self.results {
            summary.add(result.status);
        }
        summary
    }
}

/// Pass/fail/skip statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
    /// `passed / (total - skipped)`, 0.0 when nothing executed.
    pub pass_rate: f64,
}

impl SuiteSummary {
    fn add(&mut self, status: TestStatus) {
        self.total += 1;
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Error => self.errored += 1,
        }
        let executed = self.passed + self.failed + self.errored;
        self.pass_rate = if executed > 0 {
            self.passed as f64 / executed as f64
        } else {
            0.0
        };
    }

    fn merge(&mut self, other: &SuiteSummary) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.errored += other.errored;
        let executed = self.passed + self.failed + self.errored;
        self.pass_rate = if executed > 0 {
            self.passed as f64 / executed as f64
        } else {
            0.0
        };
    }
}

/// The assembled report: every renderer consumes exactly this value.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub snapshot: MetricsSnapshot,
    pub summary: SuiteSummary,
    pub suites: Vec<SuiteResult>,
    pub issues: Vec<Issue>,
    pub trends: Vec<TrendSeries>,
    pub screenshot_diffs: Vec<ScreenshotDiff>,
    pub flaky: Vec<FlakyTestDetail>,
    pub key_points: Vec<String>,
}

/// Accumulates run artifacts and assembles them into a [`Report`].
pub struct ReportGenerator {
    suites: Vec<SuiteResult>,
    issues: Vec<Issue>,
    trends: Vec<TrendSeries>,
    screenshot_diffs: Vec<ScreenshotDiff>,
    whitespace: Regex,
}

impl ReportGenerator {
    /// Creates an empty generator.
    pub fn new() -> Self {
        Self {
            suites: Vec::new(),
            issues: Vec::new(),
            trends: Vec::new(),
            screenshot_diffs: Vec::new(),
            whitespace: Regex::new(r"\s+").expect("static regex"),
        }
    }

    /// Adds a suite of test results.
    pub fn add_suite(&mut self, suite: SuiteResult) {
        self.suites.push(suite);
    }

    /// Adds a scenario run as a suite.
    pub fn add_scenario_report(&mut self, report: &ScenarioReport) {
        self.suites.push(SuiteResult {
            name: report.scenario.clone(),
            results: report.steps.iter().map(|s| s.result.clone()).collect(),
        });
    }

    /// Adds an issue, merging duplicates.
    ///
    /// Titles are compared case-insensitively with collapsed whitespace; a
    /// title contained in (or containing) an existing one merges into it,
    /// bumping the occurrence counter and appending the associated test.
    /// Returns the (possibly pre-existing) issue id.
    pub fn add_issue(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        test_name: Option<&str>,
    ) -> String {
        let title = title.into();
        let normalized = self.normalize(&title);

        for issue in &mut self.issues {
            let existing = self.whitespace.replace_all(&issue.title, " ").to_lowercase();
            let existing = existing.trim().to_string();
            if existing == normalized
                || existing.contains(&normalized)
                || normalized.contains(&existing)
            {
                issue.occurrences += 1;
                if let Some(test) = test_name {
                    if !issue.tests.iter().any(|t| t == test) {
                        issue.tests.push(test.to_string());
                    }
                }
                return issue.id.clone();
            }
        }

        let id = format!("ISSUE-{}", self.issues.len() + 1);
        self.issues.push(Issue {
            id: id.clone(),
            title,
            description: description.into(),
            severity,
            tests: test_name.map(|t| vec![t.to_string()]).unwrap_or_default(),
            screenshot: None,
            occurrences: 1,
            created: Utc::now(),
        });
        id
    }

    /// Attaches a screenshot artifact reference to an issue.
    pub fn attach_screenshot(&mut self, issue_id: &str, path: impl Into<String>) -> bool {
        match self.issues.iter_mut().find(|i| i.id == issue_id) {
            Some(issue) => {
                issue.screenshot = Some(path.into());
                true
            }
            None => false,
        }
    }

    /// Adds a trend series.
    pub fn add_trend_series(&mut self, series: TrendSeries) {
        self.trends.push(series);
    }

    /// Adds a screenshot-diff record.
    pub fn add_screenshot_diff(&mut self, diff: ScreenshotDiff) {
        self.screenshot_diffs.push(diff);
    }

    /// Issues recorded so far.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Assembles the final report around a metrics snapshot.
    ///
    /// Issues are ordered most severe first; the key-points summary is
    /// derived from the same facts the renderers present.
    pub fn assemble(&self, snapshot: MetricsSnapshot, flaky: Vec<FlakyTestDetail>) -> Report {
        let mut summary = SuiteSummary::default();
        for suite in &self.suites {
            summary.merge(&suite.summary());
        }

        let mut issues = self.issues.clone();
        issues.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.id.cmp(&b.id)));

        let key_points = self.key_points(&summary, &issues, &flaky);

        Report {
            generated_at: Utc::now(),
            snapshot,
            summary,
            suites: self.suites.clone(),
            issues,
            trends: self.trends.clone(),
            screenshot_diffs: self.screenshot_diffs.clone(),
            flaky,
            key_points,
        }
    }

    fn key_points(
        &self,
        summary: &SuiteSummary,
        issues: &[Issue],
        flaky: &[FlakyTestDetail],
    ) -> Vec<String> {
        let mut points = Vec::new();
        points.push(format!(
            "Ran {} tests with {:.1}% pass rate",
            summary.total,
            summary.pass_rate * 100.0
        ));
        if summary.failed > 0 {
            points.push(format!("{} tests failed", summary.failed));
        }
        if summary.errored > 0 {
            points.push(format!(
                "{} tests errored (infrastructure issues)",
                summary.errored
            ));
        }
        if !flaky.is_empty() {
            points.push(format!("{} flaky tests detected", flaky.len()));
        }
        let critical = issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count();
        if critical > 0 {
            points.push(format!("{critical} critical issues found"));
        }
        for issue in issues {
            let occurrences = if issue.occurrences > 1 {
                format!(" ({}x)", issue.occurrences)
            } else {
                String::new()
            };
            points.push(format!(
                "[{}] {}{}",
                issue.severity.as_str(),
                issue.title,
                occurrences
            ));
        }
        points
    }

    fn normalize(&self, title: &str) -> String {
        self.whitespace
            .replace_all(title, " ")
            .trim()
            .to_lowercase()
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MetricsCollector;
    use std::time::Duration;

    fn suite(name: &str, statuses: &[TestStatus]) -> SuiteResult {
        let results = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| match status {
                TestStatus::Passed => TestResult::passed(format!("t{i}"), Duration::from_millis(5)),
                TestStatus::Failed => {
                    TestResult::failed(format!("t{i}"), Duration::from_millis(5), "boom")
                }
                TestStatus::Skipped => TestResult::skipped(format!("t{i}"), "skipped"),
                TestStatus::Error => {
                    TestResult::errored(format!("t{i}"), Duration::from_millis(5), "infra")
                }
            })
            .collect();
        SuiteResult {
            name: name.to_string(),
            results,
        }
    }

    #[test]
    fn test_suite_summary_counts() {
        let suite = suite(
            "onboarding",
            &[
                TestStatus::Passed,
                TestStatus::Passed,
                TestStatus::Failed,
                TestStatus::Skipped,
            ],
        );
        let summary = suite.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        // Skipped excluded from the denominator.
        assert!((summary.pass_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_issue_duplicate_merging() {
        let mut generator = ReportGenerator::new();
        let first = generator.add_issue(
            "Login button missing",
            "The login button is not rendered",
            Severity::High,
            Some("login_test"),
        );
        // Same title modulo case/whitespace merges.
        let second = generator.add_issue(
            "login  button MISSING",
            "seen again",
            Severity::High,
            Some("signup_test"),
        );
        assert_eq!(first, second);
        assert_eq!(generator.issues().len(), 1);
        assert_eq!(generator.issues()[0].occurrences, 2);
        assert_eq!(generator.issues()[0].tests, ["login_test", "signup_test"]);

        // Containment either way merges too.
        let third = generator.add_issue("Login button", "prefix", Severity::High, None);
        assert_eq!(first, third);
        assert_eq!(generator.issues()[0].occurrences, 3);

        // Unrelated titles do not merge.
        let other = generator.add_issue("Checkout hangs", "spinner forever", Severity::Critical, None);
        assert_ne!(first, other);
        assert_eq!(generator.issues().len(), 2);
    }

    #[test]
    fn test_assemble_orders_issues_by_severity() {
        let mut generator = ReportGenerator::new();
        generator.add_issue("minor padding", "cosmetic", Severity::Low, None);
        generator.add_issue("data loss on save", "critical path", Severity::Critical, None);
        generator.add_issue("slow search", "5s latency", Severity::Medium, None);

        let collector = MetricsCollector::new();
        let report = generator.assemble(collector.snapshot().unwrap(), Vec::new());

        let severities: Vec<Severity> = report.issues.iter().map(|i| i.severity).collect();
        assert_eq!(
            severities,
            [Severity::Critical, Severity::Medium, Severity::Low]
        );
    }

    #[test]
    fn test_key_points_reflect_summary_and_issues() {
        let mut generator = ReportGenerator::new();
        generator.add_suite(suite(
            "onboarding",
            &[TestStatus::Passed, TestStatus::Failed],
        ));
        generator.add_issue("data loss on save", "critical path", Severity::Critical, None);
        generator.add_issue("data loss on save", "again", Severity::Critical, None);

        let collector = MetricsCollector::new();
        let report = generator.assemble(collector.snapshot().unwrap(), Vec::new());

        assert_eq!(report.key_points[0], "Ran 2 tests with 50.0% pass rate");
        assert!(report.key_points.contains(&"1 tests failed".to_string()));
        assert!(report.key_points.contains(&"1 critical issues found".to_string()));
        assert!(
            report
                .key_points
                .iter()
                .any(|p| p.contains("data loss on save (2x)"))
        );
    }

    #[test]
    fn test_overall_summary_merges_suites() {
        let mut generator = ReportGenerator::new();
        generator.add_suite(suite("a", &[TestStatus::Passed, TestStatus::Passed]));
        generator.add_suite(suite("b", &[TestStatus::Failed]));

        let collector = MetricsCollector::new();
        let report = generator.assemble(collector.snapshot().unwrap(), Vec::new());

        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.passed, 2);
        assert!((report.summary.pass_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
