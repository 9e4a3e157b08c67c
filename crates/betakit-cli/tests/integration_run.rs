//! CLI-level integration: the run command wired to a mock-backed registry,
//! exit-condition semantics, and report regeneration from the metrics log.

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use betakit_cli::replay;
use betakit_cli::run::{ReportFormat, RunOptions, execute};
use betakit_core::AdapterRegistry;
use betakit_core::testing::{MockAdapter, MockOutcome};
use betakit_proto::{Adapter, Category};

fn passing_factory() -> Box<dyn Adapter> {
    Box::new(MockAdapter::passing("web", Category::Web))
}

fn failing_factory() -> Box<dyn Adapter> {
    Box::new(MockAdapter::scripted(
        "web",
        Category::Web,
        vec![
            MockOutcome::Pass,
            MockOutcome::Fail("welcome banner missing".into()),
        ],
    ))
}

fn write_scenarios(dir: &TempDir) {
    std::fs::write(
        dir.path().join("onboarding.yaml"),
        r"
steps:
  - operation: page_load
  - operation: signup_form
",
    )
    .unwrap();
}

fn options(dir: &TempDir, formats: Vec<ReportFormat>) -> RunOptions {
    RunOptions {
        target: "https://app.example.com".to_string(),
        category: Category::Web,
        scenarios: vec!["onboarding".to_string()],
        scenario_dir: dir.path().to_path_buf(),
        adapter_options: serde_json::json!({}),
        headless: true,
        metrics_log: Some(dir.path().join("metrics.jsonl")),
        report_dir: dir.path().join("reports"),
        formats,
        connect_attempts: 3,
        stability_secs: None,
    }
}

#[tokio::test]
async fn run_all_passing_scenarios() {
    let dir = TempDir::new().unwrap();
    write_scenarios(&dir);

    let registry = AdapterRegistry::new();
    registry.register(Category::Web, passing_factory).unwrap();

    let summary = execute(
        options(&dir, vec![ReportFormat::Json, ReportFormat::Html]),
        &registry,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(summary.all_passed());
    assert_eq!(summary.artifacts.len(), 2);
    for artifact in &summary.artifacts {
        assert!(artifact.exists());
    }
}

#[tokio::test]
async fn run_with_failure_is_not_all_passed() {
    let dir = TempDir::new().unwrap();
    write_scenarios(&dir);

    let registry = AdapterRegistry::new();
    registry.register(Category::Web, failing_factory).unwrap();

    let summary = execute(
        options(&dir, vec![ReportFormat::Json]),
        &registry,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(!summary.all_passed());

    // The failed step surfaced as an issue in the rendered report.
    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("reports/report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["summary"]["failed"], 1);
    let issues = json["issues"].as_array().unwrap();
    assert!(
        issues
            .iter()
            .any(|i| i["description"] == "welcome banner missing")
    );
}

#[tokio::test]
async fn metrics_log_supports_report_regeneration() {
    let dir = TempDir::new().unwrap();
    write_scenarios(&dir);

    let registry = AdapterRegistry::new();
    registry.register(Category::Web, failing_factory).unwrap();

    execute(
        options(&dir, vec![ReportFormat::Json]),
        &registry,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    // Regenerate from the persisted log into a fresh directory.
    let out = dir.path().join("replayed");
    let artifacts = replay::regenerate(
        &dir.path().join("metrics.jsonl"),
        &out,
        &[ReportFormat::Json],
    )
    .unwrap();
    assert_eq!(artifacts.len(), 1);

    let live: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("reports/report.json")).unwrap(),
    )
    .unwrap();
    let replayed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&artifacts[0]).unwrap()).unwrap();

    // The replayed aggregates match the live run exactly.
    assert_eq!(live["snapshot"], replayed["snapshot"]);
}

#[tokio::test]
async fn unreachable_target_is_reported_not_crashed() {
    let dir = TempDir::new().unwrap();
    write_scenarios(&dir);

    fn unreachable_factory() -> Box<dyn Adapter> {
        Box::new(MockAdapter::passing("web", Category::Web).with_connect_failures(99))
    }

    let registry = AdapterRegistry::new();
    registry.register(Category::Web, unreachable_factory).unwrap();

    let summary = execute(
        options(&dir, vec![ReportFormat::Json]),
        &registry,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(!summary.all_passed());
    // No operations were dispatched against the unreachable target.
    assert_eq!(summary.reports[0].samples_recorded, 0);
}
