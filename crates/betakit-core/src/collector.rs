//! Thread-safe, append-only metrics collection with on-demand aggregation.
//!
//! The collector owns the canonical ordered history of test-result,
//! benchmark-sample, and crash events across all adapters. Writers append
//! concurrently from any number of runners; readers derive aggregates on
//! demand. No aggregate is ever stored — the event history is authoritative,
//! and a collector rebuilt by replaying a persisted log derives identical
//! numbers.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use betakit_proto::{BenchmarkSample, Error, Result, TestResult, TestStatus};

use crate::events::{EventLog, MetricEvent, MetricEventKind};

/// Default recent-history window for flaky detection.
pub const DEFAULT_MIN_RUNS: usize = 3;

/// How many times a write retries the state lock before reporting
/// [`Error::StoreBusy`]. Writes never block indefinitely.
const LOCK_RETRIES: usize = 1024;

/// Point-in-time aggregate derived from the event history.
///
/// Recomputed on demand and never persisted; two collectors holding the same
/// event history produce identical snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// All recorded test results, including skipped ones.
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
    /// `passed / (total - skipped)`, or 0.0 when nothing executed.
    pub pass_rate: f64,
    pub crash_count: usize,
    /// Crashes per elapsed hour of the observed window; 0.0 for an empty or
    /// instantaneous window.
    pub crash_rate_per_hour: f64,
    /// Distinct test names with at least one recorded outcome.
    pub distinct_tests: usize,
    /// Distinct test names meeting the flaky criterion.
    pub flaky_tests: usize,
    /// `flaky_tests / distinct_tests`, or 0.0 when no tests recorded.
    pub flaky_rate: f64,
    /// Aggregate over all benchmark sample durations in the window.
    pub response: ResponseStats,
    /// Timestamp of the first event in the window, if any.
    pub window_start: Option<DateTime<Utc>>,
    /// Timestamp of the last event in the window, if any.
    pub window_end: Option<DateTime<Utc>>,
}

/// Mean and percentile aggregate over benchmark sample durations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseStats {
    pub samples: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl ResponseStats {
    /// Computes stats over raw millisecond durations (nearest-rank
    /// percentiles). Empty input yields all zeros rather than NaN.
    fn from_durations(mut durations: Vec<u64>) -> Self {
        if durations.is_empty() {
            return Self::default();
        }
        durations.sort_unstable();
        let n = durations.len();
        let sum: u64 = durations.iter().sum();
        let rank = |q: f64| -> f64 {
            let idx = ((q * n as f64).ceil() as usize).clamp(1, n) - 1;
            durations[idx] as f64
        };
        Self {
            samples: n,
            mean_ms: sum as f64 / n as f64,
            p50_ms: rank(0.50),
            p95_ms: rank(0.95),
            p99_ms: rank(0.99),
        }
    }
}

/// A test whose recent outcomes are inconsistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlakyTestDetail {
    pub name: String,
    /// All recorded executed runs for this name.
    pub total_runs: usize,
    /// Passes within the inspected recent window.
    pub pass_count: usize,
    /// Failures (failed or errored) within the inspected recent window.
    pub fail_count: usize,
    /// `min(pass, fail) / window`, in `[0, 0.5]`; higher is flakier.
    pub flakiness: f64,
}

struct CollectorState {
    events: Vec<MetricEvent>,
    log: Option<EventLog>,
}

/// Append-only, thread-safe store of metric events.
pub struct MetricsCollector {
    state: Mutex<CollectorState>,
}

impl MetricsCollector {
    /// Creates an in-memory collector.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CollectorState {
                events: Vec::new(),
                log: None,
            }),
        }
    }

    /// Creates a collector backed by a durable append log at `path`.
    ///
    /// Existing events in the log are loaded first, so reopening a log
    /// continues the same history.
    pub fn with_log(path: impl AsRef<Path>) -> Result<Self> {
        let events = EventLog::read_all(&path)?;
        let log = EventLog::open(&path)?;
        Ok(Self {
            state: Mutex::new(CollectorState {
                events,
                log: Some(log),
            }),
        })
    }

    /// Rebuilds a collector by replaying a persisted event log.
    ///
    /// The rebuilt collector is read-oriented (no durable sink attached) and
    /// derives aggregates identical to the run that produced the log.
    pub fn replay(path: impl AsRef<Path>) -> Result<Self> {
        let events = EventLog::read_all(&path)?;
        debug!(count = events.len(), "replayed metric events");
        Ok(Self {
            state: Mutex::new(CollectorState { events, log: None }),
        })
    }

    /// Acquires the state lock with bounded retries.
    ///
    /// Contention beyond the retry budget surfaces as `Error::StoreBusy`, the
    /// transient-retry signal; a caller is never parked indefinitely and a
    /// write is never silently dropped.
    fn lock_state(&self) -> Result<MutexGuard<'_, CollectorState>> {
        for _ in 0..LOCK_RETRIES {
            match self.state.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(std::sync::TryLockError::WouldBlock) => std::thread::yield_now(),
                // A panicked writer cannot have left a partial append; the
                // history is still consistent, so recover the guard.
                Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                    return Ok(poisoned.into_inner());
                }
            }
        }
        Err(Error::StoreBusy)
    }

    fn record(&self, event: MetricEvent) -> Result<()> {
        let mut state = self.lock_state()?;
        if let Some(log) = state.log.as_mut() {
            log.append(&event)?;
        }
        state.events.push(event);
        Ok(())
    }

    /// Records the outcome of one test invocation.
    pub fn record_test_result(&self, result: &TestResult) -> Result<()> {
        self.record(MetricEvent::from_test_result(result))
    }

    /// Records one benchmark sample.
    pub fn record_sample(&self, sample: &BenchmarkSample) -> Result<()> {
        self.record(MetricEvent::from_sample(sample))
    }

    /// Records a crash event at the current instant.
    pub fn record_crash(&self) -> Result<()> {
        self.record(MetricEvent::crash())
    }

    /// Number of recorded events.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock_state()?.events.len())
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock_state()?.events.is_empty())
    }

    /// Clones the full ordered event history.
    pub fn events(&self) -> Result<Vec<MetricEvent>> {
        Ok(self.lock_state()?.events.clone())
    }

    /// Derives a snapshot over all history with the default flaky window.
    pub fn snapshot(&self) -> Result<MetricsSnapshot> {
        self.snapshot_with(None, DEFAULT_MIN_RUNS)
    }

    /// Derives a snapshot over an optional `[since, until]` window with a
    /// caller-supplied flaky window size.
    pub fn snapshot_with(
        &self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        min_runs: usize,
    ) -> Result<MetricsSnapshot> {
        let state = self.lock_state()?;
        let events: Vec<&MetricEvent> = match window {
            Some((since, until)) => state
                .events
                .iter()
                .filter(|e| e.timestamp >= since && e.timestamp <= until)
                .collect(),
            None => state.events.iter().collect(),
        };
        Ok(derive_snapshot(&events, min_runs))
    }

    /// Lists flaky tests over the last-`min_runs` window per test name,
    /// flakiest first.
    pub fn flaky_tests(&self, min_runs: usize) -> Result<Vec<FlakyTestDetail>> {
        let state = self.lock_state()?;
        let events: Vec<&MetricEvent> = state.events.iter().collect();
        Ok(derive_flaky(&events, min_runs))
    }

    /// Response-time aggregate, optionally filtered by operation name.
    pub fn response_stats(&self, operation: Option<&str>) -> Result<ResponseStats> {
        let state = self.lock_state()?;
        let durations = state
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                MetricEventKind::BenchmarkSample {
                    operation: op,
                    elapsed_ms,
                    ..
                } if operation.is_none_or(|want| want == op) => Some(*elapsed_ms),
                _ => None,
            })
            .collect();
        Ok(ResponseStats::from_durations(durations))
    }

    /// Most recent `last_n` sample durations of one operation, oldest first,
    /// as `(timestamp, elapsed_ms)` points for trend charting.
    pub fn trend(&self, operation: &str, last_n: usize) -> Result<Vec<(DateTime<Utc>, f64)>> {
        let state = self.lock_state()?;
        let mut points: Vec<(DateTime<Utc>, f64)> = state
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                MetricEventKind::BenchmarkSample {
                    operation: op,
                    elapsed_ms,
                    ..
                } if op == operation => Some((e.timestamp, *elapsed_ms as f64)),
                _ => None,
            })
            .collect();
        if points.len() > last_n {
            points.drain(..points.len() - last_n);
        }
        Ok(points)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_snapshot(events: &[&MetricEvent], min_runs: usize) -> MetricsSnapshot {
    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    let mut errored = 0usize;
    let mut crash_count = 0usize;
    let mut durations = Vec::new();

    for event in events {
        match &event.kind {
            MetricEventKind::TestResult { status, .. } => match status {
                TestStatus::Passed => passed += 1,
                TestStatus::Failed => failed += 1,
                TestStatus::Skipped => skipped += 1,
                TestStatus::Error => errored += 1,
            },
            MetricEventKind::BenchmarkSample { elapsed_ms, .. } => durations.push(*elapsed_ms),
            MetricEventKind::Crash => crash_count += 1,
        }
    }

    let total_tests = passed + failed + skipped + errored;
    let executed = passed + failed + errored;
    let pass_rate = if executed > 0 {
        passed as f64 / executed as f64
    } else {
        0.0
    };

    let window_start = events.first().map(|e| e.timestamp);
    let window_end = events.last().map(|e| e.timestamp);
    let crash_rate_per_hour = match (window_start, window_end) {
        (Some(start), Some(end)) => {
            let hours = (end - start).num_milliseconds() as f64 / 3_600_000.0;
            if hours > 0.0 {
                crash_count as f64 / hours
            } else {
                0.0
            }
        }
        _ => 0.0,
    };

    let flaky = derive_flaky(events, min_runs);
    let distinct_tests = distinct_test_names(events);
    let flaky_tests = flaky.len();
    let flaky_rate = if distinct_tests > 0 {
        flaky_tests as f64 / distinct_tests as f64
    } else {
        0.0
    };

    MetricsSnapshot {
        total_tests,
        passed,
        failed,
        skipped,
        errored,
        pass_rate,
        crash_count,
        crash_rate_per_hour,
        distinct_tests,
        flaky_tests,
        flaky_rate,
        response: ResponseStats::from_durations(durations),
        window_start,
        window_end,
    }
}

fn distinct_test_names(events: &[&MetricEvent]) -> usize {
    let mut names = std::collections::HashSet::new();
    for event in events {
        if let MetricEventKind::TestResult { name, .. } = &event.kind {
            names.insert(name.as_str());
        }
    }
    names.len()
}

/// A test is flaky iff its most recent `min_runs` executed results contain
/// at least one pass and one failure. Skipped results reflect dispatch, not
/// target behavior, and are excluded from the window; errored results count
/// as failures. A name with fewer than `min_runs` executed results is never
/// flagged.
fn derive_flaky(events: &[&MetricEvent], min_runs: usize) -> Vec<FlakyTestDetail> {
    use std::collections::HashMap;

    let min_runs = min_runs.max(1);
    let mut histories: HashMap<&str, Vec<TestStatus>> = HashMap::new();
    for event in events {
        if let MetricEventKind::TestResult { name, status, .. } = &event.kind {
            if *status != TestStatus::Skipped {
                histories.entry(name.as_str()).or_default().push(*status);
            }
        }
    }

    let mut flaky = Vec::new();
    for (name, history) in &histories {
        if history.len() < min_runs {
            continue;
        }
        let window = &history[history.len() - min_runs..];
        let pass_count = window.iter().filter(|s| **s == TestStatus::Passed).count();
        let fail_count = window.iter().filter(|s| s.is_failure()).count();
        if pass_count > 0 && fail_count > 0 {
            flaky.push(FlakyTestDetail {
                name: (*name).to_string(),
                total_runs: history.len(),
                pass_count,
                fail_count,
                flakiness: pass_count.min(fail_count) as f64 / window.len() as f64,
            });
        }
    }

    flaky.sort_by(|a, b| {
        b.flakiness
            .partial_cmp(&a.flakiness)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    flaky
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn record_outcome(collector: &MetricsCollector, name: &str, status: TestStatus) {
        let result = match status {
            TestStatus::Passed => TestResult::passed(name, Duration::from_millis(10)),
            TestStatus::Failed => TestResult::failed(name, Duration::from_millis(10), "boom"),
            TestStatus::Skipped => TestResult::skipped(name, "not dispatched"),
            TestStatus::Error => TestResult::errored(name, Duration::from_millis(10), "infra"),
        };
        collector.record_test_result(&result).unwrap();
    }

    #[test]
    fn test_pass_rate_exact() {
        let collector = MetricsCollector::new();
        record_outcome(&collector, "a", TestStatus::Passed);
        record_outcome(&collector, "a", TestStatus::Passed);
        record_outcome(&collector, "b", TestStatus::Failed);
        record_outcome(&collector, "c", TestStatus::Error);

        let snapshot = collector.snapshot().unwrap();
        assert_eq!(snapshot.total_tests, 4);
        assert_eq!(snapshot.passed, 2);
        assert!((snapshot.pass_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_history_is_nan_safe() {
        let collector = MetricsCollector::new();
        let snapshot = collector.snapshot().unwrap();
        assert_eq!(snapshot.total_tests, 0);
        assert_eq!(snapshot.pass_rate, 0.0);
        assert_eq!(snapshot.crash_rate_per_hour, 0.0);
        assert_eq!(snapshot.flaky_rate, 0.0);
        assert_eq!(snapshot.response, ResponseStats::default());
        assert!(snapshot.window_start.is_none());
    }

    #[test]
    fn test_skipped_excluded_from_pass_rate() {
        let collector = MetricsCollector::new();
        record_outcome(&collector, "a", TestStatus::Passed);
        record_outcome(&collector, "b", TestStatus::Skipped);

        let snapshot = collector.snapshot().unwrap();
        assert_eq!(snapshot.total_tests, 2);
        assert!((snapshot.pass_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_flaky_requires_min_runs() {
        let collector = MetricsCollector::new();
        record_outcome(&collector, "t", TestStatus::Passed);
        record_outcome(&collector, "t", TestStatus::Failed);

        // Two runs, min_runs = 3: never flagged.
        assert!(collector.flaky_tests(3).unwrap().is_empty());
        // min_runs = 2: flagged.
        let flaky = collector.flaky_tests(2).unwrap();
        assert_eq!(flaky.len(), 1);
        assert_eq!(flaky[0].name, "t");
        assert_eq!(flaky[0].total_runs, 2);
    }

    #[test]
    fn test_flaky_window_is_most_recent() {
        let collector = MetricsCollector::new();
        // login_test: pass, fail, pass, pass — window of last 3 is
        // fail,pass,pass which still mixes outcomes, so it is flagged.
        for status in [
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Passed,
            TestStatus::Passed,
        ] {
            record_outcome(&collector, "login_test", status);
        }
        let flaky = collector.flaky_tests(3).unwrap();
        assert_eq!(flaky.len(), 1);
        assert_eq!(flaky[0].pass_count, 2);
        assert_eq!(flaky[0].fail_count, 1);

        // One more pass pushes the fail out of the window: no longer flaky.
        record_outcome(&collector, "login_test", TestStatus::Passed);
        assert!(collector.flaky_tests(3).unwrap().is_empty());
    }

    #[test]
    fn test_errored_counts_as_failure_for_flakiness() {
        let collector = MetricsCollector::new();
        record_outcome(&collector, "t", TestStatus::Passed);
        record_outcome(&collector, "t", TestStatus::Error);
        record_outcome(&collector, "t", TestStatus::Passed);

        let flaky = collector.flaky_tests(3).unwrap();
        assert_eq!(flaky.len(), 1);
        assert_eq!(flaky[0].fail_count, 1);
    }

    #[test]
    fn test_crash_rate_scales_with_window() {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let make_events = |span_hours: i64| -> Vec<MetricEvent> {
            vec![
                MetricEvent {
                    timestamp: base,
                    kind: MetricEventKind::Crash,
                },
                MetricEvent {
                    timestamp: base + chrono::Duration::hours(span_hours),
                    kind: MetricEventKind::TestResult {
                        name: "t".into(),
                        status: TestStatus::Passed,
                        duration_ms: 5,
                        error_message: None,
                    },
                },
            ]
        };

        let narrow = derive_snapshot(&make_events(1).iter().collect::<Vec<_>>(), 3);
        let wide = derive_snapshot(&make_events(2).iter().collect::<Vec<_>>(), 3);
        assert!((narrow.crash_rate_per_hour - 1.0).abs() < 1e-9);
        assert!((wide.crash_rate_per_hour - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_response_stats_percentiles() {
        let collector = MetricsCollector::new();
        for ms in [10u64, 20, 30, 40, 50, 60, 70, 80, 90, 100] {
            let sample = BenchmarkSample::new("op", Duration::from_millis(ms));
            collector.record_sample(&sample).unwrap();
        }
        let stats = collector.response_stats(Some("op")).unwrap();
        assert_eq!(stats.samples, 10);
        assert!((stats.mean_ms - 55.0).abs() < f64::EPSILON);
        assert!((stats.p50_ms - 50.0).abs() < f64::EPSILON);
        assert!((stats.p95_ms - 100.0).abs() < f64::EPSILON);
        assert!((stats.p99_ms - 100.0).abs() < f64::EPSILON);

        // Filter by a different operation: empty.
        let stats = collector.response_stats(Some("other")).unwrap();
        assert_eq!(stats.samples, 0);
    }

    #[test]
    fn test_trend_returns_last_n_in_order() {
        let collector = MetricsCollector::new();
        for ms in [10u64, 20, 30, 40] {
            let sample = BenchmarkSample::new("op", Duration::from_millis(ms));
            collector.record_sample(&sample).unwrap();
        }
        let points = collector.trend("op", 2).unwrap();
        assert_eq!(points.len(), 2);
        assert!((points[0].1 - 30.0).abs() < f64::EPSILON);
        assert!((points[1].1 - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_replay_reproduces_identical_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.jsonl");

        let live = MetricsCollector::with_log(&path).unwrap();
        record_outcome(&live, "login_test", TestStatus::Passed);
        record_outcome(&live, "login_test", TestStatus::Failed);
        record_outcome(&live, "checkout", TestStatus::Passed);
        live.record_crash().unwrap();
        live.record_sample(&BenchmarkSample::new("op", Duration::from_millis(42)))
            .unwrap();

        let live_snapshot = live.snapshot().unwrap();
        drop(live);

        let replayed = MetricsCollector::replay(&path).unwrap();
        let replayed_snapshot = replayed.snapshot().unwrap();

        assert_eq!(live_snapshot, replayed_snapshot);
        // Byte-for-byte identical serialized aggregates.
        assert_eq!(
            serde_json::to_string(&live_snapshot).unwrap(),
            serde_json::to_string(&replayed_snapshot).unwrap()
        );
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let collector = std::sync::Arc::new(MetricsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let collector = collector.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let result =
                            TestResult::passed(format!("t{i}_{j}"), Duration::from_millis(1));
                        // StoreBusy is a transient signal: retry until accepted.
                        loop {
                            match collector.record_test_result(&result) {
                                Ok(()) => break,
                                Err(Error::StoreBusy) => std::thread::yield_now(),
                                Err(other) => panic!("unexpected error: {other}"),
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(collector.len().unwrap(), 400);
    }

    #[test]
    fn test_reopened_log_continues_history() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.jsonl");

        {
            let collector = MetricsCollector::with_log(&path).unwrap();
            record_outcome(&collector, "a", TestStatus::Passed);
        }
        {
            let collector = MetricsCollector::with_log(&path).unwrap();
            record_outcome(&collector, "b", TestStatus::Failed);
            assert_eq!(collector.len().unwrap(), 2);
        }

        let replayed = MetricsCollector::replay(&path).unwrap();
        assert_eq!(replayed.len().unwrap(), 2);
    }
}
