//! Test and benchmark outcome shapes recorded during a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status of one test invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    /// Not executed (session lost or cancelled before dispatch).
    Skipped,
    /// Infrastructure failure rather than an assertion failure.
    Error,
}

impl TestStatus {
    /// Returns true if this status counts as a failing outcome.
    ///
    /// `Skipped` is neither pass nor fail; it reflects dispatch, not the
    /// target's behavior.
    pub fn is_failure(self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::Error)
    }
}

/// Outcome of one named test invocation. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Name of the test that ran.
    pub name: String,
    /// Pass/fail/skip/error outcome.
    pub status: TestStatus,
    /// Wall-clock duration of the invocation in milliseconds.
    pub duration_ms: u64,
    /// Failure detail, present for failed and errored results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the result was produced.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}

impl TestResult {
    /// Creates a passed result.
    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self::with_status(name, TestStatus::Passed, duration, None)
    }

    /// Creates a failed result with a failure detail.
    pub fn failed(name: impl Into<String>, duration: Duration, detail: impl Into<String>) -> Self {
        Self::with_status(name, TestStatus::Failed, duration, Some(detail.into()))
    }

    /// Creates a skipped result (zero duration).
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_status(name, TestStatus::Skipped, Duration::ZERO, Some(reason.into()))
    }

    /// Creates an errored result with an infrastructure failure detail.
    pub fn errored(name: impl Into<String>, duration: Duration, detail: impl Into<String>) -> Self {
        Self::with_status(name, TestStatus::Error, duration, Some(detail.into()))
    }

    fn with_status(
        name: impl Into<String>,
        status: TestStatus,
        duration: Duration,
        error_message: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            duration_ms: duration.as_millis() as u64,
            error_message,
            timestamp: Utc::now(),
        }
    }
}

/// One timed measurement of a single operation. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSample {
    /// Operation name, e.g. `element_find` or `ui_response`.
    pub operation: String,
    /// Elapsed wall-clock time in milliseconds.
    pub elapsed_ms: u64,
    /// Optional numeric payload (FPS, memory bytes) read from the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// When the sample was taken.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkSample {
    /// Creates a sample for an operation that took `elapsed`.
    pub fn new(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            operation: operation.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            value: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches a numeric payload to the sample.
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Best-effort snapshot of backend-observable resource metrics.
///
/// Absent readings stay `None`; a backend that cannot observe a metric
/// reports it as unavailable, never fabricated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_count: Option<u32>,
}

impl ResourceMetrics {
    /// Returns true if no reading is available at all.
    pub fn is_empty(&self) -> bool {
        self.memory_bytes.is_none()
            && self.cpu_percent.is_none()
            && self.fps.is_none()
            && self.crash_count.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_failure_classification() {
        assert!(TestStatus::Failed.is_failure());
        assert!(TestStatus::Error.is_failure());
        assert!(!TestStatus::Passed.is_failure());
        assert!(!TestStatus::Skipped.is_failure());
    }

    #[test]
    fn test_result_constructors() {
        let pass = TestResult::passed("login_test", Duration::from_millis(120));
        assert_eq!(pass.status, TestStatus::Passed);
        assert_eq!(pass.duration_ms, 120);
        assert!(pass.error_message.is_none());

        let fail = TestResult::failed("login_test", Duration::from_millis(80), "no welcome text");
        assert_eq!(fail.status, TestStatus::Failed);
        assert_eq!(fail.error_message.as_deref(), Some("no welcome text"));

        let skip = TestResult::skipped("checkout_test", "session lost");
        assert_eq!(skip.status, TestStatus::Skipped);
        assert_eq!(skip.duration_ms, 0);
    }

    #[test]
    fn test_sample_serialization_shape() {
        let sample = BenchmarkSample::new("element_find", Duration::from_millis(42)).with_value(60.0);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["operation"], "element_find");
        assert_eq!(json["elapsed_ms"], 42);
        assert_eq!(json["value"], 60.0);
        assert!(json.get("ts").is_some());
    }

    #[test]
    fn test_resource_metrics_absent_fields_not_serialized() {
        let metrics = ResourceMetrics {
            memory_bytes: Some(128 * 1024 * 1024),
            ..ResourceMetrics::default()
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert!(json.get("memory_bytes").is_some());
        assert!(json.get("fps").is_none());
        assert!(!metrics.is_empty());
        assert!(ResourceMetrics::default().is_empty());
    }
}
