//! Metric events and the durable append-only event log.
//!
//! Every recorded outcome becomes one [`MetricEvent`] in an ordered history.
//! The history may be backed by a JSONL file on disk so a collector can be
//! reconstructed by replay; the event log is the source of truth and no
//! derived aggregate is ever persisted independently of it.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use betakit_proto::{BenchmarkSample, Error, Result, TestResult, TestStatus};

/// A single event in the metrics history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    /// When the event occurred.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// Event payload.
    #[serde(rename = "type")]
    pub kind: MetricEventKind,
}

/// Kinds of events that can be recorded in the metrics history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricEventKind {
    /// Outcome of one named test invocation.
    TestResult {
        name: String,
        status: TestStatus,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },

    /// One timed operation measurement.
    BenchmarkSample {
        operation: String,
        elapsed_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
    },

    /// A crash observed on the target. Distinct from a failed test.
    Crash,
}

impl MetricEvent {
    /// Wraps a test result, keeping the result's own timestamp so replayed
    /// histories derive the same aggregates as the live run.
    pub fn from_test_result(result: &TestResult) -> Self {
        Self {
            timestamp: result.timestamp,
            kind: MetricEventKind::TestResult {
                name: result.name.clone(),
                status: result.status,
                duration_ms: result.duration_ms,
                error_message: result.error_message.clone(),
            },
        }
    }

    /// Wraps a benchmark sample, keeping the sample's own timestamp.
    pub fn from_sample(sample: &BenchmarkSample) -> Self {
        Self {
            timestamp: sample.timestamp,
            kind: MetricEventKind::BenchmarkSample {
                operation: sample.operation.clone(),
                elapsed_ms: sample.elapsed_ms,
                value: sample.value,
            },
        }
    }

    /// Records a crash at the current instant.
    pub fn crash() -> Self {
        Self {
            timestamp: Utc::now(),
            kind: MetricEventKind::Crash,
        }
    }
}

/// Append-only JSONL event log.
///
/// Each appended event is written as one line and flushed immediately, so a
/// crashed process leaves a replayable prefix behind.
pub struct EventLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventLog {
    /// Opens the log at `path` for appending, creating parent directories
    /// and the file as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one event and flushes it to disk.
    pub fn append(&mut self, event: &MetricEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Reads every event from the log at `path`, in append order.
    ///
    /// Blank lines are skipped; a malformed line is an error. Replay must
    /// reproduce the live run's aggregates exactly, so a record that cannot
    /// be parsed is surfaced instead of silently dropped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<MetricEvent>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str::<MetricEvent>(&line).map_err(Error::Json)?;
            events.push(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.jsonl");

        let result = TestResult::passed("login_test", Duration::from_millis(120));
        let sample = BenchmarkSample::new("ui_response", Duration::from_millis(45)).with_value(60.0);

        {
            let mut log = EventLog::open(&path).unwrap();
            log.append(&MetricEvent::from_test_result(&result)).unwrap();
            log.append(&MetricEvent::from_sample(&sample)).unwrap();
            log.append(&MetricEvent::crash()).unwrap();
        }

        let events = EventLog::read_all(&path).unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0].kind,
            MetricEventKind::TestResult { ref name, status: TestStatus::Passed, duration_ms: 120, .. }
                if name == "login_test"
        ));
        assert!(matches!(
            events[1].kind,
            MetricEventKind::BenchmarkSample { ref operation, elapsed_ms: 45, value: Some(v) }
                if operation == "ui_response" && (v - 60.0).abs() < f64::EPSILON
        ));
        assert!(matches!(events[2].kind, MetricEventKind::Crash));
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let events = EventLog::read_all(dir.path().join("absent.jsonl")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.jsonl");
        std::fs::write(&path, "{not valid json\n").unwrap();

        let err = EventLog::read_all(&path).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_serialization_format() {
        let event = MetricEvent::crash();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"ts\""));
        assert!(json.contains("\"kind\":\"crash\""));

        let result = TestResult::failed("login_test", Duration::from_millis(10), "no welcome");
        let json = serde_json::to_string(&MetricEvent::from_test_result(&result)).unwrap();
        assert!(json.contains("\"kind\":\"test_result\""));
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"error_message\":\"no welcome\""));
    }

    #[test]
    fn test_event_keeps_source_timestamp() {
        let result = TestResult::passed("t", Duration::ZERO);
        let event = MetricEvent::from_test_result(&result);
        assert_eq!(event.timestamp, result.timestamp);
    }
}
