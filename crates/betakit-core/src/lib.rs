//! # betakit-core
//!
//! Core orchestration functionality for the Betakit engine.
//!
//! This crate provides:
//! - The adapter registry mapping target categories to adapter factories
//! - The benchmark runner that drives an adapter through scenario steps
//! - The thread-safe metrics collector and its durable event log
//! - Report generation over the collected metrics
//! - A scripted mock adapter for deterministic testing

mod collector;
mod events;
mod registry;
mod render;
mod report;
mod runner;
pub mod testing;

pub use collector::{
    DEFAULT_MIN_RUNS, FlakyTestDetail, MetricsCollector, MetricsSnapshot, ResponseStats,
};
pub use events::{EventLog, MetricEvent, MetricEventKind};
pub use registry::{AdapterFactory, AdapterRegistry, global_registry};
pub use render::{ExchangeRenderer, HtmlRenderer, JsonRenderer, Renderer};
pub use report::{
    Issue, Report, ReportGenerator, ScreenshotDiff, Severity, SuiteResult, SuiteSummary,
    TrendPoint, TrendSeries,
};
pub use runner::{BenchmarkRunner, ScenarioReport, StepOutcome, connect_with_retries};
