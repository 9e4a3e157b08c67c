//! The adapter capability contract.
//!
//! Defines the [`Adapter`] trait that target-application integrations (web,
//! windows, game, vst) implement so the benchmark runner and report generator
//! can treat a browser, a game process, a DAW plugin host, and a Windows UI
//! session identically. Backend-specific behavior stays behind `configure`'s
//! option set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::outcome::{ResourceMetrics, TestResult};
use crate::target::{Category, TargetDescriptor};

/// One named step inside a scenario.
///
/// Operation names and parameters are opaque to the engine; the adapter's
/// backend gives them meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Backend-specific operation name.
    pub operation: String,
    /// Backend-specific parameters, passed through untouched.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ScenarioStep {
    /// Creates a step with no parameters.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            parameters: serde_json::Value::Null,
        }
    }

    /// Creates a step with parameters.
    pub fn with_parameters(operation: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            operation: operation.into(),
            parameters,
        }
    }
}

/// An ordered list of named steps run against one connected adapter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name, e.g. `onboarding` or `poweruser`.
    pub name: String,
    /// Steps, executed strictly in order.
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Creates a scenario from a name and steps.
    pub fn new(name: impl Into<String>, steps: Vec<ScenarioStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

/// The uniform capability contract every target integration implements.
///
/// Lifecycle: `configure` → `connect` → `run_test`* → `disconnect`. An
/// implementor carries one logical session: `connect` on a connected instance
/// fails with `AlreadyConnected`, operations outside the connected window
/// fail with `NotConnected`, and reconnecting requires a fresh instance from
/// the registry factory.
#[async_trait]
pub trait Adapter: Send {
    /// Human-readable adapter name.
    fn name(&self) -> &str;

    /// The category this adapter serves.
    fn category(&self) -> Category;

    /// Validates and stores configuration for subsequent `connect` calls.
    ///
    /// Fails with `Error::Configuration` if a required option is missing,
    /// malformed, or unrecognized.
    fn configure(&mut self, options: &serde_json::Value) -> Result<()>;

    /// Establishes a session against `target` within the configured startup
    /// timeout.
    ///
    /// Fails with `Error::Connection` if the target is unreachable or the
    /// backend cannot be started in time, and `Error::AlreadyConnected` if a
    /// session is already live.
    async fn connect(&mut self, target: &TargetDescriptor) -> Result<()>;

    /// Executes one named backend test against the live session.
    ///
    /// Backend operation failures are converted into a failed [`TestResult`],
    /// never propagated — except connection loss, which fails with
    /// `Error::SessionLost` and marks the instance unusable.
    async fn run_test(&mut self, name: &str, parameters: &serde_json::Value)
    -> Result<TestResult>;

    /// Returns a best-effort snapshot of backend-observable resource metrics
    /// at call time. Absent metrics are reported as unavailable.
    async fn collect_metrics(&mut self) -> Result<ResourceMetrics>;

    /// Releases the session and any backend resources.
    ///
    /// Safe to call at most once per instance; fails with
    /// `Error::NotConnected` on an already-disconnected instance.
    async fn disconnect(&mut self) -> Result<()>;

    /// Backend log lines buffered during the session, oldest first.
    ///
    /// Adapters without a log channel return an empty list.
    fn logs(&self) -> Vec<String> {
        Vec::new()
    }
}
