//! Mock adapter with scripted outcomes for deterministic testing.

use std::time::Duration;

use async_trait::async_trait;

use betakit_proto::{
    Adapter, Category, Error, ResourceMetrics, Result, TargetDescriptor, TestResult,
};

/// Scripted outcome for one `run_test` invocation.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Pass,
    Fail(String),
    /// Infrastructure failure, converted to an errored result.
    Infra(String),
    /// Connection loss mid-operation; poisons the instance.
    SessionLost(String),
}

/// Adapter that replays pre-scripted outcomes.
///
/// Outcomes are consumed in order; once the script is exhausted every further
/// invocation passes. The first `connect_failures` connect attempts fail with
/// a connection error, which is how retry paths are exercised.
#[derive(Debug)]
pub struct MockAdapter {
    name: String,
    category: Category,
    script: Vec<MockOutcome>,
    next: usize,
    connect_failures: usize,
    latency: Duration,
    metrics: ResourceMetrics,
    configured_options: Option<serde_json::Value>,
    connected: bool,
    poisoned: bool,
    closed: bool,
    invocations: Vec<String>,
    log_lines: Vec<String>,
}

impl MockAdapter {
    /// Creates a mock whose every test passes.
    pub fn passing(name: impl Into<String>, category: Category) -> Self {
        Self::scripted(name, category, Vec::new())
    }

    /// Creates a mock that replays `script` in order.
    pub fn scripted(name: impl Into<String>, category: Category, script: Vec<MockOutcome>) -> Self {
        Self {
            name: name.into(),
            category,
            script,
            next: 0,
            connect_failures: 0,
            latency: Duration::ZERO,
            metrics: ResourceMetrics::default(),
            configured_options: None,
            connected: false,
            poisoned: false,
            closed: false,
            invocations: Vec::new(),
            log_lines: Vec::new(),
        }
    }

    /// Makes the first `count` connect attempts fail.
    pub fn with_connect_failures(mut self, count: usize) -> Self {
        self.connect_failures = count;
        self
    }

    /// Adds a fixed per-operation latency so durations are non-zero.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sets the resource metrics returned by `collect_metrics`.
    pub fn with_metrics(mut self, metrics: ResourceMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Operations invoked so far, in order.
    pub fn invocations(&self) -> &[String] {
        &self.invocations
    }

    /// Options last passed to `configure`, if any.
    pub fn configured_options(&self) -> Option<&serde_json::Value> {
        self.configured_options.as_ref()
    }

    fn next_outcome(&mut self) -> MockOutcome {
        let outcome = self
            .script
            .get(self.next)
            .cloned()
            .unwrap_or(MockOutcome::Pass);
        self.next += 1;
        outcome
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.category
    }

    fn configure(&mut self, options: &serde_json::Value) -> Result<()> {
        if !options.is_object() && !options.is_null() {
            return Err(Error::Configuration(
                "options must be a JSON object".to_string(),
            ));
        }
        self.configured_options = Some(options.clone());
        Ok(())
    }

    async fn connect(&mut self, target: &TargetDescriptor) -> Result<()> {
        if self.connected {
            return Err(Error::AlreadyConnected);
        }
        if self.closed {
            return Err(Error::NotConnected);
        }
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(Error::Connection(format!("{target} unreachable")));
        }
        self.connected = true;
        self.log_lines.push(format!("connected to {target}"));
        Ok(())
    }

    async fn run_test(
        &mut self,
        name: &str,
        _parameters: &serde_json::Value,
    ) -> Result<TestResult> {
        if !self.connected || self.poisoned {
            return Err(Error::NotConnected);
        }
        self.invocations.push(name.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.next_outcome() {
            MockOutcome::Pass => Ok(TestResult::passed(name, self.latency)),
            MockOutcome::Fail(detail) => Ok(TestResult::failed(name, self.latency, detail)),
            MockOutcome::Infra(detail) => Ok(TestResult::errored(name, self.latency, detail)),
            MockOutcome::SessionLost(detail) => {
                self.poisoned = true;
                self.connected = false;
                Err(Error::SessionLost(detail))
            }
        }
    }

    async fn collect_metrics(&mut self) -> Result<ResourceMetrics> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        Ok(self.metrics.clone())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.connected = false;
        self.closed = true;
        self.log_lines.push("disconnected".to_string());
        Ok(())
    }

    fn logs(&self) -> Vec<String> {
        self.log_lines.clone()
    }
}
