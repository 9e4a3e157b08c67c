//! Benchmark execution against a connected adapter.
//!
//! The runner drives one adapter instance through a scenario's steps,
//! strictly in order, timing every operation and recording each outcome into
//! the metrics collector as it happens. One step's failure never aborts the
//! remaining steps; only session loss does, and cancellation stops dispatch
//! between operations while preserving everything recorded so far.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use betakit_proto::{
    Adapter, BenchmarkSample, Error, Result, Scenario, TargetDescriptor, TestResult, TestStatus,
};

use crate::collector::MetricsCollector;

/// How often a collector write is retried on `StoreBusy` before giving up.
const STORE_RETRIES: usize = 3;

/// Outcome of one executed scenario step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Operation name of the step.
    pub operation: String,
    /// The recorded result.
    pub result: TestResult,
}

/// Summary of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: String,
    /// Per-step outcomes in execution order, including skipped steps.
    pub steps: Vec<StepOutcome>,
    /// Benchmark samples recorded during the run.
    pub samples_recorded: usize,
    /// True if the session was lost mid-run and remaining steps were skipped.
    pub session_lost: bool,
    /// True if an external stop signal ended the run early.
    pub cancelled: bool,
}

impl ScenarioReport {
    fn new(scenario: &Scenario) -> Self {
        Self {
            scenario: scenario.name.clone(),
            steps: Vec::new(),
            samples_recorded: 0,
            session_lost: false,
            cancelled: false,
        }
    }

    /// True if every executed step passed and the run completed normally.
    pub fn all_passed(&self) -> bool {
        !self.session_lost
            && !self.cancelled
            && self
                .steps
                .iter()
                .all(|step| step.result.status == TestStatus::Passed)
    }

    /// Number of steps with a given status.
    pub fn count(&self, status: TestStatus) -> usize {
        self.steps
            .iter()
            .filter(|step| step.result.status == status)
            .count()
    }
}

/// Executes timed operations against a connected adapter and records the
/// outcomes into a shared [`MetricsCollector`].
pub struct BenchmarkRunner {
    collector: Arc<MetricsCollector>,
}

impl BenchmarkRunner {
    /// Creates a runner writing into `collector`.
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    /// The collector this runner writes into.
    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    /// Runs a scenario's steps sequentially on a connected adapter.
    ///
    /// Per step: the runner records the start instant, invokes the operation
    /// through the adapter, and records the elapsed duration together with
    /// the step's [`TestResult`] and one [`BenchmarkSample`]. Session loss
    /// marks all remaining steps skipped and emits a scenario-level failure;
    /// cancellation stops dispatching new operations.
    pub async fn run_scenario(
        &self,
        adapter: &mut dyn Adapter,
        scenario: &Scenario,
        cancel: &CancellationToken,
    ) -> Result<ScenarioReport> {
        info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");
        let mut report = ScenarioReport::new(scenario);

        for (index, step) in scenario.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(scenario = %scenario.name, at = index, "cancelled, stopping dispatch");
                report.cancelled = true;
                break;
            }

            match self.execute_step(adapter, &step.operation, &step.parameters, &mut report).await? {
                StepFlow::Continue => {}
                StepFlow::SessionLost => {
                    self.abort_remaining(scenario, index + 1, &mut report)?;
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Loops a scenario's operations until the wall-clock budget elapses,
    /// accumulating samples.
    ///
    /// The loop checks the cancellation token between operations; on early
    /// cancellation every sample gathered so far has already been flushed to
    /// the collector, so the cancelled run's samples are a strict prefix of
    /// what the full run would have recorded.
    pub async fn run_stability(
        &self,
        adapter: &mut dyn Adapter,
        scenario: &Scenario,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<ScenarioReport> {
        info!(scenario = %scenario.name, budget_secs = budget.as_secs_f64(), "running stability benchmark");
        let mut report = ScenarioReport::new(scenario);
        if scenario.steps.is_empty() {
            return Ok(report);
        }

        let started = Instant::now();
        'outer: loop {
            for step in &scenario.steps {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'outer;
                }
                if started.elapsed() >= budget {
                    break 'outer;
                }

                match self
                    .execute_step(adapter, &step.operation, &step.parameters, &mut report)
                    .await?
                {
                    StepFlow::Continue => {}
                    StepFlow::SessionLost => {
                        self.record_scenario_failure(scenario, &mut report)?;
                        break 'outer;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Executes one operation and records its outcome.
    async fn execute_step(
        &self,
        adapter: &mut dyn Adapter,
        operation: &str,
        parameters: &serde_json::Value,
        report: &mut ScenarioReport,
    ) -> Result<StepFlow> {
        let start = Instant::now();
        match adapter.run_test(operation, parameters).await {
            Ok(result) => {
                let elapsed = start.elapsed();
                self.record_result(&result)?;
                let sample = BenchmarkSample::new(operation, elapsed);
                self.record_sample(&sample)?;
                report.samples_recorded += 1;
                report.steps.push(StepOutcome {
                    operation: operation.to_string(),
                    result,
                });
                Ok(StepFlow::Continue)
            }
            Err(Error::SessionLost(detail)) => {
                warn!(operation, %detail, "session lost mid-operation");
                let result = TestResult::errored(operation, start.elapsed(), detail);
                self.record_result(&result)?;
                report.steps.push(StepOutcome {
                    operation: operation.to_string(),
                    result,
                });
                report.session_lost = true;
                Ok(StepFlow::SessionLost)
            }
            Err(other) => Err(other),
        }
    }

    /// Marks every step from `from` on as skipped and emits the
    /// scenario-level failure.
    fn abort_remaining(
        &self,
        scenario: &Scenario,
        from: usize,
        report: &mut ScenarioReport,
    ) -> Result<()> {
        for step in &scenario.steps[from..] {
            let result = TestResult::skipped(&step.operation, "session lost");
            self.record_result(&result)?;
            report.steps.push(StepOutcome {
                operation: step.operation.clone(),
                result,
            });
        }
        self.record_scenario_failure(scenario, report)
    }

    fn record_scenario_failure(&self, scenario: &Scenario, report: &mut ScenarioReport) -> Result<()> {
        let result = TestResult::errored(
            &scenario.name,
            Duration::ZERO,
            "scenario aborted: session lost",
        );
        self.record_result(&result)?;
        report.session_lost = true;
        Ok(())
    }

    fn record_result(&self, result: &TestResult) -> Result<()> {
        retry_store(|| self.collector.record_test_result(result))
    }

    fn record_sample(&self, sample: &BenchmarkSample) -> Result<()> {
        retry_store(|| self.collector.record_sample(sample))
    }
}

enum StepFlow {
    Continue,
    SessionLost,
}

/// Retries a collector write a few times on the transient `StoreBusy`
/// signal before surfacing it.
fn retry_store(mut write: impl FnMut() -> Result<()>) -> Result<()> {
    let mut attempts = 0;
    loop {
        match write() {
            Err(Error::StoreBusy) if attempts < STORE_RETRIES => {
                attempts += 1;
                std::thread::yield_now();
            }
            other => return other,
        }
    }
}

/// Connects an adapter with bounded retries.
///
/// Each failed attempt surfaces as a logged `Connection` error; the scenario
/// counts as started only once a connect succeeds, and failed attempts
/// produce no samples. Non-connection errors end the retry loop immediately.
pub async fn connect_with_retries(
    adapter: &mut dyn Adapter,
    target: &TargetDescriptor,
    attempts: u32,
) -> Result<()> {
    let attempts = attempts.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        match adapter.connect(target).await {
            Ok(()) => {
                info!(%target, attempt, "connected");
                return Ok(());
            }
            Err(Error::Connection(detail)) => {
                warn!(%target, attempt, %detail, "connect attempt failed");
                last = Some(Error::Connection(detail));
            }
            Err(other) => return Err(other),
        }
    }
    Err(last.unwrap_or(Error::Connection(format!("{target} unreachable"))))
}
