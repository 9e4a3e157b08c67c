//! Shared session lifecycle for driver-backed adapters.
//!
//! Every category adapter owns its configuration and backend choice; the
//! connect/run/disconnect state machine and the error-to-result conversion
//! are identical across categories and live here.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use betakit_proto::{Error, ResourceMetrics, Result, TargetDescriptor, TestResult};

use crate::driver::DriverBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Connected,
    /// Session lost mid-run; the instance is unusable.
    Poisoned,
    Closed,
}

/// One adapter instance's live session over a driver backend.
pub(crate) struct DriverSession {
    backend: Box<dyn DriverBackend>,
    state: SessionState,
    startup_timeout: Duration,
}

impl DriverSession {
    pub(crate) fn new(backend: Box<dyn DriverBackend>, startup_timeout: Duration) -> Self {
        Self {
            backend,
            state: SessionState::Idle,
            startup_timeout,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub(crate) async fn connect(&mut self, target: &TargetDescriptor) -> Result<()> {
        match self.state {
            SessionState::Connected => return Err(Error::AlreadyConnected),
            SessionState::Poisoned | SessionState::Closed => return Err(Error::NotConnected),
            SessionState::Idle => {}
        }

        self.backend.start(target, self.startup_timeout).await?;
        self.state = SessionState::Connected;
        info!(%target, "session established");
        Ok(())
    }

    /// Runs one named operation, converting backend failures to data.
    ///
    /// Operation-level failures become failed results, other backend errors
    /// become errored results, and only session loss propagates — after
    /// poisoning the instance.
    pub(crate) async fn run_test(
        &mut self,
        name: &str,
        parameters: &serde_json::Value,
    ) -> Result<TestResult> {
        if self.state != SessionState::Connected {
            return Err(Error::NotConnected);
        }

        let start = Instant::now();
        match self.backend.invoke(name, parameters).await {
            Ok(reply) if reply.ok => Ok(TestResult::passed(name, start.elapsed())),
            Ok(reply) => Ok(TestResult::failed(
                name,
                start.elapsed(),
                reply.detail.unwrap_or_else(|| "operation failed".to_string()),
            )),
            Err(Error::SessionLost(detail)) => {
                self.state = SessionState::Poisoned;
                warn!(operation = name, %detail, "session lost");
                Err(Error::SessionLost(detail))
            }
            Err(other) => Ok(TestResult::errored(name, start.elapsed(), other.to_string())),
        }
    }

    pub(crate) async fn collect_metrics(&mut self) -> Result<ResourceMetrics> {
        if self.state != SessionState::Connected {
            return Err(Error::NotConnected);
        }
        match self.backend.probe().await {
            Ok(metrics) => Ok(metrics),
            Err(Error::SessionLost(detail)) => {
                self.state = SessionState::Poisoned;
                Err(Error::SessionLost(detail))
            }
            // Probes are best-effort: a failed reading reports everything
            // unavailable rather than failing the caller.
            Err(_) => Ok(ResourceMetrics::default()),
        }
    }

    pub(crate) async fn disconnect(&mut self) -> Result<()> {
        if self.state != SessionState::Connected {
            return Err(Error::NotConnected);
        }
        self.backend.shutdown().await?;
        self.state = SessionState::Closed;
        Ok(())
    }

    pub(crate) fn logs(&self) -> Vec<String> {
        self.backend.logs()
    }
}
