//! Scripted driver backend for deterministic adapter testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use betakit_proto::{Error, ResourceMetrics, Result, TargetDescriptor};

use crate::driver::{DriverBackend, DriverReply};

/// Scripted behavior for one `invoke` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Ok,
    Failed(String),
    SessionLost(String),
}

#[derive(Debug)]
struct MockState {
    replies: Vec<MockReply>,
    next: usize,
    start_failures: usize,
    invocations: Vec<String>,
    started: bool,
    shut_down: bool,
}

/// Driver backend that replays pre-scripted replies.
///
/// Clones share state, so a test can keep a handle for inspection after
/// handing the backend to an adapter.
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
    metrics: ResourceMetrics,
}

impl MockDriver {
    /// Creates a driver whose every operation succeeds.
    pub fn ok() -> Self {
        Self::scripted(Vec::new())
    }

    /// Creates a driver replaying `replies` in order; an exhausted script
    /// keeps succeeding.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                replies,
                next: 0,
                start_failures: 0,
                invocations: Vec::new(),
                started: false,
                shut_down: false,
            })),
            metrics: ResourceMetrics::default(),
        }
    }

    /// Makes the first `count` start attempts fail.
    pub fn with_start_failures(self, count: usize) -> Self {
        self.state.lock().unwrap().start_failures = count;
        self
    }

    /// Sets the probe reading.
    pub fn with_metrics(mut self, metrics: ResourceMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Operations invoked so far, in order.
    pub fn invocations(&self) -> Vec<String> {
        self.state.lock().unwrap().invocations.clone()
    }

    /// True once `shutdown` was called.
    pub fn was_shut_down(&self) -> bool {
        self.state.lock().unwrap().shut_down
    }
}

#[async_trait]
impl DriverBackend for MockDriver {
    async fn start(&mut self, target: &TargetDescriptor, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.start_failures > 0 {
            state.start_failures -= 1;
            return Err(Error::Connection(format!("{target} unreachable")));
        }
        state.started = true;
        Ok(())
    }

    async fn invoke(
        &mut self,
        operation: &str,
        _parameters: &serde_json::Value,
    ) -> Result<DriverReply> {
        let mut state = self.state.lock().unwrap();
        state.invocations.push(operation.to_string());
        let reply = state.replies.get(state.next).cloned().unwrap_or(MockReply::Ok);
        state.next += 1;
        match reply {
            MockReply::Ok => Ok(DriverReply::ok()),
            MockReply::Failed(detail) => Ok(DriverReply::failed(detail)),
            MockReply::SessionLost(detail) => Err(Error::SessionLost(detail)),
        }
    }

    async fn probe(&mut self) -> Result<ResourceMetrics> {
        Ok(self.metrics.clone())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.state.lock().unwrap().shut_down = true;
        Ok(())
    }

    fn logs(&self) -> Vec<String> {
        vec!["mock driver ready".to_string()]
    }
}
