//! The driver-backend seam.
//!
//! An adapter never drives a browser, game engine, DAW, or UI tree itself;
//! it talks to an external driver through this trait. Transports live in
//! [`crate::process_driver`] (spawned process, JSON lines over stdio) and
//! [`crate::http_driver`] (HTTP session endpoint).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use betakit_proto::{ResourceMetrics, Result, TargetDescriptor};

/// Reply to one driver operation.
///
/// `ok: false` is an operation-level failure — the session is still alive and
/// the adapter converts it into a failed test result. Transport-level loss is
/// reported as `Error::SessionLost` by the backend instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverReply {
    /// Whether the operation succeeded on the target.
    pub ok: bool,
    /// Failure detail or informational message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Optional numeric reading produced by the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl DriverReply {
    /// A successful reply with no payload.
    pub fn ok() -> Self {
        Self {
            ok: true,
            detail: None,
            value: None,
        }
    }

    /// A failed reply with a detail message.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
            value: None,
        }
    }
}

/// Transport to one external automation driver.
///
/// Implementors own the underlying session handle for their lifetime. All
/// calls may block on external I/O; `start` is expected to complete within
/// the timeout it is given, and the other calls fail with
/// `Error::SessionLost` once the transport is gone.
#[async_trait]
pub trait DriverBackend: Send {
    /// Establishes the driver session against `target`.
    async fn start(&mut self, target: &TargetDescriptor, timeout: Duration) -> Result<()>;

    /// Invokes one named operation and returns the driver's reply.
    async fn invoke(
        &mut self,
        operation: &str,
        parameters: &serde_json::Value,
    ) -> Result<DriverReply>;

    /// Best-effort resource probe; backends without a reading return an
    /// empty [`ResourceMetrics`].
    async fn probe(&mut self) -> Result<ResourceMetrics>;

    /// Tears the session down and releases driver resources.
    async fn shutdown(&mut self) -> Result<()>;

    /// Driver log lines captured so far, oldest first.
    fn logs(&self) -> Vec<String> {
        Vec::new()
    }
}
