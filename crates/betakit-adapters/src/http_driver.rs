//! Driver transport over an HTTP session endpoint.
//!
//! Speaks to a WinAppDriver-style automation server: `POST /session` creates
//! a session against the target, operations go to
//! `POST /session/{id}/operation/{name}`, resource readings come from
//! `GET /session/{id}/metrics`, and `DELETE /session/{id}` tears down.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use betakit_proto::{Error, ResourceMetrics, Result, TargetDescriptor};

use crate::driver::{DriverBackend, DriverReply};

#[derive(Debug, Deserialize)]
struct SessionCreated {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// HTTP session driver transport.
pub struct HttpDriver {
    base_url: String,
    client: reqwest::Client,
    session_id: Option<String>,
}

impl HttpDriver {
    /// Creates a transport against `base_url` (e.g. `http://127.0.0.1:4723`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
            session_id: None,
        }
    }

    fn session_url(&self, suffix: &str) -> Result<String> {
        let id = self
            .session_id
            .as_ref()
            .ok_or(Error::NotConnected)?;
        Ok(format!("{}/session/{id}{suffix}", self.base_url))
    }

    /// A transport error after the session was established means the session
    /// (or the server behind it) is gone.
    fn lost(e: reqwest::Error) -> Error {
        Error::SessionLost(format!("automation server unreachable: {e}"))
    }
}

#[async_trait]
impl DriverBackend for HttpDriver {
    async fn start(&mut self, target: &TargetDescriptor, timeout: Duration) -> Result<()> {
        if self.session_id.is_some() {
            return Err(Error::AlreadyConnected);
        }

        let response = self
            .client
            .post(format!("{}/session", self.base_url))
            .timeout(timeout)
            .json(&serde_json::json!({ "target": target.location }))
            .send()
            .await
            .map_err(|e| Error::Connection(format!("session create failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Connection(format!(
                "session create rejected: HTTP {}",
                response.status()
            )));
        }

        let created: SessionCreated = response
            .json()
            .await
            .map_err(|e| Error::Connection(format!("malformed session reply: {e}")))?;
        debug!(session = %created.session_id, "http driver session created");
        self.session_id = Some(created.session_id);
        Ok(())
    }

    async fn invoke(
        &mut self,
        operation: &str,
        parameters: &serde_json::Value,
    ) -> Result<DriverReply> {
        let url = self.session_url(&format!("/operation/{operation}"))?;
        let response = self
            .client
            .post(url)
            .json(parameters)
            .send()
            .await
            .map_err(Self::lost)?;

        if response.status().as_u16() == 404 {
            // The server forgot the session: it died underneath us.
            return Err(Error::SessionLost("session no longer known".to_string()));
        }

        response.json().await.map_err(Self::lost)
    }

    async fn probe(&mut self) -> Result<ResourceMetrics> {
        let url = self.session_url("/metrics")?;
        let response = self.client.get(url).send().await.map_err(Self::lost)?;
        if !response.status().is_success() {
            // Metrics are best-effort; an unsupported endpoint reports
            // everything as unavailable.
            return Ok(ResourceMetrics::default());
        }
        Ok(response.json().await.unwrap_or_default())
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Ok(url) = self.session_url("") {
            if let Err(e) = self.client.delete(url).send().await {
                warn!(error = %e, "session delete failed");
            }
        }
        self.session_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betakit_proto::Category;

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // Nothing listens on this port.
        let mut driver = HttpDriver::new("http://127.0.0.1:1/");
        let target = TargetDescriptor::new("Calculator.exe", Category::Windows);
        let err = driver.start(&target, Duration::from_millis(500)).await;
        assert!(matches!(err, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn test_invoke_before_start_is_not_connected() {
        let mut driver = HttpDriver::new("http://127.0.0.1:4723");
        let err = driver.invoke("click", &serde_json::Value::Null).await;
        assert!(matches!(err, Err(Error::NotConnected)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let driver = HttpDriver::new("http://127.0.0.1:4723///");
        assert_eq!(driver.base_url, "http://127.0.0.1:4723");
    }
}
