//! Windows application adapter.
//!
//! Drives native Windows targets through a WinAppDriver-style automation
//! server addressed by URL; the session endpoint launches the application
//! and exposes UI operations over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use betakit_proto::{
    Adapter, Category, Error, ResourceMetrics, Result, TargetDescriptor, TestResult,
};

use crate::driver::DriverBackend;
use crate::http_driver::HttpDriver;
use crate::session::DriverSession;

fn default_startup_timeout() -> u64 {
    10
}

/// Validated Windows adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowsConfig {
    /// Automation server URL, e.g. `http://127.0.0.1:4723`.
    pub winappdriver_url: String,
    /// Application startup timeout in seconds.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

/// Adapter for native Windows application targets.
pub struct WindowsAdapter {
    config: Option<WindowsConfig>,
    session: Option<DriverSession>,
    backend_override: Option<Box<dyn DriverBackend>>,
}

impl WindowsAdapter {
    /// Creates an unconfigured adapter.
    pub fn new() -> Self {
        Self {
            config: None,
            session: None,
            backend_override: None,
        }
    }

    /// Creates an adapter with an injected backend (used by tests).
    pub fn with_backend(backend: Box<dyn DriverBackend>) -> Self {
        Self {
            config: None,
            session: None,
            backend_override: Some(backend),
        }
    }

    fn session_mut(&mut self) -> Result<&mut DriverSession> {
        self.session.as_mut().ok_or(Error::NotConnected)
    }
}

impl Default for WindowsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for WindowsAdapter {
    fn name(&self) -> &str {
        "windows"
    }

    fn category(&self) -> Category {
        Category::Windows
    }

    fn configure(&mut self, options: &serde_json::Value) -> Result<()> {
        let config: WindowsConfig = serde_json::from_value(options.clone())
            .map_err(|e| Error::Configuration(format!("windows adapter: {e}")))?;
        if !config.winappdriver_url.starts_with("http://")
            && !config.winappdriver_url.starts_with("https://")
        {
            return Err(Error::Configuration(format!(
                "windows adapter: winappdriver_url must be an http(s) URL, got {:?}",
                config.winappdriver_url
            )));
        }
        self.config = Some(config);
        Ok(())
    }

    async fn connect(&mut self, target: &TargetDescriptor) -> Result<()> {
        if self.session.is_none() {
            let config = self.config.as_ref().ok_or_else(|| {
                Error::Configuration("windows adapter: not configured".to_string())
            })?;
            let backend = match self.backend_override.take() {
                Some(backend) => backend,
                None => Box::new(HttpDriver::new(&config.winappdriver_url)),
            };
            let timeout = Duration::from_secs(config.startup_timeout_secs);
            self.session = Some(DriverSession::new(backend, timeout));
        }
        self.session_mut()?.connect(target).await
    }

    async fn run_test(
        &mut self,
        name: &str,
        parameters: &serde_json::Value,
    ) -> Result<TestResult> {
        self.session_mut()?.run_test(name, parameters).await
    }

    async fn collect_metrics(&mut self) -> Result<ResourceMetrics> {
        self.session_mut()?.collect_metrics().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.session_mut()?.disconnect().await
    }

    fn logs(&self) -> Vec<String> {
        self.session.as_ref().map(|s| s.logs()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDriver;
    use betakit_proto::TestStatus;
    use serde_json::json;

    fn target() -> TargetDescriptor {
        TargetDescriptor::new(r"C:\Apps\Calculator.exe", Category::Windows)
    }

    #[test]
    fn test_missing_url_rejected() {
        let mut adapter = WindowsAdapter::new();
        let err = adapter.configure(&json!({})).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let mut adapter = WindowsAdapter::new();
        let err = adapter
            .configure(&json!({"winappdriver_url": "127.0.0.1:4723"}))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let mut adapter = WindowsAdapter::new();
        let err = adapter
            .configure(&json!({
                "winappdriver_url": "http://127.0.0.1:4723",
                "winium_url": "http://localhost:9999"
            }))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_lifecycle_with_mock_backend() {
        let driver = MockDriver::ok();
        let handle = driver.clone();
        let mut adapter = WindowsAdapter::with_backend(Box::new(driver));
        adapter
            .configure(&json!({
                "winappdriver_url": "http://127.0.0.1:4723",
                "startup_timeout_secs": 5
            }))
            .unwrap();

        adapter.connect(&target()).await.unwrap();
        let result = adapter.run_test("window_title", &json!({})).await.unwrap();
        assert_eq!(result.status, TestStatus::Passed);

        adapter.disconnect().await.unwrap();
        assert!(handle.was_shut_down());
    }
}
