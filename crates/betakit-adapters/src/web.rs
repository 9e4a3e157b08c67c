//! Web application adapter.
//!
//! Drives browser-based targets through an external web automation driver
//! (Playwright- or Selenium-flavored), optionally routed through a grid hub
//! for parallel cross-browser runs.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use betakit_proto::{
    Adapter, Category, Error, ResourceMetrics, Result, TargetDescriptor, TestResult,
};

use crate::driver::DriverBackend;
use crate::process_driver::ProcessDriver;
use crate::session::DriverSession;

const BROWSERS: &[&str] = &["chromium", "firefox", "webkit", "chrome", "edge"];

fn default_true() -> bool {
    true
}

fn default_startup_timeout() -> u64 {
    30
}

/// Validated web adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebConfig {
    /// Browser to launch: chromium, firefox, webkit, chrome, or edge.
    pub browser: String,
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Playwright-flavored driver when true, Selenium-flavored otherwise.
    #[serde(default = "default_true")]
    pub use_playwright: bool,
    /// Grid hub URL for parallel cross-browser execution.
    #[serde(default)]
    pub grid_url: Option<String>,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

/// Adapter for web application targets.
pub struct WebAdapter {
    config: Option<WebConfig>,
    session: Option<DriverSession>,
    backend_override: Option<Box<dyn DriverBackend>>,
}

impl WebAdapter {
    /// Creates an unconfigured adapter using the external web driver.
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

    fn build_backend(config: &WebConfig) -> Box<dyn DriverBackend> {
        let command = if config.use_playwright {
            "betakit-playwright-driver"
        } else {
            "betakit-selenium-driver"
        };
        let mut args = vec!["--browser".to_string(), config.browser.clone()];
        if config.headless {
            args.push("--headless".to_string());
        }
        if let Some(grid) = &config.grid_url {
            args.push("--grid-url".to_string());
            args.push(grid.clone());
        }
        Box::new(ProcessDriver::new(command, args))
    }

    fn session_mut(&mut self) -> Result<&mut DriverSession> {
        self.session.as_mut().ok_or(Error::NotConnected)
    }
}

impl Default for WebAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for WebAdapter {
    fn name(&self) -> &str {
        "web"
    }

    fn category(&self) -> Category {
        Category::Web
    }

    fn configure(&mut self, options: &serde_json::Value) -> Result<()> {
        let config: WebConfig = serde_json::from_value(options.clone())
            .map_err(|e| Error::Configuration(format!("web adapter: {e}")))?;
        if !BROWSERS.contains(&config.browser.as_str()) {
            return Err(Error::Configuration(format!(
                "web adapter: unknown browser {:?} (expected one of {})",
                config.browser,
                BROWSERS.join(", ")
            )));
        }
        self.config = Some(config);
        Ok(())
    }

    async fn connect(&mut self, target: &TargetDescriptor) -> Result<()> {
        if self.session.is_none() {
            let config = self
                .config
                .as_ref()
                .ok_or_else(|| Error::Configuration("web adapter: not configured".to_string()))?;
            let backend = match self.backend_override.take() {
                Some(backend) => backend,
                None => Self::build_backend(config),
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
