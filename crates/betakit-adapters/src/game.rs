//! Game adapter.
//!
//! Drives game builds through an external image/input automation driver
//! (AirTest-flavored) for windows and android targets.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use betakit_proto::{
    Adapter, Category, Error, ResourceMetrics, Result, TargetDescriptor, TestResult,
};

use crate::driver::DriverBackend;
use crate::process_driver::ProcessDriver;
use crate::session::DriverSession;

const PLATFORMS: &[&str] = &["windows", "android"];

fn default_startup_timeout() -> u64 {
    60
}

/// Validated game adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameConfig {
    /// Target platform: windows or android.
    pub platform: String,
    /// Enables image-based automation in the driver.
    #[serde(default)]
    pub airtest_enabled: bool,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

/// Adapter for game targets.
pub struct GameAdapter {
    config: Option<GameConfig>,
    session: Option<DriverSession>,
    backend_override: Option<Box<dyn DriverBackend>>,
}

impl GameAdapter {
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

    fn build_backend(config: &GameConfig) -> Box<dyn DriverBackend> {
        let mut args = vec!["--platform".to_string(), config.platform.clone()];
        if config.airtest_enabled {
            args.push("--airtest".to_string());
        }
        Box::new(ProcessDriver::new("betakit-game-driver", args))
    }

    fn session_mut(&mut self) -> Result<&mut DriverSession> {
        self.session.as_mut().ok_or(Error::NotConnected)
    }
}

impl Default for GameAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for GameAdapter {
    fn name(&self) -> &str {
        "game"
    }

    fn category(&self) -> Category {
        Category::Game
    }

    fn configure(&mut self, options: &serde_json::Value) -> Result<()> {
        let config: GameConfig = serde_json::from_value(options.clone())
            .map_err(|e| Error::Configuration(format!("game adapter: {e}")))?;
        if !PLATFORMS.contains(&config.platform.as_str()) {
            return Err(Error::Configuration(format!(
                "game adapter: unknown platform {:?} (expected one of {})",
                config.platform,
                PLATFORMS.join(", ")
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
                .ok_or_else(|| Error::Configuration("game adapter: not configured".to_string()))?;
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
