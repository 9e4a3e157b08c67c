//! VST plugin adapter.
//!
//! Drives audio plugin targets by loading them into a DAW host through an
//! external host driver; the target location is the plugin binary or a host
//! project referencing it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use betakit_proto::{
    Adapter, Category, Error, ResourceMetrics, Result, TargetDescriptor, TestResult,
};

use crate::driver::DriverBackend;
use crate::process_driver::ProcessDriver;
use crate::session::DriverSession;

const DAWS: &[&str] = &["reaper", "ableton", "logic", "bitwig"];

fn default_startup_timeout() -> u64 {
    45
}

/// Validated VST adapter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VstConfig {
    /// Host DAW: reaper, ableton, logic, or bitwig.
    pub daw_type: String,
    /// Path to the DAW executable.
    pub daw_path: String,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

/// Adapter for VST plugin targets.
pub struct VstAdapter {
    config: Option<VstConfig>,
    session: Option<DriverSession>,
    backend_override: Option<Box<dyn DriverBackend>>,
}

impl VstAdapter {
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

    fn build_backend(config: &VstConfig) -> Box<dyn DriverBackend> {
        let args = vec![
            "--daw".to_string(),
            config.daw_type.clone(),
            "--daw-path".to_string(),
            config.daw_path.clone(),
        ];
        Box::new(ProcessDriver::new("betakit-daw-driver", args))
    }

    fn session_mut(&mut self) -> Result<&mut DriverSession> {
        self.session.as_mut().ok_or(Error::NotConnected)
    }
}

impl Default for VstAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for VstAdapter {
    fn name(&self) -> &str {
        "vst"
    }

    fn category(&self) -> Category {
        Category::Vst
    }

    fn configure(&mut self, options: &serde_json::Value) -> Result<()> {
        let config: VstConfig = serde_json::from_value(options.clone())
            .map_err(|e| Error::Configuration(format!("vst adapter: {e}")))?;
        if !DAWS.contains(&config.daw_type.as_str()) {
            return Err(Error::Configuration(format!(
                "vst adapter: unknown daw_type {:?} (expected one of {})",
                config.daw_type,
                DAWS.join(", ")
            )));
        }
        if config.daw_path.trim().is_empty() {
            return Err(Error::Configuration(
                "vst adapter: daw_path must not be empty".to_string(),
            ));
        }
        self.config = Some(config);
        Ok(())
    }

    async fn connect(&mut self, target: &TargetDescriptor) -> Result<()> {
        if self.session.is_none() {
            let config = self
                .config
                .as_ref()
                .ok_or_else(|| Error::Configuration("vst adapter: not configured".to_string()))?;
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
