//! Driver transport over a spawned process.
//!
//! Spawns the external driver command and speaks a JSON-lines protocol over
//! its stdio: one request object per line on stdin, one [`DriverReply`]
//! object per line on stdout. Stderr lines are buffered as driver logs. The
//! driver answers the initial `start` request to signal readiness.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use betakit_proto::{Error, ResourceMetrics, Result, TargetDescriptor};

use crate::driver::{DriverBackend, DriverReply};

#[derive(Debug, Serialize)]
struct DriverRequest<'a> {
    op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    params: &'a serde_json::Value,
}

/// Spawned-process driver transport.
pub struct ProcessDriver {
    command: String,
    args: Vec<String>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr_task: Option<JoinHandle<Vec<String>>>,
    logs: Vec<String>,
}

impl ProcessDriver {
    /// Creates a transport that will spawn `command` with `args`.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            child: None,
            stdin: None,
            stdout: None,
            stderr_task: None,
            logs: Vec::new(),
        }
    }

    async fn send(&mut self, request: &DriverRequest<'_>) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::SessionLost("driver stdin closed".to_string()))?;
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::SessionLost(format!("driver write failed: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::SessionLost(format!("driver write failed: {e}")))?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<DriverReply> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| Error::SessionLost("driver stdout closed".to_string()))?;
        match stdout.next_line().await {
            Ok(Some(line)) => {
                debug!(%line, "driver reply");
                serde_json::from_str(&line).map_err(Error::Json)
            }
            Ok(None) => Err(Error::SessionLost("driver exited".to_string())),
            Err(e) => Err(Error::SessionLost(format!("driver read failed: {e}"))),
        }
    }

    async fn round_trip(
        &mut self,
        op: &str,
        target: Option<&str>,
        params: &serde_json::Value,
    ) -> Result<DriverReply> {
        self.send(&DriverRequest { op, target, params }).await?;
        self.receive().await
    }

    /// Kills the child and folds captured stderr into the log buffer.
    async fn reap(&mut self) {
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "driver process kill failed");
            }
        }
        if let Some(task) = self.stderr_task.take() {
            if let Ok(lines) = task.await {
                self.logs.extend(lines);
            }
        }
    }
}

#[async_trait]
impl DriverBackend for ProcessDriver {
    async fn start(&mut self, target: &TargetDescriptor, timeout: Duration) -> Result<()> {
        if self.child.is_some() {
            return Err(Error::AlreadyConnected);
        }

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Connection(format!("failed to spawn {}: {e}", self.command)))?;

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take().map(|out| BufReader::new(out).lines());

        // Drain stderr into the log buffer in the background; the lines are
        // joined back in on shutdown.
        self.stderr_task = child.stderr.take().map(|err| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(err).lines();
                let mut collected = Vec::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    collected.push(line);
                }
                collected
            })
        });

        self.child = Some(child);

        // Handshake: the driver must answer the start request within the
        // startup timeout or the connect fails instead of hanging.
        let started = tokio::time::timeout(
            timeout,
            self.round_trip("start", Some(&target.location), &serde_json::Value::Null),
        )
        .await;

        match started {
            Ok(Ok(reply)) if reply.ok => Ok(()),
            Ok(Ok(reply)) => {
                self.reap().await;
                Err(Error::Connection(
                    reply
                        .detail
                        .unwrap_or_else(|| "driver rejected target".to_string()),
                ))
            }
            Ok(Err(e)) => {
                self.reap().await;
                Err(Error::Connection(format!("driver start failed: {e}")))
            }
            Err(_) => {
                self.reap().await;
                Err(Error::Connection(format!(
                    "driver did not become ready within {}s",
                    timeout.as_secs()
                )))
            }
        }
    }

    async fn invoke(
        &mut self,
        operation: &str,
        parameters: &serde_json::Value,
    ) -> Result<DriverReply> {
        self.round_trip(operation, None, parameters).await
    }

    async fn probe(&mut self) -> Result<ResourceMetrics> {
        let reply = self
            .round_trip("metrics", None, &serde_json::Value::Null)
            .await?;
        // Readings arrive as JSON in the reply detail; anything missing or
        // unparseable stays unavailable.
        match reply.detail {
            Some(payload) => Ok(serde_json::from_str(&payload).unwrap_or_default()),
            None => Ok(ResourceMetrics::default()),
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        // Best-effort goodbye; the driver may already be gone.
        if self.stdin.is_some() {
            let _ = self
                .send(&DriverRequest {
                    op: "shutdown",
                    target: None,
                    params: &serde_json::Value::Null,
                })
                .await;
        }
        self.reap().await;
        Ok(())
    }

    fn logs(&self) -> Vec<String> {
        self.logs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betakit_proto::Category;

    fn target() -> TargetDescriptor {
        TargetDescriptor::new("https://app.example.com", Category::Web)
    }

    // `cat` echoes each request line back; a request object happens to be a
    // valid reply object only when it carries an `ok` field, so craft the
    // echo with a driver that replies via a tiny shell script instead.
    fn echo_driver() -> ProcessDriver {
        ProcessDriver::new(
            "sh",
            vec![
                "-c".to_string(),
                // Replies `{"ok":true}` to every request line.
                r#"while read -r _line; do echo '{"ok":true}'; done"#.to_string(),
            ],
        )
    }

    #[tokio::test]
    async fn test_start_invoke_shutdown_round_trip() {
        let mut driver = echo_driver();
        driver.start(&target(), Duration::from_secs(5)).await.unwrap();

        let reply = driver
            .invoke("element_find", &serde_json::json!({"selector": "#login"}))
            .await
            .unwrap();
        assert!(reply.ok);

        driver.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unspawnable_command_is_connection_error() {
        let mut driver = ProcessDriver::new("betakit-driver-that-does-not-exist", vec![]);
        let err = driver.start(&target(), Duration::from_secs(1)).await;
        assert!(matches!(err, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn test_silent_driver_times_out() {
        // A driver that never answers the handshake.
        let mut driver = ProcessDriver::new("sh", vec!["-c".to_string(), "sleep 30".to_string()]);
        let err = driver.start(&target(), Duration::from_millis(200)).await;
        assert!(matches!(err, Err(Error::Connection(detail)) if detail.contains("ready")));
    }

    #[tokio::test]
    async fn test_dead_driver_reports_session_lost() {
        let mut driver = ProcessDriver::new(
            "sh",
            vec![
                "-c".to_string(),
                // Answer the handshake, then exit.
                r#"read -r _line; echo '{"ok":true}'"#.to_string(),
            ],
        );
        driver.start(&target(), Duration::from_secs(5)).await.unwrap();

        let err = driver.invoke("ui_response", &serde_json::Value::Null).await;
        assert!(matches!(err, Err(Error::SessionLost(_))));
    }
}
