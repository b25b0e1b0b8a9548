//! Lifecycle control of the forwarding daemon through the OS service manager.

use crate::error::{PanelError, Result};
use log::{debug, error, info};
use serde::Serialize;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_UNIT: &str = "realm";
pub const DEFAULT_PROGRAM: &str = "systemctl";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// `systemctl is-active` exit code for a unit that is not running.
const INACTIVE_EXIT_CODE: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Start => "Service started",
            Self::Stop => "Service stopped",
            Self::Restart => "Service restarted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceStatus {
    Active,
    Inactive,
    Unknown,
    CheckFailed,
}

pub struct ServiceControl {
    program: String,
    unit: String,
    timeout: Duration,
}

impl ServiceControl {
    pub fn new(program: impl Into<String>, unit: impl Into<String>, timeout: Duration) -> Self {
        Self { program: program.into(), unit: unit.into(), timeout }
    }

    /// Start, stop or restart the unit. Never retried.
    pub async fn run(&self, action: ServiceAction) -> Result<()> {
        let output = self.exec(&[action.as_str(), &self.unit]).await?;
        if output.status.success() {
            info!("{} {} succeeded", action.as_str(), self.unit);
            return Ok(());
        }
        let reason = format!("exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr).trim());
        error!("{} {} failed: {}", action.as_str(), self.unit, reason);
        Err(PanelError::Subprocess { command: self.describe(&[action.as_str(), &self.unit]), reason })
    }

    /// Query the unit. Not cached: every call runs the service manager.
    pub async fn status(&self) -> ServiceStatus {
        match self.exec(&["is-active", "--quiet", &self.unit]).await {
            Ok(output) => match output.status.code() {
                Some(0) => ServiceStatus::Active,
                Some(INACTIVE_EXIT_CODE) => ServiceStatus::Inactive,
                _ => ServiceStatus::Unknown,
            },
            Err(e) => {
                error!("Status check for {} failed: {}", self.unit, e);
                ServiceStatus::CheckFailed
            }
        }
    }

    async fn exec(&self, args: &[&str]) -> Result<Output> {
        let command = self.describe(args);
        debug!("Running {}", command);
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(PanelError::Subprocess { command, reason: e.to_string() }),
            Err(_) => Err(PanelError::Timeout { command, secs: self.timeout.as_secs() }),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// Write an executable shell script standing in for the service manager.
    fn script(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-systemctl");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn control(program: impl Into<String>) -> ServiceControl {
        ServiceControl::new(program, "realm", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_run_success() {
        assert!(control("true").run(ServiceAction::Restart).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_failure() {
        let result = control("false").run(ServiceAction::Start).await;
        assert!(matches!(result, Err(PanelError::Subprocess { .. })));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = control("/nonexistent/systemctl").run(ServiceAction::Stop).await;
        assert!(matches!(result, Err(PanelError::Subprocess { .. })));
        assert_eq!(control("/nonexistent/systemctl").status().await, ServiceStatus::CheckFailed);
    }

    #[tokio::test]
    async fn test_arguments_passed() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("args");
        let program = script(dir.path(), &format!("echo \"$@\" > {}", log.display()));
        control(program).run(ServiceAction::Restart).await.unwrap();
        assert_eq!(std::fs::read_to_string(log).unwrap().trim(), "restart realm");
    }

    #[tokio::test]
    async fn test_status_codes() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(control("true").status().await, ServiceStatus::Active);
        assert_eq!(control(script(dir.path(), "exit 3")).status().await, ServiceStatus::Inactive);
        assert_eq!(control(script(dir.path(), "exit 4")).status().await, ServiceStatus::Unknown);
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "sleep 10");
        let slow = ServiceControl::new(program, "realm", Duration::from_millis(200));
        assert!(matches!(slow.run(ServiceAction::Start).await, Err(PanelError::Timeout { .. })));
        assert_eq!(slow.status().await, ServiceStatus::CheckFailed);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&ServiceStatus::CheckFailed).unwrap(), "\"check-failed\"");
        assert_eq!(serde_json::to_string(&ServiceStatus::Active).unwrap(), "\"active\"");
    }
}
