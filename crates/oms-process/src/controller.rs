//! Process controller: serialized start/stop/restart.

use std::sync::Arc;

use oms_core::{OperateRequest, Operation, keys};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{ProcessError, ProcessResult};
use crate::launcher::{LaunchOutput, ProcessLauncher, ServiceCommand};

/// Only hosts reporting this OS family run a compatible service manager.
const SUPPORTED_OS: &str = "linux";

/// Issues service-manager commands, one at a time.
pub struct ProcessController {
    launcher: Arc<dyn ProcessLauncher>,
    os: String,
    lock: Mutex<()>,
}

impl ProcessController {
    /// Create a controller for the current host OS.
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            launcher,
            os: std::env::consts::OS.to_string(),
            lock: Mutex::new(()),
        }
    }

    /// Override the reported host OS (for testing).
    pub fn with_os(mut self, os: &str) -> Self {
        self.os = os.to_string();
        self
    }

    /// Handle an operate request as received over HTTP.
    ///
    /// The platform check runs before request validation, so a
    /// non-linux host rejects every request the same way.
    pub async fn operate_request(&self, req: &OperateRequest) -> ProcessResult<LaunchOutput> {
        let _guard = self.lock.lock().await;
        self.ensure_supported()?;

        let app_key = req.app_key.as_deref().unwrap_or_default();
        let operation = match req.operate.as_deref().map(str::trim) {
            Some(op) if !op.is_empty() => op
                .parse::<Operation>()
                .map_err(|e| ProcessError::Validation(e.to_string()))?,
            _ => return Err(ProcessError::Validation("operate is required".to_string())),
        };
        self.run(app_key, operation).await
    }

    /// Apply `operation` to the application named `app_key`.
    pub async fn operate(&self, app_key: &str, operation: Operation) -> ProcessResult<LaunchOutput> {
        let _guard = self.lock.lock().await;
        self.ensure_supported()?;
        self.run(app_key, operation).await
    }

    fn ensure_supported(&self) -> ProcessResult<()> {
        if self.os != SUPPORTED_OS {
            warn!(os = %self.os, "operate rejected on unsupported platform");
            return Err(ProcessError::UnsupportedPlatform(self.os.clone()));
        }
        Ok(())
    }

    /// Must be called with the lock held.
    async fn run(&self, app_key: &str, operation: Operation) -> ProcessResult<LaunchOutput> {
        let app_key =
            keys::validate_app_key(app_key).map_err(|e| ProcessError::Validation(e.to_string()))?;
        let command = ServiceCommand::new(app_key, operation);

        info!(app_key, %operation, unit = %command.unit, "operating app");
        let launcher = Arc::clone(&self.launcher);
        let output = tokio::task::spawn_blocking(move || launcher.launch(&command))
            .await
            .map_err(|e| ProcessError::Join(e.to_string()))??;

        info!(app_key, %operation, command = %output.command, "app operated");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::launcher::DryRunLauncher;

    fn controller(os: &str) -> (ProcessController, Arc<DryRunLauncher>) {
        let launcher = Arc::new(DryRunLauncher::default());
        let controller = ProcessController::new(launcher.clone()).with_os(os);
        (controller, launcher)
    }

    fn request(app_key: Option<&str>, operate: Option<&str>) -> OperateRequest {
        OperateRequest {
            app_key: app_key.map(str::to_string),
            operate: operate.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn operate_issues_lowercased_command() {
        let (controller, launcher) = controller("linux");
        let out = controller.operate("WCS", Operation::Restart).await.unwrap();
        assert_eq!(out.command, "sudo systemctl restart wcs");
        assert_eq!(launcher.commands(), vec!["sudo systemctl restart wcs"]);
    }

    #[tokio::test]
    async fn non_linux_host_executes_nothing() {
        let (controller, launcher) = controller("windows");
        let err = controller.operate("WCS", Operation::Start).await.unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedPlatform(os) if os == "windows"));

        let err = controller
            .operate_request(&request(None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedPlatform(_)));
        assert!(launcher.commands().is_empty());
    }

    #[tokio::test]
    async fn request_parses_operation() {
        let (controller, launcher) = controller("linux");
        controller
            .operate_request(&request(Some("Wms"), Some("stop")))
            .await
            .unwrap();
        assert_eq!(launcher.commands(), vec!["sudo systemctl stop wms"]);
    }

    #[tokio::test]
    async fn missing_fields_are_validation_errors() {
        let (controller, launcher) = controller("linux");

        for req in [
            request(None, Some("START")),
            request(Some("  "), Some("START")),
            request(Some("WCS"), None),
            request(Some("WCS"), Some("")),
            request(Some("WCS"), Some("reload")),
        ] {
            let err = controller.operate_request(&req).await.unwrap_err();
            assert!(matches!(err, ProcessError::Validation(_)), "{req:?}: {err}");
        }
        assert!(launcher.commands().is_empty());
    }

    #[tokio::test]
    async fn shell_metacharacters_rejected() {
        let (controller, launcher) = controller("linux");
        let err = controller
            .operate("wcs; rm -rf /", Operation::Stop)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Validation(_)));
        assert!(launcher.commands().is_empty());
    }

    /// Counts launches that begin while another launch is still running.
    #[derive(Default)]
    struct OverlapLauncher {
        in_flight: AtomicUsize,
        overlaps: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ProcessLauncher for OverlapLauncher {
        fn launch(&self, command: &ServiceCommand) -> ProcessResult<LaunchOutput> {
            if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(50));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LaunchOutput {
                command: format!("{} {}", command.operation, command.unit),
                stdout: String::new(),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_operates_never_overlap() {
        let launcher = Arc::new(OverlapLauncher::default());
        let controller = Arc::new(ProcessController::new(launcher.clone()).with_os("linux"));

        let mut handles = Vec::new();
        for key in ["a", "b", "c", "d"] {
            let c = Arc::clone(&controller);
            handles.push(tokio::spawn(async move {
                c.operate(key, Operation::Restart).await
            }));
        }
        let c = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            c.operate_request(&request(Some("e"), Some("STOP"))).await
        }));
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(launcher.calls.load(Ordering::SeqCst), 5);
        assert_eq!(launcher.overlaps.load(Ordering::SeqCst), 0);
    }
}
