//! Privileged command execution.
//!
//! The controller decides *what* to run; a `ProcessLauncher` decides *how*.
//! Swapping the launcher (setuid helper, service-manager API, container
//! runtime) leaves the controller and upgrade logic untouched.

use std::process::Command;
use std::sync::Mutex;

use oms_core::Operation;
use tracing::{debug, info, warn};

use crate::error::{ProcessError, ProcessResult};

/// A service-manager action for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCommand {
    pub operation: Operation,
    /// Lower-cased application key, used as the unit name.
    pub unit: String,
}

impl ServiceCommand {
    pub fn new(app_key: &str, operation: Operation) -> Self {
        Self {
            operation,
            unit: app_key.trim().to_lowercase(),
        }
    }
}

/// Output of a successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutput {
    /// The command line that was (or would have been) executed.
    pub command: String,
    pub stdout: String,
}

/// Executes service commands.
pub trait ProcessLauncher: Send + Sync {
    /// Run the command, blocking until it exits.
    fn launch(&self, command: &ServiceCommand) -> ProcessResult<LaunchOutput>;
}

/// Runs `[sudo] <service_manager> <verb> <unit>` through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    elevate: bool,
    service_manager: String,
}

impl Default for ShellLauncher {
    fn default() -> Self {
        Self {
            elevate: true,
            service_manager: "systemctl".to_string(),
        }
    }
}

impl ShellLauncher {
    pub fn new(elevate: bool, service_manager: &str) -> Self {
        Self {
            elevate,
            service_manager: service_manager.to_string(),
        }
    }

    /// The shell command line for `command`, e.g. `sudo systemctl restart wcs`.
    pub fn render(&self, command: &ServiceCommand) -> String {
        let base = format!(
            "{} {} {}",
            self.service_manager,
            command.operation.verb(),
            command.unit
        );
        if self.elevate {
            format!("sudo {base}")
        } else {
            base
        }
    }
}

impl ProcessLauncher for ShellLauncher {
    fn launch(&self, command: &ServiceCommand) -> ProcessResult<LaunchOutput> {
        let line = self.render(command);
        info!(operation = %command.operation, command = %line, "executing service command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .output()
            .map_err(|source| ProcessError::Spawn {
                command: line.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            warn!(
                command = %line,
                code = ?output.status.code(),
                %stderr,
                "service command failed"
            );
            return Err(ProcessError::ExecutionFailed {
                command: line,
                code: output.status.code(),
                stderr,
            });
        }

        debug!(command = %line, %stdout, "service command succeeded");
        Ok(LaunchOutput {
            command: line,
            stdout,
        })
    }
}

/// Records rendered commands instead of executing them.
///
/// Used by `omsd --dry-run` on hosts without a service manager, and by tests.
#[derive(Debug, Default)]
pub struct DryRunLauncher {
    shell: ShellLauncher,
    issued: Mutex<Vec<String>>,
}

impl DryRunLauncher {
    pub fn new(shell: ShellLauncher) -> Self {
        Self {
            shell,
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Command lines recorded so far, oldest first.
    pub fn commands(&self) -> Vec<String> {
        self.issued
            .lock()
            .map(|issued| issued.clone())
            .unwrap_or_default()
    }
}

impl ProcessLauncher for DryRunLauncher {
    fn launch(&self, command: &ServiceCommand) -> ProcessResult<LaunchOutput> {
        let line = self.shell.render(command);
        info!(command = %line, "dry run: service command not executed");
        if let Ok(mut issued) = self.issued.lock() {
            issued.push(line.clone());
        }
        Ok(LaunchOutput {
            command: line,
            stdout: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lowercases_unit_and_verb() {
        let shell = ShellLauncher::default();
        let cmd = ServiceCommand::new("WCS", Operation::Restart);
        assert_eq!(shell.render(&cmd), "sudo systemctl restart wcs");
    }

    #[test]
    fn render_without_elevation() {
        let shell = ShellLauncher::new(false, "systemctl");
        let cmd = ServiceCommand::new("Wms", Operation::Stop);
        assert_eq!(shell.render(&cmd), "systemctl stop wms");
    }

    #[test]
    fn dry_run_records_commands() {
        let launcher = DryRunLauncher::default();
        launcher
            .launch(&ServiceCommand::new("WCS", Operation::Start))
            .unwrap();
        launcher
            .launch(&ServiceCommand::new("WCS", Operation::Stop))
            .unwrap();
        assert_eq!(
            launcher.commands(),
            vec!["sudo systemctl start wcs", "sudo systemctl stop wcs"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn shell_launcher_surfaces_exit_code() {
        // `false` ignores its arguments and exits 1.
        let shell = ShellLauncher::new(false, "false");
        let err = shell
            .launch(&ServiceCommand::new("wcs", Operation::Restart))
            .unwrap_err();
        match err {
            ProcessError::ExecutionFailed { command, code, .. } => {
                assert_eq!(command, "false restart wcs");
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn shell_launcher_captures_stdout() {
        let shell = ShellLauncher::new(false, "echo");
        let out = shell
            .launch(&ServiceCommand::new("wcs", Operation::Start))
            .unwrap();
        assert_eq!(out.stdout, "start wcs");
    }
}
