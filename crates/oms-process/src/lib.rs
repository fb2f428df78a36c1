//! oms-process: start, stop and restart applications through the host
//! service manager.
//!
//! # Architecture
//!
//! ```text
//! ProcessController (operate lock, platform gate, validation)
//!   └── Arc<dyn ProcessLauncher>
//!         ├── ShellLauncher   `sudo systemctl <verb> <unit>` via `sh -c`
//!         └── DryRunLauncher  records commands, executes nothing
//! ```
//!
//! Launchers are synchronous; the controller runs them on the blocking
//! pool while holding its lock, so at most one command is in flight.

pub mod controller;
pub mod error;
pub mod launcher;

pub use controller::ProcessController;
pub use error::{ProcessError, ProcessResult};
pub use launcher::{DryRunLauncher, LaunchOutput, ProcessLauncher, ServiceCommand, ShellLauncher};
