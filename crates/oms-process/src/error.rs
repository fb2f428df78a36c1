//! Process controller error types.

use thiserror::Error;

/// Errors that can occur while operating an application.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("operation only supported on linux hosts (current: {0})")]
    UnsupportedPlatform(String),

    #[error("invalid operate request: {0}")]
    Validation(String),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// `code` is `None` when the process was killed by a signal.
    #[error("`{command}` exited with status {code:?}: {stderr}")]
    ExecutionFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("launcher task failed: {0}")]
    Join(String),
}

pub type ProcessResult<T> = Result<T, ProcessError>;
