use std::path::PathBuf;

use oms_process::ProcessError;
use oms_state::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("config key {0} is missing or blank")]
    ConfigMissing(String),

    #[error("install directory {} must contain exactly one file, found {found}", .path.display())]
    DirectoryStateInvalid { path: PathBuf, found: usize },

    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("blocking task failed: {0}")]
    Join(String),
}

pub type DeployResult<T> = Result<T, DeployError>;

impl DeployError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::Io {
            path: path.into(),
            source,
        }
    }
}
